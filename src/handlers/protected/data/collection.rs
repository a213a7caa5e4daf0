// handlers/protected/data/collection.rs - GET/POST /api/:product/:resource

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::filter::FilterData;
use crate::handlers::protected::json_body;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::resources::ResourceDef;
use crate::services::resource_service::ResourceService;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// e.g. `last_name asc, first_name`
    pub order: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl From<ListQuery> for FilterData {
    fn from(q: ListQuery) -> Self {
        FilterData {
            order: q.order.map(Value::String),
            limit: q.limit,
            offset: q.offset,
            include_deleted: q.include_deleted,
            ..Default::default()
        }
    }
}

pub async fn list(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Value>> {
    let page = ResourceService::new(def, pool, &user).find(query.into()).await?;
    let meta = page.meta();
    Ok(ApiResponse::success(page.rows).with_meta(meta))
}

pub async fn create(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let body = json_body(payload)?;
    let row = ResourceService::new(def, pool, &user).create(body).await?;
    tracing::info!(table = def.table, user_id = %user.user_id, "Created record");
    Ok(ApiResponse::created(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_maps_to_filter() {
        let filter: FilterData = ListQuery {
            limit: Some(10),
            order: Some("name desc".into()),
            include_deleted: true,
            ..Default::default()
        }
        .into();
        assert_eq!(filter.limit, Some(10));
        assert_eq!(filter.order, Some(Value::String("name desc".into())));
        assert!(filter.include_deleted);
        assert!(filter.where_clause.is_none());
    }
}
