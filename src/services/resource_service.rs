use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::vip_service::{row_is_vip, VipService};
use super::{ServiceError, ServiceResult};
use crate::database::record::{Operation, Record};
use crate::database::Repository;
use crate::filter::filter_order::FilterOrder;
use crate::filter::FilterData;
use crate::middleware::AuthUser;
use crate::resources::ResourceDef;

/// Generic CRUD for a registered resource on behalf of one authenticated user.
/// Adds VIP restrictions on top of the repository for guarded resources.
pub struct ResourceService<'a> {
    repo: Repository,
    user: &'a AuthUser,
}

pub struct Page {
    pub rows: Vec<Value>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn meta(&self) -> Value {
        json!({ "total": self.total, "limit": self.limit, "offset": self.offset })
    }
}

impl<'a> ResourceService<'a> {
    pub fn new(def: &'static ResourceDef, pool: PgPool, user: &'a AuthUser) -> Self {
        Self {
            repo: Repository::new(def, pool, user.organization_id),
            user,
        }
    }

    fn def(&self) -> &'static ResourceDef {
        self.repo.def()
    }

    fn vip(&self) -> VipService {
        VipService::new(self.repo.pool().clone(), self.user.organization_id)
    }

    pub async fn find(&self, filter_data: FilterData) -> ServiceResult<Page> {
        let filter_data = self.scope_restricted_predicates(filter_data).await?;
        let settings = &crate::config::config().filter;
        let limit = filter_data.limit.unwrap_or(settings.default_limit).min(settings.max_limit);
        let offset = filter_data.offset.unwrap_or(0);
        let count_filter = FilterData {
            where_clause: filter_data.where_clause.clone(),
            include_deleted: filter_data.include_deleted,
            ..Default::default()
        };
        let mut rows = self.repo.find(filter_data).await?;
        let total = self.repo.count(count_filter).await?;
        self.restrict(&mut rows).await?;
        Ok(Page { rows, total, limit, offset })
    }

    pub async fn get(&self, id: Uuid, include_deleted: bool) -> ServiceResult<Value> {
        let row = self
            .repo
            .get_optional(id, include_deleted)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", self.def().table, id)))?;
        let mut rows = [row];
        self.restrict(&mut rows).await?;
        let [row] = rows;
        Ok(row)
    }

    pub async fn create(&self, body: Value) -> ServiceResult<Value> {
        let record = Record::from_json(self.def(), body, Operation::Create)?;
        Ok(self.repo.create(self.user.user_id, &record).await?)
    }

    pub async fn update(&self, id: Uuid, body: Value) -> ServiceResult<Value> {
        let record = Record::from_json(self.def(), body, Operation::Update)?;

        if let Some(guard) = self.def().vip_guard {
            let touched: Vec<&str> = record
                .field_names()
                .filter(|f| guard.restricted_fields.contains(f))
                .collect();
            if !touched.is_empty() {
                let existing = self.repo.get(id).await?;
                if row_is_vip(&existing) {
                    let decision = self.vip().check_access(self.user, id, None, "update").await?;
                    if !decision.allowed {
                        return Err(ServiceError::Forbidden(format!(
                            "Not authorized to modify restricted fields: {}",
                            touched.join(", ")
                        )));
                    }
                }
            }
        }

        let mut row = self.repo.update(id, self.user.user_id, &record).await?;
        self.restrict(std::slice::from_mut(&mut row)).await?;
        Ok(row)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<Value> {
        let mut row = self.repo.soft_delete(id, self.user.user_id).await?;
        self.restrict(std::slice::from_mut(&mut row)).await?;
        Ok(row)
    }

    pub async fn restore(&self, id: Uuid) -> ServiceResult<Value> {
        let mut row = self.repo.restore(id, self.user.user_id).await?;
        self.restrict(std::slice::from_mut(&mut row)).await?;
        Ok(row)
    }

    /// Filtering or ordering on restricted fields only considers rows whose values the caller may see,
    /// so neither `meta.total` nor row order reveals a hidden value
    async fn scope_restricted_predicates(&self, mut filter_data: FilterData) -> ServiceResult<FilterData> {
        let Some(guard) = self.def().vip_guard else { return Ok(filter_data) };
        if self.user.is_admin() || !references_any(self.def(), &filter_data, guard.restricted_fields) {
            return Ok(filter_data);
        }

        let mut visible: Vec<Uuid> = self
            .vip()
            .active_grant_employee_ids(self.user.user_id)
            .await?
            .into_iter()
            .collect();
        visible.extend(self.user.employee_id);
        tracing::debug!(table = self.def().table, visible = visible.len(), "Scoping query on restricted fields");
        filter_data.where_clause = Some(scope_to_visible(filter_data.where_clause.take(), &visible));
        Ok(filter_data)
    }

    async fn restrict(&self, rows: &mut [Value]) -> ServiceResult<()> {
        match self.def().vip_guard {
            Some(guard) => self.vip().apply_read_restrictions(self.user, rows, guard.restricted_fields).await,
            None => Ok(()),
        }
    }
}

/// Field names a where-tree compares against, at any depth
fn where_columns<'v>(where_data: &'v Value, out: &mut Vec<&'v str>) {
    let Value::Object(obj) = where_data else { return };
    for (key, value) in obj {
        if key.starts_with('$') {
            match value {
                Value::Array(branches) => branches.iter().for_each(|b| where_columns(b, out)),
                other => where_columns(other, out),
            }
        } else {
            out.push(key.as_str());
        }
    }
}

fn references_any(def: &ResourceDef, filter_data: &FilterData, fields: &[&str]) -> bool {
    let mut columns = Vec::new();
    if let Some(where_data) = &filter_data.where_clause {
        where_columns(where_data, &mut columns);
    }
    // malformed orders are rejected later by the filter itself
    let ordered = filter_data
        .order
        .as_ref()
        .and_then(|order| FilterOrder::validate_and_parse(def, order).ok())
        .unwrap_or_default();
    columns
        .into_iter()
        .chain(ordered.iter().map(|info| info.column))
        .any(|c| fields.contains(&c))
}

/// Non-VIP rows plus the VIP rows in `visible`
fn scope_to_visible(where_data: Option<Value>, visible: &[Uuid]) -> Value {
    let scope = json!({ "$or": [{ "is_vip": false }, { "id": { "$in": visible } }] });
    match where_data {
        Some(original) if !original.is_null() => json!({ "$and": [original, scope] }),
        _ => scope,
    }
}
