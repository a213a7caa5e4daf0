use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};
use crate::resources::ResourceDef;

/// Organization-scoped SELECT builder for one resource.
///
/// Rows come back as a single JSON column so the generic handlers never need a
/// Rust struct per table. `$1` is always the organization id.
pub struct Filter {
    def: &'static ResourceDef,
    organization_id: Uuid,
    select_columns: Vec<&'static str>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: i64,
    offset: i64,
    include_deleted: bool,
}

impl Filter {
    pub fn new(def: &'static ResourceDef, organization_id: Uuid) -> Self {
        let order_data = FilterOrder::parse_order_string(def, def.default_order).unwrap_or_default();
        Self {
            def,
            organization_id,
            select_columns: vec![],
            where_data: None,
            order_data,
            limit: crate::config::CONFIG.filter.default_limit,
            offset: 0,
            include_deleted: false,
        }
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        if data.limit.is_some() || data.offset.is_some() {
            self.limit(data.limit.unwrap_or(self.limit), data.offset)?;
        }
        self.include_deleted(data.include_deleted);
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        if columns.iter().any(|c| c == "*") {
            self.select_columns.clear();
            return Ok(self);
        }
        let mut selected = Vec::with_capacity(columns.len() + 2);
        for name in &columns {
            let column = self
                .def
                .column(name)
                .ok_or_else(|| FilterError::InvalidColumn(name.clone()))?;
            if !selected.contains(&column.name) {
                selected.push(column.name);
            }
        }
        // Redaction downstream keys off these
        let mut implied = vec!["id"];
        if self.def.vip_guard.is_some() {
            implied.push("is_vip");
        }
        for name in implied {
            if !selected.contains(&name) {
                selected.push(name);
            }
        }
        self.select_columns = selected;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        let order_info = FilterOrder::validate_and_parse(self.def, &order_spec)?;
        if !order_info.is_empty() {
            self.order_data = order_info;
        }
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 1 { return Err(FilterError::InvalidLimit("Limit must be positive".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }

        let max_limit = crate::config::CONFIG.filter.max_limit;
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = applied_limit;
        self.offset = offset.unwrap_or(0);
        Ok(self)
    }

    pub fn include_deleted(&mut self, include: bool) -> &mut Self {
        self.include_deleted = include;
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.build_where()?;
        let query = format!(
            "SELECT {} FROM \"{}\" t WHERE {} {} LIMIT {} OFFSET {}",
            self.build_select_clause(),
            self.def.table,
            where_clause,
            FilterOrder::generate(&self.order_data),
            self.limit,
            self.offset,
        );
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.build_where()?;
        let query = format!("SELECT COUNT(*) FROM \"{}\" WHERE {}", self.def.table, where_clause);
        Ok(SqlResult { query, params })
    }

    fn build_where(&self) -> Result<(String, Vec<Option<String>>), FilterError> {
        let mut params = vec![Some(self.organization_id.to_string())];
        let mut conditions = vec!["\"organization_id\" = $1::uuid".to_string()];
        if !self.include_deleted {
            conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        if let Some(where_data) = &self.where_data {
            let max_depth = crate::config::CONFIG.filter.max_nested_depth;
            if let Some(sql) = FilterWhere::new(self.def, &mut params, max_depth).generate(where_data)? {
                conditions.push(sql);
            }
        }
        Ok((conditions.join(" AND "), params))
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() {
            "row_to_json(t)".to_string()
        } else {
            let pairs = self
                .select_columns
                .iter()
                .map(|c| format!("'{}', t.\"{}\"", c, c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("json_build_object({})", pairs)
        }
    }
}
