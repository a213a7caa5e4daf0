use serde_json::Value;

use super::error::FilterError;
use super::types::FilterOp;
use crate::database::record::parse_value;
use crate::resources::{ColumnDef, ResourceDef};

/// Renders a JSON where-tree into SQL predicates, appending bound values to `params`.
/// Placeholders continue numbering after whatever `params` already holds.
pub struct FilterWhere<'a> {
    def: &'static ResourceDef,
    params: &'a mut Vec<Option<String>>,
    max_depth: u32,
}

impl<'a> FilterWhere<'a> {
    pub fn new(def: &'static ResourceDef, params: &'a mut Vec<Option<String>>, max_depth: u32) -> Self {
        Self { def, params, max_depth }
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// `None` when the tree contributes no predicate
    pub fn generate(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        self.build(where_data, 0)
    }

    fn build(&mut self, where_data: &Value, depth: u32) -> Result<Option<String>, FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::TooDeep(self.max_depth));
        }

        let obj = match where_data {
            Value::Null => return Ok(None),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };

        let mut parts = Vec::new();
        for (key, value) in obj {
            let part = if key.starts_with('$') {
                self.logical(key, value, depth)?
            } else {
                Some(self.field(key, value)?)
            };
            parts.extend(part);
        }

        Ok(join(parts, " AND "))
    }

    fn logical(&mut self, op: &str, value: &Value, depth: u32) -> Result<Option<String>, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", op)))?;
                let mut parts = Vec::with_capacity(arr.len());
                for v in arr {
                    // an empty branch is always true
                    match self.build(v, depth + 1)? {
                        Some(sql) => parts.push(sql),
                        None if op == "$or" => return Ok(None),
                        None => {}
                    }
                }
                Ok(join(parts, if op == "$and" { " AND " } else { " OR " }))
            }
            "$not" => match self.build(value, depth + 1)? {
                Some(sql) => Ok(Some(format!("NOT ({})", sql))),
                None => Err(FilterError::InvalidOperatorData("$not requires a condition".to_string())),
            },
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field(&mut self, key: &str, value: &Value) -> Result<String, FilterError> {
        let column = self
            .def
            .column(key)
            .ok_or_else(|| FilterError::InvalidColumn(key.to_string()))?;

        match value {
            Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
                let mut parts = Vec::with_capacity(ops.len());
                for (op_key, data) in ops {
                    let op = FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    parts.push(self.condition(column, op, data)?);
                }
                Ok(join(parts, " AND ").unwrap_or_else(|| "TRUE".to_string()))
            }
            // Implicit equality: { field: value }
            _ => self.condition(column, FilterOp::Eq, value),
        }
    }

    fn condition(&mut self, column: &'static ColumnDef, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted = format!("\"{}\"", column.name);

        match op {
            FilterOp::Eq if data.is_null() => Ok(format!("{} IS NULL", quoted)),
            FilterOp::Ne if data.is_null() => Ok(format!("{} IS NOT NULL", quoted)),
            FilterOp::Eq | FilterOp::Ne | FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let sql_op = op.comparison().unwrap_or("=");
                Ok(format!("{} {} {}", quoted, sql_op, self.param(column, data)?))
            }
            FilterOp::Like | FilterOp::ILike => {
                let pattern = data
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$like/$ilike require a string".to_string()))?;
                self.params.push(Some(pattern.to_string()));
                let keyword = if op == FilterOp::Like { "LIKE" } else { "ILIKE" };
                Ok(format!("{}::text {} ${}::text", quoted, keyword, self.params.len()))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin require an array".to_string()))?;
                if values.is_empty() {
                    return Ok(if op == FilterOp::In { "FALSE" } else { "TRUE" }.to_string());
                }
                let placeholders = values
                    .iter()
                    .map(|v| self.param(column, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let keyword = if op == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted, keyword, placeholders.join(", ")))
            }
            FilterOp::Between => match data.as_array().map(Vec::as_slice) {
                Some([low, high]) => {
                    let low = self.param(column, low)?;
                    let high = self.param(column, high)?;
                    Ok(format!("{} BETWEEN {} AND {}", quoted, low, high))
                }
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Null => match data.as_bool() {
                Some(true) => Ok(format!("{} IS NULL", quoted)),
                Some(false) => Ok(format!("{} IS NOT NULL", quoted)),
                None => Err(FilterError::InvalidOperatorData("$null requires true or false".to_string())),
            },
        }
    }

    fn param(&mut self, column: &'static ColumnDef, value: &Value) -> Result<String, FilterError> {
        if value.is_null() {
            return Err(FilterError::InvalidValue {
                column: column.name.to_string(),
                message: "null is only valid with $eq, $ne or $null".to_string(),
            });
        }
        let bound = parse_value(column.kind, value).map_err(|message| FilterError::InvalidValue {
            column: column.name.to_string(),
            message,
        })?;
        self.params.push(bound.text);
        Ok(format!("${}::{}", self.params.len(), column.kind.pg_type()))
    }
}

fn join(parts: Vec<String>, joiner: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => Some(format!("({})", parts.join(joiner))),
    }
}
