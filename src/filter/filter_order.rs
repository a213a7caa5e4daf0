use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::resources::ResourceDef;

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"col desc, other"`, `["col desc", "other"]` or `{ "col": "desc" }`
    pub fn validate_and_parse(def: &ResourceDef, order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(def, s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidOrder("order array must contain strings".to_string()))?;
                    out.extend(Self::parse_order_string(def, s)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let dir = v.as_str().unwrap_or("asc");
                    out.push(FilterOrderInfo { column: Self::column(def, k)?, sort: Self::direction(dir)? });
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidOrder("order must be a string, array or object".to_string())),
        }
    }

    pub fn parse_order_string(def: &ResourceDef, s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            let Some(col) = it.next() else { continue };
            let sort = Self::direction(it.next().unwrap_or("asc"))?;
            if it.next().is_some() {
                return Err(FilterError::InvalidOrder(part.trim().to_string()));
            }
            out.push(FilterOrderInfo { column: Self::column(def, col)?, sort });
        }
        Ok(out)
    }

    /// ORDER BY clause; `id` is appended as a tie-breaker so pages are stable
    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        let mut parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        if !infos.iter().any(|i| i.column == "id") {
            parts.push("\"id\" ASC".to_string());
        }
        format!("ORDER BY {}", parts.join(", "))
    }

    fn column(def: &ResourceDef, name: &str) -> Result<&'static str, FilterError> {
        def.column(name)
            .map(|c| c.name)
            .ok_or_else(|| FilterError::InvalidColumn(name.to_string()))
    }

    fn direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOrder(format!("unknown direction '{}'", dir)))
        }
    }
}
