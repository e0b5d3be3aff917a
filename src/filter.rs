//! Generic filter requests.
//!
//! A filter request is a loose map: the reserved keys `_sortKey`,
//! `_sortDirection`, `_offset` and `_length` drive ordering and pagination,
//! every other key is a candidate equality filter on a model attribute.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mapper::PropertyMapper;
use crate::record::{is_truthy, Record};

pub const SORT_KEY: &str = "_sortKey";
pub const SORT_DIRECTION: &str = "_sortDirection";
pub const OFFSET: &str = "_offset";
pub const LENGTH: &str = "_length";

lazy_static! {
    static ref FILTER_KEY: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    /// `ASC`/`DESC` and `ascending`/`descending`, case-insensitively.
    /// Anything else is `Asc`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRule {
    /// Attribute name, empty when no sort was requested.
    pub sort_key: String,
    pub direction: SortDirection,
}

/// `-1` means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitInfo {
    pub offset: i64,
    pub length: i64,
}

impl LimitInfo {
    pub fn is_active(&self) -> bool {
        self.offset >= 0 && self.length > 0
    }
}

/// A caller-supplied filter request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterOptions {
    params: Record,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, property: impl Into<String>, direction: impl Into<String>) -> Self {
        self.params.insert(SORT_KEY.into(), Value::String(property.into()));
        self.params
            .insert(SORT_DIRECTION.into(), Value::String(direction.into()));
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.params.insert(OFFSET.into(), Value::from(offset));
        self
    }

    pub fn length(mut self, length: i64) -> Self {
        self.params.insert(LENGTH.into(), Value::from(length));
        self
    }

    /// Equality filter on an attribute. Falsy values are accepted here but
    /// dropped when the request is applied.
    pub fn filter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(property.into(), value.into());
        self
    }

    pub fn params(&self) -> &Record {
        &self.params
    }

    pub fn sort_rule(&self) -> SortRule {
        let sort_key = match self.params.get(SORT_KEY) {
            Some(Value::String(key)) => key.clone(),
            _ => String::new(),
        };
        let direction = match self.params.get(SORT_DIRECTION) {
            Some(Value::String(raw)) => SortDirection::parse_lenient(raw),
            _ => SortDirection::Asc,
        };
        SortRule {
            sort_key,
            direction,
        }
    }

    pub fn limit_info(&self) -> LimitInfo {
        LimitInfo {
            offset: numeric_param(self.params.get(OFFSET)),
            length: numeric_param(self.params.get(LENGTH)),
        }
    }

    /// `(column, value)` equality filters: identifier-shaped keys that name
    /// a mapped attribute and carry a truthy value, in key order.
    pub fn equality_filters(&self, mapper: &PropertyMapper) -> Vec<(String, Value)> {
        self.params
            .iter()
            .filter(|(key, value)| FILTER_KEY.is_match(key) && is_truthy(value))
            .filter_map(|(key, value)| {
                mapper
                    .column_of(key)
                    .map(|column| (column.to_string(), value.clone()))
            })
            .collect()
    }
}

impl From<Record> for FilterOptions {
    fn from(params: Record) -> Self {
        FilterOptions { params }
    }
}

fn numeric_param(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(-1),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
            .unwrap_or(-1),
        _ => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> PropertyMapper {
        PropertyMapper::new([("uid", "uid"), ("key1", "key1"), ("create_time", "created_at")])
    }

    #[test]
    fn direction_synonyms() {
        assert_eq!(SortDirection::parse_lenient("DESC"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("descending"), SortDirection::Desc);
        assert_eq!(SortDirection::parse_lenient("Ascending"), SortDirection::Asc);
        assert_eq!(SortDirection::parse_lenient("sideways"), SortDirection::Asc);
    }

    #[test]
    fn sort_rule_defaults() {
        let rule = FilterOptions::new().sort_rule();
        assert_eq!(rule.sort_key, "");
        assert_eq!(rule.direction, SortDirection::Asc);

        let rule = FilterOptions::new().sort_by("key1", "descending").sort_rule();
        assert_eq!(rule.sort_key, "key1");
        assert_eq!(rule.direction, SortDirection::Desc);
    }

    #[test]
    fn limit_info_parsing() {
        assert!(!FilterOptions::new().limit_info().is_active());
        assert!(FilterOptions::new().offset(0).length(10).limit_info().is_active());
        assert!(!FilterOptions::new().offset(0).length(0).limit_info().is_active());
        assert!(!FilterOptions::new().offset(-1).length(10).limit_info().is_active());

        let mut params = Record::new();
        params.insert(OFFSET.into(), json!("20"));
        params.insert(LENGTH.into(), json!("abc"));
        let info = FilterOptions::from(params).limit_info();
        assert_eq!(info.offset, 20);
        assert_eq!(info.length, -1);
    }

    #[test]
    fn equality_filters_drop_falsy_unmapped_and_reserved_keys() {
        let options = FilterOptions::new()
            .filter("key1", "K1")
            .filter("uid", 0)
            .filter("create_time", "")
            .filter("unknown", "x")
            .filter("1bad", "x")
            .sort_by("key1", "ASC");

        let filters = options.equality_filters(&mapper());
        assert_eq!(filters, vec![("key1".to_string(), json!("K1"))]);
    }

    #[test]
    fn equality_filters_translate_to_columns() {
        let options = FilterOptions::new().filter("create_time", "2024-01-01");
        let filters = options.equality_filters(&mapper());
        assert_eq!(filters, vec![("created_at".to_string(), json!("2024-01-01"))]);
    }
}
