// ABOUTME: Output types: pipe values, extracted records, and page-indexed traversal results.
// ABOUTME: PaginatedResults records why a traversal stopped so truncation is distinguishable from completion.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A value produced by a pipe chain.
///
/// Every pipe receives its input as a string; typed variants only survive when
/// they come out of the last pipe in a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Time(DateTime<Utc>),
}

impl Value {
    /// Returns true if the value counts as "nothing extracted".
    ///
    /// Only text can be empty. A numeric zero is a real result and does not
    /// trigger alternative selectors.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// The value stored under one key of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    One(Value),
    Many(Vec<Value>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::One(Value::Text(s.into()))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::One(v) => v.is_empty(),
            FieldValue::Many(vs) => vs.is_empty(),
        }
    }

    /// Returns the single value, if this is not a list.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::One(v) => Some(v),
            FieldValue::Many(_) => None,
        }
    }

    /// Returns the text of a single text value.
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            FieldValue::One(_) => None,
            FieldValue::Many(vs) => Some(vs),
        }
    }
}

/// One extracted record: field key to value.
pub type Record = BTreeMap<String, FieldValue>;

/// Records extracted from one page of a traversal.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub url: String,
    pub page_number: usize,
    pub items: Vec<Record>,
    pub fetched_at: DateTime<Utc>,
}

/// Why a traversal ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last page had no next link.
    NoNextLink,
    /// The next link pointed at a page already visited.
    CycleDetected,
    /// Every enumerated page was scraped.
    Exhausted,
    /// The page cap was reached while more pages were offered.
    MaxPages,
    /// The wall-clock budget ran out before the next fetch.
    Timeout,
}

impl StopReason {
    /// Returns true for stops caused by a bound rather than by running out of pages.
    pub fn is_truncation(self) -> bool {
        matches!(self, StopReason::MaxPages | StopReason::Timeout)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::NoNextLink => "no next link",
            StopReason::CycleDetected => "cycle detected",
            StopReason::Exhausted => "all pages scraped",
            StopReason::MaxPages => "page limit reached",
            StopReason::Timeout => "timeout elapsed",
        };
        f.write_str(s)
    }
}

/// The result of a successful (possibly truncated) traversal.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResults {
    pub pages: Vec<PageResult>,
    pub total_pages: usize,
    pub total_items: usize,
    pub stop_reason: StopReason,
}

impl PaginatedResults {
    pub fn new(pages: Vec<PageResult>, stop_reason: StopReason) -> Self {
        let total_pages = pages.len();
        let total_items = pages.iter().map(|p| p.items.len()).sum();
        Self {
            pages,
            total_pages,
            total_items,
            stop_reason,
        }
    }

    /// Returns true if a page or time bound cut the traversal short.
    pub fn is_truncated(&self) -> bool {
        self.stop_reason.is_truncation()
    }

    /// All items in page order.
    pub fn items(&self) -> impl Iterator<Item = &Record> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn value_display() {
        assert_eq!(Value::Text("abc".into()).to_string(), "abc");
        assert_eq!(Value::Integer(-42).to_string(), "-42");
        assert_eq!(Value::Float(1500.0).to_string(), "1500");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(Value::Time(t).to_string(), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn zero_is_not_empty() {
        assert!(!Value::Integer(0).is_empty());
        assert!(!Value::Float(0.0).is_empty());
        assert!(!Value::Text("0".into()).is_empty());
        assert!(Value::Text("  \n".into()).is_empty());
        assert!(FieldValue::Many(vec![]).is_empty());
    }

    #[test]
    fn record_serializes_untagged() {
        let mut record = Record::new();
        record.insert("name".into(), FieldValue::text("Widget"));
        record.insert("price".into(), FieldValue::One(Value::Float(9.5)));
        record.insert(
            "tags".into(),
            FieldValue::Many(vec!["a".into(), "b".into()]),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"name":"Widget","price":9.5,"tags":["a","b"]}"#);
    }

    #[test]
    fn paginated_results_totals() {
        let mut record = Record::new();
        record.insert("k".into(), FieldValue::text("v"));
        let page = |n: usize, count: usize| PageResult {
            url: format!("https://example.com/{}", n),
            page_number: n,
            items: vec![record.clone(); count],
            fetched_at: Utc::now(),
        };
        let results = PaginatedResults::new(vec![page(1, 2), page(2, 3)], StopReason::MaxPages);
        assert_eq!(results.total_pages, 2);
        assert_eq!(results.total_items, 5);
        assert_eq!(results.items().count(), 5);
        assert!(results.is_truncated());
        assert!(!StopReason::CycleDetected.is_truncation());
    }
}
