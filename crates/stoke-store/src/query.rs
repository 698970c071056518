//! Query predicates for filtered document listing.
//!
//! Queries are conjunctive: a document matches a query set when every
//! predicate matches. The in-memory store evaluates predicates locally;
//! the HTTP store serializes them to `query=` parameters.

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

/// A single filter predicate over one document attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `attribute == value`
    Equal { attribute: String, value: Value },
    /// `attribute >= value`
    GreaterThanEqual { attribute: String, value: Value },
    /// `attribute < value`
    LessThan { attribute: String, value: Value },
}

impl Query {
    /// Equality predicate
    pub fn equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Lower-bound predicate (inclusive)
    pub fn greater_than_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::GreaterThanEqual {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Upper-bound predicate (exclusive)
    pub fn less_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LessThan {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Evaluate this predicate against a document payload.
    ///
    /// A missing attribute never matches.
    pub fn matches(&self, data: &Value) -> bool {
        let (attribute, expected) = self.parts();
        let Some(actual) = data.get(attribute) else {
            return false;
        };
        match self {
            Query::Equal { .. } => actual == expected,
            Query::GreaterThanEqual { .. } => {
                matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal))
            }
            Query::LessThan { .. } => matches!(compare(actual, expected), Some(Ordering::Less)),
        }
    }

    /// Serialize to the wire form used in `query=` URL parameters,
    /// e.g. `equal(user_id,"u-1")`.
    pub fn to_param(&self) -> String {
        let (attribute, value) = self.parts();
        let method = match self {
            Query::Equal { .. } => "equal",
            Query::GreaterThanEqual { .. } => "greaterThanEqual",
            Query::LessThan { .. } => "lessThan",
        };
        format!("{}({},{})", method, attribute, value)
    }

    fn parts(&self) -> (&str, &Value) {
        match self {
            Query::Equal { attribute, value }
            | Query::GreaterThanEqual { attribute, value }
            | Query::LessThan { attribute, value } => (attribute, value),
        }
    }
}

/// Order two JSON values for range predicates.
///
/// Numbers compare numerically. Strings that both parse as RFC 3339
/// timestamps compare as instants (so timestamps with different UTC
/// offsets still order correctly); other strings compare lexicographically.
/// Mixed or non-orderable types do not compare.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_matches() {
        let q = Query::equal("user_id", "u-1");
        assert!(q.matches(&json!({"user_id": "u-1"})));
        assert!(!q.matches(&json!({"user_id": "u-2"})));
        assert!(!q.matches(&json!({"other": "u-1"})));
    }

    #[test]
    fn test_range_on_numbers() {
        let q = Query::greater_than_equal("count", 3);
        assert!(q.matches(&json!({"count": 3})));
        assert!(q.matches(&json!({"count": 10})));
        assert!(!q.matches(&json!({"count": 2})));

        let q = Query::less_than("count", 3);
        assert!(q.matches(&json!({"count": 2})));
        assert!(!q.matches(&json!({"count": 3})));
    }

    #[test]
    fn test_range_on_timestamps() {
        let q = Query::greater_than_equal("completed_at", "2026-08-07T00:00:00+00:00");
        assert!(q.matches(&json!({"completed_at": "2026-08-07T09:30:00Z"})));
        assert!(!q.matches(&json!({"completed_at": "2026-08-06T23:59:59Z"})));
        // Same instant expressed in a different offset still matches.
        assert!(q.matches(&json!({"completed_at": "2026-08-07T02:00:00+02:00"})));
    }

    #[test]
    fn test_mixed_types_never_match_ranges() {
        let q = Query::greater_than_equal("count", 3);
        assert!(!q.matches(&json!({"count": "three"})));
    }

    #[test]
    fn test_to_param() {
        assert_eq!(
            Query::equal("user_id", "u-1").to_param(),
            r#"equal(user_id,"u-1")"#
        );
        assert_eq!(
            Query::greater_than_equal("streak_count", 2).to_param(),
            "greaterThanEqual(streak_count,2)"
        );
    }
}
