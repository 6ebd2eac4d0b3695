use std::cmp::Ordering;

use serde_json::Value;

use super::{CompareOp, Comparison, Predicate};
use crate::record::Record;

impl Predicate {
    /// Evaluates the predicate against a record in memory.
    ///
    /// Missing fields behave as `null`. Ordering comparisons between values of
    /// different JSON types never match, and a `null` field never satisfies a
    /// range against a non-null bound.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::True => true,
            Self::And(children) => children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
            Self::Not(inner) => !inner.matches(record),
            Self::Compare(cmp) => compare(cmp, record.get(&cmp.field).unwrap_or(&Value::Null)),
        }
    }
}

fn compare(cmp: &Comparison, actual: &Value) -> bool {
    let expected = &cmp.value;
    match cmp.op {
        CompareOp::Eq => values_equal(actual, expected),
        CompareOp::Ne => !values_equal(actual, expected),
        CompareOp::Lt => range(actual, expected) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            range(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => range(actual, expected) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            range(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => list(expected).iter().any(|v| values_equal(actual, v)),
        CompareOp::NotIn => !list(expected).iter().any(|v| values_equal(actual, v)),
        CompareOp::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|v| values_equal(v, needle)),
            _ => false,
        },
        CompareOp::StartsWith => match (actual, expected) {
            (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        CompareOp::IsNull => {
            let want_null = expected.as_bool().unwrap_or(true);
            actual.is_null() == want_null
        }
    }
}

/// Orders a field against a range bound. A `null` bound keeps null-first
/// ordering; a `null` field against any other bound is unordered.
fn range(actual: &Value, bound: &Value) -> Option<Ordering> {
    if actual.is_null() && !bound.is_null() {
        return None;
    }
    compare_values(actual, bound)
}

fn list(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Orders two JSON scalars of the same kind.
///
/// Numbers compare numerically, strings lexicographically (ISO-8601
/// timestamps therefore order chronologically), booleans with `false < true`.
/// `null` sorts before everything. Mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return Some(x.cmp(&y));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
