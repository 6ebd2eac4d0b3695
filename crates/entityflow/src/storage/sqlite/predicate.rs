//! Renders `Predicate` trees to SQL over the JSON `data` column.
//!
//! Every rendered fragment evaluates to 0 or 1, never NULL, so `NOT` keeps
//! the same meaning as the in-memory evaluator: a missing field behaves as
//! JSON `null`.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use entityflow_core::predicate::{CompareOp, Comparison, Predicate};
use entityflow_core::query::{Sort, SortDirection};
use entityflow_core::record::{ACTIVE_FIELD, ID_FIELD};
use entityflow_core::storage::{RepositoryError, Result};

/// A WHERE fragment and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Renders a predicate. Field names must be plain identifiers.
pub fn render(predicate: &Predicate) -> Result<SqlFragment> {
    let mut params = Vec::new();
    let sql = render_into(predicate, &mut params)?;
    Ok(SqlFragment { sql, params })
}

/// Renders an ORDER BY clause, always ending with the id for stable pages.
pub fn render_order(sort: &[Sort]) -> Result<String> {
    let mut terms = Vec::with_capacity(sort.len() + 1);
    for key in sort {
        let direction = match key.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        terms.push(format!("{} {direction}", extract(&key.field)?));
    }
    terms.push("id ASC".to_string());
    Ok(format!("ORDER BY {}", terms.join(", ")))
}

/// Converts a JSON scalar to a SQLite value. Arrays and objects bind as JSON text.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn render_into(predicate: &Predicate, params: &mut Vec<SqlValue>) -> Result<String> {
    match predicate {
        Predicate::True => Ok("1".to_string()),
        Predicate::And(children) => group(children, " AND ", "1", params),
        Predicate::Or(children) => group(children, " OR ", "0", params),
        Predicate::Not(inner) => Ok(format!("NOT ({})", render_into(inner, params)?)),
        Predicate::Compare(cmp) => render_comparison(cmp, params),
    }
}

fn group(
    children: &[Predicate],
    separator: &str,
    empty: &str,
    params: &mut Vec<SqlValue>,
) -> Result<String> {
    if children.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = children
        .iter()
        .map(|child| render_into(child, params).map(|sql| format!("({sql})")))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(separator))
}

fn path(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RepositoryError::InvalidData(format!(
            "field name not supported by the SQLite store: {field:?}"
        )));
    }
    Ok(format!("'$.\"{field}\"'"))
}

fn extract(field: &str) -> Result<String> {
    Ok(format!("json_extract(data, {})", path(field)?))
}

fn json_type(field: &str) -> Result<String> {
    Ok(format!("json_type(data, {})", path(field)?))
}

/// `json_type` values a range comparison against `value` may match.
fn comparable_types(value: &Value) -> &'static str {
    match value {
        Value::Number(_) => "('integer', 'real')",
        Value::String(_) => "('text')",
        Value::Bool(_) => "('true', 'false')",
        _ => "()",
    }
}

fn render_comparison(cmp: &Comparison, params: &mut Vec<SqlValue>) -> Result<String> {
    let field = cmp.field.as_str();
    let value = &cmp.value;

    match cmp.op {
        CompareOp::Eq | CompareOp::Ne => {
            let negate = if cmp.op == CompareOp::Ne { " NOT" } else { "" };
            match value {
                Value::Bool(b) if field == ACTIVE_FIELD => {
                    Ok(format!("is_active IS{negate} {}", i64::from(*b)))
                }
                Value::Bool(b) => Ok(format!("{} IS{negate} '{b}'", json_type(field)?)),
                Value::String(id) if field == ID_FIELD => {
                    params.push(SqlValue::Text(id.clone()));
                    Ok(format!("id IS{negate} ?"))
                }
                _ => {
                    params.push(to_sql_value(value));
                    Ok(format!("{} IS{negate} ?", extract(field)?))
                }
            }
        }
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            let x = extract(field)?;
            if value.is_null() {
                return Ok(match cmp.op {
                    CompareOp::Lt => "0".to_string(),
                    CompareOp::Lte => format!("{x} IS NULL"),
                    CompareOp::Gt => format!("{x} IS NOT NULL"),
                    _ => "1".to_string(),
                });
            }
            let op = match cmp.op {
                CompareOp::Lt => "<",
                CompareOp::Lte => "<=",
                CompareOp::Gt => ">",
                _ => ">=",
            };
            params.push(to_sql_value(value));
            Ok(format!(
                "COALESCE({} IN {} AND {x} {op} ?, 0)",
                json_type(field)?,
                comparable_types(value)
            ))
        }
        CompareOp::In | CompareOp::NotIn => {
            let membership = render_membership(field, value, params)?;
            if cmp.op == CompareOp::In {
                Ok(membership)
            } else {
                Ok(format!("NOT ({membership})"))
            }
        }
        CompareOp::Contains => {
            let p = path(field)?;
            params.push(to_sql_value(value));
            let in_array = format!(
                "EXISTS (SELECT 1 FROM json_each(records.data, {p}) AS je WHERE je.value IS ?)"
            );
            match value {
                Value::String(needle) => {
                    params.push(SqlValue::Text(needle.clone()));
                    Ok(format!(
                        "CASE json_type(data, {p}) WHEN 'array' THEN {in_array} \
                         WHEN 'text' THEN instr(json_extract(data, {p}), ?) > 0 ELSE 0 END"
                    ))
                }
                _ => Ok(format!(
                    "CASE json_type(data, {p}) WHEN 'array' THEN {in_array} ELSE 0 END"
                )),
            }
        }
        CompareOp::StartsWith => match value {
            Value::String(prefix) => {
                params.push(SqlValue::Text(prefix.clone()));
                params.push(SqlValue::Text(prefix.clone()));
                Ok(format!(
                    "COALESCE({} = 'text' AND substr({x}, 1, length(?)) = ?, 0)",
                    json_type(field)?,
                    x = extract(field)?
                ))
            }
            _ => Ok("0".to_string()),
        },
        CompareOp::IsNull => {
            let want_null = value.as_bool().unwrap_or(true);
            let x = extract(field)?;
            if want_null {
                Ok(format!("{x} IS NULL"))
            } else {
                Ok(format!("{x} IS NOT NULL"))
            }
        }
    }
}

/// Null-safe membership test over a JSON array of candidates.
fn render_membership(field: &str, value: &Value, params: &mut Vec<SqlValue>) -> Result<String> {
    let candidates = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
    let has_null = candidates.iter().any(Value::is_null);
    let present: Vec<&Value> = candidates.iter().filter(|v| !v.is_null()).collect();
    let x = extract(field)?;

    let listed = if present.is_empty() {
        None
    } else {
        let placeholders = vec!["?"; present.len()].join(", ");
        params.extend(present.into_iter().map(to_sql_value));
        Some(format!("COALESCE({x} IN ({placeholders}), 0)"))
    };

    Ok(match (listed, has_null) {
        (Some(listed), true) => format!("{listed} OR {x} IS NULL"),
        (Some(listed), false) => listed,
        (None, true) => format!("{x} IS NULL"),
        (None, false) => "0".to_string(),
    })
}
