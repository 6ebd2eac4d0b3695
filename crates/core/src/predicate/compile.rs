use std::collections::BTreeSet;

use serde_json::Value;

use super::{CompareOp, Comparison, FilterCondition, FilterExpr, Predicate, PredicateError};
use crate::record::ACTIVE_FIELD;

/// Compiles a caller filter and a route predicate into one normalized tree.
///
/// `fields` restricts which fields a filter may reference; `None` accepts any.
/// The route predicate is trusted and never validated against `fields`.
pub fn compile(
    route: Predicate,
    filter: Option<&FilterExpr>,
    fields: Option<&BTreeSet<String>>,
) -> Result<Predicate, PredicateError> {
    let combined = match filter {
        Some(filter) => Predicate::And(vec![route, compile_filter(filter, fields)?]),
        None => route,
    };
    Ok(normalize(combined))
}

/// Converts a filter expression into a predicate, validating each condition.
pub fn compile_filter(
    filter: &FilterExpr,
    fields: Option<&BTreeSet<String>>,
) -> Result<Predicate, PredicateError> {
    match filter {
        FilterExpr::And { and } => {
            if and.is_empty() {
                return Err(PredicateError::EmptyGroup);
            }
            let children = and
                .iter()
                .map(|child| compile_filter(child, fields))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::And(children))
        }
        FilterExpr::Or { or } => {
            if or.is_empty() {
                return Err(PredicateError::EmptyGroup);
            }
            let children = or
                .iter()
                .map(|child| compile_filter(child, fields))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Predicate::Or(children))
        }
        FilterExpr::Condition(condition) => {
            check_condition(condition, fields).map(Predicate::Compare)
        }
    }
}

fn check_condition(
    condition: &FilterCondition,
    fields: Option<&BTreeSet<String>>,
) -> Result<Comparison, PredicateError> {
    let FilterCondition {
        field,
        operator,
        value,
    } = condition;

    if let Some(fields) = fields {
        if !fields.contains(field) {
            return Err(PredicateError::UnknownField(field.clone()));
        }
    }

    let value = match (operator, value) {
        (CompareOp::IsNull, Value::Null) => Value::Bool(true),
        (CompareOp::IsNull, Value::Bool(b)) => Value::Bool(*b),
        (CompareOp::IsNull, _) => {
            return Err(PredicateError::ExpectedBool {
                field: field.clone(),
                op: *operator,
            })
        }
        (op, Value::Array(_)) if op.takes_list() => value.clone(),
        (op, _) if op.takes_list() => {
            return Err(PredicateError::ExpectedList {
                field: field.clone(),
                op: *operator,
            })
        }
        (_, Value::Array(_) | Value::Object(_)) => {
            return Err(PredicateError::ExpectedScalar {
                field: field.clone(),
                op: *operator,
            })
        }
        _ => value.clone(),
    };

    Ok(Comparison {
        field: field.clone(),
        op: *operator,
        value,
    })
}

/// Flattens nested groups and drops neutral `True` terms.
///
/// An `And` with no remaining terms becomes `True`; an `Or` containing `True`
/// becomes `True`. Single-child groups collapse to the child.
pub fn normalize(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::And(children) => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children.into_iter().map(normalize) {
                match child {
                    Predicate::True => {}
                    Predicate::And(nested) => flat.extend(nested),
                    other => flat.push(other),
                }
            }
            match flat.len() {
                0 => Predicate::True,
                1 => flat.remove(0),
                _ => Predicate::And(flat),
            }
        }
        Predicate::Or(children) => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children.into_iter().map(normalize) {
                match child {
                    Predicate::True => return Predicate::True,
                    Predicate::Or(nested) => flat.extend(nested),
                    other => flat.push(other),
                }
            }
            if flat.len() == 1 {
                flat.remove(0)
            } else {
                Predicate::Or(flat)
            }
        }
        Predicate::Not(inner) => match normalize(*inner) {
            Predicate::Not(double) => *double,
            other => Predicate::Not(Box::new(other)),
        },
        other => other,
    }
}

/// Adds the `isActive = true` scope unless inactive rows were requested.
pub fn active_scope(predicate: Predicate, include_inactive: bool) -> Predicate {
    if include_inactive {
        return normalize(predicate);
    }
    normalize(Predicate::And(vec![
        predicate,
        Predicate::eq(ACTIVE_FIELD, true),
    ]))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_compile_without_filter_returns_route() {
        let route = Predicate::eq("storeId", "s1");
        assert_eq!(compile(route.clone(), None, None).unwrap(), route);
    }

    #[test]
    fn test_compile_merges_route_and_filter() {
        let filter = FilterExpr::condition("name", CompareOp::Contains, "Pro");
        let compiled = compile(Predicate::eq("storeId", "s1"), Some(&filter), None).unwrap();
        assert_eq!(
            compiled,
            Predicate::And(vec![
                Predicate::eq("storeId", "s1"),
                Predicate::compare("name", CompareOp::Contains, "Pro"),
            ])
        );
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let filter = FilterExpr::condition("color", CompareOp::Eq, "red");
        let allowed = fields(&["name"]);
        assert_eq!(
            compile(Predicate::True, Some(&filter), Some(&allowed)),
            Err(PredicateError::UnknownField("color".to_string()))
        );
    }

    #[test]
    fn test_compile_checks_value_shapes() {
        let in_scalar = FilterExpr::condition("status", CompareOp::In, "normal");
        assert!(matches!(
            compile_filter(&in_scalar, None),
            Err(PredicateError::ExpectedList { .. })
        ));

        let eq_list = FilterExpr::condition("status", CompareOp::Eq, json!(["a"]));
        assert!(matches!(
            compile_filter(&eq_list, None),
            Err(PredicateError::ExpectedScalar { .. })
        ));

        let null_check = FilterExpr::condition("status", CompareOp::IsNull, 3);
        assert!(matches!(
            compile_filter(&null_check, None),
            Err(PredicateError::ExpectedBool { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_empty_groups() {
        let filter = FilterExpr::Or { or: vec![] };
        assert_eq!(
            compile_filter(&filter, None),
            Err(PredicateError::EmptyGroup)
        );
    }

    #[test]
    fn test_is_null_defaults_to_true() {
        let filter = FilterExpr::condition("deletedBy", CompareOp::IsNull, Value::Null);
        assert_eq!(
            compile_filter(&filter, None).unwrap(),
            Predicate::compare("deletedBy", CompareOp::IsNull, true)
        );
    }

    #[test]
    fn test_normalize_flattens_and_collapses() {
        let p = Predicate::And(vec![
            Predicate::True,
            Predicate::And(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]),
        ]);
        assert_eq!(
            normalize(p),
            Predicate::And(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)])
        );

        assert_eq!(normalize(Predicate::And(vec![])), Predicate::True);
        assert_eq!(
            normalize(Predicate::Or(vec![Predicate::eq("a", 1), Predicate::True])),
            Predicate::True
        );
        assert_eq!(
            normalize(Predicate::not(Predicate::not(Predicate::eq("a", 1)))),
            Predicate::eq("a", 1)
        );
    }

    #[test]
    fn test_active_scope() {
        assert_eq!(
            active_scope(Predicate::True, false),
            Predicate::eq("isActive", true)
        );
        assert_eq!(active_scope(Predicate::True, true), Predicate::True);
        assert_eq!(
            active_scope(Predicate::by_id("x"), false),
            Predicate::And(vec![Predicate::by_id("x"), Predicate::eq("isActive", true)])
        );
    }
}
