use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CompareOp;

/// Caller supplied filter.
///
/// ```json
/// {"and": [{"field": "status", "operator": "eq", "value": "normal"},
///          {"or": [{"field": "amount", "operator": "gt", "value": 100}]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    And { and: Vec<FilterExpr> },
    Or { or: Vec<FilterExpr> },
    Condition(FilterCondition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: CompareOp,
    #[serde(default)]
    pub value: Value,
}

impl FilterExpr {
    pub fn condition(field: impl Into<String>, operator: CompareOp, value: impl Into<Value>) -> Self {
        Self::Condition(FilterCondition {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }
}
