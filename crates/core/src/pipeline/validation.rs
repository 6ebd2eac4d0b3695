//! Pure input checks run before any I/O.

use serde_json::{Map, Value};

use super::{FieldViolation, ValidationError, Verb};
use crate::record::{EntitySchema, ACTIVE_FIELD, ID_FIELD, SYSTEM_FIELDS};

const MAX_ID_LEN: usize = 128;

/// Checks an id's shape: non-empty, bounded, printable without whitespace.
pub fn validate_id(id: &str) -> Result<(), FieldViolation> {
    if id.is_empty() {
        return Err(FieldViolation::new(ID_FIELD, "cannot be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(FieldViolation::new(
            ID_FIELD,
            format!("too long (max {MAX_ID_LEN} characters)"),
        ));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(FieldViolation::new(ID_FIELD, "contains whitespace"));
    }
    Ok(())
}

/// Reports required fields that are missing or null.
pub fn missing_required(data: &Map<String, Value>, required: &[String]) -> Vec<FieldViolation> {
    required
        .iter()
        .filter(|field| data.get(field.as_str()).is_none_or(Value::is_null))
        .map(|field| FieldViolation::new(field.as_str(), "is required"))
        .collect()
}

/// Reports fields the schema does not declare or the store manages itself.
///
/// `id` is accepted on create only, as is `isActive: true` (the state every
/// created record ends up in anyway).
pub fn unwritable_fields(
    verb: Verb,
    data: &Map<String, Value>,
    schema: &EntitySchema,
) -> Vec<FieldViolation> {
    data.iter()
        .filter_map(|(field, value)| {
            if field == ID_FIELD {
                return (verb != Verb::Create)
                    .then(|| FieldViolation::new(ID_FIELD, "cannot be changed"));
            }
            if field == ACTIVE_FIELD && verb == Verb::Create && value == &Value::Bool(true) {
                return None;
            }
            if SYSTEM_FIELDS.contains(&field.as_str()) {
                return Some(FieldViolation::new(field.as_str(), "is managed by the store"));
            }
            (!schema.accepts_field(field))
                .then(|| FieldViolation::new(field.as_str(), "is not a known field"))
        })
        .collect()
}

/// Baseline validation for every command.
///
/// Writes are checked against the schema; update, delete and get require an
/// id; create requires every declared required field.
pub fn validate_input(
    verb: Verb,
    id: Option<&str>,
    data: &Map<String, Value>,
    schema: &EntitySchema,
) -> Result<(), ValidationError> {
    let mut error = ValidationError::default();

    match (verb, id) {
        (Verb::Get | Verb::Update | Verb::Delete, None) => {
            error.push(FieldViolation::new(ID_FIELD, "is required"));
        }
        (_, Some(id)) => {
            if let Err(violation) = validate_id(id) {
                error.push(violation);
            }
        }
        (Verb::Create | Verb::List, None) => {}
    }

    if verb == Verb::Create {
        if let Some(Value::String(data_id)) = data.get(ID_FIELD) {
            if let Err(violation) = validate_id(data_id) {
                error.push(violation);
            }
            if id.is_some_and(|id| id != data_id.as_str()) {
                error.push(FieldViolation::new(ID_FIELD, "does not match the id in data"));
            }
        }
        error.extend(missing_required(data, &schema.required));
    }

    if matches!(verb, Verb::Create | Verb::Update) {
        error.extend(unwritable_fields(verb, data, schema));
    }

    error.into_result()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> EntitySchema {
        let mut schema = EntitySchema::new("saleTransaction");
        schema.fields = vec![
            "sellerId".to_string(),
            "amount".to_string(),
            "status".to_string(),
        ];
        schema.required = vec!["sellerId".to_string(), "amount".to_string()];
        schema
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("abc-123").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("has space").is_err());
        assert!(validate_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_missing_required_treats_null_as_missing() {
        let violations = missing_required(
            &data(json!({"sellerId": null})),
            &["sellerId".to_string(), "amount".to_string()],
        );
        let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["sellerId", "amount"]);
    }

    #[test]
    fn test_create_requires_fields() {
        let input = data(json!({"sellerId": "u1"}));
        let error = validate_input(Verb::Create, None, &input, &schema()).unwrap_err();
        assert_eq!(
            error.violations,
            vec![FieldViolation::new("amount", "is required")]
        );
    }

    #[test]
    fn test_create_accepts_id_in_data() {
        let input = data(json!({"id": "t-1", "sellerId": "u1", "amount": 5}));
        assert!(validate_input(Verb::Create, None, &input, &schema()).is_ok());
    }

    #[test]
    fn test_create_rejects_conflicting_ids() {
        let input = data(json!({"id": "t-2", "sellerId": "u1", "amount": 5}));
        let error = validate_input(Verb::Create, Some("t-1"), &input, &schema()).unwrap_err();
        assert_eq!(
            error.violations,
            vec![FieldViolation::new("id", "does not match the id in data")]
        );

        let same = data(json!({"id": "t-1", "sellerId": "u1", "amount": 5}));
        assert!(validate_input(Verb::Create, Some("t-1"), &same, &schema()).is_ok());
    }

    #[test]
    fn test_update_requires_id_and_rejects_managed_fields() {
        let error = validate_input(
            Verb::Update,
            None,
            &data(json!({"isActive": true, "color": "red", "id": "x"})),
            &schema(),
        )
        .unwrap_err();
        let fields: Vec<_> = error.violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"id"));
        assert!(fields.contains(&"isActive"));
        assert!(fields.contains(&"color"));
    }

    #[test]
    fn test_create_accepts_active_true_only() {
        let active = data(json!({"sellerId": "u1", "amount": 5, "isActive": true}));
        assert!(validate_input(Verb::Create, None, &active, &schema()).is_ok());

        let inactive = data(json!({"sellerId": "u1", "amount": 5, "isActive": false}));
        let error = validate_input(Verb::Create, None, &inactive, &schema()).unwrap_err();
        assert_eq!(error.violations[0].field, "isActive");
    }

    #[test]
    fn test_update_does_not_check_required() {
        let input = data(json!({"status": "corrected"}));
        assert!(validate_input(Verb::Update, Some("t-1"), &input, &schema()).is_ok());
    }

    #[test]
    fn test_list_needs_nothing() {
        assert!(validate_input(Verb::List, None, &Map::new(), &schema()).is_ok());
    }
}
