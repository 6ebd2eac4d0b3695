//! Sample entity catalog: stores, store assignments and sale transactions
//! with their correction history.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use entityflow_core::cascade::CascadeEdge;
use entityflow_core::pipeline::{CommandInput, FieldViolation, ValidationError, Verb};
use entityflow_core::record::{DataClause, EntitySchema};

use crate::pipeline::{
    default_data_clause, EntityDefinition, EntityRegistry, PlannedWrite, WriteContext,
};

pub const STORE: &str = "store";
pub const STORE_ASSIGNMENT: &str = "storeAssignment";
pub const SALE_TRANSACTION: &str = "saleTransaction";
pub const SALE_TRANSACTION_HISTORY: &str = "saleTransactionHistory";

const TRANSACTION_STATUSES: [&str; 3] = ["normal", "corrected", "canceled"];

/// Fields a transaction update may change. Everything else is dropped.
const TRANSACTION_UPDATABLE: [&str; 4] =
    ["amount", "currency", "status", "correctionJustification"];

/// Registry with every catalog entity and its cascade edges.
pub fn catalog() -> EntityRegistry {
    EntityRegistry::new()
        .register(store())
        .register(store_assignment())
        .register(sale_transaction())
        .register(sale_transaction_history())
        .cascade(CascadeEdge::soft_delete(STORE, STORE_ASSIGNMENT, "storeId"))
        .cascade(CascadeEdge::soft_delete(
            SALE_TRANSACTION,
            SALE_TRANSACTION_HISTORY,
            "transactionId",
        ))
}

pub fn store() -> EntityDefinition {
    EntityDefinition::builder(STORE)
        .fields(["name", "codename", "fullname", "avatar", "ownerId"])
        .required(["name", "fullname"])
        .unique(["codename"])
        .owner_field("ownerId")
        .data_clause(store_data_clause)
        .build()
}

/// Derives `codename` from `name` on create when none is given.
fn store_data_clause(verb: Verb, input: &CommandInput) -> DataClause {
    let mut clause = default_data_clause(&EntitySchema::new(STORE), verb, input);
    if verb == Verb::Create && !clause.contains("codename") {
        if let Some(name) = input.data.get("name").and_then(Value::as_str) {
            clause.insert("codename", codename(name));
        }
    }
    clause
}

fn codename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn store_assignment() -> EntityDefinition {
    EntityDefinition::builder(STORE_ASSIGNMENT)
        .fields([
            "userId",
            "storeId",
            "role",
            "assignmentType",
            "status",
            "overrideJustification",
            "validFrom",
            "validUntil",
        ])
        .required(["userId", "storeId"])
        .unique(["userId", "storeId", "assignmentType"])
        .owner_field("userId")
        .data_clause(|verb, input| {
            let schema = EntitySchema::new(STORE_ASSIGNMENT);
            let mut clause = default_data_clause(&schema, verb, input);
            if verb == Verb::Create {
                defaults(
                    &mut clause,
                    &[
                        ("role", "seller"),
                        ("assignmentType", "normal"),
                        ("status", "active"),
                    ],
                );
            }
            clause
        })
        .build()
}

pub fn sale_transaction() -> EntityDefinition {
    EntityDefinition::builder(SALE_TRANSACTION)
        .fields([
            "sellerId",
            "amount",
            "currency",
            "transactionDate",
            "status",
            "correctionJustification",
            "storeId",
        ])
        .required(["sellerId", "amount", "transactionDate"])
        .tenant_field("storeId")
        .owner_field("sellerId")
        .validate(validate_transaction)
        .data_clause(transaction_data_clause)
        .extra_writes(correction_history)
        .build()
}

fn validate_transaction(verb: Verb, input: &CommandInput) -> Result<(), ValidationError> {
    if !matches!(verb, Verb::Create | Verb::Update) {
        return Ok(());
    }

    let data = &input.data;
    let mut error = ValidationError::default();

    if let Some(amount) = data.get("amount") {
        if !amount.is_number() {
            error.push(FieldViolation::new("amount", "must be a number"));
        }
    }

    let status = data.get("status").and_then(Value::as_str);
    if let Some(status) = status {
        if !TRANSACTION_STATUSES.contains(&status) {
            error.push(FieldViolation::new(
                "status",
                format!("must be one of {}", TRANSACTION_STATUSES.join(", ")),
            ));
        }
    }

    let needs_justification = matches!(status, Some("corrected" | "canceled"));
    if needs_justification && !has_text(data, "correctionJustification") {
        error.push(FieldViolation::new(
            "correctionJustification",
            "is required when status is corrected or canceled",
        ));
    }

    error.into_result()
}

fn has_text(data: &Map<String, Value>, field: &str) -> bool {
    data.get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn transaction_data_clause(verb: Verb, input: &CommandInput) -> DataClause {
    let schema = EntitySchema {
        tenant_field: Some("storeId".to_string()),
        ..EntitySchema::new(SALE_TRANSACTION)
    };
    let clause = default_data_clause(&schema, verb, input);

    match verb {
        Verb::Create => {
            let mut clause = clause;
            defaults(&mut clause, &[("currency", "USD"), ("status", "normal")]);
            clause
        }
        Verb::Update => clause
            .iter()
            .filter(|(field, _)| TRANSACTION_UPDATABLE.contains(&field.as_str()))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect(),
        Verb::Get | Verb::List | Verb::Delete => clause,
    }
}

/// Every transaction update appends a correction entry with both images.
fn correction_history(ctx: &WriteContext<'_>) -> Vec<PlannedWrite> {
    if ctx.verb != Verb::Update {
        return Vec::new();
    }
    let Some(previous) = ctx.previous else {
        return Vec::new();
    };

    let mut input = CommandInput::new()
        .with_field("transactionId", ctx.current.id_str())
        .with_field("changeType", "correction")
        .with_field(
            "changeTimestamp",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with_field("previousData", Value::from(previous.clone()))
        .with_field("newData", Value::from(ctx.current.clone()))
        .with_actor(ctx.actor.clone());

    if let Some(user) = &ctx.actor.user_id {
        input = input.with_field("changedByUserId", user.as_str());
    }
    if let Some(justification) = ctx.clause.get("correctionJustification") {
        input = input.with_field("correctionJustification", justification.clone());
    }
    if let Some(store) = ctx.current.get("storeId") {
        input = input.with_field("storeId", store.clone());
    }

    vec![PlannedWrite::create(SALE_TRANSACTION_HISTORY, input)]
}

pub fn sale_transaction_history() -> EntityDefinition {
    EntityDefinition::builder(SALE_TRANSACTION_HISTORY)
        .fields([
            "transactionId",
            "changeType",
            "changedByUserId",
            "changeTimestamp",
            "correctionJustification",
            "previousData",
            "newData",
            "storeId",
        ])
        .required(["transactionId", "changeType", "previousData"])
        .tenant_field("storeId")
        .owner_field("changedByUserId")
        .build()
}

fn defaults(clause: &mut DataClause, values: &[(&str, &str)]) {
    for (field, value) in values {
        if !clause.contains(field) {
            clause.insert(*field, *value);
        }
    }
}
