//! JSON content filtering.
//!
//! Two constraint shapes are understood:
//!
//! - `jsonContentFilterPredicate`: `conditions` only, used as a filter
//!   predicate over emitted values.
//! - `filterJsonContent`: `actions` (delete / blacken / replace) applied to
//!   every payload that satisfies the optional `conditions`.
//!
//! Everything is validated when the handler is built. A malformed constraint
//! is a `ContentViolation` and must deny access.

mod action;
mod condition;
mod path;
mod provider;

use std::sync::Arc;

use serde_json::Value;

use crate::constraint::Constraint;
use crate::constraints::handler::Mapper;
use crate::error::{PepError, Result};
use crate::predicate::Predicate;

pub use action::{Blacken, BLACK_SQUARE, MAX_BLACKEN_LENGTH};
pub use provider::{ContentFilterPredicateProvider, ContentFilteringProvider};

use action::{compile_actions, Action};

/// Predicate built from `constraint.conditions` (all ANDed).
pub fn predicate_from_conditions(constraint: &Constraint) -> Result<Predicate<Value>> {
    condition::compile_conditions(constraint.as_value())
}

/// Mapper applying `constraint.actions` to qualifying payloads.
///
/// `null` and empty text pass through. Text payloads are parsed as JSON
/// first. Arrays are filtered element by element; elements failing the
/// conditions are returned untouched.
pub fn get_handler(constraint: &Constraint) -> Result<Mapper<Value>> {
    let predicate = predicate_from_conditions(constraint)?;
    let actions: Arc<[Action]> = compile_actions(constraint.as_value())?.into();

    Ok(Arc::new(move |payload: Value| {
        match normalize(payload)? {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .into_iter()
                .map(|item| map_element(item, &predicate, &actions))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => map_element(other, &predicate, &actions),
        }
    }))
}

fn map_element(item: Value, predicate: &Predicate<Value>, actions: &[Action]) -> Result<Value> {
    let mut item = normalize(item)?;
    if !predicate.test(&item) {
        return Ok(item);
    }
    for action in actions {
        action.apply(&mut item)?;
    }
    Ok(item)
}

fn normalize(payload: Value) -> Result<Value> {
    match payload {
        Value::String(text) if !text.is_empty() => serde_json::from_str(&text).map_err(|e| {
            PepError::ContentViolation(format!("payload is not a JSON document: {e}"))
        }),
        other => Ok(other),
    }
}
