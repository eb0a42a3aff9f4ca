//! Obligation / advice payloads attached to a decision.
//!
//! A constraint is an arbitrary JSON object whose `type` field selects the
//! provider that understands it. The engine only classifies the discriminator;
//! the remaining fields are interpreted by the responsible provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Constraint type handled by the built-in content filter predicate.
pub const JSON_CONTENT_FILTER_PREDICATE: &str = "jsonContentFilterPredicate";
/// Constraint type handled by the built-in content filtering mapper.
pub const FILTER_JSON_CONTENT: &str = "filterJsonContent";

const TYPE: &str = "type";

/// Classified `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind<'a> {
    JsonContentFilterPredicate,
    FilterJsonContent,
    /// Application-defined type, claimed by registered providers.
    Custom(&'a str),
    /// Not an object, or no textual `type`.
    Untyped,
}

/// One obligation or advice entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraint(Value);

impl Constraint {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The textual `type` field, if present.
    pub fn type_name(&self) -> Option<&str> {
        self.0.get(TYPE).and_then(Value::as_str)
    }

    pub fn kind(&self) -> ConstraintKind<'_> {
        match self.type_name() {
            Some(JSON_CONTENT_FILTER_PREDICATE) => ConstraintKind::JsonContentFilterPredicate,
            Some(FILTER_JSON_CONTENT) => ConstraintKind::FilterJsonContent,
            Some(other) => ConstraintKind::Custom(other),
            None => ConstraintKind::Untyped,
        }
    }

    /// True when `type` equals `required`. Non-objects are never responsible.
    pub fn is_type(&self, required: &str) -> bool {
        self.type_name() == Some(required)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Constraint {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
