//! PDP decision (wire model).
//!
//! Parsing is strict about the status discriminator only: a message without a
//! valid `decision` field is rejected, everything else defaults to empty.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constraint::Constraint;
use crate::error::{PepError, Result};

/// Decision status returned by the PDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Permit => "PERMIT",
            DecisionStatus::Deny => "DENY",
            DecisionStatus::NotApplicable => "NOT_APPLICABLE",
            DecisionStatus::Indeterminate => "INDETERMINATE",
        }
    }
}

/// Immutable decision as received from the PDP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "decision")]
    status: DecisionStatus,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    obligations: Vec<Constraint>,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    advice: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<Value>,
}

// `"obligations": null` means none.
fn null_as_empty<'de, D>(d: D) -> std::result::Result<Vec<Constraint>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Constraint>>::deserialize(d)?.unwrap_or_default())
}

impl Decision {
    pub fn new(status: DecisionStatus) -> Self {
        Self {
            status,
            obligations: Vec::new(),
            advice: Vec::new(),
            resource: None,
            action: None,
            environment: None,
            subject: None,
        }
    }

    /// Synthetic decision used while the PDP is unreachable.
    pub fn indeterminate() -> Self {
        Self::new(DecisionStatus::Indeterminate)
    }

    pub fn with_obligation(mut self, c: impl Into<Constraint>) -> Self {
        self.obligations.push(c.into());
        self
    }

    pub fn with_advice(mut self, c: impl Into<Constraint>) -> Self {
        self.advice.push(c.into());
        self
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Parse from an already-decoded JSON value.
    pub fn from_value(v: Value) -> Result<Self> {
        if v.get("decision").is_none() {
            return Err(PepError::MalformedDecision(
                "decision object is missing the decision field".into(),
            ));
        }
        serde_json::from_value(v).map_err(|e| PepError::MalformedDecision(e.to_string()))
    }

    /// Parse from raw message bytes.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let v: Value = serde_json::from_slice(raw)
            .map_err(|e| PepError::MalformedDecision(format!("invalid json: {e}")))?;
        Self::from_value(v)
    }

    pub fn status(&self) -> DecisionStatus {
        self.status
    }

    pub fn is_permit(&self) -> bool {
        self.status == DecisionStatus::Permit
    }

    pub fn obligations(&self) -> &[Constraint] {
        &self.obligations
    }

    pub fn advice(&self) -> &[Constraint] {
        &self.advice
    }

    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_ref()
    }

    pub fn action(&self) -> Option<&Value> {
        self.action.as_ref()
    }

    pub fn environment(&self) -> Option<&Value> {
        self.environment.as_ref()
    }

    pub fn subject(&self) -> Option<&Value> {
        self.subject.as_ref()
    }
}
