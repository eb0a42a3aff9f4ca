//! `actions` compilation and application (delete / blacken / replace).

use serde_json::{Map, Value};

use crate::error::{PepError, Result};

use super::path::{find_key_paths, lookup_mut, strip_root};

const ACTIONS: &str = "actions";
const PATH: &str = "path";
const TYPE: &str = "type";
const REPLACEMENT: &str = "replacement";
const LENGTH: &str = "length";
const DISCLOSE_LEFT: &str = "discloseLeft";
const DISCLOSE_RIGHT: &str = "discloseRight";

/// Largest glyph count a `blacken` action may ask for.
pub const MAX_BLACKEN_LENGTH: usize = 65_536;

/// Default blacken glyph.
pub const BLACK_SQUARE: &str = "█";

/// Blacken parameters after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Blacken {
    pub replacement: String,
    /// Glyph count; `None` covers the undisclosed span.
    pub length: Option<usize>,
    pub disclose_left: usize,
    pub disclose_right: usize,
}

impl Default for Blacken {
    fn default() -> Self {
        Self {
            replacement: BLACK_SQUARE.to_owned(),
            length: None,
            disclose_left: 0,
            disclose_right: 0,
        }
    }
}

impl Blacken {
    /// Mask `text`, keeping the disclosed edges. Counts Unicode scalar values.
    pub fn apply(&self, text: &str) -> String {
        let n = text.chars().count();
        let (left, right) = (self.disclose_left, self.disclose_right);
        if left.saturating_add(right) >= n {
            return text.to_owned();
        }
        let hidden = n - left - right;
        let mut out: String = text.chars().take(left).collect();
        out.push_str(&self.replacement.repeat(self.length.unwrap_or(hidden)));
        out.extend(text.chars().skip(left + hidden));
        out
    }

    fn apply_node(&self, node: &Value) -> Result<Value> {
        let text = match node {
            Value::String(s) => s.clone(),
            Value::Object(_) | Value::Array(_) | Value::Null => node.to_string(),
            Value::Number(_) | Value::Bool(_) => {
                return Err(PepError::ContentViolation(
                    "The constraint indicates a text node to be blackened. However, the node identified by the path is not a text node.".into(),
                ))
            }
        };
        Ok(Value::String(self.apply(&text)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ActionKind {
    Delete,
    Replace(Value),
    Blacken(Blacken),
}

/// One compiled action: where (key name) and what.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Action {
    key: String,
    kind: ActionKind,
}

impl Action {
    /// Apply to every location named `key`. The key must exist somewhere.
    pub(crate) fn apply(&self, doc: &mut Value) -> Result<()> {
        let paths = find_key_paths(doc, &self.key);
        if paths.is_empty() {
            return Err(PepError::ContentViolation(format!(
                "Constraint enforcement failed. The path '{}' defined in the constraint is not present in the data.",
                self.key
            )));
        }
        for path in &paths {
            // an earlier action on an enclosing match may have replaced this node
            let Some(slot) = lookup_mut(doc, path) else {
                continue;
            };
            *slot = match &self.kind {
                ActionKind::Delete => Value::Null,
                ActionKind::Replace(v) => v.clone(),
                ActionKind::Blacken(b) => b.apply_node(slot)?,
            };
        }
        Ok(())
    }
}

/// Compile `constraint.actions`. Absent or `null` means no actions.
pub(crate) fn compile_actions(constraint: &Value) -> Result<Vec<Action>> {
    match constraint.get(ACTIONS) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(compile_action).collect(),
        Some(_) => Err(violation("'actions' is not an array.")),
    }
}

fn compile_action(action: &Value) -> Result<Action> {
    let obj = action
        .as_object()
        .ok_or_else(|| violation("An action in 'actions' is not an object."))?;

    let key = strip_root(textual(obj, PATH)?).to_owned();
    let ty = textual(obj, TYPE)?.to_lowercase();

    let kind = match ty.as_str() {
        "delete" => ActionKind::Delete,
        "replace" => ActionKind::Replace(obj.get(REPLACEMENT).cloned().ok_or_else(|| {
            violation("The constraint indicates a text node to be replaced. However, the action does not specify a 'replacement'.")
        })?),
        "blacken" => ActionKind::Blacken(compile_blacken(obj)?),
        other => return Err(violation(format!("Unknown action type: '{other}'."))),
    };

    Ok(Action { key, kind })
}

fn compile_blacken(obj: &Map<String, Value>) -> Result<Blacken> {
    let replacement = match obj.get(REPLACEMENT) {
        None => BLACK_SQUARE.to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(violation("'replacement' of 'blacken' action is not textual.")),
    };
    let length = count(obj, LENGTH)?;
    if length.is_some_and(|n| n > MAX_BLACKEN_LENGTH) {
        return Err(violation(format!(
            "'length' of 'blacken' action exceeds {MAX_BLACKEN_LENGTH}."
        )));
    }
    Ok(Blacken {
        replacement,
        length,
        disclose_left: count(obj, DISCLOSE_LEFT)?.unwrap_or(0),
        disclose_right: count(obj, DISCLOSE_RIGHT)?.unwrap_or(0),
    })
}

fn textual<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    match obj.get(key) {
        None => Err(violation(format!("An action does not declare '{key}'."))),
        Some(v) => v
            .as_str()
            .ok_or_else(|| violation(format!("An action's '{key}' is not textual."))),
    }
}

// Non-negative finite number; fractions truncate.
fn count(obj: &Map<String, Value>, key: &str) -> Result<Option<usize>> {
    let Some(v) = obj.get(key) else {
        return Ok(None);
    };
    match v.as_f64() {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n.trunc() as usize)),
        _ => Err(violation(format!(
            "An action's '{key}' is not a non-negative number."
        ))),
    }
}

fn violation(msg: impl Into<String>) -> PepError {
    PepError::ContentViolation(msg.into())
}
