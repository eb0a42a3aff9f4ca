//! `conditions` compilation: `[{path, type, value}]` into a predicate.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{PepError, Result};
use crate::predicate::Predicate;

use super::path::{find_first, strip_root};

const CONDITIONS: &str = "conditions";
const PATH: &str = "path";
const TYPE: &str = "type";
const VALUE: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Neq,
    Geq,
    Leq,
    Gt,
    Lt,
}

impl Op {
    fn parse(s: &str) -> Option<Op> {
        Some(match s {
            "==" => Op::Eq,
            "!=" => Op::Neq,
            ">=" => Op::Geq,
            "<=" => Op::Leq,
            ">" => Op::Gt,
            "<" => Op::Lt,
            _ => return None,
        })
    }

    fn cmp_num(self, node: f64, value: f64) -> bool {
        match self {
            Op::Eq => node == value,
            Op::Neq => node != value,
            Op::Geq => node >= value,
            Op::Leq => node <= value,
            Op::Gt => node > value,
            Op::Lt => node < value,
        }
    }
}

enum Check {
    Num(Op, f64),
    Text { negate: bool, value: String },
    Matches(Regex),
}

impl Check {
    fn test(&self, node: &Value) -> bool {
        match self {
            Check::Num(op, value) => node.as_f64().is_some_and(|n| op.cmp_num(n, *value)),
            Check::Text { negate, value } => {
                node.as_str().is_some_and(|s| (s == value) != *negate)
            }
            Check::Matches(re) => node.as_str().is_some_and(|s| re.is_match(s)),
        }
    }
}

/// Conjunction of every condition in `constraint.conditions`.
///
/// Absent or `null` conditions give a predicate that accepts everything.
/// Structural problems fail here, never while testing.
pub(crate) fn compile_conditions(constraint: &Value) -> Result<Predicate<Value>> {
    let conditions = match constraint.get(CONDITIONS) {
        None | Some(Value::Null) => return Ok(Predicate::always()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("'conditions' is not an array")),
    };

    conditions
        .iter()
        .try_fold(Predicate::always(), |acc, condition| {
            Ok(acc.and(&condition_to_predicate(condition)?))
        })
}

fn condition_to_predicate(condition: &Value) -> Result<Predicate<Value>> {
    let obj = condition
        .as_object()
        .ok_or_else(|| invalid("condition is not an object"))?;

    let path = required(obj, PATH)?
        .as_str()
        .ok_or_else(|| invalid("condition 'path' is not textual"))?;
    let op = required(obj, TYPE)?
        .as_str()
        .ok_or_else(|| invalid("condition 'type' is not textual"))?;
    let value = required(obj, VALUE)?;

    let check = compile(op, value)?;
    let key = strip_root(path).to_owned();

    Ok(Predicate::new(move |doc: &Value| {
        find_first(doc, &key).is_some_and(|node| check.test(node))
    }))
}

fn compile(op: &str, value: &Value) -> Result<Check> {
    if op == "=~" {
        let pattern = value
            .as_str()
            .ok_or_else(|| invalid(format!("'=~' needs a textual value, got {value}")))?;
        let re = Regex::new(pattern)
            .map_err(|e| invalid(format!("invalid regular expression '{pattern}': {e}")))?;
        return Ok(Check::Matches(re));
    }

    let parsed = Op::parse(op).ok_or_else(|| invalid(format!("unknown operator '{op}'")))?;
    match (parsed, value) {
        (_, Value::Number(n)) => {
            let n = n
                .as_f64()
                .ok_or_else(|| invalid(format!("value {n} is not representable")))?;
            Ok(Check::Num(parsed, n))
        }
        (Op::Eq | Op::Neq, Value::String(s)) => Ok(Check::Text {
            negate: parsed == Op::Neq,
            value: s.clone(),
        }),
        (Op::Eq | Op::Neq, other) => Err(invalid(format!(
            "'{op}' needs a number or text value, got {other}"
        ))),
        (_, other) => Err(invalid(format!("'{op}' needs a numeric value, got {other}"))),
    }
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(invalid(format!("condition does not declare '{key}'"))),
        Some(v) => Ok(v),
    }
}

fn invalid(msg: impl std::fmt::Display) -> PepError {
    PepError::ContentViolation(format!("Not a valid predicate condition: {msg}"))
}
