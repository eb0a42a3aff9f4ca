//! Composable boolean tests and value filtering.
//!
//! Combinators never mutate their operands; they capture shared handles and
//! re-evaluate both sides on every `test` call.

use std::fmt;
use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use serde_json::{Map, Value};

/// Shared predicate over `T`.
pub struct Predicate<T: ?Sized> {
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

impl<T: ?Sized + 'static> Predicate<T> {
    pub fn new(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self { test: Arc::new(f) }
    }

    /// Vacuously true.
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    pub fn test(&self, v: &T) -> bool {
        (self.test)(v)
    }

    #[must_use]
    pub fn and(&self, other: &Predicate<T>) -> Predicate<T> {
        let (a, b) = (self.clone(), other.clone());
        Predicate::new(move |v| a.test(v) && b.test(v))
    }

    #[must_use]
    pub fn or(&self, other: &Predicate<T>) -> Predicate<T> {
        let (a, b) = (self.clone(), other.clone());
        Predicate::new(move |v| a.test(v) || b.test(v))
    }

    #[must_use]
    pub fn negate(&self) -> Predicate<T> {
        let a = self.clone();
        Predicate::new(move |v| !a.test(v))
    }
}

impl<T: PartialEq + Send + Sync + 'static> Predicate<T> {
    pub fn is_equal(target: T) -> Predicate<T> {
        Predicate::new(move |v| *v == target)
    }
}

/// Filter a JSON value by shape.
///
/// - `None` stays `None`
/// - arrays keep passing elements in order
/// - objects keep entries whose value passes, keys in original order
/// - scalars are kept only if they pass
pub fn handle_predicate(p: &Predicate<Value>, value: Option<Value>) -> Option<Value> {
    match value? {
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter(|v| p.test(v)).collect(),
        )),
        Value::Object(entries) => Some(Value::Object(
            entries
                .into_iter()
                .filter(|(_, v)| p.test(v))
                .collect::<Map<String, Value>>(),
        )),
        scalar => p.test(&scalar).then_some(scalar),
    }
}

/// Decode a byte buffer, then filter it as JSON.
pub fn handle_predicate_bytes(p: &Predicate<Value>, raw: &[u8]) -> Option<Value> {
    handle_predicate(p, Some(decode_data(raw)))
}

/// Lazily filter a stream; failing elements are dropped.
pub fn handle_predicate_stream<T, S>(p: Predicate<T>, source: S) -> impl Stream<Item = T>
where
    T: 'static,
    S: Stream<Item = T>,
{
    source.filter(move |v| future::ready(p.test(v)))
}

/// UTF-8 decode; JSON-looking text is parsed (empty string if that fails).
pub fn decode_data(raw: &[u8]) -> Value {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(&text).unwrap_or_else(|_| Value::String(String::new()));
    }
    Value::String(text.into_owned())
}
