//! Handler shapes produced by providers, and their composition.
//!
//! Handlers are `Arc`ed closures so a bundle can be cloned into a gate or a
//! spawned task. Composition keeps order: `run_all`/`consume_all` call
//! handlers first to last and stop on the first failure; `map_all` folds left
//! to right.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{PepError, Result};

use super::provider::MethodInvocation;

/// Side effect without input (signal handlers).
pub type Runnable = Arc<dyn Fn() -> Result<()> + Send + Sync>;
/// Side effect observing a value.
pub type Consumer<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;
/// Value transformation.
pub type Mapper<T> = Arc<dyn Fn(T) -> Result<T> + Send + Sync>;
/// Side effect observing an error.
pub type ErrorConsumer = Arc<dyn Fn(&PepError) + Send + Sync>;
/// Error transformation.
pub type ErrorMapper = Arc<dyn Fn(PepError) -> PepError + Send + Sync>;
/// May rewrite the invocation before the protected method runs.
pub type MethodInvocationHandler = Arc<dyn Fn(&mut MethodInvocation) -> Result<()> + Send + Sync>;

pub fn runnable(f: impl Fn() -> Result<()> + Send + Sync + 'static) -> Runnable {
    Arc::new(f)
}

pub fn consumer<T: ?Sized + 'static>(
    f: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn Fn(&T) -> Result<()> + Send + Sync> {
    Arc::new(f)
}

pub fn mapper<T: 'static>(f: impl Fn(T) -> Result<T> + Send + Sync + 'static) -> Mapper<T> {
    Arc::new(f)
}

pub fn error_consumer(f: impl Fn(&PepError) + Send + Sync + 'static) -> ErrorConsumer {
    Arc::new(f)
}

pub fn error_mapper(f: impl Fn(PepError) -> PepError + Send + Sync + 'static) -> ErrorMapper {
    Arc::new(f)
}

pub fn method_invocation(
    f: impl Fn(&mut MethodInvocation) -> Result<()> + Send + Sync + 'static,
) -> MethodInvocationHandler {
    Arc::new(f)
}

pub(crate) fn run_all(handlers: Vec<Runnable>) -> Runnable {
    Arc::new(move || handlers.iter().try_for_each(|h| h()))
}

pub(crate) fn consume_all<T: ?Sized + 'static>(handlers: Vec<Consumer<T>>) -> Consumer<T> {
    Arc::new(move |v: &T| handlers.iter().try_for_each(|h| h(v)))
}

pub(crate) fn map_all(handlers: Vec<Mapper<Value>>) -> Mapper<Value> {
    Arc::new(move |v: Value| handlers.iter().try_fold(v, |acc, h| h(acc)))
}

pub(crate) fn consume_error_all(handlers: Vec<ErrorConsumer>) -> ErrorConsumer {
    Arc::new(move |e: &PepError| handlers.iter().for_each(|h| h(e)))
}

pub(crate) fn map_error_all(handlers: Vec<ErrorMapper>) -> ErrorMapper {
    Arc::new(move |e: PepError| handlers.iter().fold(e, |acc, h| h(acc)))
}

pub(crate) fn method_invocation_all(handlers: Vec<MethodInvocationHandler>) -> MethodInvocationHandler {
    Arc::new(move |inv: &mut MethodInvocation| {
        handlers.iter().try_for_each(|h| h(&mut *inv))
    })
}
