//! Per-decision handler bundles.
//!
//! A bundle is built for exactly one decision and invoked by the caller at
//! the matching control-flow point. Both flavours share the value pipeline:
//! filter, then consumers, then mappers.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{PepError, Result};
use crate::predicate::{handle_predicate, Predicate};

use super::handler::{
    Consumer, ErrorConsumer, ErrorMapper, Mapper, MethodInvocationHandler, Runnable,
};
use super::provider::{MethodInvocation, Signal};

/// Handlers every bundle carries.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) on_decision: Runnable,
    pub(crate) method_invocation: MethodInvocationHandler,
    pub(crate) on_next: Consumer<Value>,
    pub(crate) map_next: Mapper<Value>,
    pub(crate) on_error: ErrorConsumer,
    pub(crate) map_error: ErrorMapper,
    pub(crate) filter: Predicate<Value>,
}

impl Pipeline {
    // A scalar rejected by the filter has nothing left to emit.
    fn filter(&self, value: Value) -> Value {
        handle_predicate(&self.filter, Some(value)).unwrap_or(Value::Null)
    }

    fn on_next(&self, value: Value) -> Result<Value> {
        let value = self.filter(value);
        (self.on_next)(&value)?;
        (self.map_next)(value)
    }

    fn on_error(&self, error: PepError) -> PepError {
        (self.on_error)(&error);
        (self.map_error)(error)
    }
}

/// Bundle for a single blocking call (pre- or post-enforce).
#[derive(Clone)]
pub struct BlockingConstraintHandlerBundle {
    pipeline: Pipeline,
}

impl BlockingConstraintHandlerBundle {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Run decision-arrival runnables.
    pub fn handle_on_decision_signal_constraints(&self) -> Result<()> {
        (self.pipeline.on_decision)()
    }

    /// Let handlers rewrite the invocation. Post-enforce bundles carry none.
    pub fn handle_method_invocation_handlers(&self, invocation: &mut MethodInvocation) -> Result<()> {
        (self.pipeline.method_invocation)(invocation)
    }

    /// Filter, consume, then map `value`.
    pub fn handle_all_on_next_constraints(&self, value: Value) -> Result<Value> {
        self.pipeline.on_next(value)
    }

    pub fn handle_filter_predicate_handlers(&self, value: Value) -> Value {
        self.pipeline.filter(value)
    }

    /// Run error consumers, then fold the error through error mappers.
    pub fn handle_all_on_error_constraints(&self, error: PepError) -> PepError {
        self.pipeline.on_error(error)
    }
}

impl fmt::Debug for BlockingConstraintHandlerBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingConstraintHandlerBundle")
            .finish_non_exhaustive()
    }
}

/// Bundle driving one enforced stream.
#[derive(Clone)]
pub struct ReactiveConstraintHandlerBundle {
    pipeline: Pipeline,
    signals: HashMap<Signal, Runnable>,
    on_subscribe: Runnable,
    on_request: Consumer<u64>,
}

impl fmt::Debug for ReactiveConstraintHandlerBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signals: Vec<&str> = self.signals.keys().map(|s| s.as_str()).collect();
        signals.sort_unstable();
        f.debug_struct("ReactiveConstraintHandlerBundle")
            .field("signals", &signals)
            .finish_non_exhaustive()
    }
}

impl ReactiveConstraintHandlerBundle {
    pub(crate) fn new(
        pipeline: Pipeline,
        signals: HashMap<Signal, Runnable>,
        on_subscribe: Runnable,
        on_request: Consumer<u64>,
    ) -> Self {
        Self {
            pipeline,
            signals,
            on_subscribe,
            on_request,
        }
    }

    pub fn handle_signal(&self, signal: Signal) -> Result<()> {
        match signal {
            Signal::Decision => (self.pipeline.on_decision)(),
            other => self.signals.get(&other).map_or(Ok(()), |run| run()),
        }
    }

    pub fn handle_on_decision_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Decision)
    }

    pub fn handle_on_close_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Close)
    }

    pub fn handle_on_data_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Data)
    }

    pub fn handle_on_end_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::End)
    }

    pub fn handle_on_error_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Error)
    }

    pub fn handle_on_pause_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Pause)
    }

    pub fn handle_on_readable_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Readable)
    }

    pub fn handle_on_resume_signal_constraints(&self) -> Result<()> {
        self.handle_signal(Signal::Resume)
    }

    pub fn handle_on_subscribe_constraints(&self) -> Result<()> {
        (self.on_subscribe)()
    }

    /// `n` is the number of items requested from upstream.
    pub fn handle_on_request_constraints(&self, n: u64) -> Result<()> {
        (self.on_request)(&n)
    }

    pub fn handle_method_invocation_handlers(&self, invocation: &mut MethodInvocation) -> Result<()> {
        (self.pipeline.method_invocation)(invocation)
    }

    pub fn handle_all_on_next_constraints(&self, value: Value) -> Result<Value> {
        self.pipeline.on_next(value)
    }

    pub fn handle_filter_predicate_handlers(&self, value: Value) -> Value {
        self.pipeline.filter(value)
    }

    pub fn handle_all_on_error_constraints(&self, error: PepError) -> PepError {
        self.pipeline.on_error(error)
    }
}
