//! Constraint handler providers.
//!
//! One trait per handler category. Every provider answers two questions:
//! does it understand a constraint (`Responsible`), and which handler does
//! it produce for it (`get_handler`). Registries hold `Arc<dyn ...>` so the
//! same provider can serve every decision.

use std::sync::Arc;

use serde_json::Value;

use crate::constraint::Constraint;
use crate::error::Result;
use crate::predicate::Predicate;

use super::handler::{
    Consumer, ErrorConsumer, ErrorMapper, Mapper, MethodInvocationHandler, Runnable,
};

/// Lifecycle events a reactive bundle exposes runnables for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Decision,
    Close,
    Data,
    End,
    Error,
    Pause,
    Readable,
    Resume,
}

impl Signal {
    pub const ALL: [Signal; 8] = [
        Signal::Decision,
        Signal::Close,
        Signal::Data,
        Signal::End,
        Signal::Error,
        Signal::Pause,
        Signal::Readable,
        Signal::Resume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Decision => "decision",
            Signal::Close => "close",
            Signal::Data => "data",
            Signal::End => "end",
            Signal::Error => "error",
            Signal::Pause => "pause",
            Signal::Readable => "readable",
            Signal::Resume => "resume",
        }
    }
}

/// Name and arguments of the protected call, rewritable before it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInvocation {
    pub name: String,
    pub args: Vec<Value>,
}

impl MethodInvocation {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

pub trait Responsible {
    fn is_responsible(&self, constraint: &Constraint) -> bool;
}

/// Runnable bound to one lifecycle signal.
pub trait RunnableConstraintHandlerProvider: Responsible + Send + Sync {
    fn signal(&self) -> Signal;
    fn get_handler(&self, constraint: &Constraint) -> Result<Runnable>;
}

pub trait MethodInvocationConstraintHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<MethodInvocationHandler>;
}

/// Observes each value before mappers run.
pub trait ConsumerConstraintHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<Consumer<Value>>;
}

/// Transforms each value. Lower priority runs first.
pub trait MappingConstraintHandlerProvider: Responsible + Send + Sync {
    fn priority(&self) -> i32 {
        0
    }
    fn get_handler(&self, constraint: &Constraint) -> Result<Mapper<Value>>;
}

pub trait ErrorHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<ErrorConsumer>;
}

pub trait ErrorMappingConstraintHandlerProvider: Responsible + Send + Sync {
    fn priority(&self) -> i32 {
        0
    }
    fn get_handler(&self, constraint: &Constraint) -> Result<ErrorMapper>;
}

/// Decides which values reach consumers and mappers.
pub trait FilterPredicateConstraintHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<Predicate<Value>>;
}

pub trait SubscriptionHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<Runnable>;
}

/// Receives the demand (number of items) requested from upstream.
pub trait RequestHandlerProvider: Responsible + Send + Sync {
    fn get_handler(&self, constraint: &Constraint) -> Result<Consumer<u64>>;
}

/// Provider claiming one constraint `type` and handing out a fixed handler.
///
/// Built through the free functions below, which pick the category.
pub struct TypedProvider<H> {
    constraint_type: String,
    priority: i32,
    signal: Signal,
    handler: H,
}

impl<H: Clone> TypedProvider<H> {
    fn new(constraint_type: impl Into<String>, handler: H) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            priority: 0,
            signal: Signal::Decision,
            handler,
        }
    }

    fn handler(&self) -> Result<H> {
        Ok(self.handler.clone())
    }
}

impl<H> Responsible for TypedProvider<H> {
    fn is_responsible(&self, constraint: &Constraint) -> bool {
        constraint.is_type(&self.constraint_type)
    }
}

impl RunnableConstraintHandlerProvider for TypedProvider<Runnable> {
    fn signal(&self) -> Signal {
        self.signal
    }
    fn get_handler(&self, _: &Constraint) -> Result<Runnable> {
        self.handler()
    }
}

impl MethodInvocationConstraintHandlerProvider for TypedProvider<MethodInvocationHandler> {
    fn get_handler(&self, _: &Constraint) -> Result<MethodInvocationHandler> {
        self.handler()
    }
}

impl ConsumerConstraintHandlerProvider for TypedProvider<Consumer<Value>> {
    fn get_handler(&self, _: &Constraint) -> Result<Consumer<Value>> {
        self.handler()
    }
}

impl MappingConstraintHandlerProvider for TypedProvider<Mapper<Value>> {
    fn priority(&self) -> i32 {
        self.priority
    }
    fn get_handler(&self, _: &Constraint) -> Result<Mapper<Value>> {
        self.handler()
    }
}

impl ErrorHandlerProvider for TypedProvider<ErrorConsumer> {
    fn get_handler(&self, _: &Constraint) -> Result<ErrorConsumer> {
        self.handler()
    }
}

impl ErrorMappingConstraintHandlerProvider for TypedProvider<ErrorMapper> {
    fn priority(&self) -> i32 {
        self.priority
    }
    fn get_handler(&self, _: &Constraint) -> Result<ErrorMapper> {
        self.handler()
    }
}

impl FilterPredicateConstraintHandlerProvider for TypedProvider<Predicate<Value>> {
    fn get_handler(&self, _: &Constraint) -> Result<Predicate<Value>> {
        self.handler()
    }
}

impl SubscriptionHandlerProvider for TypedProvider<Runnable> {
    fn get_handler(&self, _: &Constraint) -> Result<Runnable> {
        self.handler()
    }
}

impl RequestHandlerProvider for TypedProvider<Consumer<u64>> {
    fn get_handler(&self, _: &Constraint) -> Result<Consumer<u64>> {
        self.handler()
    }
}

pub fn on_signal(
    constraint_type: impl Into<String>,
    signal: Signal,
    f: impl Fn() -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn RunnableConstraintHandlerProvider> {
    let mut p = TypedProvider::<Runnable>::new(constraint_type, Arc::new(f));
    p.signal = signal;
    Arc::new(p)
}

pub fn on_method_invocation(
    constraint_type: impl Into<String>,
    f: impl Fn(&mut MethodInvocation) -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn MethodInvocationConstraintHandlerProvider> {
    Arc::new(TypedProvider::<MethodInvocationHandler>::new(
        constraint_type,
        Arc::new(f),
    ))
}

pub fn on_next_consumer(
    constraint_type: impl Into<String>,
    f: impl Fn(&Value) -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn ConsumerConstraintHandlerProvider> {
    Arc::new(TypedProvider::<Consumer<Value>>::new(
        constraint_type,
        Arc::new(f),
    ))
}

pub fn on_next_mapper(
    constraint_type: impl Into<String>,
    priority: i32,
    f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
) -> Arc<dyn MappingConstraintHandlerProvider> {
    let mut p = TypedProvider::<Mapper<Value>>::new(constraint_type, Arc::new(f));
    p.priority = priority;
    Arc::new(p)
}

pub fn on_error_consumer(
    constraint_type: impl Into<String>,
    f: impl Fn(&crate::error::PepError) + Send + Sync + 'static,
) -> Arc<dyn ErrorHandlerProvider> {
    Arc::new(TypedProvider::<ErrorConsumer>::new(
        constraint_type,
        Arc::new(f),
    ))
}

pub fn on_error_mapper(
    constraint_type: impl Into<String>,
    priority: i32,
    f: impl Fn(crate::error::PepError) -> crate::error::PepError + Send + Sync + 'static,
) -> Arc<dyn ErrorMappingConstraintHandlerProvider> {
    let mut p = TypedProvider::<ErrorMapper>::new(constraint_type, Arc::new(f));
    p.priority = priority;
    Arc::new(p)
}

pub fn filter_predicate(
    constraint_type: impl Into<String>,
    predicate: Predicate<Value>,
) -> Arc<dyn FilterPredicateConstraintHandlerProvider> {
    Arc::new(TypedProvider::new(constraint_type, predicate))
}

pub fn on_subscribe(
    constraint_type: impl Into<String>,
    f: impl Fn() -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn SubscriptionHandlerProvider> {
    Arc::new(TypedProvider::<Runnable>::new(constraint_type, Arc::new(f)))
}

pub fn on_request(
    constraint_type: impl Into<String>,
    f: impl Fn(&u64) -> Result<()> + Send + Sync + 'static,
) -> Arc<dyn RequestHandlerProvider> {
    Arc::new(TypedProvider::<Consumer<u64>>::new(
        constraint_type,
        Arc::new(f),
    ))
}
