//! Constraint handling: providers, the enforcement service and bundles.

pub mod bundle;
pub mod handler;
pub mod provider;
pub mod service;

pub use bundle::{BlockingConstraintHandlerBundle, ReactiveConstraintHandlerBundle};
pub use provider::{MethodInvocation, Responsible, Signal};
pub use service::ConstraintEnforcementService;
