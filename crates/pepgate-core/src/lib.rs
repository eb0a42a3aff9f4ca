//! pepgate core: decision model, constraint engine, and content filtering.
//!
//! This crate defines the policy-enforcement primitives shared by the client
//! runtime and any integration layer: the PDP decision wire model, the
//! constraint-handler registry that turns a decision into a handler bundle,
//! and the JSON content-filter language. It carries no transport or runtime
//! dependencies so it can be driven from blocking or async callers alike.
//!
//! # Panics
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every enforcement path surfaces failure as `PepError` so a broken
//! constraint or decision denies access instead of crashing the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod constraint;
pub mod constraints;
pub mod decision;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod subscription;

/// Shared result type.
pub use error::{ErrorCode, PepError, Result};

pub use constraint::{Constraint, ConstraintKind};
pub use constraints::{
    BlockingConstraintHandlerBundle, ConstraintEnforcementService, MethodInvocation,
    ReactiveConstraintHandlerBundle, Signal,
};
pub use decision::{Decision, DecisionStatus};
pub use predicate::Predicate;
pub use subscription::AuthorizationSubscription;
