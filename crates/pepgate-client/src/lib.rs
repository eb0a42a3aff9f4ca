//! pepgate client runtime.
//!
//! Talks to a remote PDP over HTTP, keeps a degraded decision stream alive
//! while the PDP is unreachable, and applies decisions to async calls
//! (`enforce`) and to streams (`gate`). Configuration comes from a strict
//! YAML file (`config`).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod enforce;
pub mod gate;
pub mod pdp;
pub mod subject;

pub use enforce::{post_enforce, pre_enforce};
pub use gate::{DecisionGate, EnforcedStream, GatePolicy};
pub use pdp::{ExponentialBackoffStream, PdpResponse, RemotePdp};
pub use subject::{AuthorizationManager, Subject, SubjectResolver};
