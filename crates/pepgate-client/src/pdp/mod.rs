//! Remote PDP access: HTTP requests, body framing and the degraded stream.

pub mod auth;
pub mod backoff;
pub mod framing;
pub mod remote;

pub use auth::authorization_header;
pub use backoff::{BackoffEmitter, ExponentialBackoffStream};
pub use framing::{decisions, frames, DecisionFramer};
pub use remote::{BodyStream, PdpResponse, RemotePdp, RemotePdpBuilder};
