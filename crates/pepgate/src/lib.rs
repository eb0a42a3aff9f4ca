//! Top-level facade crate for pepgate.
//!
//! Re-exports the enforcement core and the client runtime so users can depend on a single crate.

pub mod core {
    pub use pepgate_core::*;
}

pub mod client {
    pub use pepgate_client::*;
}
