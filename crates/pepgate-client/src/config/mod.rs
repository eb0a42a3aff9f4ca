//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use pepgate_core::error::{PepError, Result};

pub use schema::{AuthConfig, BackoffConfig, BasicAuth, EndpointConfig, PdpConfig, PepConfig, WatchConfig};

pub fn load_from_file(path: &str) -> Result<PepConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PepError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PepConfig> {
    let cfg: PepConfig = serde_yaml::from_str(s)
        .map_err(|e| PepError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
