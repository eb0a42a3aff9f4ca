use serde::Deserialize;
use serde_json::Value;

use pepgate_core::error::{PepError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PepConfig {
    pub version: u32,

    pub pdp: PdpConfig,

    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

impl PepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PepError::UnsupportedVersion);
        }
        self.pdp.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdpConfig {
    /// Scheme, host and optional port, e.g. `https://pdp.local:8443`.
    pub url: String,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Subject lookup (`GET <url>?username=<name>` returning a role list).
    #[serde(default)]
    pub subject_lookup_url: Option<String>,
}

impl PdpConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(PepError::BadRequest(
                "pdp.url must start with http:// or https://".into(),
            ));
        }
        self.endpoints.validate()?;
        self.backoff.validate()?;
        Ok(())
    }
}

/// Credentials. A non-empty bearer token wins over an API key, which wins
/// over basic auth.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub basic: Option<BasicAuth>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    #[serde(default = "default_decide_once")]
    pub decide_once: String,
    #[serde(default = "default_decide")]
    pub decide: String,
    #[serde(default = "default_multi_decide")]
    pub multi_decide: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            decide_once: default_decide_once(),
            decide: default_decide(),
            multi_decide: default_multi_decide(),
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("decide_once", &self.decide_once),
            ("decide", &self.decide),
            ("multi_decide", &self.multi_decide),
        ] {
            if !path.starts_with('/') {
                return Err(PepError::BadRequest(format!(
                    "pdp.endpoints.{name} must start with '/'"
                )));
            }
        }
        Ok(())
    }
}

fn default_decide_once() -> String {
    "/api/pdp/decide-once".into()
}
fn default_decide() -> String {
    "/api/pdp/decide".into()
}
fn default_multi_decide() -> String {
    "/api/pdp/multi-decide".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Retries stop once the doubled interval would exceed this.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_ms == 0 {
            return Err(PepError::BadRequest(
                "pdp.backoff.initial_ms must be greater than 0".into(),
            ));
        }
        if self.max_ms < self.initial_ms {
            return Err(PepError::BadRequest(
                "pdp.backoff.max_ms must not be less than initial_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_initial_ms() -> u64 {
    2000
}
fn default_max_ms() -> u64 {
    50000
}

/// Subscription followed by the `pep-watch` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub subject: Value,
    pub action: Value,
    pub resource: Value,
    #[serde(default)]
    pub environment: Option<Value>,
}
