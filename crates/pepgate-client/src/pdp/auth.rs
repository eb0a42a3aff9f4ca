//! `Authorization` header selection.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::AuthConfig;

/// Header value for the configured credentials, or `None` without any.
///
/// A non-empty bearer token is sent as-is, otherwise a non-empty API key is
/// sent as a bearer token, otherwise basic credentials are encoded.
pub fn authorization_header(auth: &AuthConfig) -> Option<String> {
    let non_empty = |s: &Option<String>| s.as_deref().filter(|v| !v.is_empty()).map(str::to_owned);

    if let Some(token) = non_empty(&auth.bearer_token).or_else(|| non_empty(&auth.api_key)) {
        return Some(format!("Bearer {token}"));
    }
    auth.basic.as_ref().map(|b| {
        let raw = format!("{}:{}", b.username, b.password);
        format!("Basic {}", STANDARD.encode(raw))
    })
}
