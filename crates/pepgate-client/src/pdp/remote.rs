use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

use pepgate_core::error::{PepError, Result};
use pepgate_core::{AuthorizationSubscription, ConstraintEnforcementService, Decision};

use crate::config::{AuthConfig, BackoffConfig, BasicAuth, EndpointConfig, PdpConfig};
use crate::subject::{AuthorizationManager, Subject, SubjectResolver};

use super::auth::authorization_header;
use super::backoff::{self, BackoffEmitter, ExponentialBackoffStream};
use super::framing::decisions;

/// Raw response body chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// What a decision request produced.
pub enum PdpResponse {
    /// The PDP answered; the body holds one or more decisions.
    Body(BodyStream),
    /// The PDP was unreachable. The stream starts with `INDETERMINATE` and
    /// carries the decisions of later successful retries.
    Degraded(ExponentialBackoffStream),
    /// A degraded stream was already open; this call's decisions go there.
    Redirected,
}

impl PdpResponse {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PdpResponse::Degraded(_))
    }

    /// Parsed decisions, whichever shape the response has.
    pub fn into_decisions(self) -> BoxStream<'static, Decision> {
        match self {
            PdpResponse::Body(body) => decisions(body).boxed(),
            PdpResponse::Degraded(stream) => decisions(stream.map(Ok::<Bytes, PepError>)).boxed(),
            PdpResponse::Redirected => stream::empty().boxed(),
        }
    }

    /// First decision, or `INDETERMINATE` when none arrives.
    pub async fn first_decision(self) -> Decision {
        self.into_decisions()
            .next()
            .await
            .unwrap_or_else(Decision::indeterminate)
    }
}

impl fmt::Debug for PdpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdpResponse::Body(_) => f.write_str("PdpResponse::Body"),
            PdpResponse::Degraded(_) => f.write_str("PdpResponse::Degraded"),
            PdpResponse::Redirected => f.write_str("PdpResponse::Redirected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecisionKind {
    Once,
    Stream,
    Multi,
}

impl DecisionKind {
    fn as_str(self) -> &'static str {
        match self {
            DecisionKind::Once => "decide_once",
            DecisionKind::Stream => "decide",
            DecisionKind::Multi => "multi_decide",
        }
    }
}

/// Client for a remote PDP.
///
/// Cheap to clone; clones share credentials, the backoff interval and the
/// single degraded stream. At most one degraded stream is open at a time:
/// while it is, every answer from the PDP is fed into it.
#[derive(Clone)]
pub struct RemotePdp {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    auth: AuthConfig,
    endpoints: EndpointConfig,
    max_backoff_ms: u64,
    backoff_ms: AtomicU64,
    backoff_stream: Mutex<Option<BackoffEmitter>>,
    service: Arc<ConstraintEnforcementService>,
    authorization_manager: Option<AuthorizationManager>,
}

impl RemotePdp {
    pub fn builder() -> RemotePdpBuilder {
        RemotePdpBuilder::default()
    }

    pub fn from_config(cfg: &PdpConfig, service: Arc<ConstraintEnforcementService>) -> Result<Self> {
        cfg.validate()?;
        let mut b = RemotePdp::builder()
            .host(&cfg.url)
            .auth(cfg.auth.clone())
            .endpoints(cfg.endpoints.clone())
            .backoff(cfg.backoff.clone())
            .service(service);
        if let Some(url) = &cfg.subject_lookup_url {
            b = b.authorization_manager(url);
        }
        b.build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn constraint_enforcement_service(&self) -> &Arc<ConstraintEnforcementService> {
        &self.inner.service
    }

    pub fn authorization_manager(&self) -> Option<&AuthorizationManager> {
        self.inner.authorization_manager.as_ref()
    }

    /// Current backoff interval in milliseconds.
    pub fn backoff_interval_ms(&self) -> u64 {
        self.inner.backoff_ms.load(Ordering::SeqCst)
    }

    /// Resolve a subject through the configured lookup.
    pub async fn resolve_subject(&self, username: &str) -> Result<Subject> {
        match &self.inner.authorization_manager {
            Some(m) => m.resolve(username).await,
            None => Err(PepError::BadRequest("no subject lookup configured".into())),
        }
    }

    /// One decision for a single subscription.
    pub async fn decide_once(&self, subscription: &AuthorizationSubscription) -> Result<PdpResponse> {
        Ok(self.request(DecisionKind::Once, subscription.clone()).await)
    }

    /// Batch decisions for a multi subscription.
    pub async fn multi_decide(&self, subscription: &AuthorizationSubscription) -> Result<PdpResponse> {
        Ok(self.request(DecisionKind::Multi, subscription.clone()).await)
    }

    /// Live decision stream. Only single subscriptions are accepted.
    pub async fn decide(&self, subscription: &AuthorizationSubscription) -> Result<PdpResponse> {
        if !subscription.is_single() {
            return Err(PepError::BadRequest(
                "decide accepts single subscriptions only".into(),
            ));
        }
        Ok(self.request(DecisionKind::Stream, subscription.clone()).await)
    }

    fn url_for(&self, kind: DecisionKind) -> String {
        let endpoints = &self.inner.endpoints;
        let path = match kind {
            DecisionKind::Once => &endpoints.decide_once,
            DecisionKind::Stream => &endpoints.decide,
            DecisionKind::Multi => &endpoints.multi_decide,
        };
        format!("{}{}", self.inner.base_url, path)
    }

    // Boxed so retries can call it again from a spawned task.
    fn request(&self, kind: DecisionKind, subscription: AuthorizationSubscription) -> BoxFuture<'static, PdpResponse> {
        let pdp = self.clone();
        async move {
            let url = pdp.url_for(kind);
            match pdp.post(&url, &subscription).await {
                Ok(resp) => {
                    let status = resp.status();
                    if status != StatusCode::OK {
                        tracing::warn!(status = %status, %url, "PDP answered with a non-200 status");
                    }
                    let body: BodyStream = resp
                        .bytes_stream()
                        .map(|chunk| chunk.map_err(|e| PepError::Transport(e.to_string())))
                        .boxed();
                    if let Some(emitter) = pdp.open_backoff_stream() {
                        tracing::debug!(endpoint = kind.as_str(), "redirecting PDP answer into degraded stream");
                        emitter.emit_decision_stream(body);
                        return PdpResponse::Redirected;
                    }
                    PdpResponse::Body(body)
                }
                Err(e) => {
                    tracing::warn!(error = %e, %url, endpoint = kind.as_str(), "PDP unreachable");
                    let created = pdp.start_backoff_stream();
                    pdp.schedule_retry(kind, subscription);
                    match created {
                        Some(stream) => PdpResponse::Degraded(stream),
                        None => PdpResponse::Redirected,
                    }
                }
            }
        }
        .boxed()
    }

    async fn post(
        &self,
        url: &str,
        subscription: &AuthorizationSubscription,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut req = self
            .inner
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(subscription.as_string());
        if let Some(value) = authorization_header(&self.inner.auth) {
            req = req.header(AUTHORIZATION, value);
        }
        req.send().await
    }

    // The open degraded stream, if its consumer is still there.
    fn open_backoff_stream(&self) -> Option<BackoffEmitter> {
        let mut slot = self.inner.backoff_stream.lock().ok()?;
        if slot.as_ref().is_some_and(BackoffEmitter::is_closed) {
            *slot = None;
        }
        slot.clone()
    }

    // A new degraded stream, unless one is already open.
    fn start_backoff_stream(&self) -> Option<ExponentialBackoffStream> {
        let Ok(mut slot) = self.inner.backoff_stream.lock() else {
            return None;
        };
        if slot.as_ref().is_some_and(|e| !e.is_closed()) {
            return None;
        }
        let (emitter, stream) = backoff::channel();
        *slot = Some(emitter);
        Some(stream)
    }

    // Wait the current interval, double it, retry while within the limit.
    fn schedule_retry(&self, kind: DecisionKind, subscription: AuthorizationSubscription) {
        let pdp = self.clone();
        let wait = self.inner.backoff_ms.load(Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(wait)).await;
            let next = pdp.inner.backoff_ms.load(Ordering::SeqCst).saturating_mul(2);
            pdp.inner.backoff_ms.store(next, Ordering::SeqCst);
            if next > pdp.inner.max_backoff_ms {
                tracing::warn!(interval_ms = next, endpoint = kind.as_str(), "backoff limit reached, no more retries");
                return;
            }
            tracing::info!(interval_ms = next, endpoint = kind.as_str(), "retrying PDP request");
            pdp.request(kind, subscription).await;
        });
    }
}

impl fmt::Debug for RemotePdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePdp")
            .field("base_url", &self.inner.base_url)
            .field("backoff_ms", &self.backoff_interval_ms())
            .finish_non_exhaustive()
    }
}

/// Builder mirroring the config file sections.
#[derive(Default)]
pub struct RemotePdpBuilder {
    host: Option<String>,
    port: Option<u16>,
    auth: AuthConfig,
    endpoints: Option<EndpointConfig>,
    backoff: Option<BackoffConfig>,
    service: Option<Arc<ConstraintEnforcementService>>,
    authorization_manager: Option<String>,
    http: Option<reqwest::Client>,
}

impl RemotePdpBuilder {
    /// Scheme and host, e.g. `https://localhost`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth.bearer_token = Some(token.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.auth.api_key = Some(key.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth.basic = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn service(mut self, service: Arc<ConstraintEnforcementService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Subject lookup URL.
    pub fn authorization_manager(mut self, url: impl Into<String>) -> Self {
        self.authorization_manager = Some(url.into());
        self
    }

    /// Use a preconfigured HTTP client instead of the default one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<RemotePdp> {
        let host = self
            .host
            .ok_or_else(|| PepError::BadRequest("PDP host is required".into()))?;
        let host = host.trim_end_matches('/');
        let base_url = match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let backoff = self.backoff.unwrap_or_default();
        backoff.validate()?;
        let endpoints = self.endpoints.unwrap_or_default();
        endpoints.validate()?;

        // Self-signed certificates are accepted on HTTPS.
        let http = match self.http {
            Some(c) => c,
            None => reqwest::Client::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| PepError::Internal(format!("http client: {e}")))?,
        };

        let authorization_manager = self
            .authorization_manager
            .map(|url| AuthorizationManager::with_client(http.clone(), url));

        Ok(RemotePdp {
            inner: Arc::new(Inner {
                http,
                base_url,
                auth: self.auth,
                endpoints,
                max_backoff_ms: backoff.max_ms,
                backoff_ms: AtomicU64::new(backoff.initial_ms),
                backoff_stream: Mutex::new(None),
                service: self.service.unwrap_or_default(),
                authorization_manager,
            }),
        })
    }
}
