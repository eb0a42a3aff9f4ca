//! pep-watch: follow one subscription's decisions and log them.
//!
//! Reads `pepgate.yaml` (or the path given as the first argument) and
//! subscribes to the streaming endpoint with the `watch` section.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing_subscriber::{fmt, EnvFilter};

use pepgate_client::config;
use pepgate_client::RemotePdp;
use pepgate_core::error::{PepError, Result};
use pepgate_core::{AuthorizationSubscription, ConstraintEnforcementService};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "pepgate.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let watch = cfg
        .watch
        .ok_or_else(|| PepError::BadRequest(format!("{path}: no watch section")))?;

    let pdp = RemotePdp::from_config(&cfg.pdp, Arc::new(ConstraintEnforcementService::new()))?;

    let mut subject = watch.subject;
    if pdp.authorization_manager().is_some() {
        if let Some(name) = subject.as_str().map(str::to_owned) {
            subject = pdp.resolve_subject(&name).await?.to_json();
        }
    }

    let mut subscription = AuthorizationSubscription::single(subject, watch.action, watch.resource);
    if let Some(env) = watch.environment {
        subscription = subscription.with_environment(env);
    }

    tracing::info!(pdp = pdp.base_url(), subscription = %subscription.as_string(), "pep-watch starting");
    let response = pdp.decide(&subscription).await?;
    if response.is_degraded() {
        tracing::warn!("PDP unreachable, waiting for retries");
    }

    let mut decisions = response.into_decisions();
    while let Some(decision) = decisions.next().await {
        tracing::info!(
            decision = decision.status().as_str(),
            obligations = decision.obligations().len(),
            advice = decision.advice().len(),
            "decision"
        );
    }
    tracing::info!("decision stream ended");
    Ok(())
}
