//! Enforcement around a single async call.

use std::future::Future;

use serde_json::Value;

use pepgate_core::error::{PepError, Result};
use pepgate_core::{AuthorizationSubscription, MethodInvocation};

use crate::pdp::RemotePdp;

/// Decide before `operation` runs.
///
/// The call only happens on PERMIT, after method invocation handlers had
/// their chance to rewrite `invocation`. Its result passes the onNext
/// pipeline; every failure passes the error path.
pub async fn pre_enforce<F, Fut>(
    pdp: &RemotePdp,
    subscription: &AuthorizationSubscription,
    mut invocation: MethodInvocation,
    operation: F,
) -> Result<Value>
where
    F: FnOnce(MethodInvocation) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let decision = pdp.decide_once(subscription).await?.first_decision().await;
    let bundle = pdp
        .constraint_enforcement_service()
        .blocking_pre_enforce_bundle_for(&decision)?;

    let admitted = bundle
        .handle_on_decision_signal_constraints()
        .and_then(|()| {
            if decision.is_permit() {
                Ok(())
            } else {
                Err(PepError::access_denied())
            }
        })
        .and_then(|()| bundle.handle_method_invocation_handlers(&mut invocation));
    if let Err(e) = admitted {
        tracing::debug!(decision = decision.status().as_str(), method = %invocation.name, "pre-enforce denied");
        return Err(bundle.handle_all_on_error_constraints(e));
    }

    match operation(invocation).await {
        Ok(value) => bundle
            .handle_all_on_next_constraints(value)
            .map_err(|e| bundle.handle_all_on_error_constraints(e)),
        Err(e) => Err(bundle.handle_all_on_error_constraints(e)),
    }
}

/// Run `operation`, then decide whether its result may leave.
pub async fn post_enforce<F, Fut>(
    pdp: &RemotePdp,
    subscription: &AuthorizationSubscription,
    operation: F,
) -> Result<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let outcome = operation().await;

    let decision = pdp.decide_once(subscription).await?.first_decision().await;
    let bundle = pdp
        .constraint_enforcement_service()
        .blocking_post_enforce_bundle_for(&decision)?;

    if let Err(e) = bundle.handle_on_decision_signal_constraints() {
        return Err(bundle.handle_all_on_error_constraints(e));
    }
    if !decision.is_permit() {
        tracing::debug!(decision = decision.status().as_str(), "post-enforce denied");
        return Err(bundle.handle_all_on_error_constraints(PepError::access_denied()));
    }

    match outcome {
        Ok(value) => bundle
            .handle_all_on_next_constraints(value)
            .map_err(|e| bundle.handle_all_on_error_constraints(e)),
        Err(e) => Err(bundle.handle_all_on_error_constraints(e)),
    }
}
