//! Decision-driven stream gates.
//!
//! A [`DecisionGate`] holds the latest decision's verdict and reactive
//! bundle. Streams wrapped by the gate consult it on every item, so a new
//! decision takes effect on the next item without restarting the stream.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{ready, Context, Poll};

use futures_util::stream::{Stream, StreamExt};
use pin_project_lite::pin_project;
use serde_json::Value;

use pepgate_core::error::{PepError, Result};
use pepgate_core::{ConstraintEnforcementService, Decision, ReactiveConstraintHandlerBundle, Signal};

/// What a gated stream does with items that arrive while access is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatePolicy {
    /// Run the error path, emit the access-denied error, end the stream.
    KillIfDenied,
    /// Run the error path, emit nothing, keep going.
    HandleAccessDenied,
    /// Silently drop the item.
    #[default]
    DropWhileDenied,
}

pub struct DecisionGate {
    policy: GatePolicy,
    data_allowed: AtomicBool,
    bundle: RwLock<Option<Arc<ReactiveConstraintHandlerBundle>>>,
}

impl fmt::Debug for DecisionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionGate")
            .field("policy", &self.policy)
            .field("data_allowed", &self.is_allowed())
            .finish_non_exhaustive()
    }
}

impl DecisionGate {
    /// Closed until the first PERMIT arrives.
    pub fn new(policy: GatePolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            data_allowed: AtomicBool::new(false),
            bundle: RwLock::new(None),
        })
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    pub fn is_allowed(&self) -> bool {
        self.data_allowed.load(Ordering::SeqCst)
    }

    /// Bundle of the latest applied decision.
    pub fn bundle(&self) -> Option<Arc<ReactiveConstraintHandlerBundle>> {
        self.bundle.read().ok().and_then(|b| b.clone())
    }

    fn set_bundle(&self, bundle: Option<Arc<ReactiveConstraintHandlerBundle>>) -> bool {
        match self.bundle.write() {
            Ok(mut slot) => {
                *slot = bundle;
                true
            }
            Err(_) => false,
        }
    }

    fn deny(&self) {
        self.data_allowed.store(false, Ordering::SeqCst);
    }

    /// Switch the gate to `decision`. Returns whether data now flows.
    ///
    /// Any failure leaves the gate closed: an unhandled obligation also
    /// drops the previous bundle, a failing signal handler keeps the new one
    /// so its error path still runs.
    pub fn apply_decision(
        &self,
        service: &ConstraintEnforcementService,
        decision: &Decision,
    ) -> Result<bool> {
        let was_allowed = self.is_allowed();
        let bundle = match service.reactive_type_bundle_for(decision) {
            Ok(b) => Arc::new(b),
            Err(e) => {
                self.deny();
                self.set_bundle(None);
                tracing::warn!(code = e.code().as_str(), error = %e, "decision rejected, gate closed");
                return Err(e);
            }
        };

        if !self.set_bundle(Some(Arc::clone(&bundle))) {
            self.deny();
            return Err(PepError::Internal("gate state poisoned".into()));
        }

        let signals = bundle
            .handle_on_data_signal_constraints()
            .and_then(|()| bundle.handle_on_decision_signal_constraints());
        if let Err(e) = signals {
            self.deny();
            tracing::warn!(code = e.code().as_str(), error = %e, "decision handler failed, gate closed");
            return Err(e);
        }

        let allowed = decision.is_permit();
        self.data_allowed.store(allowed, Ordering::SeqCst);
        tracing::debug!(decision = decision.status().as_str(), allowed, "gate updated");

        let transition = match (was_allowed, allowed) {
            (true, false) => Some(Signal::Pause),
            (false, true) => Some(Signal::Resume),
            _ => None,
        };
        if let Some(signal) = transition {
            if let Err(e) = bundle.handle_signal(signal) {
                tracing::warn!(signal = signal.as_str(), error = %e, "signal handler failed");
            }
        }
        Ok(allowed)
    }

    /// Apply every decision of `decisions` until the stream ends.
    pub async fn follow<S>(&self, service: &ConstraintEnforcementService, decisions: S)
    where
        S: Stream<Item = Decision>,
    {
        let mut decisions = std::pin::pin!(decisions);
        while let Some(decision) = decisions.next().await {
            // failures already closed the gate and were logged
            let _ = self.apply_decision(service, &decision);
        }
        tracing::debug!("decision stream ended");
    }

    /// Gate `upstream` on this gate's current decision.
    pub fn wrap<S>(self: &Arc<Self>, upstream: S) -> EnforcedStream<S>
    where
        S: Stream<Item = Result<Value>>,
    {
        EnforcedStream {
            upstream,
            gate: Arc::clone(self),
            subscribed: false,
            subscribe_handled: false,
            demanded: false,
            terminated: false,
        }
    }
}

pin_project! {
    /// Stream returned by [`DecisionGate::wrap`].
    pub struct EnforcedStream<S> {
        #[pin]
        upstream: S,
        gate: Arc<DecisionGate>,
        subscribed: bool,
        subscribe_handled: bool,
        demanded: bool,
        terminated: bool,
    }

    impl<S> PinnedDrop for EnforcedStream<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if *this.subscribed {
                fire(this.gate, Signal::Close);
            }
        }
    }
}

fn fire(gate: &DecisionGate, signal: Signal) {
    if let Some(bundle) = gate.bundle() {
        if let Err(e) = bundle.handle_signal(signal) {
            tracing::warn!(signal = signal.as_str(), error = %e, "signal handler failed");
        }
    }
}

fn error_path(bundle: Option<&ReactiveConstraintHandlerBundle>, error: PepError) -> PepError {
    match bundle {
        Some(b) => b.handle_all_on_error_constraints(error),
        None => error,
    }
}

impl<S> Stream for EnforcedStream<S>
where
    S: Stream<Item = Result<Value>>,
{
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.terminated {
            return Poll::Ready(None);
        }

        *this.subscribed = true;

        loop {
            // Subscription and demand handlers wait for the first bundle, so
            // a stream polled before any decision still gets them.
            if let Some(bundle) = this.gate.bundle() {
                let mut started = Ok(());
                if !*this.subscribe_handled {
                    *this.subscribe_handled = true;
                    started = bundle.handle_on_subscribe_constraints();
                }
                if started.is_ok() && !*this.demanded {
                    *this.demanded = true;
                    started = bundle.handle_on_request_constraints(1);
                }
                if let Err(e) = started {
                    *this.terminated = true;
                    return Poll::Ready(Some(Err(bundle.handle_all_on_error_constraints(e))));
                }
            }

            let item = ready!(this.upstream.as_mut().poll_next(cx));
            *this.demanded = false;
            let bundle = this.gate.bundle();

            let value = match item {
                None => {
                    *this.terminated = true;
                    fire(this.gate, Signal::End);
                    return Poll::Ready(None);
                }
                Some(Err(e)) => {
                    fire(this.gate, Signal::Error);
                    return Poll::Ready(Some(Err(error_path(bundle.as_deref(), e))));
                }
                Some(Ok(v)) => v,
            };

            if this.gate.is_allowed() {
                if let Some(b) = &bundle {
                    let out = b
                        .handle_all_on_next_constraints(value)
                        .map_err(|e| b.handle_all_on_error_constraints(e));
                    return Poll::Ready(Some(out));
                }
            }

            match this.gate.policy {
                GatePolicy::DropWhileDenied => {}
                GatePolicy::HandleAccessDenied => {
                    let _ = error_path(bundle.as_deref(), PepError::access_denied());
                }
                GatePolicy::KillIfDenied => {
                    *this.terminated = true;
                    let e = error_path(bundle.as_deref(), PepError::access_denied());
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
