use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::constraint::Constraint;
use crate::decision::Decision;
use crate::error::{PepError, Result};
use crate::filter::{ContentFilterPredicateProvider, ContentFilteringProvider};
use crate::predicate::Predicate;

use super::bundle::{BlockingConstraintHandlerBundle, Pipeline, ReactiveConstraintHandlerBundle};
use super::handler::{
    consume_all, consume_error_all, map_all, map_error_all, method_invocation_all, run_all,
    Runnable,
};
use super::provider::{
    ConsumerConstraintHandlerProvider, ErrorHandlerProvider, ErrorMappingConstraintHandlerProvider,
    FilterPredicateConstraintHandlerProvider, MappingConstraintHandlerProvider,
    MethodInvocationConstraintHandlerProvider, RequestHandlerProvider, Responsible,
    RunnableConstraintHandlerProvider, Signal, SubscriptionHandlerProvider,
};

/// Registry of constraint handler providers.
///
/// Register providers up front (`add_*` takes `&mut self`), then share the
/// service behind an `Arc`. Every `*_bundle_for` call works on its own copy
/// of the provider lists, so concurrent enforcement is safe.
///
/// Fail-closed: if any obligation of the decision is claimed by no provider,
/// bundle construction fails with [`PepError::UnhandledObligations`]. Advice
/// is best effort.
#[derive(Default, Clone)]
pub struct ConstraintEnforcementService {
    runnables: Vec<Arc<dyn RunnableConstraintHandlerProvider>>,
    method_invocations: Vec<Arc<dyn MethodInvocationConstraintHandlerProvider>>,
    on_next: Vec<Arc<dyn ConsumerConstraintHandlerProvider>>,
    map_next: Vec<Arc<dyn MappingConstraintHandlerProvider>>,
    on_error: Vec<Arc<dyn ErrorHandlerProvider>>,
    map_error: Vec<Arc<dyn ErrorMappingConstraintHandlerProvider>>,
    filters: Vec<Arc<dyn FilterPredicateConstraintHandlerProvider>>,
    subscriptions: Vec<Arc<dyn SubscriptionHandlerProvider>>,
    requests: Vec<Arc<dyn RequestHandlerProvider>>,
}

impl ConstraintEnforcementService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_runnable(&mut self, p: Arc<dyn RunnableConstraintHandlerProvider>) -> &mut Self {
        self.runnables.push(p);
        self
    }

    pub fn add_method_invocation(
        &mut self,
        p: Arc<dyn MethodInvocationConstraintHandlerProvider>,
    ) -> &mut Self {
        self.method_invocations.push(p);
        self
    }

    pub fn add_on_next_consumer(&mut self, p: Arc<dyn ConsumerConstraintHandlerProvider>) -> &mut Self {
        self.on_next.push(p);
        self
    }

    pub fn add_on_next_mapper(&mut self, p: Arc<dyn MappingConstraintHandlerProvider>) -> &mut Self {
        self.map_next.push(p);
        self
    }

    pub fn add_on_error_consumer(&mut self, p: Arc<dyn ErrorHandlerProvider>) -> &mut Self {
        self.on_error.push(p);
        self
    }

    pub fn add_on_error_mapper(
        &mut self,
        p: Arc<dyn ErrorMappingConstraintHandlerProvider>,
    ) -> &mut Self {
        self.map_error.push(p);
        self
    }

    pub fn add_filter_predicate(
        &mut self,
        p: Arc<dyn FilterPredicateConstraintHandlerProvider>,
    ) -> &mut Self {
        self.filters.push(p);
        self
    }

    pub fn add_subscription_handler(&mut self, p: Arc<dyn SubscriptionHandlerProvider>) -> &mut Self {
        self.subscriptions.push(p);
        self
    }

    pub fn add_request_handler(&mut self, p: Arc<dyn RequestHandlerProvider>) -> &mut Self {
        self.requests.push(p);
        self
    }

    /// Bundle for enforcement before the protected call runs.
    pub fn blocking_pre_enforce_bundle_for(
        &self,
        decision: &Decision,
    ) -> Result<BlockingConstraintHandlerBundle> {
        let mut asm = Assembly::new(decision);
        let (pipeline, _) = self.pipeline(&mut asm, true)?;
        asm.finish()?;
        Ok(BlockingConstraintHandlerBundle::new(pipeline))
    }

    /// Bundle for enforcement on the result of a call that already ran.
    ///
    /// Method invocation providers are not consulted: an obligation only
    /// they could satisfy is unhandled here.
    pub fn blocking_post_enforce_bundle_for(
        &self,
        decision: &Decision,
    ) -> Result<BlockingConstraintHandlerBundle> {
        let mut asm = Assembly::new(decision);
        let (pipeline, _) = self.pipeline(&mut asm, false)?;
        asm.finish()?;
        Ok(BlockingConstraintHandlerBundle::new(pipeline))
    }

    /// Bundle for an enforced stream, with per-signal runnables.
    pub fn reactive_type_bundle_for(
        &self,
        decision: &Decision,
    ) -> Result<ReactiveConstraintHandlerBundle> {
        let mut asm = Assembly::new(decision);
        let (pipeline, signals) = self.pipeline(&mut asm, true)?;

        let on_subscribe = run_all(strip(asm.matched(&self.subscriptions, |p, c| p.get_handler(c))?));
        let on_request = consume_all(strip(asm.matched(&self.requests, |p, c| p.get_handler(c))?));

        asm.finish()?;
        Ok(ReactiveConstraintHandlerBundle::new(
            pipeline,
            signals,
            on_subscribe,
            on_request,
        ))
    }

    // Categories shared by every bundle. Runnables for signals other than
    // `Decision` are returned separately; only reactive bundles use them.
    fn pipeline(
        &self,
        asm: &mut Assembly<'_>,
        with_invocation: bool,
    ) -> Result<(Pipeline, HashMap<Signal, Runnable>)> {
        let mut by_signal: HashMap<Signal, Vec<Runnable>> = HashMap::new();
        for (_, (signal, run)) in
            asm.matched(&self.runnables, |p, c| Ok((p.signal(), p.get_handler(c)?)))?
        {
            by_signal.entry(signal).or_default().push(run);
        }
        let on_decision = run_all(by_signal.remove(&Signal::Decision).unwrap_or_default());
        let signals = by_signal
            .into_iter()
            .map(|(signal, runs)| (signal, run_all(runs)))
            .collect();

        let method_invocation = if with_invocation {
            method_invocation_all(strip(
                asm.matched(&self.method_invocations, |p, c| p.get_handler(c))?,
            ))
        } else {
            method_invocation_all(Vec::new())
        };

        let on_next = consume_all(strip(asm.matched(&self.on_next, |p, c| p.get_handler(c))?));

        let builtin_mapper: Arc<dyn MappingConstraintHandlerProvider> =
            Arc::new(ContentFilteringProvider);
        let map_next_providers = with_builtin(&self.map_next, builtin_mapper);
        let map_next = map_all(by_priority(asm.matched(&map_next_providers, |p, c| {
            Ok((p.priority(), p.get_handler(c)?))
        })?));

        let on_error = consume_error_all(strip(asm.matched(&self.on_error, |p, c| p.get_handler(c))?));

        let map_error = map_error_all(by_priority(asm.matched(&self.map_error, |p, c| {
            Ok((p.priority(), p.get_handler(c)?))
        })?));

        let builtin_filter: Arc<dyn FilterPredicateConstraintHandlerProvider> =
            Arc::new(ContentFilterPredicateProvider);
        let filter_providers = with_builtin(&self.filters, builtin_filter);
        let filter = strip(asm.matched(&filter_providers, |p, c| p.get_handler(c))?)
            .iter()
            .fold(Predicate::always(), |acc, p| acc.and(p));

        let pipeline = Pipeline {
            on_decision,
            method_invocation,
            on_next,
            map_next,
            on_error,
            map_error,
            filter,
        };
        Ok((pipeline, signals))
    }
}

/// Working copy: registered providers followed by the built-in one.
fn with_builtin<P: ?Sized>(registered: &[Arc<P>], builtin: Arc<P>) -> Vec<Arc<P>> {
    registered.iter().cloned().chain(std::iter::once(builtin)).collect()
}

fn strip<H>(matched: Vec<(usize, H)>) -> Vec<H> {
    matched.into_iter().map(|(_, h)| h).collect()
}

// Stable: equal priorities keep the order the handlers were collected in.
fn by_priority<H>(matched: Vec<(usize, (i32, H))>) -> Vec<H> {
    let mut matched = matched;
    matched.sort_by_key(|(_, (priority, _))| *priority);
    matched.into_iter().map(|(_, (_, h))| h).collect()
}

/// Obligation tracking for one bundle construction.
struct Assembly<'d> {
    obligations: &'d [Constraint],
    advice: &'d [Constraint],
    handled: Vec<bool>,
}

impl<'d> Assembly<'d> {
    fn new(decision: &'d Decision) -> Self {
        Self {
            obligations: decision.obligations(),
            advice: decision.advice(),
            handled: vec![false; decision.obligations().len()],
        }
    }

    /// Handlers from every responsible provider, obligations first, tagged
    /// with the provider's index. Obligation failures propagate; advice
    /// failures are logged and skipped.
    fn matched<P, H>(
        &mut self,
        providers: &[Arc<P>],
        make: impl Fn(&P, &Constraint) -> Result<H>,
    ) -> Result<Vec<(usize, H)>>
    where
        P: Responsible + ?Sized,
    {
        let mut out = Vec::new();
        let obligations = self.obligations;
        for (i, constraint) in obligations.iter().enumerate() {
            for (idx, provider) in providers.iter().enumerate() {
                if provider.is_responsible(constraint) {
                    self.handled[i] = true;
                    out.push((idx, make(provider.as_ref(), constraint)?));
                }
            }
        }
        for constraint in self.advice {
            for (idx, provider) in providers.iter().enumerate() {
                if !provider.is_responsible(constraint) {
                    continue;
                }
                match make(provider.as_ref(), constraint) {
                    Ok(h) => out.push((idx, h)),
                    Err(e) => tracing::warn!(
                        code = e.code().as_str(),
                        constraint = %constraint.as_value(),
                        error = %e,
                        "advice handler could not be built; skipped"
                    ),
                }
            }
        }
        Ok(out)
    }

    fn finish(self) -> Result<()> {
        let unhandled = self.handled.iter().filter(|h| !**h).count();
        if unhandled > 0 {
            let types: Vec<Value> = self
                .obligations
                .iter()
                .zip(&self.handled)
                .filter(|(_, h)| !**h)
                .map(|(c, _)| c.as_value().clone())
                .collect();
            let types = Value::Array(types);
            tracing::warn!(unhandled, obligations = %types, "unhandled obligations");
            return Err(PepError::UnhandledObligations(unhandled));
        }
        Ok(())
    }
}
