//! Stream gates under changing decisions.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};

use pepgate_client::{DecisionGate, GatePolicy};
use pepgate_core::constraints::provider::{on_error_consumer, on_request, on_signal, on_subscribe};
use pepgate_core::{ConstraintEnforcementService, Decision, ErrorCode, PepError, Result, Signal};

fn decision(v: Value) -> Decision {
    Decision::from_value(v).unwrap()
}

fn items(values: &[i64]) -> Vec<Result<Value>> {
    values.iter().map(|v| Ok(json!(v))).collect()
}

#[tokio::test]
async fn closed_gate_drops_items_by_default() {
    let svc = ConstraintEnforcementService::new();
    let gate = DecisionGate::new(GatePolicy::default());
    assert!(!gate.is_allowed());

    let out: Vec<_> = gate.wrap(stream::iter(items(&[1, 2]))).collect().await;
    assert!(out.is_empty());

    assert!(gate.apply_decision(&svc, &decision(json!({"decision": "PERMIT"}))).unwrap());
    let out: Vec<_> = gate.wrap(stream::iter(items(&[1, 2]))).collect().await;
    let out: Vec<Value> = out.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(out, vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn kill_policy_emits_access_denied_and_ends() {
    let svc = ConstraintEnforcementService::new();
    let gate = DecisionGate::new(GatePolicy::KillIfDenied);
    gate.apply_decision(&svc, &decision(json!({"decision": "DENY"}))).unwrap();

    let out: Vec<_> = gate.wrap(stream::iter(items(&[1, 2, 3]))).collect().await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].as_ref().unwrap_err().code(), ErrorCode::AccessDenied);
}

#[tokio::test]
async fn handle_policy_runs_error_path_without_emitting() {
    let seen = Arc::new(Mutex::new(Vec::<ErrorCode>::new()));
    let sink = Arc::clone(&seen);
    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_error_consumer(on_error_consumer("audit", move |e: &PepError| {
        sink.lock().unwrap().push(e.code());
    }));

    let gate = DecisionGate::new(GatePolicy::HandleAccessDenied);
    let deny = decision(json!({"decision": "DENY", "obligations": [{"type": "audit"}]}));
    assert!(!gate.apply_decision(&svc, &deny).unwrap());

    let out: Vec<_> = gate.wrap(stream::iter(items(&[1, 2]))).collect().await;
    assert!(out.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![ErrorCode::AccessDenied; 2]);
}

#[tokio::test]
async fn content_filter_obligation_applies_to_items() {
    let svc = ConstraintEnforcementService::new();
    let gate = DecisionGate::new(GatePolicy::default());
    let permit = decision(json!({
        "decision": "PERMIT",
        "obligations": [{
            "type": "filterJsonContent",
            "actions": [{"type": "blacken", "path": "$.pin", "discloseLeft": 1}]
        }]
    }));
    gate.apply_decision(&svc, &permit).unwrap();

    let upstream = stream::iter(vec![Ok(json!({"user": "ann", "pin": "4321"}))]);
    let out: Vec<_> = gate.wrap(upstream).collect().await;
    assert_eq!(out[0].as_ref().unwrap(), &json!({"user": "ann", "pin": "4███"}));
}

#[tokio::test]
async fn unhandled_obligation_closes_the_gate() {
    let svc = ConstraintEnforcementService::new();
    let gate = DecisionGate::new(GatePolicy::default());
    gate.apply_decision(&svc, &decision(json!({"decision": "PERMIT"}))).unwrap();
    assert!(gate.is_allowed());

    let err = gate
        .apply_decision(
            &svc,
            &decision(json!({"decision": "PERMIT", "obligations": [{"type": "unknown"}]})),
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnhandledObligations);
    assert!(!gate.is_allowed());
    assert!(gate.bundle().is_none());
}

#[tokio::test]
async fn follow_applies_each_decision_in_turn() {
    let svc = ConstraintEnforcementService::new();
    let gate = DecisionGate::new(GatePolicy::default());
    let decisions = stream::iter(vec![
        decision(json!({"decision": "DENY"})),
        decision(json!({"decision": "PERMIT"})),
    ]);
    gate.follow(&svc, decisions).await;
    assert!(gate.is_allowed());
}

#[tokio::test]
async fn lifecycle_signals_fire_in_order() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut svc = ConstraintEnforcementService::new();
    for signal in [Signal::Data, Signal::Decision, Signal::Resume, Signal::Pause, Signal::End, Signal::Close] {
        let sink = Arc::clone(&log);
        svc.add_runnable(on_signal("trace", signal, move || {
            sink.lock().unwrap().push(signal.as_str().to_owned());
            Ok(())
        }));
    }
    let sink = Arc::clone(&log);
    svc.add_subscription_handler(on_subscribe("trace", move || {
        sink.lock().unwrap().push("subscribe".into());
        Ok(())
    }));
    let sink = Arc::clone(&log);
    svc.add_request_handler(on_request("trace", move |n: &u64| {
        sink.lock().unwrap().push(format!("request {n}"));
        Ok(())
    }));

    let permit = decision(json!({"decision": "PERMIT", "obligations": [{"type": "trace"}]}));
    let gate = DecisionGate::new(GatePolicy::default());
    gate.apply_decision(&svc, &permit).unwrap();

    {
        let out: Vec<_> = gate.wrap(stream::iter(items(&[7]))).collect().await;
        assert_eq!(out.len(), 1);
    }

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "data",
            "decision",
            "resume",
            "subscribe",
            "request 1",
            "request 1",
            "end",
            "close",
        ]
    );

    log.lock().unwrap().clear();
    let deny = decision(json!({"decision": "DENY", "obligations": [{"type": "trace"}]}));
    gate.apply_decision(&svc, &deny).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["data", "decision", "pause"]);
}

#[tokio::test]
async fn upstream_error_passes_error_path_and_propagates() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_error_mapper(pepgate_core::constraints::provider::on_error_mapper(
        "mask",
        0,
        |_| PepError::Upstream("masked".into()),
    ));
    let gate = DecisionGate::new(GatePolicy::default());
    gate.apply_decision(
        &svc,
        &decision(json!({"decision": "PERMIT", "obligations": [{"type": "mask"}]})),
    )
    .unwrap();

    let upstream = stream::iter(vec![Err(PepError::Internal("db down".into())), Ok(json!(1))]);
    let out: Vec<_> = gate.wrap(upstream).collect().await;
    assert_eq!(out[0].as_ref().unwrap_err(), &PepError::Upstream("masked".into()));
    assert_eq!(out[1].as_ref().unwrap(), &json!(1));
}

#[tokio::test]
async fn stream_polled_before_any_decision_still_runs_subscribe_handlers() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut svc = ConstraintEnforcementService::new();
    let sink = Arc::clone(&log);
    svc.add_subscription_handler(on_subscribe("trace", move || {
        sink.lock().unwrap().push("subscribe".into());
        Ok(())
    }));
    let sink = Arc::clone(&log);
    svc.add_request_handler(on_request("trace", move |n: &u64| {
        sink.lock().unwrap().push(format!("request {n}"));
        Ok(())
    }));

    let gate = DecisionGate::new(GatePolicy::default());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Result<Value>>();
    let mut gated = Box::pin(gate.wrap(stream::poll_fn(move |cx| rx.poll_recv(cx))));

    tx.send(Ok(json!(1))).unwrap();
    assert!(futures_util::poll!(gated.next()).is_pending());
    assert!(log.lock().unwrap().is_empty());

    let permit = decision(json!({"decision": "PERMIT", "obligations": [{"type": "trace"}]}));
    gate.apply_decision(&svc, &permit).unwrap();
    tx.send(Ok(json!(2))).unwrap();
    assert_eq!(gated.next().await.unwrap().unwrap(), json!(2));
    assert_eq!(*log.lock().unwrap(), vec!["subscribe", "request 1"]);
}

#[test]
fn gate_debug_shows_policy_and_verdict() {
    let gate = DecisionGate::new(GatePolicy::KillIfDenied);
    let shown = format!("{gate:?}");
    assert!(shown.contains("KillIfDenied"), "{shown}");
    assert!(shown.contains("data_allowed: false"), "{shown}");
}
