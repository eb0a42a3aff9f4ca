//! Bundle assembly: fail-closed obligations, ordering, built-ins.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use pepgate_core::constraints::provider::{
    filter_predicate, on_error_consumer, on_error_mapper, on_method_invocation, on_next_consumer,
    on_next_mapper, on_request, on_signal, on_subscribe,
};
use pepgate_core::{
    ConstraintEnforcementService, Decision, ErrorCode, MethodInvocation, PepError, Predicate,
    Signal,
};

fn decision(v: Value) -> Decision {
    Decision::from_value(v).unwrap()
}

fn all_entry_points(svc: &ConstraintEnforcementService, d: &Decision) -> [Result<(), PepError>; 3] {
    [
        svc.blocking_pre_enforce_bundle_for(d).map(|_| ()),
        svc.blocking_post_enforce_bundle_for(d).map(|_| ()),
        svc.reactive_type_bundle_for(d).map(|_| ()),
    ]
}

#[test]
fn decision_without_obligations_always_builds() {
    let svc = ConstraintEnforcementService::new();
    let d = decision(json!({"decision": "PERMIT"}));
    for r in all_entry_points(&svc, &d) {
        assert!(r.is_ok());
    }
}

#[test]
fn unknown_obligation_fails_closed_until_a_provider_claims_it() {
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "audit"}]}));

    let mut svc = ConstraintEnforcementService::new();
    for r in all_entry_points(&svc, &d) {
        let err = r.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnhandledObligations);
        assert!(err.to_string().starts_with("Unhandled obligations"));
    }

    svc.add_on_next_consumer(on_next_consumer("audit", |_: &Value| Ok(())));
    for r in all_entry_points(&svc, &d) {
        assert!(r.is_ok());
    }
}

#[test]
fn advice_never_fails_the_bundle() {
    let svc = ConstraintEnforcementService::new();
    let d = decision(json!({
        "decision": "PERMIT",
        "advice": [
            {"type": "nobodyHandlesThis"},
            {"type": "filterJsonContent", "actions": "not an array"}
        ]
    }));
    for r in all_entry_points(&svc, &d) {
        assert!(r.is_ok());
    }
}

#[test]
fn broken_obligation_handler_propagates() {
    let svc = ConstraintEnforcementService::new();
    let d = decision(json!({
        "decision": "PERMIT",
        "obligations": [{"type": "filterJsonContent", "actions": "not an array"}]
    }));
    let err = svc.blocking_pre_enforce_bundle_for(&d).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContentViolation);
}

#[test]
fn payload_unchanged_without_content_filter() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_next_consumer(on_next_consumer("log", |_: &Value| Ok(())));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "log"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let payload = json!({"id": 1, "items": [1, 2]});
    assert_eq!(bundle.handle_all_on_next_constraints(payload.clone()).unwrap(), payload);
}

#[test]
fn builtin_content_filter_obligation_transforms_payload() {
    let svc = ConstraintEnforcementService::new();
    let d = decision(json!({
        "decision": "PERMIT",
        "obligations": [{
            "type": "filterJsonContent",
            "actions": [{"type": "blacken", "path": "$.ssn", "discloseRight": 2}]
        }]
    }));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let out = bundle.handle_all_on_next_constraints(json!({"ssn": "123456"})).unwrap();
    assert_eq!(out, json!({"ssn": "████56"}));
}

#[test]
fn builtin_filter_predicate_drops_rows() {
    let svc = ConstraintEnforcementService::new();
    let d = decision(json!({
        "decision": "PERMIT",
        "obligations": [{
            "type": "jsonContentFilterPredicate",
            "conditions": [{"path": "owner", "type": "==", "value": "alice"}]
        }]
    }));
    let bundle = svc.reactive_type_bundle_for(&d).unwrap();
    let rows = json!([{"owner": "alice", "n": 1}, {"owner": "bob", "n": 2}]);
    assert_eq!(
        bundle.handle_all_on_next_constraints(rows).unwrap(),
        json!([{"owner": "alice", "n": 1}])
    );
}

#[test]
fn filtered_out_scalar_becomes_null() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_filter_predicate(filter_predicate(
        "positiveOnly",
        Predicate::new(|v: &Value| v.as_i64().is_some_and(|n| n > 0)),
    ));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "positiveOnly"}]}));
    let bundle = svc.blocking_post_enforce_bundle_for(&d).unwrap();
    assert_eq!(bundle.handle_all_on_next_constraints(json!(-3)).unwrap(), Value::Null);
    assert_eq!(bundle.handle_all_on_next_constraints(json!(3)).unwrap(), json!(3));
}

#[test]
fn mappers_run_by_priority_then_registration_order() {
    let mut svc = ConstraintEnforcementService::new();
    let append = |tag: &'static str| {
        move |v: Value| Ok::<_, PepError>(Value::String(format!("{}{tag}", v.as_str().unwrap_or_default())))
    };
    svc.add_on_next_mapper(on_next_mapper("m", 10, append("c")))
        .add_on_next_mapper(on_next_mapper("m", 0, append("a")))
        .add_on_next_mapper(on_next_mapper("m", 0, append("b")))
        .add_on_next_mapper(on_next_mapper("m", -5, append("0")));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "m"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    assert_eq!(bundle.handle_all_on_next_constraints(json!("")).unwrap(), json!("0abc"));
}

#[test]
fn filter_consume_map_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_next_consumer(on_next_consumer("t", move |v: &Value| {
        log.lock().unwrap().push(v.clone());
        Ok(())
    }))
    .add_on_next_mapper(on_next_mapper("t", 0, |v: Value| {
        Ok(json!(v.as_array().map_or(0, |a| a.len())))
    }))
    .add_filter_predicate(filter_predicate(
        "t",
        Predicate::new(|v: &Value| v != &json!(0)),
    ));

    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "t"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let out = bundle.handle_all_on_next_constraints(json!([1, 0, 2])).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!([1, 2])]);
    assert_eq!(out, json!(2));
}

#[test]
fn failing_consumer_denies_the_value() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_next_consumer(on_next_consumer("strict", |_: &Value| {
        Err(PepError::access_denied())
    }));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "strict"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let err = bundle.handle_all_on_next_constraints(json!(1)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AccessDenied);
}

#[test]
fn error_path_consumes_then_maps() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    let mut svc = ConstraintEnforcementService::new();
    svc.add_on_error_consumer(on_error_consumer("e", move |e: &PepError| {
        log.lock().unwrap().push(e.code());
    }))
    .add_on_error_mapper(on_error_mapper("e", 0, |_| PepError::access_denied()));

    let d = decision(json!({"decision": "PERMIT", "advice": [{"type": "e"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let out = bundle.handle_all_on_error_constraints(PepError::Upstream("boom".into()));

    assert_eq!(out.code(), ErrorCode::AccessDenied);
    assert_eq!(*seen.lock().unwrap(), vec![ErrorCode::Upstream]);
}

#[test]
fn method_invocation_only_in_pre_enforce() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_method_invocation(on_method_invocation("limit", |inv: &mut MethodInvocation| {
        inv.args[0] = json!(10);
        Ok(())
    }));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "limit"}]}));

    let pre = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    let mut inv = MethodInvocation::new("list", vec![json!(500)]);
    pre.handle_method_invocation_handlers(&mut inv).unwrap();
    assert_eq!(inv.args, vec![json!(10)]);

    let err = svc.blocking_post_enforce_bundle_for(&d).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnhandledObligations);
}

#[test]
fn reactive_signals_subscription_and_request() {
    let events = Arc::new(Mutex::new(Vec::<String>::new()));

    let mut svc = ConstraintEnforcementService::new();
    for signal in Signal::ALL {
        let log = events.clone();
        svc.add_runnable(on_signal("sig", signal, move || {
            log.lock().unwrap().push(signal.as_str().to_string());
            Ok(())
        }));
    }
    let log = events.clone();
    svc.add_subscription_handler(on_subscribe("sig", move || {
        log.lock().unwrap().push("subscribe".into());
        Ok(())
    }));
    let log = events.clone();
    svc.add_request_handler(on_request("sig", move |n: &u64| {
        log.lock().unwrap().push(format!("request {n}"));
        Ok(())
    }));

    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "sig"}]}));
    let bundle = svc.reactive_type_bundle_for(&d).unwrap();
    bundle.handle_on_subscribe_constraints().unwrap();
    bundle.handle_on_request_constraints(1).unwrap();
    bundle.handle_on_decision_signal_constraints().unwrap();
    bundle.handle_on_data_signal_constraints().unwrap();
    bundle.handle_on_end_signal_constraints().unwrap();
    bundle.handle_on_close_signal_constraints().unwrap();
    bundle.handle_on_pause_signal_constraints().unwrap();
    bundle.handle_on_resume_signal_constraints().unwrap();
    bundle.handle_on_readable_signal_constraints().unwrap();
    bundle.handle_on_error_signal_constraints().unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "subscribe", "request 1", "decision", "data", "end", "close", "pause", "resume",
            "readable", "error"
        ]
    );
}

#[test]
fn blocking_bundle_runs_only_decision_signal() {
    let count = Arc::new(Mutex::new(0));
    let c = count.clone();
    let mut svc = ConstraintEnforcementService::new();
    svc.add_runnable(on_signal("once", Signal::Decision, move || {
        *c.lock().unwrap() += 1;
        Ok(())
    }));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "once"}, {"type": "once"}]}));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    bundle.handle_on_decision_signal_constraints().unwrap();
    assert_eq!(*count.lock().unwrap(), 2);
}

#[test]
fn equal_priority_mappers_keep_collection_order() {
    let mut svc = ConstraintEnforcementService::new();
    let append = |tag: &'static str| {
        move |v: Value| Ok::<_, PepError>(Value::String(format!("{}{tag}", v.as_str().unwrap_or_default())))
    };
    // registered first, but claims the second obligation
    svc.add_on_next_mapper(on_next_mapper("second", 0, append("2")))
        .add_on_next_mapper(on_next_mapper("first", 0, append("1")));
    let d = decision(json!({
        "decision": "PERMIT",
        "obligations": [{"type": "first"}, {"type": "second"}]
    }));
    let bundle = svc.blocking_pre_enforce_bundle_for(&d).unwrap();
    assert_eq!(bundle.handle_all_on_next_constraints(json!("")).unwrap(), json!("12"));
}

#[test]
fn bundles_are_debug_printable() {
    let mut svc = ConstraintEnforcementService::new();
    svc.add_runnable(on_signal("audit", Signal::Close, || Ok(())));
    let d = decision(json!({"decision": "PERMIT", "obligations": [{"type": "audit"}]}));

    let blocking = svc.blocking_post_enforce_bundle_for(&d).unwrap();
    assert!(format!("{blocking:?}").starts_with("BlockingConstraintHandlerBundle"));

    let reactive = svc.reactive_type_bundle_for(&d).unwrap();
    assert!(format!("{reactive:?}").contains("\"close\""));
}
