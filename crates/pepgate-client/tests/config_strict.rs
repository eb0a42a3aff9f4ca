#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use pepgate_client::config;
use pepgate_core::ErrorCode;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
pdp:
  url: "http://localhost:8080"
  auth:
    bearer_tokn: "abc" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
pdp:
  url: "http://localhost:8080"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.pdp.endpoints.decide_once, "/api/pdp/decide-once");
    assert_eq!(cfg.pdp.endpoints.decide, "/api/pdp/decide");
    assert_eq!(cfg.pdp.endpoints.multi_decide, "/api/pdp/multi-decide");
    assert_eq!(cfg.pdp.backoff.initial_ms, 2000);
    assert_eq!(cfg.pdp.backoff.max_ms, 50000);
    assert!(cfg.watch.is_none());
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
pdp:
  url: "https://pdp.example:8443"
  auth:
    api_key: "sapl_key"
    basic: { username: "svc", password: "pw" }
  endpoints:
    multi_decide: "/api/pdp/multi-decide-all"
  backoff: { initial_ms: 500, max_ms: 4000 }
  subject_lookup_url: "http://users.example/roles"
watch:
  subject: "alice"
  action: "read"
  resource: { "type": "report", "id": 7 }
"#;
    let cfg = config::load_from_str(ok).unwrap();
    assert_eq!(cfg.pdp.auth.api_key.as_deref(), Some("sapl_key"));
    assert_eq!(cfg.pdp.auth.basic.as_ref().unwrap().username, "svc");
    assert_eq!(cfg.pdp.endpoints.multi_decide, "/api/pdp/multi-decide-all");
    assert_eq!(cfg.pdp.endpoints.decide, "/api/pdp/decide");
    let watch = cfg.watch.unwrap();
    assert_eq!(watch.resource, json!({"type": "report", "id": 7}));
    assert!(watch.environment.is_none());
}

#[test]
fn rejects_unsupported_version() {
    let bad = r#"
version: 2
pdp:
  url: "http://localhost:8080"
"#;
    let err = config::load_from_str(bad).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedVersion);
}

#[test]
fn rejects_invalid_values() {
    for bad in [
        "version: 1\npdp:\n  url: \"localhost:8080\"\n",
        "version: 1\npdp:\n  url: \"http://x\"\n  endpoints: { decide: \"api/pdp/decide\" }\n",
        "version: 1\npdp:\n  url: \"http://x\"\n  backoff: { initial_ms: 0 }\n",
        "version: 1\npdp:\n  url: \"http://x\"\n  backoff: { initial_ms: 5000, max_ms: 100 }\n",
        "version: 1\n",
    ] {
        let err = config::load_from_str(bad).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest, "{bad}");
    }
}
