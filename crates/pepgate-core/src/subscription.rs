//! Authorization subscription (request body sent to the PDP).

use serde_json::{json, Map, Value};

/// Single or multi subscription.
///
/// A single subscription asks for one decision. A multi subscription lists
/// subjects, actions and resources and indexes them in
/// `authorizationSubscriptions` (`id-1`, `id-2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationSubscription {
    Single {
        subject: Value,
        action: Value,
        resource: Value,
        environment: Option<Value>,
    },
    Multi {
        subjects: Vec<Value>,
        actions: Vec<Value>,
        resources: Vec<Value>,
    },
}

impl AuthorizationSubscription {
    pub fn single(
        subject: impl Into<Value>,
        action: impl Into<Value>,
        resource: impl Into<Value>,
    ) -> Self {
        AuthorizationSubscription::Single {
            subject: subject.into(),
            action: action.into(),
            resource: resource.into(),
            environment: None,
        }
    }

    /// Build from arbitrary values: any JSON array turns the whole
    /// subscription into a multi subscription, scalars joining as one entry.
    pub fn from_parts(subject: Value, action: Value, resource: Value) -> Self {
        let any_array = subject.is_array() || action.is_array() || resource.is_array();
        if !any_array {
            return AuthorizationSubscription::Single {
                subject,
                action,
                resource,
                environment: None,
            };
        }
        AuthorizationSubscription::Multi {
            subjects: into_list(subject),
            actions: into_list(action),
            resources: into_list(resource),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, env: Value) -> Self {
        if let AuthorizationSubscription::Single { environment, .. } = &mut self {
            *environment = Some(env);
        }
        self
    }

    pub fn is_single(&self) -> bool {
        matches!(self, AuthorizationSubscription::Single { .. })
    }

    /// Wire representation.
    pub fn to_json(&self) -> Value {
        match self {
            AuthorizationSubscription::Single {
                subject,
                action,
                resource,
                environment,
            } => {
                let mut v = json!({
                    "subject": subject,
                    "action": action,
                    "resource": resource,
                });
                if let (Some(env), Some(obj)) = (environment, v.as_object_mut()) {
                    obj.insert("environment".into(), env.clone());
                }
                v
            }
            AuthorizationSubscription::Multi {
                subjects,
                actions,
                resources,
            } => json!({
                "subjects": subjects,
                "actions": actions,
                "resources": resources,
                "authorizationSubscriptions": index_entries(subjects.len(), actions.len(), resources.len()),
            }),
        }
    }

    pub fn as_string(&self) -> String {
        self.to_json().to_string()
    }
}

fn into_list(v: Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items,
        other => vec![other],
    }
}

// Shorter lists clamp to their last entry so every id references a real item.
fn index_entries(subjects: usize, actions: usize, resources: usize) -> Map<String, Value> {
    let n = subjects.max(actions).max(resources);
    let clamp = |len: usize, i: usize| i.min(len.saturating_sub(1));
    (0..n)
        .map(|i| {
            (
                format!("id-{}", i + 1),
                json!({
                    "subjectId": clamp(subjects, i),
                    "actionId": clamp(actions, i),
                    "resourceId": clamp(resources, i),
                }),
            )
        })
        .collect()
}
