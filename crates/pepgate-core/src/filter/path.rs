//! Key-name lookup over nested JSON.
//!
//! A "path" here is a bare key name, not a path expression: it matches that
//! key at any depth. Two differently located keys with the same name are
//! indistinguishable.

use serde_json::Value;

const ROOT_PREFIX: &str = "$.";

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Seg {
    Key(String),
    Index(usize),
}

pub(crate) fn strip_root(path: &str) -> &str {
    path.strip_prefix(ROOT_PREFIX).unwrap_or(path)
}

/// First value stored under `key`. An object's own key wins over its
/// descendants; children are then searched in document order.
pub(crate) fn find_first<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    match doc {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|child| find_first(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_first(child, key)),
        _ => None,
    }
}

/// Every location whose last step is `key`, depth first.
pub(crate) fn find_key_paths(doc: &Value, key: &str) -> Vec<Vec<Seg>> {
    let mut found = Vec::new();
    let mut cur = Vec::new();
    collect(doc, key, &mut cur, &mut found);
    found
}

fn collect(v: &Value, key: &str, cur: &mut Vec<Seg>, found: &mut Vec<Vec<Seg>>) {
    match v {
        Value::Object(map) => {
            if map.contains_key(key) {
                let mut hit = cur.clone();
                hit.push(Seg::Key(key.to_owned()));
                found.push(hit);
            }
            for (k, child) in map {
                cur.push(Seg::Key(k.clone()));
                collect(child, key, cur, found);
                cur.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                cur.push(Seg::Index(i));
                collect(child, key, cur, found);
                cur.pop();
            }
        }
        _ => {}
    }
}

/// Mutable slot at `path`, if every step still resolves.
pub(crate) fn lookup_mut<'a>(doc: &'a mut Value, path: &[Seg]) -> Option<&'a mut Value> {
    path.iter().try_fold(doc, |node, seg| match seg {
        Seg::Key(k) => node.as_object_mut()?.get_mut(k),
        Seg::Index(i) => node.as_array_mut()?.get_mut(*i),
    })
}

