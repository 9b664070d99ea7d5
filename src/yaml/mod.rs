//! # YAML Operations
//!
//! Parse, dump, deep-merge, flatten, and unflatten YAML trees. All
//! operations work on [`serde_yaml::Mapping`], which preserves the key
//! order the document defines.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::error::{Result, ServiceError};

/// Parse YAML text into a single nested map.
///
/// Multi-document input is deep-merged in document order (later documents
/// override earlier ones). Empty input yields an empty map. Scalar or
/// sequence documents are rejected.
pub fn parse(text: &str) -> Result<Mapping> {
    let mut merged = Mapping::new();
    if text.trim().is_empty() {
        return Ok(merged);
    }
    for document in serde_yaml::Deserializer::from_str(text) {
        let value =
            Value::deserialize(document).map_err(|e| ServiceError::InvalidYaml(e.to_string()))?;
        match value {
            Value::Mapping(map) => deep_merge(&mut merged, map),
            Value::Null => {}
            other => {
                return Err(ServiceError::InvalidYaml(format!(
                    "expected a mapping document, got {}",
                    type_name(&other)
                )));
            }
        }
    }
    Ok(merged)
}

/// Best-effort parse for the read path: a malformed source yields an empty
/// map and a warning instead of an error.
pub fn parse_lenient(text: &str, source: &str) -> Mapping {
    match parse(text) {
        Ok(map) => map,
        Err(e) => {
            warn!("skipping malformed YAML source {source}: {e}");
            Mapping::new()
        }
    }
}

/// Dump a map as block-style YAML with 2-space indentation.
pub fn dump(map: &Mapping) -> Result<String> {
    serde_yaml::to_string(&Value::Mapping(map.clone()))
        .map_err(|e| ServiceError::Internal(format!("YAML dump failed: {e}")))
}

/// Recursively merge `source` into `target`.
///
/// When both sides hold a mapping at the same key, the mappings merge;
/// any other combination lets `source` overwrite `target`.
pub fn deep_merge(target: &mut Mapping, source: Mapping) {
    for (key, value) in source {
        let both_maps =
            value.is_mapping() && matches!(target.get(&key), Some(Value::Mapping(_)));
        if both_maps {
            if let (Some(Value::Mapping(existing)), Value::Mapping(incoming)) =
                (target.get_mut(&key), value)
            {
                deep_merge(existing, incoming);
            }
        } else {
            target.insert(key, value);
        }
    }
}

/// Flatten a nested map into dot-joined leaf paths.
///
/// Sequences are leaves and are not expanded.
pub fn flatten(map: &Mapping) -> Mapping {
    let mut flat = Mapping::new();
    flatten_into(map, String::new(), &mut flat);
    flat
}

fn flatten_into(map: &Mapping, prefix: String, out: &mut Mapping) {
    for (key, value) in map {
        let key = key_to_string(key);
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Mapping(nested) => flatten_into(nested, path, out),
            leaf => {
                out.insert(Value::String(path), leaf.clone());
            }
        }
    }
}

/// Rebuild a nested map from dot-joined leaf paths.
pub fn unflatten(flat: &Mapping) -> Mapping {
    let mut nested = Mapping::new();
    for (key, value) in flat {
        let path = key_to_string(key);
        insert_path(&mut nested, &path, value.clone());
    }
    nested
}

fn insert_path(map: &mut Mapping, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(Value::String(path.to_string()), value);
        }
        Some((head, rest)) => {
            let key = Value::String(head.to_string());
            if !matches!(map.get(&key), Some(Value::Mapping(_))) {
                map.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(child)) = map.get_mut(&key) {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Render a mapping key as its dotted-path segment.
pub fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Mapping {
        parse(text).expect("valid YAML")
    }

    #[test]
    fn parse_empty_is_empty_map() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("   \n").is_empty());
    }

    #[test]
    fn parse_merges_documents() {
        let map = parse_ok("a: 1\nb:\n  c: 2\n---\nb:\n  d: 3\n");
        let flat = flatten(&map);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat.get("b.c"), Some(&Value::from(2)));
        assert_eq!(flat.get("b.d"), Some(&Value::from(3)));
    }

    #[test]
    fn parse_rejects_scalar_document() {
        assert!(parse("just a string").is_err());
    }

    #[test]
    fn deep_merge_overrides_non_mappings() {
        let mut target = parse_ok("a:\n  b: 1\n  c: 2\nd: 4\n");
        let source = parse_ok("a:\n  b: 9\ne: 5\n");
        deep_merge(&mut target, source);
        let flat = flatten(&target);
        assert_eq!(flat.get("a.b"), Some(&Value::from(9)));
        assert_eq!(flat.get("a.c"), Some(&Value::from(2)));
        assert_eq!(flat.get("d"), Some(&Value::from(4)));
        assert_eq!(flat.get("e"), Some(&Value::from(5)));
    }

    #[test]
    fn deep_merge_map_replaces_scalar() {
        let mut target = parse_ok("a: scalar\n");
        let source = parse_ok("a:\n  b: 1\n");
        deep_merge(&mut target, source);
        let flat = flatten(&target);
        assert_eq!(flat.get("a.b"), Some(&Value::from(1)));
    }

    #[test]
    fn flatten_keeps_lists_as_leaves() {
        let map = parse_ok("servers:\n  - one\n  - two\nnested:\n  deep:\n    leaf: x\n");
        let flat = flatten(&map);
        assert!(matches!(
            flat.get("servers"),
            Some(Value::Sequence(_))
        ));
        assert_eq!(
            flat.get("nested.deep.leaf"),
            Some(&Value::String("x".into()))
        );
    }

    #[test]
    fn flatten_merge_equivalence() {
        // flatten(deep_merge(a, b)) == entrywise override of flatten(a) by flatten(b)
        let mut a = parse_ok("x:\n  y: 1\n  z: 2\nq: 7\n");
        let b = parse_ok("x:\n  y: 10\nr: 8\n");
        let mut expected = flatten(&a);
        for (k, v) in flatten(&b) {
            expected.insert(k, v);
        }
        deep_merge(&mut a, b);
        assert_eq!(flatten(&a), expected);
    }

    #[test]
    fn dump_parse_flatten_round_trip() {
        let map = parse_ok("server:\n  port: 8080\n  hosts:\n    - a\n    - b\nname: svc\n");
        let dumped = dump(&map).unwrap();
        let reparsed = parse_ok(&dumped);
        assert_eq!(flatten(&map), flatten(&reparsed));
    }

    #[test]
    fn unflatten_inverts_flatten() {
        let map = parse_ok("a:\n  b:\n    c: 1\n  d: 2\ne: 3\n");
        let rebuilt = unflatten(&flatten(&map));
        assert_eq!(flatten(&rebuilt), flatten(&map));
    }

    #[test]
    fn lenient_parse_swallows_errors() {
        assert!(parse_lenient("a: [broken", "test.yml").is_empty());
    }
}
