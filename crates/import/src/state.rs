//! Imported state record and its wire encoding.

use std::collections::BTreeMap;

use kport_core::{AssemblyError, AttributePath, PathStep, TypedValue};
use serde_json::{Map, Value as Json};

/// Key of the sentinel object that encodes a Pending marker on the wire.
///
/// Label, annotation and data keys cannot contain `$`, so those maps never produce the
/// sentinel. A `Dynamic` value, or a free-form `Map` of booleans, whose live content is
/// literally `{"$pending": true}` encodes identically; consumers that need to tell them apart
/// must consult the `TypedValue` rather than the wire form.
pub const PENDING_SENTINEL: &str = "$pending";

/// Final record handed to the caller. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedState {
    /// Declarative config text; an imported object has none yet.
    pub manifest: TypedValue,
    pub object: TypedValue,
    pub wait_for: TypedValue,
}

/// Compose the state from the converted, backfilled and narrowed object.
pub fn assemble(object: TypedValue) -> ImportedState {
    ImportedState { manifest: TypedValue::Object(BTreeMap::new()), object, wait_for: TypedValue::Null }
}

impl ImportedState {
    /// Serialize as `{"manifest": {}, "object": ..., "wait_for": null}`.
    ///
    /// Pending is written as `{"$pending": true}`. A surviving `Absent` placeholder means the
    /// backfill pass was skipped and fails the whole encoding.
    pub fn to_json(&self) -> Result<Json, AssemblyError> {
        let mut out = Map::new();
        out.insert("manifest".into(), encode(&self.manifest, &AttributePath::root().child(PathStep::Attribute("manifest".into())))?);
        out.insert("object".into(), encode(&self.object, &AttributePath::root().child(PathStep::Attribute("object".into())))?);
        out.insert("wait_for".into(), encode(&self.wait_for, &AttributePath::root().child(PathStep::Attribute("wait_for".into())))?);
        Ok(Json::Object(out))
    }
}

pub fn pending_sentinel() -> Json {
    let mut m = Map::new();
    m.insert(PENDING_SENTINEL.into(), Json::Bool(true));
    Json::Object(m)
}

fn encode(v: &TypedValue, path: &AttributePath) -> Result<Json, AssemblyError> {
    Ok(match v {
        TypedValue::Absent => {
            return Err(AssemblyError { path: path.clone(), reason: "undetermined value was not backfilled".into() });
        }
        TypedValue::Pending => pending_sentinel(),
        TypedValue::Null => Json::Null,
        TypedValue::String(s) => Json::String(s.clone()),
        TypedValue::Number(n) => Json::Number(n.clone()),
        TypedValue::Bool(b) => Json::Bool(*b),
        TypedValue::Dynamic(raw) => raw.clone(),
        TypedValue::List(items) | TypedValue::Set(items) => Json::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| encode(item, &path.child(PathStep::Index(i))))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        TypedValue::Object(attrs) => {
            let mut m = Map::new();
            for (k, item) in attrs {
                m.insert(k.clone(), encode(item, &path.child(PathStep::Attribute(k.clone())))?);
            }
            Json::Object(m)
        }
        TypedValue::Map(entries) => {
            let mut m = Map::new();
            for (k, item) in entries {
                m.insert(k.clone(), encode(item, &path.child(PathStep::Key(k.clone())))?);
            }
            Json::Object(m)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_fixed_slots() {
        let obj = TypedValue::Object([("kind".to_string(), TypedValue::from("Secret")), ("spec".to_string(), TypedValue::Pending)].into_iter().collect());
        let state = assemble(obj);
        let json = state.to_json().unwrap();
        assert_eq!(json["manifest"], serde_json::json!({}));
        assert!(json["wait_for"].is_null());
        assert_eq!(json["object"]["kind"], "Secret");
        assert_eq!(json["object"]["spec"], serde_json::json!({ "$pending": true }));
    }

    #[test]
    fn leftover_placeholder_is_an_assembly_error() {
        let obj = TypedValue::Object(
            [("spec".to_string(), TypedValue::List(vec![TypedValue::from(1), TypedValue::Absent]))].into_iter().collect(),
        );
        let err = assemble(obj).to_json().unwrap_err();
        assert_eq!(err.path.to_string(), "object.spec[1]");
    }

    #[test]
    fn only_the_exact_sentinel_shape_reads_as_pending() {
        let obj = TypedValue::Object(
            [
                ("a".to_string(), TypedValue::Pending),
                ("b".to_string(), TypedValue::Dynamic(serde_json::json!({ "$pending": false }))),
                ("c".to_string(), TypedValue::Dynamic(serde_json::json!({ "$pending": true, "extra": 1 }))),
            ]
            .into_iter()
            .collect(),
        );
        let json = assemble(obj).to_json().unwrap();
        assert_eq!(json["object"]["a"], pending_sentinel());
        assert_ne!(json["object"]["b"], pending_sentinel());
        assert_ne!(json["object"]["c"], pending_sentinel());
    }
}
