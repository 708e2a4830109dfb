//! Removal of server-owned fields from live objects.

use serde_json::Value as Json;

/// `metadata` keys populated and managed by the API server.
pub const SERVER_METADATA_FIELDS: &[&str] = &[
    "uid",
    "resourceVersion",
    "generation",
    "creationTimestamp",
    "managedFields",
    "selfLink",
];

/// Strip `status` and the server-managed `metadata` keys. Everything else, including the
/// object body (`spec`, `data`, ...), is left untouched. Missing fields are fine.
pub fn strip_server_fields(mut v: Json) -> Json {
    if let Some(obj) = v.as_object_mut() {
        obj.remove("status");
        if let Some(meta) = obj.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            for field in SERVER_METADATA_FIELDS {
                meta.remove(*field);
            }
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_status_and_server_metadata() {
        let v = serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "x",
                "namespace": "ns",
                "labels": { "app": "x" },
                "managedFields": [ { "manager": "kubectl" } ],
                "resourceVersion": "123",
                "generation": 5,
                "uid": "0b9f0a5e-0000-0000-0000-000000000001",
                "selfLink": "/api/v1/namespaces/ns/configmaps/x",
                "creationTimestamp": "2020-01-01T00:00:00Z"
            },
            "status": { "obs": true },
            "data": { "k": "v" }
        });
        let pruned = strip_server_fields(v);
        let meta = pruned["metadata"].as_object().unwrap();
        for f in SERVER_METADATA_FIELDS {
            assert!(!meta.contains_key(*f), "{} should be removed", f);
        }
        assert_eq!(meta["name"], "x");
        assert_eq!(meta["namespace"], "ns");
        assert_eq!(meta["labels"]["app"], "x");
        assert!(pruned.get("status").is_none());
        assert_eq!(pruned["data"]["k"], "v");
    }

    #[test]
    fn tolerates_missing_fields() {
        let bare = serde_json::json!({ "spec": { "status": "kept", "resourceVersion": "kept" } });
        assert_eq!(strip_server_fields(bare.clone()), bare);
        let odd = serde_json::json!({ "metadata": "not-an-object" });
        assert_eq!(strip_server_fields(odd.clone()), odd);
        assert_eq!(strip_server_fields(Json::Null), Json::Null);
    }
}
