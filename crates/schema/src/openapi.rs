//! OpenAPI (v2 definitions and CRD v3 `openAPIV3Schema`) to [`FieldSchema`].
//!
//! - `type: object` with `properties` becomes an object; attributes not listed in
//!   `required` are optional
//! - `type: object` with only `additionalProperties` becomes a map
//! - `type: array` becomes a list, or a set for `x-kubernetes-list-type: set`
//! - `string`, `integer`/`number`, `boolean` become scalars
//! - int-or-string, preserve-unknown-fields and untyped nodes become `Dynamic`
//!
//! `$ref`s resolve against `#/definitions/`; a reference cycle ends in `Dynamic`.

use std::collections::{BTreeMap, BTreeSet};

use kport_core::{FieldSchema, Gvk};
use serde_json::{Map, Value as Json};

const REF_PREFIX: &str = "#/definitions/";

/// v2 definition of the metadata block every object carries.
pub const OBJECT_META_DEFINITION: &str = "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta";

/// Build the schema for a whole resource from its root OpenAPI node.
pub fn resource_schema(root: &Json, definitions: Option<&Map<String, Json>>) -> FieldSchema {
    let mut visiting = Vec::new();
    let schema = walk(root, definitions, &mut visiting);
    require_root_attributes(schema, || object_meta_schema(definitions))
}

/// Build the schema for a custom resource from its CRD `openAPIV3Schema`.
///
/// CRD schemas rarely describe `metadata`; it is taken from `meta_definitions` (the cluster's
/// v2 definitions) when given, else from a built-in ObjectMeta subset.
pub fn crd_resource_schema(root: &Json, meta_definitions: Option<&Map<String, Json>>) -> FieldSchema {
    let schema = walk(root, None, &mut Vec::new());
    require_root_attributes(schema, || object_meta_schema(meta_definitions))
}

/// ObjectMeta from `definitions`, falling back to the fields an imported object commonly sets.
pub fn object_meta_schema(definitions: Option<&Map<String, Json>>) -> FieldSchema {
    match definitions.and_then(|d| d.get(OBJECT_META_DEFINITION)) {
        Some(def) => walk(def, definitions, &mut vec![OBJECT_META_DEFINITION.to_string()]),
        None => FieldSchema::object(
            [] as [(&str, FieldSchema); 0],
            [
                ("name", FieldSchema::string()),
                ("namespace", FieldSchema::string()),
                ("generateName", FieldSchema::string()),
                ("labels", FieldSchema::map(FieldSchema::string())),
                ("annotations", FieldSchema::map(FieldSchema::string())),
                ("finalizers", FieldSchema::list(FieldSchema::string())),
                ("ownerReferences", FieldSchema::list(FieldSchema::Dynamic)),
            ],
        ),
    }
}

/// Find the v2 definition tagged with `x-kubernetes-group-version-kind` for `gvk`.
pub fn find_definition<'a>(definitions: &'a Map<String, Json>, gvk: &Gvk) -> Option<&'a Json> {
    definitions.values().find(|def| {
        def.get("x-kubernetes-group-version-kind")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter().any(|t| {
                    let g = t.get("group").and_then(|s| s.as_str()).unwrap_or("");
                    let v = t.get("version").and_then(|s| s.as_str()).unwrap_or("");
                    let k = t.get("kind").and_then(|s| s.as_str()).unwrap_or("");
                    g == gvk.group && v == gvk.version && k == gvk.kind
                })
            })
            .unwrap_or(false)
    })
}

fn flag(node: &Json, key: &str) -> bool {
    node.get(key).and_then(|b| b.as_bool()).unwrap_or(false)
}

fn walk(node: &Json, defs: Option<&Map<String, Json>>, visiting: &mut Vec<String>) -> FieldSchema {
    if let Some(reference) = node.get("$ref").and_then(|r| r.as_str()) {
        let name = reference.strip_prefix(REF_PREFIX).unwrap_or(reference);
        if visiting.iter().any(|v| v == name) {
            return FieldSchema::Dynamic;
        }
        let Some(target) = defs.and_then(|d| d.get(name)) else { return FieldSchema::Dynamic };
        visiting.push(name.to_string());
        let out = walk(target, defs, visiting);
        visiting.pop();
        return out;
    }
    if flag(node, "x-kubernetes-int-or-string") {
        return FieldSchema::Dynamic;
    }
    // CRDs sometimes wrap a single referenced schema in allOf
    if let Some([only]) = node.get("allOf").and_then(|a| a.as_array()).map(|a| a.as_slice()) {
        return walk(only, defs, visiting);
    }
    let ty = node.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let props = node.get("properties").and_then(|p| p.as_object());
    match ty {
        "string" if node.get("format").and_then(|f| f.as_str()) == Some("int-or-string") => FieldSchema::Dynamic,
        "string" => FieldSchema::string(),
        "integer" | "number" => FieldSchema::number(),
        "boolean" => FieldSchema::bool(),
        "array" => match node.get("items") {
            Some(items) => {
                let element = walk(items, defs, visiting);
                if node.get("x-kubernetes-list-type").and_then(|t| t.as_str()) == Some("set") {
                    FieldSchema::set(element)
                } else {
                    FieldSchema::list(element)
                }
            }
            None => FieldSchema::Dynamic,
        },
        "object" | "" => match (props, node.get("additionalProperties")) {
            (Some(props), _) if !props.is_empty() => object_schema(node, props, defs, visiting),
            (_, Some(ap)) if ap.is_object() => FieldSchema::map(walk(ap, defs, visiting)),
            _ => FieldSchema::Dynamic,
        },
        _ => FieldSchema::Dynamic,
    }
}

fn object_schema(node: &Json, props: &Map<String, Json>, defs: Option<&Map<String, Json>>, visiting: &mut Vec<String>) -> FieldSchema {
    let required: BTreeSet<&str> = node
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|s| s.as_str()).collect())
        .unwrap_or_default();
    let mut attributes = BTreeMap::new();
    let mut optional = BTreeSet::new();
    for (name, prop) in props {
        attributes.insert(name.clone(), walk(prop, defs, visiting));
        if !required.contains(name.as_str()) {
            optional.insert(name.clone());
        }
    }
    FieldSchema::Object { attributes, optional }
}

/// Make `apiVersion`, `kind` and `metadata` required root attributes, adding any the schema
/// leaves out. An untyped `metadata` is replaced by `metadata()`.
fn require_root_attributes(schema: FieldSchema, metadata: impl FnOnce() -> FieldSchema) -> FieldSchema {
    match schema {
        FieldSchema::Object { mut attributes, mut optional } => {
            for name in ["apiVersion", "kind"] {
                attributes.entry(name.to_string()).or_insert_with(FieldSchema::string);
                optional.remove(name);
            }
            match attributes.get("metadata") {
                Some(FieldSchema::Object { .. }) => {}
                _ => {
                    attributes.insert("metadata".to_string(), metadata());
                }
            }
            optional.remove("metadata");
            FieldSchema::Object { attributes, optional }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Map<String, Json> {
        serde_json::json!({
            "io.k8s.api.core.v1.Secret": {
                "type": "object",
                "properties": {
                    "apiVersion": { "type": "string" },
                    "kind": { "type": "string" },
                    "metadata": { "$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta" },
                    "data": { "type": "object", "additionalProperties": { "type": "string", "format": "byte" } },
                    "immutable": { "type": "boolean" },
                    "type": { "type": "string" }
                },
                "x-kubernetes-group-version-kind": [ { "group": "", "version": "v1", "kind": "Secret" } ]
            },
            "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "labels": { "type": "object", "additionalProperties": { "type": "string" } },
                    "finalizers": { "type": "array", "items": { "type": "string" }, "x-kubernetes-list-type": "set" },
                    "generation": { "type": "integer" }
                }
            },
            "io.example.Node": {
                "type": "object",
                "properties": {
                    "value": { "type": "string" },
                    "children": { "type": "array", "items": { "$ref": "#/definitions/io.example.Node" } }
                },
                "required": ["value"]
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn secret_definition_maps_to_field_schema() {
        let d = defs();
        let root = find_definition(&d, &Gvk::new("", "v1", "Secret")).unwrap();
        let s = resource_schema(root, Some(&d));
        assert!(!s.is_optional("apiVersion"));
        assert!(!s.is_optional("metadata"));
        assert!(s.is_optional("data"));
        assert_eq!(s.attribute("data"), Some(&FieldSchema::map(FieldSchema::string())));
        assert_eq!(s.attribute("immutable"), Some(&FieldSchema::bool()));
        let meta = s.attribute("metadata").unwrap();
        assert_eq!(meta.attribute("finalizers"), Some(&FieldSchema::set(FieldSchema::string())));
        assert_eq!(meta.attribute("generation"), Some(&FieldSchema::number()));
        assert!(find_definition(&d, &Gvk::new("apps", "v1", "Secret")).is_none());
    }

    #[test]
    fn recursive_refs_end_in_dynamic() {
        let d = defs();
        let s = resource_schema(&serde_json::json!({ "$ref": "#/definitions/io.example.Node" }), Some(&d));
        assert!(!s.is_optional("value"));
        let children = s.attribute("children").unwrap();
        assert_eq!(children, &FieldSchema::list(FieldSchema::Dynamic));
    }

    #[test]
    fn crd_v3_extensions() {
        let v3 = serde_json::json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {
                        "port": { "x-kubernetes-int-or-string": true },
                        "raw": { "type": "object", "x-kubernetes-preserve-unknown-fields": true },
                        "replicas": { "type": "integer" },
                        "tags": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["replicas"]
                }
            }
        });
        let s = resource_schema(&v3, None);
        let spec = s.attribute("spec").unwrap();
        assert_eq!(spec.attribute("port"), Some(&FieldSchema::Dynamic));
        assert_eq!(spec.attribute("raw"), Some(&FieldSchema::Dynamic));
        assert_eq!(spec.attribute("tags"), Some(&FieldSchema::list(FieldSchema::string())));
        assert!(!spec.is_optional("replicas"));
        assert!(spec.is_optional("tags"));
    }

    #[test]
    fn crd_without_root_attributes_gets_them_added() {
        let v3 = serde_json::json!({
            "type": "object",
            "properties": { "spec": { "type": "object", "properties": { "size": { "type": "integer" } } } }
        });
        let s = crd_resource_schema(&v3, Some(&defs()));
        assert_eq!(s.attribute("apiVersion"), Some(&FieldSchema::string()));
        assert_eq!(s.attribute("kind"), Some(&FieldSchema::string()));
        assert!(!s.is_optional("apiVersion"));
        assert!(!s.is_optional("metadata"));
        let meta = s.attribute("metadata").unwrap();
        assert_eq!(meta.attribute("finalizers"), Some(&FieldSchema::set(FieldSchema::string())));
        assert!(s.is_optional("spec"));
    }

    #[test]
    fn untyped_metadata_falls_back_to_builtin_object_meta() {
        let v3 = serde_json::json!({
            "type": "object",
            "properties": { "metadata": { "type": "object" }, "spec": { "type": "object", "x-kubernetes-preserve-unknown-fields": true } }
        });
        let s = crd_resource_schema(&v3, None);
        let meta = s.attribute("metadata").unwrap();
        assert_eq!(meta.attribute("name"), Some(&FieldSchema::string()));
        assert_eq!(meta.attribute("labels"), Some(&FieldSchema::map(FieldSchema::string())));
        assert_eq!(s.attribute("spec"), Some(&FieldSchema::Dynamic));
    }
}
