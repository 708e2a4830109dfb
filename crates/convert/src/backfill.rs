use std::collections::BTreeMap;

use kport_core::{FieldSchema, TypedValue};

/// Replace every undeterminable position with `Pending`, walking `schema` and `value` together.
///
/// An `Absent` node, or a schema attribute missing from an object, becomes a single `Pending`
/// for the whole subtree. A list, set or map with a pending element is pending as a whole.
/// Everything else is kept as-is, so the function is total.
pub fn backfill(schema: &FieldSchema, value: TypedValue) -> TypedValue {
    match (schema, value) {
        (_, TypedValue::Absent) => TypedValue::Pending,
        (FieldSchema::Object { attributes, .. }, TypedValue::Object(mut present)) => {
            let mut out = BTreeMap::new();
            for (name, attr) in attributes {
                let v = present.remove(name).unwrap_or(TypedValue::Absent);
                out.insert(name.clone(), backfill(attr, v));
            }
            TypedValue::Object(out)
        }
        (FieldSchema::List { element }, TypedValue::List(items)) => {
            collapse(items.into_iter().map(|v| backfill(element, v)).collect()).map_or(TypedValue::Pending, TypedValue::List)
        }
        (FieldSchema::Set { element }, TypedValue::Set(items)) => {
            collapse(items.into_iter().map(|v| backfill(element, v)).collect()).map_or(TypedValue::Pending, TypedValue::Set)
        }
        (FieldSchema::Map { value }, TypedValue::Map(entries)) => {
            let out: BTreeMap<String, TypedValue> = entries.into_iter().map(|(k, v)| (k, backfill(value, v))).collect();
            if out.values().any(TypedValue::is_pending) { TypedValue::Pending } else { TypedValue::Map(out) }
        }
        (_, other) => other,
    }
}

fn collapse(items: Vec<TypedValue>) -> Option<Vec<TypedValue>> {
    if items.iter().any(TypedValue::is_pending) { None } else { Some(items) }
}

/// Turn Pending at optional attributes of the root object into `Null`: those are
/// operator-settable and read as "not configured yet". Required root attributes and deeper
/// Pending markers stay pending.
pub fn narrow_top_level(schema: &FieldSchema, value: TypedValue) -> TypedValue {
    match (schema, value) {
        (FieldSchema::Object { optional, .. }, TypedValue::Object(attrs)) => TypedValue::Object(
            attrs
                .into_iter()
                .map(|(k, v)| if v.is_pending() && optional.contains(&k) { (k, TypedValue::Null) } else { (k, v) })
                .collect(),
        ),
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;
    use serde_json::json;

    fn secret_schema() -> FieldSchema {
        FieldSchema::object(
            [("apiVersion", FieldSchema::string()), ("kind", FieldSchema::string()), (
                "metadata",
                FieldSchema::object(
                    [("name", FieldSchema::string())],
                    [("namespace", FieldSchema::string()), ("annotations", FieldSchema::map(FieldSchema::string()))],
                ),
            )],
            [("data", FieldSchema::map(FieldSchema::string())), ("immutable", FieldSchema::bool()), ("type", FieldSchema::string())],
        )
    }

    #[test]
    fn missing_optional_is_pending_nested_and_null_at_top() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "tok", "namespace": "default" },
            "data": { "token": "c2VjcmV0" },
            "type": "kubernetes.io/service-account-token"
        });
        let v = backfill(&secret_schema(), convert(&raw, &secret_schema()).unwrap());
        assert!(v.lookup(&["metadata", "annotations"]).unwrap().is_pending());
        assert!(v.lookup(&["immutable"]).unwrap().is_pending());

        let narrowed = narrow_top_level(&secret_schema(), v);
        assert!(narrowed.lookup(&["immutable"]).unwrap().is_null());
        assert!(narrowed.lookup(&["metadata", "annotations"]).unwrap().is_pending());
        assert_eq!(narrowed.lookup(&["data", "token"]), Some(&TypedValue::from("c2VjcmV0")));
    }

    #[test]
    fn backfill_without_placeholders_is_identity() {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "tok", "namespace": "default", "annotations": {} },
            "data": {},
            "immutable": true,
            "type": "Opaque"
        });
        let converted = convert(&raw, &secret_schema()).unwrap();
        assert!(converted.is_fully_known());
        let filled = backfill(&secret_schema(), converted.clone());
        assert_eq!(filled, converted);
        assert_eq!(narrow_top_level(&secret_schema(), filled.clone()), filled);
        assert_eq!(backfill(&secret_schema(), filled.clone()), filled);
    }

    #[test]
    fn collections_with_pending_elements_collapse() {
        let schema = FieldSchema::list(FieldSchema::string());
        let v = backfill(&schema, TypedValue::List(vec![TypedValue::from("a"), TypedValue::Absent]));
        assert_eq!(v, TypedValue::Pending);

        let schema = FieldSchema::map(FieldSchema::number());
        let v = backfill(&schema, convert(&json!({ "a": 1, "b": null }), &schema).unwrap());
        assert_eq!(v, TypedValue::Pending);

        let schema = FieldSchema::set(FieldSchema::bool());
        assert_eq!(backfill(&schema, TypedValue::Set(vec![TypedValue::from(true)])), TypedValue::Set(vec![TypedValue::from(true)]));
    }

    #[test]
    fn pending_subtrees_have_no_concrete_descendants() {
        let schema = FieldSchema::object(
            [],
            [("spec", FieldSchema::object([], [("ports", FieldSchema::list(FieldSchema::object([("port", FieldSchema::number())], [])))]))],
        );
        let v = backfill(&schema, convert(&json!({ "spec": { "ports": [ { "port": 80 }, null ] } }), &schema).unwrap());
        assert!(v.lookup(&["spec", "ports"]).unwrap().is_pending());
        for p in v.pending_paths() {
            let mut concrete_below = false;
            v.walk(&mut |q, node| {
                let below = q.steps().len() > p.steps().len() && q.steps().starts_with(p.steps());
                if below && !node.is_pending() {
                    concrete_below = true;
                }
            });
            assert!(!concrete_below, "concrete value below pending {}", p);
        }
    }

    #[test]
    fn required_top_level_attribute_stays_pending() {
        let schema = FieldSchema::object(
            [("kind", FieldSchema::string()), ("spec", FieldSchema::object([("x", FieldSchema::string())], []))],
            [("note", FieldSchema::string())],
        );
        let v = backfill(&schema, convert(&json!({ "kind": "Widget" }), &schema).unwrap());
        let narrowed = narrow_top_level(&schema, v);
        assert_eq!(narrowed.lookup(&["spec"]), Some(&TypedValue::Pending));
        assert_eq!(narrowed.lookup(&["note"]), Some(&TypedValue::Null));
        assert_eq!(narrowed.lookup(&["kind"]), Some(&TypedValue::from("Widget")));
    }

    #[test]
    fn absent_root_stays_pending() {
        let v = backfill(&secret_schema(), TypedValue::Absent);
        assert!(v.is_pending());
        assert!(narrow_top_level(&secret_schema(), v).is_pending());
    }
}
