use std::collections::BTreeMap;

use kport_core::{ConversionError, FieldSchema, PathStep, ScalarKind, TypedValue};
use serde_json::Value as Json;
use tracing::trace;

/// Convert a raw object into a value shaped by `schema`.
///
/// Attributes the schema declares but the raw object lacks come out as `Absent`; raw
/// attributes the schema does not declare are dropped. Errors name the offending path.
pub fn convert(raw: &Json, schema: &FieldSchema) -> Result<TypedValue, ConversionError> {
    convert_node(Some(raw), schema, false)
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn mismatch(schema: &FieldSchema, raw: &Json) -> ConversionError {
    ConversionError::new(schema.describe(), json_kind(raw))
}

/// `nullable` is true only for optional object attributes; a raw null anywhere else carries
/// no information and is treated like a missing value.
fn convert_node(raw: Option<&Json>, schema: &FieldSchema, nullable: bool) -> Result<TypedValue, ConversionError> {
    let raw = match raw {
        None => return Ok(TypedValue::Absent),
        Some(Json::Null) if nullable => return Ok(TypedValue::Null),
        Some(Json::Null) => return Ok(TypedValue::Absent),
        Some(v) => v,
    };
    match schema {
        FieldSchema::Dynamic => Ok(TypedValue::Dynamic(raw.clone())),
        FieldSchema::Scalar { kind } => coerce_scalar(raw, *kind).ok_or_else(|| mismatch(schema, raw)),
        FieldSchema::Object { attributes, optional } => {
            let Json::Object(map) = raw else { return Err(mismatch(schema, raw)) };
            let mut out = BTreeMap::new();
            for (name, attr) in attributes {
                let v = convert_node(map.get(name), attr, optional.contains(name))
                    .map_err(|e| e.within(PathStep::Attribute(name.clone())))?;
                out.insert(name.clone(), v);
            }
            for dropped in map.keys().filter(|k| !attributes.contains_key(*k)) {
                trace!(attribute = %dropped, "dropping attribute not declared in schema");
            }
            Ok(TypedValue::Object(out))
        }
        FieldSchema::List { element } => convert_elements(raw, schema, element).map(TypedValue::List),
        FieldSchema::Set { element } => convert_elements(raw, schema, element).map(TypedValue::Set),
        FieldSchema::Map { value } => {
            let Json::Object(map) = raw else { return Err(mismatch(schema, raw)) };
            let mut out = BTreeMap::new();
            for (key, v) in map {
                let tv = convert_node(Some(v), value, false).map_err(|e| e.within(PathStep::Key(key.clone())))?;
                out.insert(key.clone(), tv);
            }
            Ok(TypedValue::Map(out))
        }
    }
}

fn convert_elements(raw: &Json, schema: &FieldSchema, element: &FieldSchema) -> Result<Vec<TypedValue>, ConversionError> {
    let Json::Array(items) = raw else { return Err(mismatch(schema, raw)) };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| convert_node(Some(item), element, false).map_err(|e| e.within(PathStep::Index(i))))
        .collect()
}

fn coerce_scalar(raw: &Json, kind: ScalarKind) -> Option<TypedValue> {
    match (kind, raw) {
        (ScalarKind::String, Json::String(s)) => Some(TypedValue::String(s.clone())),
        (ScalarKind::String, Json::Number(n)) => Some(TypedValue::String(n.to_string())),
        (ScalarKind::String, Json::Bool(b)) => Some(TypedValue::String(b.to_string())),
        (ScalarKind::Number, Json::Number(n)) => Some(TypedValue::Number(n.clone())),
        (ScalarKind::Number, Json::String(s)) => s.trim().parse::<serde_json::Number>().ok().map(TypedValue::Number),
        (ScalarKind::Bool, Json::Bool(b)) => Some(TypedValue::Bool(*b)),
        (ScalarKind::Bool, Json::String(s)) => match s.as_str() {
            "true" => Some(TypedValue::Bool(true)),
            "false" => Some(TypedValue::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}
