use kport_core::TypedValue;
use serde_json::{Map, Value as Json};

/// Back to plain JSON. Pending and Absent attributes are left out of objects and maps; inside
/// lists and sets they become `null` so element positions are preserved.
pub fn flatten(value: &TypedValue) -> Json {
    match value {
        TypedValue::Pending | TypedValue::Absent | TypedValue::Null => Json::Null,
        TypedValue::String(s) => Json::String(s.clone()),
        TypedValue::Number(n) => Json::Number(n.clone()),
        TypedValue::Bool(b) => Json::Bool(*b),
        TypedValue::Dynamic(raw) => raw.clone(),
        TypedValue::List(items) | TypedValue::Set(items) => Json::Array(items.iter().map(flatten).collect()),
        TypedValue::Map(entries) | TypedValue::Object(entries) => {
            let mut out = Map::new();
            for (k, v) in entries {
                if matches!(v, TypedValue::Pending | TypedValue::Absent) {
                    continue;
                }
                out.insert(k.clone(), flatten(v));
            }
            Json::Object(out)
        }
    }
}
