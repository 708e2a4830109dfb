//! Field schemas: the shape a typed value must have, discovered per resource type at runtime.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Number,
    Bool,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSchema {
    Scalar { kind: ScalarKind },
    Object {
        attributes: BTreeMap<String, FieldSchema>,
        /// Attribute names that may be left unset (and may hold an explicit null).
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        optional: BTreeSet<String>,
    },
    List { element: Box<FieldSchema> },
    Map { value: Box<FieldSchema> },
    Set { element: Box<FieldSchema> },
    /// Free-form position (int-or-string, preserve-unknown-fields): any raw JSON is accepted as-is.
    Dynamic,
}

impl FieldSchema {
    pub fn string() -> Self { FieldSchema::Scalar { kind: ScalarKind::String } }
    pub fn number() -> Self { FieldSchema::Scalar { kind: ScalarKind::Number } }
    pub fn bool() -> Self { FieldSchema::Scalar { kind: ScalarKind::Bool } }
    pub fn list(element: FieldSchema) -> Self { FieldSchema::List { element: Box::new(element) } }
    pub fn set(element: FieldSchema) -> Self { FieldSchema::Set { element: Box::new(element) } }
    pub fn map(value: FieldSchema) -> Self { FieldSchema::Map { value: Box::new(value) } }

    /// Object schema from required and optional attribute lists.
    pub fn object<R, O, K>(required: R, optional: O) -> Self
    where
        R: IntoIterator<Item = (K, FieldSchema)>,
        O: IntoIterator<Item = (K, FieldSchema)>,
        K: Into<String>,
    {
        let mut attributes = BTreeMap::new();
        let mut opt = BTreeSet::new();
        for (k, v) in required {
            attributes.insert(k.into(), v);
        }
        for (k, v) in optional {
            let k = k.into();
            opt.insert(k.clone());
            attributes.insert(k, v);
        }
        FieldSchema::Object { attributes, optional: opt }
    }

    /// Short shape name used in conversion errors.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldSchema::Scalar { kind } => kind.as_str(),
            FieldSchema::Object { .. } => "object",
            FieldSchema::List { .. } => "list",
            FieldSchema::Map { .. } => "map",
            FieldSchema::Set { .. } => "set",
            FieldSchema::Dynamic => "dynamic",
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldSchema> {
        match self {
            FieldSchema::Object { attributes, .. } => attributes.get(name),
            _ => None,
        }
    }

    pub fn is_optional(&self, name: &str) -> bool {
        match self {
            FieldSchema::Object { optional, .. } => optional.contains(name),
            _ => false,
        }
    }
}
