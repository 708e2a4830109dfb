//! kport core types: resource identity and import-ID parsing, field schemas,
//! typed values and the per-stage error kinds shared by every crate.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod error;
pub mod path;
pub mod schema;
pub mod value;

pub use error::{AssemblyError, ConversionError, FetchError, ParseError, ResolutionError, SchemaError};
pub use path::{AttributePath, PathStep};
pub use schema::{FieldSchema, ScalarKind};
pub use value::TypedValue;

pub mod prelude {
    pub use super::{parse_import_id, AttributePath, FieldSchema, Gvk, ResourceIdentity, ScalarKind, TypedValue};
}

/// Separator between the segments of an import ID.
pub const IMPORT_ID_SEPARATOR: char = '#';

/// Group/Version/Kind triple selecting a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Split an `apiVersion` (`group/version` or bare `version`) and pair it with `kind`.
    pub fn from_api_version_and_kind(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }

    /// Key used across the workspace, e.g. "v1/Secret" or "apps/v1/Deployment".
    pub fn key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

impl std::fmt::Display for Gvk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Fully-qualified identity of the object an operator asked to import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// Present only for 4-segment IDs.
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceIdentity {
    pub fn gvk(&self) -> Gvk {
        Gvk::new(self.group.clone(), self.version.clone(), self.kind.clone())
    }

    pub fn api_version(&self) -> String { self.gvk().api_version() }

    /// `namespace/name` or just `name`, for log lines and error messages.
    pub fn object_key(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.gvk(), self.object_key())
    }
}

/// Parse an operator-supplied import ID.
///
/// Accepted forms:
///
/// - `<apiVersion>#<Kind>#<name>` for cluster-scoped objects
/// - `<apiVersion>#<Kind>#<namespace>#<name>` for namespaced objects
///
/// where `<apiVersion>` is `group/version`, or a bare `version` for the core group,
/// e.g. `v1#Secret#default#default-token-qgm6s`. Segment contents are not validated here;
/// a bad kind or name surfaces later when the type is resolved or the object fetched.
pub fn parse_import_id(id: &str) -> Result<ResourceIdentity, ParseError> {
    let parts: Vec<&str> = id.split(IMPORT_ID_SEPARATOR).collect();
    let (api_version, kind, namespace, name) = match parts.as_slice() {
        [api_version, kind, name] => (*api_version, *kind, None, *name),
        [api_version, kind, namespace, name] => (*api_version, *kind, Some((*namespace).to_string()), *name),
        _ => return Err(ParseError::InvalidFormat { id: id.to_string(), segments: parts.len() }),
    };
    let gvk = Gvk::from_api_version_and_kind(api_version, kind);
    Ok(ResourceIdentity { group: gvk.group, version: gvk.version, kind: gvk.kind, namespace, name: name.to_string() })
}
