use kport_core::{AssemblyError, ConversionError, FetchError, ParseError, ResolutionError, SchemaError};

use crate::MANIFEST_TYPE_NAME;

/// Why an import produced no state. The first failing stage wins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("unsupported resource type {0:?}, expected {:?}", MANIFEST_TYPE_NAME)]
    UnsupportedType(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("import canceled: {reason}")]
    Canceled { reason: String },
}

impl ImportError {
    /// One-line summary shown to the operator; `to_string()` is the detail.
    pub fn summary(&self) -> &'static str {
        match self {
            ImportError::UnsupportedType(_) => "Failed to determine resource type",
            ImportError::Parse(_) => "Failed to parse import ID",
            ImportError::Resolution(ResolutionError::UnknownType { .. }) => "Failed to resolve resource type to an API endpoint",
            ImportError::Resolution(ResolutionError::Unreachable { .. }) => "Failed to reach the API server for type discovery",
            ImportError::Fetch(_) => "Failed to get resource from API",
            ImportError::Schema(_) => "Failed to determine resource schema from GVK",
            ImportError::Conversion(_) => "Failed to convert resource to typed value",
            ImportError::Assembly(_) => "Failed to construct imported state",
            ImportError::Canceled { .. } => "Import canceled",
        }
    }

    /// Stable label for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            ImportError::UnsupportedType(_) => "type_name",
            ImportError::Parse(_) => "parse",
            ImportError::Resolution(_) => "resolve",
            ImportError::Fetch(_) => "fetch",
            ImportError::Schema(_) => "schema",
            ImportError::Conversion(_) => "convert",
            ImportError::Assembly(_) => "assemble",
            ImportError::Canceled { .. } => "canceled",
        }
    }
}
