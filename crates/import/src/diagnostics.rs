//! Response envelope: diagnostics on failure, one tagged state on success.

use serde::{Deserialize, Serialize};

use crate::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

impl From<&ImportError> for Diagnostic {
    fn from(e: &ImportError) -> Self {
        Self { severity: Severity::Error, summary: e.summary().to_string(), detail: e.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name exactly as the caller supplied it.
    pub type_name: String,
    /// Serialized imported state.
    pub state: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub diagnostics: Vec<Diagnostic>,
    pub imported: Vec<ImportedResource>,
}

impl ImportResponse {
    pub fn failed(e: &ImportError) -> Self {
        Self { diagnostics: vec![Diagnostic::from(e)], imported: Vec::new() }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}
