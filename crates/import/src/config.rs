use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime knobs for the import pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Upper bound on the network part of an import (type discovery, object read, schema lookup).
    /// Exceeding it cancels the import. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl ImportConfig {
    /// Read `KPORT_FETCH_TIMEOUT_SECS`; unset, unparsable or `0` means no timeout.
    pub fn from_env() -> Self {
        let fetch_timeout = std::env::var("KPORT_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self { fetch_timeout }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }
}
