//! Engine configuration.

use serde::{Deserialize, Serialize};
use tollgate_core::DEFAULT_MV_DELIMITER;

/// Tunables fixed at engine construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default resolution policy for template expansion.
    pub strict: bool,
    /// Joins multiple values when a reference has no `|delimiter`.
    pub multivalue_delimiter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strict: false,
            multivalue_delimiter: DEFAULT_MV_DELIMITER.to_string(),
        }
    }
}
