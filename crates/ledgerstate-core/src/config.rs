//! Processor configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use ledgerstate_core::config::ProcessorBuilder;
//!
//! let config = ProcessorBuilder::new()
//!     .max_batch_size(5_000)
//!     .store_timeout_ms(30_000)
//!     .build_config();
//! assert_eq!(config.max_batch_size, 5_000);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Buffered entries above which a processor commits on its own. Shared by
/// every change processor.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100_000;

/// Configuration for a change processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Commit automatically once the compactor holds more than this many
    /// entries.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Deadline for each store call during commit. `None` = no deadline.
    #[serde(default)]
    pub store_timeout_ms: Option<u64>,
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl ProcessorConfig {
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            store_timeout_ms: None,
        }
    }
}

/// Fluent builder for [`ProcessorConfig`].
#[derive(Default)]
pub struct ProcessorBuilder {
    config: ProcessorConfig,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Set the automatic-commit threshold.
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config.max_batch_size = n;
        self
    }

    /// Set the per-call store deadline in milliseconds.
    pub fn store_timeout_ms(mut self, ms: u64) -> Self {
        self.config.store_timeout_ms = Some(ms);
        self
    }

    pub fn build_config(self) -> ProcessorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let cfg = ProcessorBuilder::new().build_config();
        assert_eq!(cfg.max_batch_size, 100_000);
        assert!(cfg.store_timeout().is_none());
    }

    #[test]
    fn deserialize_fills_defaults() {
        let cfg: ProcessorConfig = serde_json::from_str(r#"{"store_timeout_ms": 250}"#).unwrap();
        assert_eq!(cfg.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert_eq!(cfg.store_timeout(), Some(Duration::from_millis(250)));
    }
}
