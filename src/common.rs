// orgtree/src/common.rs

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// Width of one path segment, in characters.
pub const SEGMENT_WIDTH: usize = 4;

/// Largest sibling index a segment can encode.
pub const MAX_SIBLING_INDEX: u32 = 9999;

/// Opaque record identifier assigned by the store at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

fn default_cache_reads() -> bool {
    true
}
fn default_max_concurrent_writes() -> usize {
    16
}
fn default_write_timeout_ms() -> Option<u64> {
    Some(10_000)
}

/// Configuration for an [`OrgTree`](crate::tree::OrgTree) engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Serve read queries from the owned snapshot cache instead of hitting
    /// the store on every call.
    #[serde(default = "default_cache_reads")]
    pub cache_reads: bool,
    /// How many independent writes of one step may be in flight at once.
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
    /// Per-write deadline. `None` leaves timeouts entirely to the store.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: Option<u64>,
    /// Organisational level labels used by this deployment. Never interpreted
    /// by the engine.
    #[serde(default)]
    pub levels: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_reads: default_cache_reads(),
            max_concurrent_writes: default_max_concurrent_writes(),
            write_timeout_ms: default_write_timeout_ms(),
            levels: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_writes == 0 {
            return Err(TreeError::Config(
                "maxConcurrentWrites must be at least 1".to_string(),
            ));
        }
        if self.write_timeout_ms == Some(0) {
            return Err(TreeError::Config(
                "writeTimeoutMs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json(r#"{ "levels": ["牧區", "區", "小組"] }"#).unwrap();
        assert!(config.cache_reads);
        assert_eq!(config.max_concurrent_writes, 16);
        assert_eq!(config.write_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.levels.len(), 3);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = EngineConfig::from_json(r#"{ "maxConcurrentWrites": 0 }"#).unwrap_err();
        assert!(matches!(err, TreeError::Config(_)));
    }

    #[test]
    fn null_timeout_disables_deadline() {
        let config = EngineConfig::from_json(r#"{ "writeTimeoutMs": null }"#).unwrap();
        assert_eq!(config.write_timeout(), None);
    }
}
