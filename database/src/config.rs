//! Cache bounds

use crate::error::{DatabaseError, DatabaseResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Soft bounds of the handler cache
///
/// When an insertion takes the cache above `size_max`, least recently used
/// handlers are evicted until at most `size_min` remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub size_min: usize,
    pub size_max: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            size_min: 4096,
            size_max: 8192,
        }
    }
}

impl DatabaseConfig {
    pub const fn new(size_min: usize, size_max: usize) -> Self {
        Self { size_min, size_max }
    }

    pub fn validate(&self) -> DatabaseResult<()> {
        if self.size_max == 0 {
            return Err(DatabaseError::InvalidConfig(
                "size_max must be positive".to_string(),
            ));
        }
        if self.size_min > self.size_max {
            return Err(DatabaseError::InvalidConfig(format!(
                "size_min ({}) exceeds size_max ({})",
                self.size_min, self.size_max
            )));
        }
        Ok(())
    }

    /// Reads and validates a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|err| {
            DatabaseError::InvalidConfig(format!("{}: {}", path.display(), err))
        })?;
        let config: DatabaseConfig = serde_json::from_str(&data).map_err(|err| {
            DatabaseError::InvalidConfig(format!("{}: {}", path.display(), err))
        })?;
        config.validate()?;
        Ok(config)
    }
}
