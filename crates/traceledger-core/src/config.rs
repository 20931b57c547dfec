use serde::Deserialize;

use crate::constants::{HASH_HEX_SIZE, POW_TARGET_DIFFICULTY};
use crate::error::LedgerError;

/// How the proof search walks the candidate space.
///
/// Both strategies return the smallest valid proof.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default)]
    pub search: SearchStrategy,
}

fn default_difficulty() -> usize {
    POW_TARGET_DIFFICULTY
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            search: SearchStrategy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty == 0 || self.difficulty > HASH_HEX_SIZE {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be between 1 and {HASH_HEX_SIZE}, got {}",
                self.difficulty
            )));
        }
        Ok(())
    }
}
