// agentd - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Per data-dir agent settings. Optional JSON file, defaults otherwise.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Agent configuration loaded from `<data-dir>/agentd.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub version: String,
    /// File name of the hook-tool socket inside the agent dir
    pub socket_name: String,
    /// Permission bits applied to the socket after binding
    pub socket_mode: u32,
    /// LMDB map size for the state store, in bytes
    pub state_map_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            socket_name: "run.socket".to_string(),
            socket_mode: 0o600,
            state_map_size: 50 * 1024 * 1024,
        }
    }
}

impl AgentConfig {
    /// Load config from JSON file, falling back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            log::debug!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.socket_name.is_empty() || self.socket_name.contains('/') {
            anyhow::bail!("invalid socket_name {:?}: must be a plain file name", self.socket_name);
        }
        if self.socket_mode > 0o777 {
            anyhow::bail!("invalid socket_mode {:o}", self.socket_mode);
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
