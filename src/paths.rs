// agentd - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single source of truth for the on-disk layout under a data dir:
//   <data-dir>/agentd.json              agent configuration
//   <data-dir>/state/                   LMDB state store
//   <data-dir>/agents/<tag>/<socket>    hook-tool socket per agent

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static DEFAULT_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Data dir used when `--data-dir` is not given.
///
/// Resolution order:
///   1. AGENTD_DATA_DIR environment variable
///   2. /var/lib/agentd
pub fn default_data_dir() -> &'static Path {
    DEFAULT_DATA_DIR.get_or_init(|| match std::env::var("AGENTD_DATA_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/var/lib/agentd"),
    })
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("agentd.json")
}

pub fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("state")
}

pub fn agent_dir(data_dir: &Path, tag: &str) -> PathBuf {
    data_dir.join("agents").join(tag)
}

pub fn socket_path(data_dir: &Path, tag: &str, socket_name: &str) -> PathBuf {
    agent_dir(data_dir, tag).join(socket_name)
}
