// agentd - LMDB State Storage
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Persists agent state to LMDB at <data-dir>/state.
// Used for: the bootstrap record and one record per running agent.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use heed::types::*;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BOOTSTRAP_KEY: &str = "bootstrap";
const AGENT_PREFIX: &str = "agent:";

/// Written once by `bootstrap-state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    pub instance_id: String,
    pub env_config: serde_json::Map<String, serde_json::Value>,
    pub bootstrapped_at: DateTime<Utc>,
}

/// Last known start of a machine or unit agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub tag: String,
    pub pid: u32,
    pub socket_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// LMDB storage for agent state
pub struct AgentStore {
    env: Env,
    /// Main key-value store: string keys → JSON values
    db: Database<Str, Str>,
}

impl AgentStore {
    /// Open or create LMDB at the given path
    pub fn open(path: &Path, map_size: usize) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("cannot create state dir {}", path.display()))?;

        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(2).open(path)? };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some("agent_state"))?;
        wtxn.commit()?;

        log::debug!("state store opened at {:?}", path);
        Ok(Self { env, db })
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut wtxn = self.env.write_txn()?;
        self.db.put(&mut wtxn, key, &json)?;
        wtxn.commit()?;
        Ok(())
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        let rtxn = self.env.read_txn()?;
        match self.db.get(&rtxn, key)? {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    /// Record the bootstrap. Fails if one already exists.
    pub fn save_bootstrap(&self, record: &BootstrapRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let mut wtxn = self.env.write_txn()?;
        if self.db.get(&wtxn, BOOTSTRAP_KEY)?.is_some() {
            anyhow::bail!("state already bootstrapped");
        }
        self.db.put(&mut wtxn, BOOTSTRAP_KEY, &json)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn load_bootstrap(&self) -> Result<Option<BootstrapRecord>> {
        self.get_json(BOOTSTRAP_KEY)
    }

    pub fn save_agent(&self, record: &AgentRecord) -> Result<()> {
        self.put_json(&format!("{}{}", AGENT_PREFIX, record.tag), record)
    }

    pub fn load_agent(&self, tag: &str) -> Result<Option<AgentRecord>> {
        self.get_json(&format!("{}{}", AGENT_PREFIX, tag))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAP_SIZE: usize = 10 * 1024 * 1024;

    fn bootstrap_record() -> BootstrapRecord {
        let mut env_config = serde_json::Map::new();
        env_config.insert("name".into(), serde_json::json!("sample"));
        BootstrapRecord {
            instance_id: "i-0001".into(),
            env_config,
            bootstrapped_at: Utc::now(),
        }
    }

    fn agent(tag: &str) -> AgentRecord {
        AgentRecord {
            tag: tag.into(),
            pid: 4242,
            socket_path: PathBuf::from(format!("/tmp/{}/run.socket", tag)),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn fresh_store_is_not_bootstrapped() -> Result<()> {
        let dir = tempdir()?;
        let store = AgentStore::open(&dir.path().join("state"), MAP_SIZE)?;
        assert!(store.load_bootstrap()?.is_none());
        assert!(store.load_agent("machine-0")?.is_none());
        Ok(())
    }

    #[test]
    fn bootstrap_persists_across_reopen() -> Result<()> {
        let dir = tempdir()?;
        let record = bootstrap_record();
        {
            let store = AgentStore::open(dir.path(), MAP_SIZE)?;
            store.save_bootstrap(&record)?;
        }
        let store = AgentStore::open(dir.path(), MAP_SIZE)?;
        assert_eq!(store.load_bootstrap()?, Some(record));
        Ok(())
    }

    #[test]
    fn second_bootstrap_fails() -> Result<()> {
        let dir = tempdir()?;
        let store = AgentStore::open(dir.path(), MAP_SIZE)?;
        store.save_bootstrap(&bootstrap_record())?;
        let err = store.save_bootstrap(&bootstrap_record()).unwrap_err();
        assert_eq!(err.to_string(), "state already bootstrapped");
        Ok(())
    }

    #[test]
    fn agents_are_keyed_by_tag() -> Result<()> {
        let dir = tempdir()?;
        let store = AgentStore::open(dir.path(), MAP_SIZE)?;
        store.save_agent(&agent("unit-wordpress-0"))?;
        store.save_agent(&agent("machine-1"))?;
        let mut again = agent("machine-1");
        again.pid = 7;
        store.save_agent(&again)?;

        assert_eq!(store.load_agent("unit-wordpress-0")?.map(|a| a.pid), Some(4242));
        assert_eq!(store.load_agent("machine-1")?.map(|a| a.pid), Some(7));
        assert!(store.load_agent("machine-2")?.is_none());
        Ok(())
    }
}
