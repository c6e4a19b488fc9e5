// agentd - Bootstrap State
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// `agentd bootstrap-state`: first write to a fresh data dir. Machine and
// unit agents refuse to start until this has run.

use crate::agent::{required, AgentConf};
use crate::cmd::{Command, Context, Info};
use crate::config::AgentConfig;
use crate::flags::FlagSet;
use crate::paths;
use crate::storage::{AgentStore, BootstrapRecord};
use anyhow::{Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::{Map, Value};

#[derive(Default)]
pub struct BootstrapState {
    conf: AgentConf,
    instance_id: String,
    env_config_raw: String,
    env_config: Map<String, Value>,
}

/// base64 text holding a JSON object.
pub fn decode_env_config(raw: &str) -> Result<Map<String, Value>> {
    let bytes = STANDARD.decode(raw.trim()).context("--env-config option is not valid base64")?;
    match serde_json::from_slice(&bytes).context("--env-config option is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("--env-config option must hold a JSON object"),
    }
}

impl Command for BootstrapState {
    fn info(&self) -> Info {
        Info::new("bootstrap-state", "initialize agent state for a new environment", "")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        let BootstrapState {
            conf,
            instance_id,
            env_config_raw,
            ..
        } = self;
        conf.add_flags(flags);
        flags.string_var(instance_id, "instance-id", "", "instance id of this machine");
        flags.string_var(env_config_raw, "env-config", "", "initial environment configuration (base64 encoded JSON)");
    }

    fn init(&mut self, args: Vec<String>) -> Result<()> {
        if self.instance_id.is_empty() {
            return Err(required("instance-id"));
        }
        if self.env_config_raw.is_empty() {
            return Err(required("env-config"));
        }
        self.env_config = decode_env_config(&self.env_config_raw)?;
        self.conf.check_args(args)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let data_dir = ctx.abs_path(&self.conf.data_dir);
        let config_path = paths::config_path(&data_dir);
        let config = AgentConfig::load(&config_path)?;
        let store = AgentStore::open(&paths::state_dir(&data_dir), config.state_map_size)?;
        store
            .save_bootstrap(&BootstrapRecord {
                instance_id: self.instance_id.clone(),
                env_config: std::mem::take(&mut self.env_config),
                bootstrapped_at: Utc::now(),
            })
            .with_context(|| format!("cannot bootstrap {}", data_dir.display()))?;
        if !config_path.exists() {
            config
                .save(&config_path)
                .with_context(|| format!("cannot write {}", config_path.display()))?;
        }
        log::info!("bootstrapped state for instance {}", self.instance_id);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
