// agentd - Machine and Unit Agents
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The long-running roles. Each one checks the state store was
// bootstrapped, records itself, and serves hook tools on its own
// socket under <data-dir>/agents/<tag>/.

use crate::cmd::{check_empty, Command, Context, Info};
use crate::config::AgentConfig;
use crate::flags::FlagSet;
use crate::paths;
use crate::registry::{ContextRegistry, Registry, ToolSet};
use crate::server::Server;
use crate::storage::{AgentRecord, AgentStore};
use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags every agent role takes.
#[derive(Debug, Clone, Default)]
pub struct AgentConf {
    pub data_dir: String,
}

impl AgentConf {
    pub fn add_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        let default = paths::default_data_dir().to_string_lossy().into_owned();
        flags.string_var(&mut self.data_dir, "data-dir", &default, "directory for agentd state");
    }

    pub(crate) fn check_args(&self, args: Vec<String>) -> Result<()> {
        if self.data_dir.is_empty() {
            bail!("--data-dir option must be set");
        }
        check_empty(&args)
    }
}

pub(crate) fn required(flag: &str) -> anyhow::Error {
    anyhow::anyhow!("--{} option must be set", flag)
}

/// Decimal without sign or leading zeros.
fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
}

/// Lowercase words joined by single hyphens; no word is all digits.
fn is_service_name(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_lowercase())
        && s.split('-').all(|w| {
            !w.is_empty()
                && w.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                && w.chars().any(|c| c.is_ascii_lowercase())
        })
}

pub fn is_unit_name(s: &str) -> bool {
    match s.split_once('/') {
        Some((service, n)) => is_service_name(service) && is_number(n),
        None => false,
    }
}

pub fn machine_tag(id: &str) -> String {
    format!("machine-{}", id)
}

/// `wordpress/0` becomes `unit-wordpress-0`.
pub fn unit_tag(name: &str) -> String {
    format!("unit-{}", name.replace('/', "-"))
}

// ============================================================================
// HOOK TOOLS
// ============================================================================

/// Prints the tag of the agent serving the call.
struct AgentInfoCommand {
    tag: String,
    json: bool,
}

impl Command for AgentInfoCommand {
    fn info(&self) -> Info {
        Info::new("agent-info", "print the serving agent's tag", "")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        flags.bool_var(&mut self.json, "json", false, "print as JSON");
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.json {
            let doc = serde_json::json!({ "tag": self.tag, "pid": std::process::id() });
            writeln!(ctx.stdout, "{}", doc)?;
        } else {
            writeln!(ctx.stdout, "{}", self.tag)?;
        }
        Ok(())
    }
}

/// Hook tools served by the agent tagged `tag`.
pub fn hook_tools(tag: &str) -> ToolSet {
    let mut tools = ToolSet::new();
    let owner = tag.to_string();
    tools.register("agent-info", move || {
        Box::new(AgentInfoCommand {
            tag: owner.clone(),
            json: false,
        })
    });
    tools
}

// ============================================================================
// AGENT STARTUP
// ============================================================================

/// A bound but not yet running agent.
pub struct RunningAgent {
    pub tag: String,
    pub registry: Arc<ContextRegistry>,
    pub server: Server,
    pub store: AgentStore,
}

/// Everything up to accepting connections. The agent's own tag is
/// opened as a standing hook context.
pub fn start_agent(data_dir: PathBuf, tag: &str) -> Result<RunningAgent> {
    let config = AgentConfig::load(&paths::config_path(&data_dir))?;
    let store = AgentStore::open(&paths::state_dir(&data_dir), config.state_map_size)?;
    if store.load_bootstrap()?.is_none() {
        bail!("state at {} is not bootstrapped", data_dir.display());
    }

    let socket_path = paths::socket_path(&data_dir, tag, &config.socket_name);
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let registry = Arc::new(ContextRegistry::new(hook_tools(tag)));
    registry.open(tag, tag)?;
    let shared: Arc<dyn Registry> = registry.clone();
    let server = Server::with_registry(shared, &socket_path)
        .with_context(|| format!("cannot listen on {}", socket_path.display()))?;
    fs::set_permissions(&socket_path, fs::Permissions::from_mode(config.socket_mode))?;

    store.save_agent(&AgentRecord {
        tag: tag.to_string(),
        pid: std::process::id(),
        socket_path,
        started_at: Utc::now(),
    })?;
    log::info!("{} started, hook tools: {}", tag, registry.tool_names().join(", "));
    Ok(RunningAgent {
        tag: tag.to_string(),
        registry,
        server,
        store,
    })
}

impl RunningAgent {
    /// Serve hook tools until the server is closed, then retire the
    /// standing context.
    pub fn serve(&self) -> Result<()> {
        let served = self.server.run();
        if let Some(context) = self.registry.close(&self.tag) {
            log::info!(
                "{} stopped after {} hook tool calls, {} failed",
                self.tag,
                context.invocations,
                context.failures.len()
            );
        }
        served.with_context(|| format!("{} hook tool server failed", self.tag))
    }
}

fn run_agent(conf: &AgentConf, tag: &str, ctx: &Context<'_>) -> Result<()> {
    start_agent(ctx.abs_path(&conf.data_dir), tag)?.serve()
}

// ============================================================================
// ROLES
// ============================================================================

/// `agentd machine`
#[derive(Default)]
pub struct MachineAgent {
    conf: AgentConf,
    machine_id: String,
}

impl Command for MachineAgent {
    fn info(&self) -> Info {
        Info::new("machine", "run an agent for a machine", "")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        let MachineAgent { conf, machine_id } = self;
        conf.add_flags(flags);
        flags.string_var(machine_id, "machine-id", "", "id of the machine to run");
    }

    fn init(&mut self, args: Vec<String>) -> Result<()> {
        if self.machine_id.is_empty() {
            bail!("--machine-id option must be set, and expects a non-negative integer");
        }
        if !is_number(&self.machine_id) {
            bail!("--machine-id option expects a non-negative integer");
        }
        self.conf.check_args(args)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        run_agent(&self.conf, &machine_tag(&self.machine_id), ctx)
    }
}

/// `agentd unit`
#[derive(Default)]
pub struct UnitAgent {
    conf: AgentConf,
    unit_name: String,
}

impl Command for UnitAgent {
    fn info(&self) -> Info {
        Info::new("unit", "run an agent for a unit", "")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        let UnitAgent { conf, unit_name } = self;
        conf.add_flags(flags);
        flags.string_var(unit_name, "unit-name", "", "name of the unit to run");
    }

    fn init(&mut self, args: Vec<String>) -> Result<()> {
        if self.unit_name.is_empty() {
            return Err(required("unit-name"));
        }
        if !is_unit_name(&self.unit_name) {
            bail!("--unit-name option expects \"<service>/<n>\" argument");
        }
        self.conf.check_args(args)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        run_agent(&self.conf, &unit_tag(&self.unit_name), ctx)
    }
}

// ============================================================================
// TESTS
// ============================================================================
