// agentd - Command Registry
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Resolves (context id, command name) to a fresh Command.
// The server only sees the Registry trait; ContextRegistry is the
// agent-side implementation that tracks which hook contexts are live.

use crate::cmd::Command;
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const MAX_FAILURES: usize = 50;

/// Source of commands for the hook-tool server.
pub trait Registry: Send + Sync {
    fn resolve(&self, context_id: &str, command_name: &str) -> Result<Box<dyn Command>>;
}

impl<F> Registry for F
where
    F: Fn(&str, &str) -> Result<Box<dyn Command>> + Send + Sync,
{
    fn resolve(&self, context_id: &str, command_name: &str) -> Result<Box<dyn Command>> {
        self(context_id, command_name)
    }
}

pub type Constructor = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

/// Hook tools an agent can serve, by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Constructor>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Command> + Send + Sync + 'static,
    {
        self.tools.insert(name.to_string(), Arc::new(constructor));
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<&Constructor> {
        self.tools.get(name)
    }
}

/// Record of one live hook context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    pub id: String,
    /// Agent tag the context runs under, e.g. `unit-wordpress-0`
    pub owner: String,
    pub opened: DateTime<Utc>,
    pub invocations: u64,
    pub last_command: Option<String>,
    pub last_invocation: Option<DateTime<Utc>>,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub error: String,
}

impl HookContext {
    pub fn new(id: &str, owner: &str) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            opened: Utc::now(),
            invocations: 0,
            last_command: None,
            last_invocation: None,
            failures: Vec::new(),
        }
    }

    fn record_invocation(&mut self, command: &str) {
        self.invocations += 1;
        self.last_command = Some(command.to_string());
        self.last_invocation = Some(Utc::now());
    }

    fn record_failure(&mut self, command: &str, error: &str) {
        self.failures.push(FailureEntry {
            timestamp: Utc::now(),
            command: command.to_string(),
            error: error.to_string(),
        });
        if self.failures.len() > MAX_FAILURES {
            self.failures.remove(0);
        }
    }
}

/// Registry that only serves contexts explicitly opened by the agent.
pub struct ContextRegistry {
    tools: ToolSet,
    contexts: Mutex<HashMap<String, HookContext>>,
}

impl ContextRegistry {
    pub fn new(tools: ToolSet) -> Self {
        Self {
            tools,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    fn contexts(&self) -> MutexGuard<'_, HashMap<String, HookContext>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting invocations for `id`.
    pub fn open(&self, id: &str, owner: &str) -> Result<()> {
        let mut contexts = self.contexts();
        if contexts.contains_key(id) {
            bail!("context already open: {}", id);
        }
        contexts.insert(id.to_string(), HookContext::new(id, owner));
        log::debug!("hook context {} opened for {}", id, owner);
        Ok(())
    }

    /// Stop accepting invocations for `id`, returning its final record.
    pub fn close(&self, id: &str) -> Option<HookContext> {
        let closed = self.contexts().remove(id);
        if let Some(ctx) = &closed {
            log::debug!("hook context {} closed after {} invocations", id, ctx.invocations);
        }
        closed
    }

    pub fn snapshot(&self, id: &str) -> Option<HookContext> {
        self.contexts().get(id).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }
}

impl Registry for ContextRegistry {
    fn resolve(&self, context_id: &str, command_name: &str) -> Result<Box<dyn Command>> {
        let constructor = {
            let mut contexts = self.contexts();
            let ctx = contexts
                .get_mut(context_id)
                .ok_or_else(|| anyhow!("unknown context: {}", context_id))?;
            match self.tools.get(command_name) {
                Some(constructor) => {
                    ctx.record_invocation(command_name);
                    Arc::clone(constructor)
                }
                None => {
                    let msg = format!("unknown command: {}", command_name);
                    ctx.record_failure(command_name, &msg);
                    bail!(msg);
                }
            }
        };
        Ok(constructor())
    }
}

// ============================================================================
// TESTS
// ============================================================================
