// agentd - Role Dispatcher
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One binary, many names. Invoked as `agentd` it runs an agent role;
// invoked under any other name it is a hook tool and forwards itself
// to the agent over the socket named in its environment.

use crate::agent::{MachineAgent, UnitAgent};
use crate::bootstrap::BootstrapState;
use crate::client::{self, HookEnv};
use crate::cmd::{self, Command, Context, Info};
use crate::supercommand::SuperCommand;
use std::io::Write;
use std::path::Path;

pub const PROGRAM_NAME: &str = "agentd";
/// Name every hook-tool link points at. Not runnable by itself.
pub const PASSTHROUGH_NAME: &str = "agentc";

const AGENTD_DOC: &str = "
agentd runs the per-machine and per-unit agents of a managed environment.

The same binary also serves as every hook tool: when invoked under a
tool's name it forwards the invocation to the running agent whose socket
is named by AGENTD_SOCKET, in the hook context named by AGENTD_CONTEXT_ID.
";

/// `agentd version`
#[derive(Default)]
pub struct VersionCommand;

impl VersionCommand {
    pub fn current() -> String {
        format!(
            "{}-{}-{}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }
}

impl Command for VersionCommand {
    fn info(&self) -> Info {
        Info::new("version", "print the current version", "")
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        writeln!(ctx.stdout, "{}", Self::current())?;
        Ok(())
    }
}

/// The `agentd` super command with every role registered.
pub fn new_agentd() -> SuperCommand {
    let mut agentd = SuperCommand::new(PROGRAM_NAME, "agent process for managed units and machines", AGENTD_DOC);
    agentd.register(Box::new(BootstrapState::default()));
    agentd.register(Box::new(MachineAgent::default()));
    agentd.register(Box::new(UnitAgent::default()));
    agentd.register(Box::new(VersionCommand));
    agentd
}

/// Route on the basename of `args[0]` and return the exit code.
pub fn main(args: &[String], env: &HookEnv, ctx: &mut Context<'_>) -> i32 {
    let (invoked, rest) = match args.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => (PROGRAM_NAME, args),
    };
    let name = Path::new(invoked)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| invoked.to_string());

    match name.as_str() {
        PROGRAM_NAME => cmd::main(&mut new_agentd(), ctx, rest),
        PASSTHROUGH_NAME => {
            let _ = ctx.stderr.write_all(new_agentd().help_text().as_bytes());
            let _ = writeln!(ctx.stderr, "error: {} should not be called directly", PASSTHROUGH_NAME);
            2
        }
        tool => client::main(tool, rest, env, ctx),
    }
}

// ============================================================================
// TESTS
// ============================================================================
