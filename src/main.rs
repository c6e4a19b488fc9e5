// agentd - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Agent roles and hook tools share this binary; the invocation name decides.
// Usage:
//   agentd bootstrap-state --instance-id <id> --env-config <b64>   # Initialize state
//   agentd machine --machine-id <n>                                # Run a machine agent
//   agentd unit --unit-name <service>/<n>                          # Run a unit agent
//   agentd version                                                 # Print version
//   <hook-tool> [args]                                             # Forward to the agent (symlink)

use agentd::client::HookEnv;
use agentd::cmd::Context;
use agentd::dispatch;
use std::io::{self, Write};

fn main() {
    let args: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let env = HookEnv::from_env();

    let dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: cannot get working directory: {}", e);
            std::process::exit(1);
        }
    };

    // Unlocked handles: agent threads log to stderr while a role runs.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let code = {
        let mut ctx = Context::new(dir, &mut stdout, &mut stderr);
        dispatch::main(&args, &env, &mut ctx)
    };
    let _ = stdout.flush();
    let _ = stderr.flush();
    std::process::exit(code);
}
