// agentd - Logging Setup
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Log flags shared by every agent role, and the one place env_logger
// gets initialized. Hook tools never come through here.

use crate::cmd::Context;
use crate::flags::FlagSet;
use anyhow::Context as _;
use log::LevelFilter;
use std::fs::OpenOptions;

/// `--log-file`, `--verbose` and `--debug`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    pub path: String,
    pub verbose: bool,
    pub debug: bool,
}

impl Log {
    pub fn add_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        let Log { path, verbose, debug } = self;
        flags.string_var(path, "log-file", "", "path to write log to");
        flags.bool_var(verbose, "verbose", false, "if set, log additional messages");
        flags.bool_var(debug, "debug", false, "if set, log debugging messages");
    }

    pub fn level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }

    /// Install the global logger. RUST_LOG wins over the flags; a second
    /// call in the same process is a no-op.
    pub fn start(&self, ctx: &Context<'_>) -> anyhow::Result<()> {
        let level = self.level().as_str().to_ascii_lowercase();
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
        if !self.path.is_empty() {
            let path = ctx.abs_path(&self.path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        let _ = builder.try_init();
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
