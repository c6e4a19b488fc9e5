// agentd - Command Abstraction and Driver
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Every invokable unit (agent role or hook tool) implements Command.
// main() is the one harness that parses flags, validates arguments,
// runs the command and turns every outcome into an exit code:
//   0 success | 1 execution failure | 2 usage failure

use crate::flags::{FlagError, FlagSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Identity and help metadata of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    /// Positional synopsis shown after `[options]`, e.g. `<command> ...`
    pub args: String,
    pub purpose: String,
    pub doc: String,
}

impl Info {
    pub fn new(name: &str, purpose: &str, doc: &str) -> Self {
        Self {
            name: name.to_string(),
            args: String::new(),
            purpose: purpose.to_string(),
            doc: doc.to_string(),
        }
    }

    pub fn with_args(mut self, args: &str) -> Self {
        self.args = args.to_string();
        self
    }

    /// Render the usage block for this command and its declared flags.
    pub fn help(&self, flags: &FlagSet<'_>) -> String {
        let mut out = format!("usage: {}", self.name);
        if flags.has_flags() {
            out.push_str(" [options]");
        }
        if !self.args.is_empty() {
            out.push(' ');
            out.push_str(&self.args);
        }
        out.push('\n');
        if !self.purpose.is_empty() {
            out.push_str(&format!("purpose: {}\n", self.purpose));
        }
        if flags.has_flags() {
            out.push_str("\noptions:\n");
            out.push_str(&flags.defaults());
        }
        let doc = self.doc.trim();
        if !doc.is_empty() {
            out.push_str(&format!("\n{}\n", doc));
        }
        out
    }
}

/// Output sinks and working directory for one invocation.
pub struct Context<'a> {
    pub dir: PathBuf,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    pub fn new(dir: impl Into<PathBuf>, stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self {
            dir: dir.into(),
            stdout,
            stderr,
        }
    }

    /// Resolve `path` against the invocation's working directory.
    pub fn abs_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

/// Outcomes the driver treats specially when returned from flag parsing,
/// `init` or `run`.
#[derive(Debug, Error)]
pub enum CmdError {
    /// Help was requested; the text goes to stdout and the exit code is 0.
    #[error("help requested")]
    Help(String),
    /// Usage failure that also prints the full usage text on stderr.
    #[error("{message}")]
    Usage { usage: String, message: String },
    #[error("unrecognized args: {}", quote_args(.0))]
    UnrecognizedArgs(Vec<String>),
    /// Exit with the failure code, the command already reported.
    #[error("")]
    Silent,
}

fn quote_args(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("{:?}", a)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Default `init` for commands taking no positional arguments.
pub fn check_empty(args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CmdError::UnrecognizedArgs(args.to_vec()).into())
    }
}

/// An invokable operation. A fresh value serves exactly one invocation.
pub trait Command {
    fn info(&self) -> Info;

    /// Declare flags, binding them to fields of `self`.
    fn set_flags<'a>(&'a mut self, _flags: &mut FlagSet<'a>) {}

    fn init(&mut self, args: Vec<String>) -> anyhow::Result<()> {
        check_empty(&args)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()>;

    /// Whether flags may appear after positional arguments.
    fn allow_interspersed_flags(&self) -> bool {
        true
    }
}

/// Parse flags declared by `command` out of `args`.
///
/// Help requests come back as `CmdError::Help` carrying the rendered text.
pub fn parse_flags(command: &mut dyn Command, info: &Info, args: &[String]) -> anyhow::Result<Vec<String>> {
    let intersperse = command.allow_interspersed_flags();
    let mut flags = FlagSet::new(&info.name);
    command.set_flags(&mut flags);
    match flags.parse(intersperse, args) {
        Ok(rest) => Ok(rest),
        Err(FlagError::Help) => Err(CmdError::Help(info.help(&flags)).into()),
        Err(e) => Err(e.into()),
    }
}

/// Run `command` with `args` (the program/command name excluded) and
/// return the exit code.
pub fn main(command: &mut dyn Command, ctx: &mut Context<'_>, args: &[String]) -> i32 {
    let info = command.info();
    let rest = match parse_flags(command, &info, args) {
        Ok(rest) => rest,
        Err(err) => return handle_usage_error(ctx, err),
    };
    if let Err(err) = command.init(rest) {
        return handle_usage_error(ctx, err);
    }
    match command.run(ctx) {
        Ok(()) => 0,
        Err(err) => {
            if let Some(CmdError::Help(text)) = err.downcast_ref::<CmdError>() {
                let _ = ctx.stdout.write_all(text.as_bytes());
                return 0;
            }
            if !matches!(err.downcast_ref::<CmdError>(), Some(CmdError::Silent)) {
                let _ = writeln!(ctx.stderr, "error: {:#}", err);
            }
            1
        }
    }
}

fn handle_usage_error(ctx: &mut Context<'_>, err: anyhow::Error) -> i32 {
    match err.downcast_ref::<CmdError>() {
        Some(CmdError::Help(text)) => {
            let _ = ctx.stdout.write_all(text.as_bytes());
            0
        }
        Some(CmdError::Silent) => 2,
        Some(CmdError::Usage { usage, message }) => {
            let _ = ctx.stderr.write_all(usage.as_bytes());
            let _ = writeln!(ctx.stderr, "error: {}", message);
            2
        }
        _ => {
            let _ = writeln!(ctx.stderr, "error: {:#}", err);
            2
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
