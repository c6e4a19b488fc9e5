// agentd - Flag Sets
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Per-command flag registration and parsing.
// Commands bind their own fields here; clap does the tokenizing.
// Error text mirrors the classic "flag provided but not defined" family
// so hook tools behave like standalone binaries.

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

const HELP_ID: &str = "__help";
const ARGS_ID: &str = "__args";

/// Usage-class failures raised while parsing flags.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("flag: help requested")]
    Help,
    #[error("flag provided but not defined: {0}")]
    Undefined(String),
    #[error("flag needs an argument: {0}")]
    MissingValue(String),
    #[error("invalid value {value:?} for flag {flag}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Other(String),
}

/// A value a flag can be bound to.
pub trait FlagValue {
    /// Replace the value from its command-line text.
    fn set(&mut self, raw: &str) -> Result<(), String>;

    /// Text shown as `(= ...)` in help output.
    fn default_text(&self) -> String;

    fn is_bool(&self) -> bool {
        false
    }
}

impl FlagValue for String {
    fn set(&mut self, raw: &str) -> Result<(), String> {
        *self = raw.to_string();
        Ok(())
    }

    fn default_text(&self) -> String {
        format!("{:?}", self)
    }
}

impl FlagValue for bool {
    fn set(&mut self, raw: &str) -> Result<(), String> {
        *self = match raw {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
            "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
            _ => return Err(format!("cannot parse {:?} as bool", raw)),
        };
        Ok(())
    }

    fn default_text(&self) -> String {
        self.to_string()
    }

    fn is_bool(&self) -> bool {
        true
    }
}

impl FlagValue for u64 {
    fn set(&mut self, raw: &str) -> Result<(), String> {
        *self = raw.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
        Ok(())
    }

    fn default_text(&self) -> String {
        self.to_string()
    }
}

struct Flag<'a> {
    usage: String,
    default: String,
    value: &'a mut dyn FlagValue,
}

/// Flags declared by one command for one invocation.
///
/// Borrows the command's fields for `'a`; drop it before calling `init`.
pub struct FlagSet<'a> {
    name: String,
    flags: BTreeMap<String, Flag<'a>>,
}

impl<'a> FlagSet<'a> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flags: BTreeMap::new(),
        }
    }

    /// Bind `value` to `--name`. Its current content is the default.
    pub fn var(&mut self, value: &'a mut dyn FlagValue, name: &str, usage: &str) {
        let default = value.default_text();
        self.flags.insert(
            name.to_string(),
            Flag {
                usage: usage.to_string(),
                default,
                value,
            },
        );
    }

    pub fn string_var(&mut self, value: &'a mut String, name: &str, default: &str, usage: &str) {
        *value = default.to_string();
        self.var(value, name, usage);
    }

    pub fn bool_var(&mut self, value: &'a mut bool, name: &str, default: bool, usage: &str) {
        *value = default;
        self.var(value, name, usage);
    }

    pub fn u64_var(&mut self, value: &'a mut u64, name: &str, default: u64, usage: &str) {
        *value = default;
        self.var(value, name, usage);
    }

    pub fn has_flags(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Sorted `--name (= default)` lines followed by the indented usage.
    pub fn defaults(&self) -> String {
        let mut out = String::new();
        for (name, flag) in &self.flags {
            let _ = writeln!(out, "{} (= {})", dashed(name), flag.default);
            let _ = writeln!(out, "    {}", flag.usage);
        }
        out
    }

    /// Parse `args`, storing flag values into their bindings.
    ///
    /// Returns the positional arguments left over. With `intersperse`
    /// false, parsing stops at the first positional and everything from
    /// there on is returned verbatim.
    pub fn parse(&mut self, intersperse: bool, args: &[String]) -> Result<Vec<String>, FlagError> {
        let matches = self
            .command(intersperse)
            .try_get_matches_from(args)
            .map_err(flag_error)?;

        if matches.get_flag(HELP_ID) {
            return Err(FlagError::Help);
        }

        for (name, flag) in self.flags.iter_mut() {
            if matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Some(raw) = matches.get_one::<String>(name) {
                flag.value
                    .set(raw)
                    .map_err(|reason| FlagError::InvalidValue {
                        flag: dashed(name),
                        value: raw.clone(),
                        reason,
                    })?;
            }
        }

        let rest = if intersperse {
            matches
                .get_many::<String>(ARGS_ID)
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default()
        } else {
            match matches.subcommand() {
                Some((first, sub)) => {
                    let mut rest = vec![first.to_string()];
                    if let Some(vals) = sub.get_many::<String>("") {
                        rest.extend(vals.cloned());
                    }
                    rest
                }
                None => Vec::new(),
            }
        };
        Ok(rest)
    }

    fn command(&self, intersperse: bool) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .disable_help_subcommand(true)
            .args_override_self(true)
            .arg(
                Arg::new(HELP_ID)
                    .long("help")
                    .short('h')
                    .action(ArgAction::SetTrue),
            );

        for (name, flag) in &self.flags {
            let mut arg = Arg::new(name.clone()).action(ArgAction::Set);
            let mut chars = name.chars();
            arg = match (chars.next(), chars.next()) {
                (Some(c), None) => arg.short(c),
                _ => arg.long(name.clone()),
            };
            arg = if flag.value.is_bool() {
                arg.num_args(0..=1)
                    .require_equals(true)
                    .default_missing_value("true")
            } else {
                arg.num_args(1).allow_hyphen_values(true)
            };
            cmd = cmd.arg(arg);
        }

        if intersperse {
            cmd.arg(Arg::new(ARGS_ID).num_args(0..).action(ArgAction::Append))
        } else {
            cmd.allow_external_subcommands(true)
                .external_subcommand_value_parser(clap::value_parser!(String))
        }
    }
}

fn dashed(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("-{}", name)
    } else {
        format!("--{}", name)
    }
}

/// clap reports unknown tokens raw (`--cheese`) and known args with
/// their value name (`--error <error>`); keep only the flag itself.
fn offending_flag(err: &clap::Error) -> Option<String> {
    match err.get(ContextKind::InvalidArg) {
        Some(ContextValue::String(arg)) => {
            let token = arg.split_whitespace().next().unwrap_or(arg);
            Some(token.split('=').next().unwrap_or(token).to_string())
        }
        _ => None,
    }
}

fn flag_error(err: clap::Error) -> FlagError {
    match (err.kind(), offending_flag(&err)) {
        (ErrorKind::UnknownArgument, Some(flag)) => FlagError::Undefined(flag),
        (ErrorKind::InvalidValue | ErrorKind::NoEquals | ErrorKind::WrongNumberOfValues, Some(flag)) => {
            FlagError::MissingValue(flag)
        }
        (kind, _) => FlagError::Other(kind.as_str().unwrap_or("invalid arguments").to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
