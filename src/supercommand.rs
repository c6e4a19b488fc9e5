// agentd - Super Command
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// A Command made of named subcommands: `agentd <role> [role options]`.
// Owns the logging flags and starts logging before the role runs.

use crate::cmd::{self, CmdError, Command, Context, Info};
use crate::flags::FlagSet;
use crate::logging::Log;
use std::collections::BTreeMap;

const HELP_PURPOSE: &str = "show help on a command or other topic";

pub struct SuperCommand {
    name: String,
    purpose: String,
    doc: String,
    log: Log,
    subcmds: BTreeMap<String, Box<dyn Command>>,
    selected: Option<String>,
}

impl SuperCommand {
    pub fn new(name: &str, purpose: &str, doc: &str) -> Self {
        Self {
            name: name.to_string(),
            purpose: purpose.to_string(),
            doc: doc.to_string(),
            log: Log::default(),
            subcmds: BTreeMap::new(),
            selected: None,
        }
    }

    /// Add a subcommand under its own `info().name`.
    pub fn register(&mut self, command: Box<dyn Command>) {
        let name = command.info().name;
        self.subcmds.insert(name, command);
    }

    /// `    <name padded> - <purpose>` per subcommand, `help` included.
    fn describe_commands(&self) -> String {
        let mut purposes: BTreeMap<String, String> = self
            .subcmds
            .iter()
            .map(|(name, c)| (name.clone(), c.info().purpose))
            .collect();
        purposes.insert("help".to_string(), HELP_PURPOSE.to_string());
        let width = purposes.keys().map(|n| n.len()).max().unwrap_or(0);
        purposes
            .iter()
            .map(|(name, purpose)| format!("    {:<width$} - {}", name, purpose, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Top-level help, as printed by `--help` or `help`.
    pub fn help_text(&self) -> String {
        let mut log = Log::default();
        let mut flags = FlagSet::new(&self.name);
        log.add_flags(&mut flags);
        self.info().help(&flags)
    }

    fn sub_info(&self, name: &str, sub: &dyn Command) -> Info {
        let mut info = sub.info();
        info.name = format!("{} {}", self.name, name);
        info
    }

    /// Help for one topic, or a usage failure if there is no such topic.
    fn topic_help(&mut self, topic: &str) -> anyhow::Result<String> {
        if topic == "help" {
            let info = Info::new(&format!("{} help", self.name), HELP_PURPOSE, "").with_args("[topic]");
            return Ok(info.help(&FlagSet::new(&info.name)));
        }
        let info = match self.subcmds.get(topic) {
            Some(sub) => self.sub_info(topic, sub.as_ref()),
            None => anyhow::bail!("unknown command or topic for {}", topic),
        };
        let sub = self
            .subcmds
            .get_mut(topic)
            .ok_or_else(|| anyhow::anyhow!("unknown command or topic for {}", topic))?;
        let mut flags = FlagSet::new(&info.name);
        sub.set_flags(&mut flags);
        Ok(info.help(&flags))
    }

    fn usage_error(&self, message: String) -> anyhow::Error {
        CmdError::Usage {
            usage: self.help_text(),
            message,
        }
        .into()
    }
}

impl Command for SuperCommand {
    fn info(&self) -> Info {
        let mut parts = Vec::new();
        let doc = self.doc.trim();
        if !doc.is_empty() {
            parts.push(doc.to_string());
        }
        let commands = self.describe_commands();
        if !commands.is_empty() {
            parts.push(format!("commands:\n{}", commands));
        }
        Info::new(&self.name, &self.purpose, &parts.join("\n\n")).with_args("<command> ...")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        self.log.add_flags(flags);
    }

    fn init(&mut self, args: Vec<String>) -> anyhow::Result<()> {
        let mut args = args.into_iter();
        let name = match args.next() {
            Some(name) => name,
            None => return Err(self.usage_error("no command specified".to_string())),
        };
        let rest: Vec<String> = args.collect();

        if name == "help" {
            let text = match rest.as_slice() {
                [] => self.help_text(),
                [topic] => self.topic_help(topic)?,
                [_, extra @ ..] => return Err(CmdError::UnrecognizedArgs(extra.to_vec()).into()),
            };
            return Err(CmdError::Help(text).into());
        }

        let info = match self.subcmds.get(&name) {
            Some(sub) => self.sub_info(&name, sub.as_ref()),
            None => return Err(self.usage_error(format!("unrecognized command: {} {}", self.name, name))),
        };
        let sub = self
            .subcmds
            .get_mut(&name)
            .ok_or_else(|| anyhow::anyhow!("unrecognized command: {}", name))?;
        let positional = cmd::parse_flags(sub.as_mut(), &info, &rest)?;
        sub.init(positional)?;
        self.selected = Some(name);
        Ok(())
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        self.log.start(ctx)?;
        let name = self.selected.clone().ok_or_else(|| anyhow::anyhow!("no command specified"))?;
        let sub = self
            .subcmds
            .get_mut(&name)
            .ok_or_else(|| anyhow::anyhow!("unrecognized command: {}", name))?;
        log::debug!("running {} {}", self.name, name);
        sub.run(ctx)
    }

    fn allow_interspersed_flags(&self) -> bool {
        false
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::tests::{run_cmd, RemoteCommand};

    fn sample() -> SuperCommand {
        let mut sc = SuperCommand::new("tool", "do things", "Tool does things.");
        sc.register(Box::new(RemoteCommand::default()));
        sc
    }

    const SAMPLE_HELP: &str = "usage: tool [options] <command> ...
purpose: do things

options:
--debug (= false)
    if set, log debugging messages
--log-file (= \"\")
    path to write log to
--verbose (= false)
    if set, log additional messages

Tool does things.

commands:
    help   - show help on a command or other topic
    remote - test hook tool
";

    #[test]
    fn help_flag_and_help_command_agree() {
        let (code, out, err) = run_cmd(&mut sample(), &["--help"]);
        assert_eq!((code, out.as_str(), err.as_str()), (0, SAMPLE_HELP, ""));
        let (code, out, _) = run_cmd(&mut sample(), &["help"]);
        assert_eq!((code, out.as_str()), (0, SAMPLE_HELP));
    }

    #[test]
    fn subcommand_runs_with_its_flags() {
        assert_eq!(run_cmd(&mut sample(), &["remote"]), (0, "success!\n".into(), String::new()));
        let (code, _, err) = run_cmd(&mut sample(), &["--verbose", "remote", "--error", "borken"]);
        assert_eq!((code, err.as_str()), (1, "error: borken\n"));
    }

    #[test]
    fn subcommand_help_uses_qualified_name() {
        let (code, out, _) = run_cmd(&mut sample(), &["remote", "--help"]);
        assert_eq!(code, 0);
        assert!(out.starts_with("usage: tool remote [options]\npurpose: test hook tool\n"));
        let (_, topic, _) = run_cmd(&mut sample(), &["help", "remote"]);
        assert_eq!(topic, out);
    }

    #[test]
    fn help_on_help_and_unknown_topics() {
        let (code, out, _) = run_cmd(&mut sample(), &["help", "help"]);
        assert_eq!(code, 0);
        assert_eq!(out, "usage: tool help [topic]\npurpose: show help on a command or other topic\n");
        let (code, _, err) = run_cmd(&mut sample(), &["help", "cavitate"]);
        assert_eq!((code, err.as_str()), (2, "error: unknown command or topic for cavitate\n"));
    }

    #[test]
    fn unrecognized_command_prints_help_first() {
        let (code, out, err) = run_cmd(&mut sample(), &["cavitate"]);
        assert_eq!(code, 2);
        assert_eq!(out, "");
        assert_eq!(err, format!("{}error: unrecognized command: tool cavitate\n", SAMPLE_HELP));
    }

    #[test]
    fn missing_command_prints_help_first() {
        let (code, _, err) = run_cmd(&mut sample(), &[]);
        assert_eq!(code, 2);
        assert_eq!(err, format!("{}error: no command specified\n", SAMPLE_HELP));
    }

    #[test]
    fn flag_errors_at_either_level_are_bare() {
        let (code, _, err) = run_cmd(&mut sample(), &["--cheese", "cavitate"]);
        assert_eq!((code, err.as_str()), (2, "error: flag provided but not defined: --cheese\n"));
        let (code, _, err) = run_cmd(&mut sample(), &["remote", "--cheese"]);
        assert_eq!((code, err.as_str()), (2, "error: flag provided but not defined: --cheese\n"));
        let (code, _, err) = run_cmd(&mut sample(), &["remote", "toastie"]);
        assert_eq!((code, err.as_str()), (2, "error: unrecognized args: [\"toastie\"]\n"));
    }
}
