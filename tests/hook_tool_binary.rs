// agentd - Binary Tests
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Drives the built binary through symlinks, the way hooks reach it,
// against a hook-tool server running inside the test process.

use agentd::cmd::{Command, Context, Info};
use agentd::flags::FlagSet;
use agentd::server::Server;
use anyhow::bail;
use std::io::Write;
use std::os::unix::fs::symlink;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{self, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

const EXPECT_USAGE: &str = "usage: remote [options]
purpose: test hook tool

options:
--error (= \"\")
    if set, fail

here is some documentation
";

#[derive(Default)]
struct RemoteCommand {
    msg: String,
}

impl Command for RemoteCommand {
    fn info(&self) -> Info {
        Info::new("remote", "test hook tool", "here is some documentation")
    }

    fn set_flags<'a>(&'a mut self, flags: &mut FlagSet<'a>) {
        flags.string_var(&mut self.msg, "error", "", "if set, fail");
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> anyhow::Result<()> {
        if !self.msg.is_empty() {
            bail!("{}", self.msg);
        }
        writeln!(ctx.stdout, "success!")?;
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    bin_dir: PathBuf,
    server: Arc<Server>,
    runner: Option<JoinHandle<std::io::Result<()>>>,
}

impl Fixture {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir(&bin_dir).unwrap();
        let exe = Path::new(env!("CARGO_BIN_EXE_agentd"));
        for name in ["agentd", "agentc", "remote", "unknown"] {
            symlink(exe, bin_dir.join(name)).unwrap();
        }

        let registry = |context_id: &str, name: &str| -> anyhow::Result<Box<dyn Command>> {
            if context_id != "bill" {
                bail!("bad context: {}", context_id);
            }
            if name != "remote" {
                bail!("bad command: {}", name);
            }
            Ok(Box::new(RemoteCommand::default()))
        };
        let server = Arc::new(Server::new(registry, dir.path().join("test.sock")).unwrap());
        let s = Arc::clone(&server);
        let runner = Some(thread::spawn(move || s.run()));
        Self {
            dir,
            bin_dir,
            server,
            runner,
        }
    }

    fn sock(&self) -> String {
        self.server.socket_path().to_str().unwrap().to_string()
    }

    /// Run `args[0]` from the link dir with the hook environment; stdout
    /// and stderr come back combined, in that order.
    fn run(&self, sock: &str, context_id: &str, args: &[&str]) -> (i32, String) {
        let work = self.dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let mut cmd = if args[0].contains('/') {
            process::Command::new(args[0])
        } else {
            let mut cmd = process::Command::new(self.bin_dir.join(args[0]));
            cmd.arg0(args[0]);
            cmd
        };
        cmd.args(&args[1..])
            .current_dir(&work)
            .env_clear()
            .stdin(Stdio::null());
        if !sock.is_empty() {
            cmd.env("AGENTD_SOCKET", sock);
        }
        if !context_id.is_empty() {
            cmd.env("AGENTD_CONTEXT_ID", context_id);
        }
        let output = cmd.output().unwrap();
        let mut text = String::from_utf8(output.stdout).unwrap();
        text.push_str(&String::from_utf8(output.stderr).unwrap());
        (output.status.code().unwrap_or(-1), text)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.server.close();
        if let Some(runner) = self.runner.take() {
            let _ = runner.join();
        }
    }
}

fn last_line(text: &str) -> &str {
    text.trim_end_matches('\n').rsplit('\n').next().unwrap_or("")
}

#[test]
fn hook_tool_args() {
    let fx = Fixture::start();
    let sock = fx.sock();
    let remote = fx.bin_dir.join("remote");
    let remote = remote.to_str().unwrap();

    let cases: Vec<(Vec<&str>, i32, String)> = vec![
        (vec!["remote"], 0, "success!\n".into()),
        (vec![remote], 0, "success!\n".into()),
        (vec!["remote", "--help"], 0, EXPECT_USAGE.into()),
        (vec!["unknown"], 1, "error: bad request: bad command: unknown\n".into()),
        (vec!["remote", "--error", "borken"], 1, "error: borken\n".into()),
        (
            vec!["remote", "--unknown"],
            2,
            "error: flag provided but not defined: --unknown\n".into(),
        ),
        (
            vec!["remote", "unwanted"],
            2,
            "error: unrecognized args: [\"unwanted\"]\n".into(),
        ),
    ];
    for (args, code, output) in cases {
        assert_eq!(fx.run(&sock, "bill", &args), (code, output), "args {:?}", args);
    }
}

#[test]
fn passthrough_name_is_refused() {
    let fx = Fixture::start();
    let (code, output) = fx.run(&fx.sock(), "bill", &["agentc", "whatever"]);
    assert_eq!(code, 2);
    assert!(output.starts_with("usage: agentd [options] <command> ...\n"), "{}", output);
    assert!(output.ends_with("\nerror: agentc should not be called directly\n"));
}

#[test]
fn environment_failures() {
    let fx = Fixture::start();
    let sock = fx.sock();
    assert_eq!(
        fx.run(&sock, "", &["remote"]),
        (1, "error: AGENTD_CONTEXT_ID not set\n".into())
    );
    assert_eq!(
        fx.run(&sock, "ben", &["remote"]),
        (1, "error: bad request: bad context: ben\n".into())
    );
    assert_eq!(
        fx.run("", "bill", &["remote"]),
        (1, "error: AGENTD_SOCKET not set\n".into())
    );

    let bad = fx.dir.path().join("bad.sock");
    let (code, output) = fx.run(bad.to_str().unwrap(), "bill", &["remote"]);
    assert_eq!(code, 1);
    assert!(output.starts_with(&format!("error: dial unix {}: ", bad.display())), "{}", output);
}

#[test]
fn agentd_parse_errors() {
    let fx = Fixture::start();
    let check = |args: &[&str], msg: &str| {
        let mut full = vec!["agentd"];
        full.extend_from_slice(args);
        let (code, output) = fx.run("", "", &full);
        assert_eq!(code, 2, "args {:?}: {}", args, output);
        assert_eq!(last_line(&output), format!("error: {}", msg));
    };

    check(&["cavitate"], "unrecognized command: agentd cavitate");
    let cheese = "flag provided but not defined: --cheese";
    check(&["--cheese", "cavitate"], cheese);
    for role in ["bootstrap-state", "unit", "machine"] {
        check(&[role, "--cheese"], cheese);
    }

    let toastie = "unrecognized args: [\"toastie\"]";
    // {"blah":"blah"}
    let env_config = "eyJibGFoIjoiYmxhaCJ9";
    check(
        &["bootstrap-state", "--instance-id", "ii", "--env-config", env_config, "toastie"],
        toastie,
    );
    check(&["unit", "--unit-name", "un/0", "toastie"], toastie);
    check(&["machine", "--machine-id", "42", "toastie"], toastie);
}

#[test]
fn bootstrap_then_refuse_second() {
    let fx = Fixture::start();
    let data_dir = fx.dir.path().join("data");
    let data_dir = data_dir.to_str().unwrap();
    let args = [
        "agentd",
        "bootstrap-state",
        "--data-dir",
        data_dir,
        "--instance-id",
        "i-1",
        "--env-config",
        "eyJibGFoIjoiYmxhaCJ9",
    ];
    assert_eq!(fx.run("", "", &args), (0, String::new()));
    let (code, output) = fx.run("", "", &args);
    assert_eq!(code, 1);
    assert!(output.ends_with("state already bootstrapped\n"), "{}", output);
}
