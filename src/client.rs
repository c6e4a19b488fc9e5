// agentd - Hook Tool Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// What a hook tool actually runs: forward argv to the agent over its
// socket, replay the captured output, exit with the remote exit code.
// Environment is read once by the binary and passed in as HookEnv.

use crate::cmd::Context;
use crate::wire::{self, Call, Reply, Request, Response};
use std::io::{self, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const AGENT_SOCKET_VAR: &str = "AGENTD_SOCKET";
pub const CONTEXT_ID_VAR: &str = "AGENTD_CONTEXT_ID";

const CALL_ID: u64 = 1;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} not set")]
    NotSet(&'static str),
    #[error("dial unix {}: {source}", .path.display())]
    Dial { path: PathBuf, source: io::Error },
    #[error("{0}")]
    Remote(String),
    #[error("connection closed before reply")]
    NoReply,
    #[error("reply id {got} does not match call id {want}")]
    IdMismatch { want: u64, got: u64 },
    #[error("reply carries neither result nor error")]
    EmptyReply,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Every client-side failure is an execution failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Session and socket as found in the hook's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookEnv {
    pub context_id: Option<String>,
    pub socket_path: Option<String>,
}

impl HookEnv {
    pub fn from_env() -> Self {
        Self {
            context_id: std::env::var(CONTEXT_ID_VAR).ok(),
            socket_path: std::env::var(AGENT_SOCKET_VAR).ok(),
        }
    }

    pub fn new(context_id: &str, socket_path: &str) -> Self {
        Self {
            context_id: Some(context_id.to_string()),
            socket_path: Some(socket_path.to_string()),
        }
    }
}

/// Empty counts as unset.
fn require<'e>(value: &'e Option<String>, var: &'static str) -> Result<&'e str, ClientError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ClientError::NotSet(var)),
    }
}

/// One call on a fresh connection.
pub fn call(socket_path: &Path, request: Request) -> Result<Response, ClientError> {
    let mut stream = UnixStream::connect(socket_path).map_err(|source| ClientError::Dial {
        path: socket_path.to_path_buf(),
        source,
    })?;
    wire::write_message(&mut stream, &Call::new(CALL_ID, request))?;
    let reply: Reply = wire::read_message(&mut BufReader::new(stream))?.ok_or(ClientError::NoReply)?;
    if reply.id != CALL_ID {
        return Err(ClientError::IdMismatch {
            want: CALL_ID,
            got: reply.id,
        });
    }
    match (reply.result, reply.error) {
        (_, Some(err)) => Err(ClientError::Remote(err.message)),
        (Some(response), None) => Ok(response),
        (None, None) => Err(ClientError::EmptyReply),
    }
}

fn forward(command_name: &str, args: &[String], env: &HookEnv, ctx: &Context<'_>) -> Result<Response, ClientError> {
    let context_id = require(&env.context_id, CONTEXT_ID_VAR)?;
    let socket_path = require(&env.socket_path, AGENT_SOCKET_VAR)?;
    let request = Request {
        context_id: context_id.to_string(),
        dir: ctx.dir.clone(),
        command_name: command_name.to_string(),
        args: args.to_vec(),
    };
    call(Path::new(socket_path), request)
}

/// Run `command_name` remotely and return the exit code to use.
pub fn main(command_name: &str, args: &[String], env: &HookEnv, ctx: &mut Context<'_>) -> i32 {
    match forward(command_name, args, env, ctx) {
        Ok(response) => {
            let _ = ctx.stdout.write_all(response.stdout.as_bytes());
            let _ = ctx.stderr.write_all(response.stderr.as_bytes());
            response.code
        }
        Err(err) => {
            let _ = writeln!(ctx.stderr, "error: {}", err);
            err.exit_code()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
