// agentd - Hook Tool Server
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Owns the agent's unix socket. Each connection carries exactly one
// call, is served on its own thread, and gets exactly one reply
// (unless the call itself cannot be decoded, then it is just dropped).
// No timeouts: a command that never returns keeps only its own thread.

use crate::cmd::{self, Context};
use crate::registry::Registry;
use crate::wire::{
    self, Call, Reply, Request, Response, BAD_REQUEST, HOOK_TOOL_METHOD, MAX_MESSAGE_BYTES, METHOD_NOT_FOUND,
};
use std::fs;
use std::io::{self, BufReader};
use std::os::unix::net::{UnixListener, UnixStream};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CLOSE_POLL: Duration = Duration::from_millis(100);

/// Room left in a message for the JSON-RPC envelope around a Response.
const ENVELOPE_BYTES: u64 = 1024;

#[derive(Default)]
struct RunState {
    running: bool,
    finished: bool,
}

/// Hook-tool server bound to one socket path.
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    registry: Arc<dyn Registry>,
    closing: AtomicBool,
    state: Mutex<RunState>,
    done: Condvar,
}

impl Server {
    /// Bind `socket_path`. Fails if another server is live on it.
    pub fn new<R: Registry + 'static>(registry: R, socket_path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_registry(Arc::new(registry), socket_path)
    }

    pub fn with_registry(registry: Arc<dyn Registry>, socket_path: impl AsRef<Path>) -> io::Result<Self> {
        let socket_path = socket_path.as_ref().to_path_buf();
        let listener = bind_listener(&socket_path)?;
        log::info!("hook tool server listening on {}", socket_path.display());
        Ok(Self {
            socket_path,
            listener,
            registry,
            closing: AtomicBool::new(false),
            state: Mutex::new(RunState::default()),
            done: Condvar::new(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept connections until `close` is called.
    ///
    /// On close the socket is unlinked and connections still queued are
    /// dropped unanswered, then in-flight connections are waited for.
    pub fn run(&self) -> io::Result<()> {
        {
            let mut state = self.state();
            if state.running {
                return Err(io::Error::other("server already running"));
            }
            if self.closing.load(Ordering::SeqCst) {
                return Ok(());
            }
            state.running = true;
        }

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut result = Ok(());
        for stream in self.listener.incoming() {
            if self.closing.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    let spawned = thread::Builder::new()
                        .name("hook-tool-conn".to_string())
                        .spawn(move || serve_conn(stream, registry.as_ref()));
                    match spawned {
                        Ok(handle) => workers.push(handle),
                        Err(e) => log::warn!("cannot spawn connection thread: {}", e),
                    }
                    reap(&mut workers);
                }
                Err(e) => {
                    if !self.closing.load(Ordering::SeqCst) {
                        log::error!("accept on {} failed: {}", self.socket_path.display(), e);
                        result = Err(e);
                    }
                    break;
                }
            }
        }

        if self.closing.load(Ordering::SeqCst) {
            // Unlink before draining: after this no client can queue up.
            if let Err(e) = remove_socket_if_exists(&self.socket_path) {
                log::warn!("cannot remove {}: {}", self.socket_path.display(), e);
            }
            self.drain_backlog();
        }

        for handle in workers {
            let _ = handle.join();
        }

        let mut state = self.state();
        state.finished = true;
        self.done.notify_all();
        result
    }

    /// Stop accepting, unlink the socket, and wait for `run` to drain.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.state();
        while state.running && !state.finished {
            drop(state);
            // Wake the blocking accept; it sees `closing` and stops.
            let _ = UnixStream::connect(&self.socket_path);
            state = self.state();
            if state.finished {
                break;
            }
            state = self
                .done
                .wait_timeout(state, CLOSE_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(state);
        if let Err(e) = remove_socket_if_exists(&self.socket_path) {
            log::warn!("cannot remove {}: {}", self.socket_path.display(), e);
        }
        log::info!("hook tool server on {} closed", self.socket_path.display());
    }

    fn drain_backlog(&self) {
        if let Err(e) = self.listener.set_nonblocking(true) {
            log::warn!("cannot drain {}: {}", self.socket_path.display(), e);
            return;
        }
        let mut dropped = 0;
        while let Ok((stream, _)) = self.listener.accept() {
            drop(stream);
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("dropped {} queued connections on close", dropped);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.closing.swap(true, Ordering::SeqCst) {
            let _ = remove_socket_if_exists(&self.socket_path);
        }
    }
}

fn reap(workers: &mut Vec<JoinHandle<()>>) {
    let (done, live): (Vec<_>, Vec<_>) = workers.drain(..).partition(|h| h.is_finished());
    for handle in done {
        let _ = handle.join();
    }
    *workers = live;
}

/// Bind, replacing a stale socket file but never a live server.
fn bind_listener(socket_path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(socket_path) {
        Ok(listener) => Ok(listener),
        Err(bind_error) if bind_error.kind() == io::ErrorKind::AddrInUse => {
            if UnixStream::connect(socket_path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("hook tool server already running at {}", socket_path.display()),
                ));
            }
            log::warn!("removing stale socket {}", socket_path.display());
            remove_socket_if_exists(socket_path)?;
            UnixListener::bind(socket_path)
        }
        Err(bind_error) => Err(bind_error),
    }
}

fn remove_socket_if_exists(socket_path: &Path) -> io::Result<()> {
    match fs::remove_file(socket_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn serve_conn(mut stream: UnixStream, registry: &dyn Registry) {
    let call: Call = {
        let reader = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("cannot clone connection: {}", e);
                return;
            }
        };
        match wire::read_message(&mut BufReader::new(reader)) {
            Ok(Some(call)) => call,
            // Connection woken by close(), or a client that gave up.
            Ok(None) => return,
            Err(e) => {
                log::warn!("dropping connection, undecodable call: {}", e);
                return;
            }
        }
    };

    let reply = if call.method == HOOK_TOOL_METHOD {
        log::debug!(
            "call {} in context {:?} args {:?}",
            call.params.command_name,
            call.params.context_id,
            call.params.args
        );
        match execute(registry, &call.params) {
            Ok(response) => Reply::result(call.id, response),
            Err(message) => {
                log::debug!("rejected: {}", message);
                Reply::error(call.id, BAD_REQUEST, message)
            }
        }
    } else {
        Reply::error(call.id, METHOD_NOT_FOUND, format!("unknown method: {}", call.method))
    };

    if let Err(e) = wire::write_message(&mut stream, &reply) {
        log::warn!("cannot send reply: {}", e);
    }
}

/// Resolve and run one request. `Err` carries the `bad request: ...` text.
pub fn execute(registry: &dyn Registry, req: &Request) -> Result<Response, String> {
    if req.command_name.is_empty() {
        return Err("bad request: command not specified".to_string());
    }
    if !req.dir.is_absolute() {
        return Err("bad request: dir is not absolute".to_string());
    }
    let mut command = registry
        .resolve(&req.context_id, &req.command_name)
        .map_err(|e| format!("bad request: {:#}", e))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let outcome = {
        let mut ctx = Context::new(&req.dir, &mut stdout, &mut stderr);
        panic::catch_unwind(AssertUnwindSafe(|| cmd::main(command.as_mut(), &mut ctx, &req.args)))
    };
    let code = match outcome {
        Ok(code) => code,
        Err(_) => {
            log::error!("hook tool {} panicked", req.command_name);
            stderr.extend_from_slice(b"error: command panicked\n");
            1
        }
    };
    let response = Response {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };
    Ok(cap_response(response, MAX_MESSAGE_BYTES - ENVELOPE_BYTES))
}

/// Replace a response whose encoding exceeds `limit` bytes with a
/// failure the client can still read.
fn cap_response(response: Response, limit: u64) -> Response {
    let size = match serde_json::to_vec(&response) {
        Ok(encoded) => encoded.len() as u64,
        Err(_) => return response,
    };
    if size <= limit {
        return response;
    }
    log::warn!("hook tool output of {} bytes exceeds the {} byte limit", size, limit);
    Response {
        code: 1,
        stdout: String::new(),
        stderr: format!("error: output too large: {} bytes exceeds {} byte limit\n", size, limit),
    }
}

// ============================================================================
// TESTS
// ============================================================================
