// agentd - Hook Tool Wire Format
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// JSON-RPC 2.0 envelope, one JSON object per line, one call per connection.
// Call:  {"jsonrpc":"2.0","id":1,"method":"HookTool.Main","params":{...}}
// Reply: {"jsonrpc":"2.0","id":1,"result":{code,stdout,stderr}}
//    or  {"jsonrpc":"2.0","id":1,"error":{code,message}}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

pub const JSONRPC_VERSION: &str = "2.0";
pub const HOOK_TOOL_METHOD: &str = "HookTool.Main";

pub const BAD_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Longest line either side will read.
pub const MAX_MESSAGE_BYTES: u64 = 16 * 1024 * 1024;

/// A hook-tool invocation forwarded by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub context_id: String,
    pub dir: PathBuf,
    pub command_name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Captured result of running the command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Request,
}

impl Call {
    pub fn new(id: u64, params: Request) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: HOOK_TOOL_METHOD.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Reply {
    pub fn result(id: u64, response: Response) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(response),
            error: None,
        }
    }

    pub fn error(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Write `msg` as a single JSON line and flush.
pub fn write_message<W: Write, T: Serialize>(w: &mut W, msg: &T) -> io::Result<()> {
    let mut line = serde_json::to_vec(msg).map_err(io::Error::other)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()
}

/// Read one JSON line. `Ok(None)` means the peer closed without sending.
pub fn read_message<R: BufRead, T: DeserializeOwned>(r: &mut R) -> io::Result<Option<T>> {
    let mut line = Vec::new();
    let n = r.by_ref().take(MAX_MESSAGE_BYTES).read_until(b'\n', &mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') && n as u64 >= MAX_MESSAGE_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }
    serde_json::from_slice(&line)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn call_keeps_awkward_arguments_intact() {
        let req = Request {
            context_id: "ctx-1".into(),
            dir: PathBuf::from("/var/lib/agentd/charm"),
            command_name: "relation-set".into(),
            args: vec!["key=two words".into(), "line\nbreak".into(), "".into(), "--".into()],
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &Call::new(7, req.clone())).unwrap();
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let call: Call = read_message(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(call.id, 7);
        assert_eq!(call.method, HOOK_TOOL_METHOD);
        assert_eq!(call.params, req);
    }

    #[test]
    fn error_reply_omits_result() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Reply::error(1, BAD_REQUEST, "bad request: nope")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("\"result\""));
        assert!(text.contains("\"code\":-32600"));
    }

    #[test]
    fn eof_is_none() {
        let got: Option<Reply> = read_message(&mut Cursor::new(Vec::new())).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn garbage_is_invalid_data() {
        let err = read_message::<_, Call>(&mut Cursor::new(b"not json\n".to_vec())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_line_is_invalid_data() {
        let input = vec![b'a'; MAX_MESSAGE_BYTES as usize + 16];
        let err = read_message::<_, Call>(&mut Cursor::new(input)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "message too large");
    }

    #[test]
    fn missing_params_fields_rejected() {
        let line = br#"{"jsonrpc":"2.0","id":1,"method":"HookTool.Main","params":{"dir":"/"}}"#;
        let mut input = line.to_vec();
        input.push(b'\n');
        assert!(read_message::<_, Call>(&mut Cursor::new(input)).is_err());
    }
}
