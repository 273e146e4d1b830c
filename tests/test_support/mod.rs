#![allow(dead_code)]

pub mod mock_remote;

use serde_json::json;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn today() -> String {
    chrono::Local::now()
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

pub struct Sidecar {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    /// Lines that arrived while waiting for a different response.
    pending: VecDeque<serde_json::Value>,
}

pub fn sidecar_command(envs: &[(&str, &str)]) -> Command {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut cmd = Command::new(exe);
    cmd.env_remove("ROLLCALL_ENDPOINT")
        .env_remove("ROLLCALL_WORKSPACE")
        .env_remove("ROLLCALL_ROSTER")
        .env_remove("ROLLCALL_TIMEOUT_SECS")
        .env("RUST_LOG", "off");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    cmd
}

pub fn spawn_sidecar_with(envs: &[(&str, &str)]) -> Sidecar {
    let mut child = sidecar_command(envs)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin: Some(stdin),
        reader: BufReader::new(stdout),
        pending: VecDeque::new(),
    }
}

pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with(&[])
}

impl Sidecar {
    fn input(&mut self) -> &mut ChildStdin {
        self.stdin.as_mut().expect("stdin already closed")
    }

    fn read_value(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("read response line");
        assert!(!line.trim().is_empty(), "sidecar closed stdout");
        serde_json::from_str(line.trim()).expect("parse response json")
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.input(), "{}", line).expect("write raw line");
        self.input().flush().expect("flush raw line");
        self.read_value()
    }

    /// Writes a request without waiting for its reply.
    pub fn send(&mut self, id: &str, method: &str, params: serde_json::Value) {
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.input(), "{}", payload).expect("write request");
        self.input().flush().expect("flush request");
    }

    pub fn request(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        self.send(id, method, params);

        if let Some(pos) = self
            .pending
            .iter()
            .position(|v| v.get("id").and_then(|v| v.as_str()) == Some(id))
        {
            return self.pending.remove(pos).expect("pending response");
        }
        loop {
            let value = self.read_value();
            if value.get("id").and_then(|v| v.as_str()) == Some(id) {
                return value;
            }
            self.pending.push_back(value);
        }
    }

    pub fn request_ok(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().expect("result")
    }

    /// Sends the request and returns its error code.
    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string()
    }

    /// Next unsolicited notification, waiting for it if needed.
    pub fn next_event(&mut self) -> serde_json::Value {
        if let Some(pos) = self.pending.iter().position(|v| v.get("event").is_some()) {
            return self.pending.remove(pos).expect("pending event");
        }
        loop {
            let value = self.read_value();
            if value.get("event").is_some() {
                return value;
            }
            self.pending.push_back(value);
        }
    }

    /// Notifications already received, without waiting.
    pub fn take_events(&mut self) -> Vec<serde_json::Value> {
        let (events, rest): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|v| v.get("event").is_some());
        self.pending = rest.into();
        events
    }
}

impl Sidecar {
    /// Closes stdin and collects every remaining line until the process exits.
    pub fn close_and_drain(&mut self) -> Vec<serde_json::Value> {
        drop(self.stdin.take());
        let mut out: Vec<serde_json::Value> = self.pending.drain(..).collect();
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).expect("read output line");
            if n == 0 {
                break;
            }
            if !line.trim().is_empty() {
                out.push(serde_json::from_str(line.trim()).expect("parse output json"));
            }
        }
        let status = self.child.wait().expect("wait for rollcalld");
        assert!(status.success(), "rollcalld exited with {}", status);
        out
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
