// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local worker child forked on behalf of a remote controller session
//! (spec §4.10 "forks local workers on their behalf").
//!
//! Structurally a smaller cousin of `distio_controller::local`: no
//! dispatcher, no registry, just a raw stdio pipe the session relays
//! frames across.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use distio_core::{DioError, DioResult, Signal, WorkerId};
use distio_wire::{build_child_args, read_frame, write_frame, ProtocolError};
use parking_lot::Mutex;
use tokio::io::AsyncBufReadExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tracing::warn;

/// Events a forked child reports back to its owning session (spec §4.10
/// "wire its stdout/stderr back to the client ... wire worker exit/close").
#[derive(Debug)]
pub enum ChildEvent {
    Frame(WorkerId, serde_json::Value),
    Stdout(WorkerId, Vec<u8>),
    Stderr(WorkerId, Vec<u8>),
    Exited(WorkerId),
}

/// One local worker process forked on behalf of a remote controller
/// session.
pub struct ChildHandle {
    worker_id: WorkerId,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
}

impl ChildHandle {
    pub async fn spawn(
        root: &Path,
        requested_path: &str,
        args: &[String],
        worker_id: WorkerId,
        alias: &str,
        events: mpsc::UnboundedSender<ChildEvent>,
    ) -> DioResult<Arc<Self>> {
        let script = resolve_script_path(root, requested_path)?;
        let child_args = build_child_args(args, worker_id, alias, None);

        let mut command = tokio::process::Command::new(&script);
        command.args(&child_args);
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| DioError::SpawnFailed(format!("{}: {e}", script.display())))?;
        let stdin = child.stdin.take().ok_or_else(|| DioError::SpawnFailed("no stdin pipe".to_string()))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let handle = Arc::new(Self {
            worker_id,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
        });

        if let Some(stdout) = stdout {
            spawn_reader(worker_id, stdout, events.clone());
        }
        if let Some(stderr) = stderr {
            spawn_stderr_forwarder(worker_id, stderr, events);
        }
        Ok(handle)
    }

    /// Relay a raw JSON frame to the child's stdin, unmodified beyond
    /// whatever the session has already stripped (spec §4.10 "strip
    /// catchAll").
    pub async fn write_frame(&self, value: &serde_json::Value) -> DioResult<()> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else { return Err(DioError::Closed) };
        write_frame(stdin, value).await.map_err(|_| DioError::Disconnected)
    }

    pub fn kill(&self, signal: Signal) -> DioResult<()> {
        let pid = {
            let guard = self.child.lock();
            guard.as_ref().and_then(|c| c.id())
        };
        if let Some(pid) = pid {
            send_signal(pid, signal)?;
        }
        Ok(())
    }

    /// Forceful teardown, used both on session close and on
    /// `killSlavesAfter` expiry (spec §4.10 "Resource limits").
    pub async fn terminate(&self) {
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.start_kill();
        }
    }
}

fn spawn_reader(worker_id: WorkerId, mut stdout: tokio::process::ChildStdout, events: mpsc::UnboundedSender<ChildEvent>) {
    tokio::spawn(async move {
        loop {
            let frame: Result<serde_json::Value, ProtocolError> = read_frame(&mut stdout).await;
            match frame {
                Ok(value) => {
                    if events.send(ChildEvent::Frame(worker_id, value)).is_err() {
                        return;
                    }
                }
                Err(_) => {
                    let _ = events.send(ChildEvent::Exited(worker_id));
                    return;
                }
            }
        }
    });
}

fn spawn_stderr_forwarder(
    worker_id: WorkerId,
    stderr: tokio::process::ChildStderr,
    events: mpsc::UnboundedSender<ChildEvent>,
) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if events.send(ChildEvent::Stderr(worker_id, line.into_bytes())).is_err() {
                return;
            }
        }
    });
}

/// Resolve a requested script path against the proxy's script root,
/// rejecting any path that escapes it (spec §4.10 "Script root").
fn resolve_script_path(root: &Path, requested: &str) -> DioResult<PathBuf> {
    let root_canon = root
        .canonicalize()
        .map_err(|e| DioError::BadArgument(format!("script root {}: {e}", root.display())))?;
    let candidate_canon = root_canon
        .join(requested)
        .canonicalize()
        .map_err(|e| DioError::BadArgument(format!("script path {requested}: {e}")))?;
    if !candidate_canon.starts_with(&root_canon) {
        return Err(DioError::BadArgument(format!("script path {requested} escapes script root")));
    }
    Ok(candidate_canon)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> DioResult<()> {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Sigint => NixSignal::SIGINT,
        Signal::Sigterm => NixSignal::SIGTERM,
        Signal::Sighup => NixSignal::SIGHUP,
        Signal::Sigkill => NixSignal::SIGKILL,
        Signal::Sigbreak => NixSignal::SIGTERM,
        Signal::Sigstop => NixSignal::SIGSTOP,
    };
    signal::kill(Pid::from_raw(pid as i32), nix_signal)
        .map_err(|e| DioError::WorkerError(format!("failed to signal pid {pid}: {e}")))
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) -> DioResult<()> {
    Err(DioError::BadArgument("signal delivery is only supported on unix".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_script_path_rejects_traversal_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.sh"), "#!/bin/sh\n").unwrap();
        let outside = dir.path().parent().unwrap().join("outside.sh");
        std::fs::write(&outside, "#!/bin/sh\n").unwrap();

        assert!(resolve_script_path(dir.path(), "ok.sh").is_ok());
        let err = resolve_script_path(dir.path(), "../outside.sh").unwrap_err();
        assert!(matches!(err, DioError::BadArgument(_)));
        let _ = std::fs::remove_file(&outside);
    }

    #[test]
    fn resolve_script_path_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_script_path(dir.path(), "nope.sh").unwrap_err();
        assert!(matches!(err, DioError::BadArgument(_)));
    }
}
