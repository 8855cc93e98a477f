//! Plugin process supervision.
//!
//! # Responsibilities
//! - Spawn a plugin executable with piped stdio
//! - Deliver the bootstrap bytes on stdin, then close it
//! - Tail stdout/stderr line by line into a caller-owned `LogSink`
//! - Publish the process state (`Running` → `Exited`) on a watch channel
//!
//! Dropping a `ProcessHandle` kills the process.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};

use crate::chain::LaunchError;

/// Which standard stream a plugin line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// Receives plugin output, one line at a time, tagged with the plugin name.
pub trait LogSink: Send + Sync {
    fn line(&self, plugin: &str, stream: StdStream, line: &str);
}

/// Forwards plugin output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn line(&self, plugin: &str, stream: StdStream, line: &str) {
        match stream {
            StdStream::Stdout => tracing::info!(plugin = %plugin, "{}", line),
            StdStream::Stderr => tracing::warn!(plugin = %plugin, "{}", line),
        }
    }
}

/// Observable state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` when terminated by a signal or when waiting failed.
    Exited(Option<i32>),
}

/// Handle to a spawned plugin process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    state: watch::Receiver<ProcessState>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Assemble a handle; `kill` fires (or is dropped) to stop the process.
    pub fn new(
        pid: Option<u32>,
        state: watch::Receiver<ProcessState>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            pid,
            state,
            kill: Some(kill),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    /// Wait until the process has exited.
    pub async fn wait(&self) -> ProcessState {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if let ProcessState::Exited(_) = current {
                return current;
            }
            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }

    /// Ask the process to stop. Idempotent.
    pub fn terminate(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Spawns plugin processes.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Start `name`, write `stdin` to it, and tail its output into `sink`.
    async fn spawn(
        &self,
        name: &str,
        stdin: Vec<u8>,
        sink: Arc<dyn LogSink>,
    ) -> Result<ProcessHandle, LaunchError>;
}

/// `tokio::process` backed supervisor.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSupervisor;

#[async_trait]
impl ProcessSupervisor for TokioSupervisor {
    async fn spawn(
        &self,
        name: &str,
        stdin: Vec<u8>,
        sink: Arc<dyn LogSink>,
    ) -> Result<ProcessHandle, LaunchError> {
        let mut child = Command::new(name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    LaunchError::NotFound(name.to_string())
                } else {
                    LaunchError::Spawn {
                        name: name.to_string(),
                        source,
                    }
                }
            })?;

        let pid = child.id();
        tracing::debug!(plugin = %name, pid = ?pid, "Plugin process spawned");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(tail(name.to_string(), StdStream::Stdout, stdout, sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(tail(name.to_string(), StdStream::Stderr, stderr, sink));
        }

        let bootstrap_error = |source| LaunchError::Bootstrap {
            name: name.to_string(),
            source,
        };
        let mut pipe = child.stdin.take().ok_or_else(|| {
            bootstrap_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin not captured",
            ))
        })?;
        pipe.write_all(&stdin).await.map_err(bootstrap_error)?;
        pipe.flush().await.map_err(bootstrap_error)?;
        drop(pipe);

        let (state_tx, state_rx) = watch::channel(ProcessState::Running);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let plugin = name.to_string();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    tracing::debug!(plugin = %plugin, "Stopping plugin process");
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(plugin = %plugin, error = %e, "Failed to kill plugin process");
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => {
                    tracing::info!(plugin = %plugin, status = %status, "Plugin process exited");
                    status.code()
                }
                Err(e) => {
                    tracing::error!(plugin = %plugin, error = %e, "Lost track of plugin process");
                    None
                }
            };
            state_tx.send_replace(ProcessState::Exited(code));
        });

        Ok(ProcessHandle::new(pid, state_rx, kill_tx))
    }
}

async fn tail<R>(plugin: String, stream: StdStream, reader: R, sink: Arc<dyn LogSink>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink.line(&plugin, stream, &line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(plugin = %plugin, stream = ?stream, error = %e, "Stopped reading plugin output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<(String, StdStream, String)>>,
    }

    impl LogSink for CollectingSink {
        fn line(&self, plugin: &str, stream: StdStream, line: &str) {
            self.lines
                .lock()
                .unwrap()
                .push((plugin.to_string(), stream, line.to_string()));
        }
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let err = TokioSupervisor
            .spawn("definitely-not-a-plugin-binary", Vec::new(), Arc::new(TracingLogSink))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stdin_delivered_and_output_tagged() {
        // `cat` echoes the bootstrap bytes back on stdout and exits on EOF.
        let sink = Arc::new(CollectingSink::default());
        let handle = TokioSupervisor
            .spawn("cat", b"hello\nworld\n".to_vec(), sink.clone())
            .await
            .unwrap();

        assert_eq!(handle.wait().await, ProcessState::Exited(Some(0)));
        // Output tasks may lag the exit notification slightly.
        for _ in 0..50 {
            if sink.lines.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let lines = sink.lines.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![
                ("cat".to_string(), StdStream::Stdout, "hello".to_string()),
                ("cat".to_string(), StdStream::Stdout, "world".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_terminate_kills_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("idle-plugin");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut handle = TokioSupervisor
            .spawn(script.to_str().unwrap(), Vec::new(), Arc::new(TracingLogSink))
            .await
            .unwrap();
        assert_eq!(handle.state(), ProcessState::Running);

        handle.terminate();
        assert_eq!(handle.wait().await, ProcessState::Exited(None));
    }
}
