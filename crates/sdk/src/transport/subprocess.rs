//! Transport that runs the agent CLI as a child process speaking stream-json.

use super::{Transport, TransportChannels, CHANNEL_CAPACITY};
use crate::options::AgentOptions;
use agentkit_core::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ENTRYPOINT_VAR: &str = "CLAUDE_CODE_ENTRYPOINT";
const ENTRYPOINT: &str = "sdk-rust";
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Launches the agent CLI and exchanges JSON lines over its stdin and stdout.
#[derive(Debug)]
pub struct SubprocessTransport {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl SubprocessTransport {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            env: BTreeMap::new(),
            cancel: CancellationToken::new(),
            reader: None,
        }
    }

    pub fn from_options(options: &AgentOptions) -> AgentResult<Self> {
        let mut transport = Self::new(options.cli_program(), options.to_cli_args()?);
        transport.cwd = options.cwd.clone();
        transport.env = options.env.clone();
        Ok(transport)
    }

    fn spawn(&self) -> AgentResult<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .env(ENTRYPOINT_VAR, ENTRYPOINT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AgentError::Configuration(format!(
                "agent CLI not found at '{}'",
                self.program.display()
            )),
            _ => AgentError::Transport(format!(
                "failed to start '{}': {}",
                self.program.display(),
                e
            )),
        })
    }
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> AgentResult<TransportChannels> {
        if self.reader.is_some() {
            return Err(AgentError::Transport("transport already connected".to_string()));
        }

        let mut child = self.spawn()?;
        info!(program = %self.program.display(), pid = ?child.id(), "Agent process started");

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(AgentError::Transport(
                "agent process pipes unavailable".to_string(),
            ));
        };

        let (outbound_tx, outbound_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<AgentResult<Value>>(CHANNEL_CAPACITY);

        tokio::spawn(write_lines(stdin, outbound_rx));
        let stderr_task = tokio::spawn(collect_stderr(stderr));

        let cancel = self.cancel.clone();
        self.reader = Some(tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let mut buf = Vec::new();

            loop {
                buf.clear();
                let read = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Stopping agent process");
                        let _ = child.kill().await;
                        return;
                    }
                    read = stdout.read_until(b'\n', &mut buf) => read,
                };

                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let message = match std::str::from_utf8(&buf) {
                            Ok(line) => {
                                let line = line.trim();
                                if line.is_empty() {
                                    continue;
                                }
                                serde_json::from_str::<Value>(line).map_err(|e| {
                                    AgentError::Protocol(format!(
                                        "invalid JSON from agent: {}: {}",
                                        e, line
                                    ))
                                })
                            }
                            Err(e) => Err(AgentError::Protocol(format!(
                                "agent output is not UTF-8: {}",
                                e
                            ))),
                        };
                        if inbound_tx.send(message).await.is_err() {
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = inbound_tx
                            .send(Err(AgentError::Transport(format!(
                                "failed to read agent output: {}",
                                e
                            ))))
                            .await;
                        let _ = child.kill().await;
                        return;
                    }
                }
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();
            match status {
                Ok(status) if status.success() => debug!("Agent process exited"),
                Ok(status) => {
                    warn!(exit_code = ?status.code(), "Agent process failed");
                    let _ = inbound_tx
                        .send(Err(AgentError::Process {
                            exit_code: status.code(),
                            stderr,
                        }))
                        .await;
                }
                Err(e) => {
                    let _ = inbound_tx
                        .send(Err(AgentError::Transport(format!(
                            "failed to wait for agent process: {}",
                            e
                        ))))
                        .await;
                }
            }
        }));

        Ok(TransportChannels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }

    async fn close(&mut self) -> AgentResult<()> {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            reader
                .await
                .map_err(|e| AgentError::Transport(format!("reader task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_lines(mut stdin: ChildStdin, mut outbound: mpsc::Receiver<Value>) {
    while let Some(value) = outbound.recv().await {
        let mut line = match serde_json::to_string(&value) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize message for agent");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            warn!(error = %e, "Failed to write to agent stdin");
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!(error = %e, "Failed to flush agent stdin");
            break;
        }
    }
    // Dropping stdin closes the pipe so the agent sees EOF
}

async fn collect_stderr<R: AsyncRead + Unpin>(stderr: R) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "agentkit_sdk::agent_stderr", "{}", line);
        if collected.len() + line.len() < MAX_STDERR_BYTES {
            collected.push_str(&line);
            collected.push('\n');
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_cli_is_configuration_error() {
        let mut transport =
            SubprocessTransport::new("/nonexistent/agentkit-test-cli", Vec::new());
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_json_lines_from_process() {
        let mut transport = SubprocessTransport::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"read line; echo '{"type":"result","subtype":"success"}'"#.to_string(),
            ],
        );
        let mut channels = transport.connect().await.unwrap();

        channels
            .outbound
            .send(serde_json::json!({"type": "user"}))
            .await
            .unwrap();
        let value = channels.inbound.recv().await.unwrap().unwrap();
        assert_eq!(value["type"], "result");

        // Clean exit ends the stream without an error
        assert!(channels.inbound.recv().await.is_none());
        transport.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_reports_process_error() {
        let mut transport = SubprocessTransport::new(
            "sh",
            vec!["-c".to_string(), "echo 'bad credentials' >&2; exit 3".to_string()],
        );
        let mut channels = transport.connect().await.unwrap();

        let err = channels.inbound.recv().await.unwrap().unwrap_err();
        match err {
            AgentError::Process { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("bad credentials"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_json_is_protocol_error() {
        let mut transport =
            SubprocessTransport::new("sh", vec!["-c".to_string(), "echo 'not json'".to_string()]);
        let mut channels = transport.connect().await.unwrap();

        let err = channels.inbound.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_line_does_not_end_stream() {
        let mut transport = SubprocessTransport::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"printf '\377\376 garbage\n{"type":"result","subtype":"success"}\n'"#.to_string(),
            ],
        );
        let mut channels = transport.connect().await.unwrap();

        let err = channels.inbound.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        let value = channels.inbound.recv().await.unwrap().unwrap();
        assert_eq!(value["type"], "result");
        assert!(channels.inbound.recv().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_stops_long_running_process() {
        let mut transport =
            SubprocessTransport::new("sh", vec!["-c".to_string(), "sleep 30".to_string()]);
        let _channels = transport.connect().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), transport.close())
            .await
            .unwrap()
            .unwrap();
    }
}
