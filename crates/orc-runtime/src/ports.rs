use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// External collaborator contracts (§6) — the agent invoker and the shell
// command runner are black boxes injected into the Task Executor. Both take
// a cancellation token: `cancel` firing terminates the child rather than
// waiting for it to exit on its own (§5 suspension points (ii) and (iii)).
// ---------------------------------------------------------------------------

/// Outcome of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub stdout: String,
    pub exit_code: i32,
}

impl AgentOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns a named code-writing agent on a prompt. Implementations shell out
/// to a subprocess; this trait treats the agent as a black box.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        agent_name: &str,
        prompt: &str,
        repo_root: &Path,
        cancel: &CancellationToken,
    ) -> AgentOutcome;
}

/// Outcome of one shell command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub combined_output: String,
    pub exit_code: i32,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches a shell command; used for preflight dependency checks, test
/// commands, and version-control queries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, repo_root: &Path, cancel: &CancellationToken) -> CommandOutcome;
}

/// Spawns `command`, reading stdout/stderr concurrently with waiting on
/// exit, and kills the child the moment `cancel` fires.
async fn run_to_completion(mut child: tokio::process::Child, cancel: &CancellationToken) -> (Option<i32>, Vec<u8>, Vec<u8>, bool) {
    let mut stdout_pipe = child.stdout.take().expect("piped stdout");
    let mut stderr_pipe = child.stderr.take().expect("piped stderr");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    tokio::select! {
        status = child.wait() => {
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            (status.ok().and_then(|s| s.code()), stdout, stderr, false)
        }
        _ = cancel.cancelled() => {
            stdout_task.abort();
            stderr_task.abort();
            let _ = child.start_kill();
            (None, Vec::new(), Vec::new(), true)
        }
    }
}

/// `tokio::process`-backed [`CommandRunner`].
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(&self, command: &str, repo_root: &Path, cancel: &CancellationToken) -> CommandOutcome {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(repo_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return CommandOutcome {
                    combined_output: format!("failed to launch command {command:?}: {e}"),
                    exit_code: -1,
                };
            }
        };

        let (code, stdout, stderr, cancelled) = run_to_completion(child, cancel).await;
        if cancelled {
            return CommandOutcome {
                combined_output: format!("command {command:?} cancelled"),
                exit_code: -1,
            };
        }
        let mut combined = String::from_utf8_lossy(&stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&stderr));
        CommandOutcome {
            combined_output: combined,
            exit_code: code.unwrap_or(-1),
        }
    }
}

/// `tokio::process`-backed [`AgentInvoker`] that runs a named agent binary.
pub struct ProcessAgentInvoker {
    pub binary: String,
}

#[async_trait]
impl AgentInvoker for ProcessAgentInvoker {
    async fn invoke(
        &self,
        agent_name: &str,
        prompt: &str,
        repo_root: &Path,
        cancel: &CancellationToken,
    ) -> AgentOutcome {
        let child = Command::new(&self.binary)
            .arg("--agent")
            .arg(agent_name)
            .arg("--prompt")
            .arg(prompt)
            .current_dir(repo_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                return AgentOutcome {
                    stdout: format!("failed to launch agent {agent_name:?}: {e}"),
                    exit_code: -1,
                };
            }
        };

        let (code, stdout, stderr, cancelled) = run_to_completion(child, cancel).await;
        if cancelled {
            return AgentOutcome {
                stdout: format!("agent {agent_name:?} cancelled"),
                exit_code: -1,
            };
        }
        let mut combined = String::from_utf8_lossy(&stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&stderr));
        AgentOutcome {
            stdout: combined,
            exit_code: code.unwrap_or(-1),
        }
    }
}
