//! Local command backend: prompt on stdin, reply on stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{BackendError, CommandBackendConfig, ModelBackend, TRAFFIC_TARGET};

/// Runs a configured command line (shell-style quoting, no shell) once per prompt.
///
/// A non-zero exit status is a failure. Stderr is logged and never parsed. The child is
/// killed when the timeout expires or the calling future is dropped.
#[derive(Clone, Debug)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(config: &CommandBackendConfig, timeout: Duration) -> Result<Self, BackendError> {
        let mut argv = shlex::split(&config.command_line)
            .filter(|argv| !argv.is_empty())
            .ok_or(BackendError::EmptyCommand)?
            .into_iter();
        let program = argv.next().ok_or(BackendError::EmptyCommand)?;
        Ok(Self {
            program,
            args: argv.collect(),
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ModelBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = prompt.as_bytes().to_vec();
            // Commands may exit without draining stdin; the write error is irrelevant then.
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(target: TRAFFIC_TARGET, program = %self.program, "stderr:\n{}", stderr.trim());
        }
        if !output.status.success() {
            return Err(BackendError::Exit(output.status.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(line: &str) -> CommandBackend {
        CommandBackend::new(
            &CommandBackendConfig {
                command_line: line.into(),
            },
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn command_line_is_split_like_a_shell() {
        let b = backend(r#"llm --model "gpt 4" -q"#);
        assert_eq!(b.program(), "llm");
        assert_eq!(b.args(), ["--model", "gpt 4", "-q"]);
    }

    #[test]
    fn empty_or_unbalanced_command_is_rejected() {
        for line in ["", "   ", "\"unterminated"] {
            let err = CommandBackend::new(
                &CommandBackendConfig {
                    command_line: line.into(),
                },
                Duration::from_secs(1),
            )
            .unwrap_err();
            assert!(matches!(err, BackendError::EmptyCommand), "line {line:?}");
        }
    }

    #[tokio::test]
    async fn prompt_is_piped_to_stdin() {
        let reply = backend("cat").complete("{\"echo\": true}").await.unwrap();
        assert_eq!(reply, "{\"echo\": true}");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let err = backend("sh -c 'echo {} ; echo oops >&2 ; exit 3'")
            .complete("p")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Exit(_)));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = backend("definitely-not-a-real-program-acp")
            .complete("p")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[tokio::test]
    async fn hung_command_times_out() {
        let b = CommandBackend::new(
            &CommandBackendConfig {
                command_line: "sleep 5".into(),
            },
            Duration::from_millis(200),
        )
        .unwrap();
        let err = b.complete("p").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
    }
}
