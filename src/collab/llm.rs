//! Completion client: integration with a text-completion LLM
//!
//! Defines the client trait used by the argument extractor. Two
//! implementations:
//! - `CommandCompletionClient`: pipes the prompt through an external command
//!   (e.g. `ollama run dolphin-llama3`) and reads the reply from stdout
//! - `MockCompletionClient`: returns preconfigured replies (testing)

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from completion client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion service not available: {0}")]
    Unavailable(String),
    #[error("completion failed: {0}")]
    InvocationFailed(String),
}

/// Client trait for requesting a completion.
///
/// Abstracts over transport (subprocess, HTTP, mock) so the extractor
/// doesn't depend on how the model is reached.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a prompt, returning the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Runs an external command per prompt: prompt on stdin, reply on stdout.
pub struct CommandCompletionClient {
    program: String,
    args: Vec<String>,
}

impl CommandCompletionClient {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a shell-style command line on whitespace.
    ///
    /// Returns `None` for an empty command line.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl CompletionClient for CommandCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                LlmError::Unavailable(format!("failed to start '{}': {}", self.program, e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| LlmError::Unavailable("no stdin available".to_string()))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| LlmError::Unavailable(format!("failed to write prompt: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LlmError::Unavailable(format!("failed to read reply: {}", e)))?;
        if !output.status.success() {
            return Err(LlmError::InvocationFailed(format!(
                "'{}' exited with {}",
                self.program, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Mock client for testing. Replays queued replies, then a fallback.
pub struct MockCompletionClient {
    available: bool,
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
}

impl MockCompletionClient {
    /// Create a mock client that answers every prompt with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            available: true,
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
        }
    }

    /// Create a mock client that answers with `replies` in order.
    pub fn sequence(replies: Vec<String>) -> Self {
        Self {
            available: true,
            replies: Mutex::new(replies.into()),
            fallback: None,
        }
    }

    /// Create a mock client that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
        }
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        if !self.available {
            return Err(LlmError::Unavailable(
                "mock client configured as unavailable".to_string(),
            ));
        }
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        self.fallback
            .clone()
            .ok_or_else(|| LlmError::InvocationFailed("no mock reply left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_always_repeats_reply() {
        let client = MockCompletionClient::always("hello");
        assert_eq!(client.complete("a").await.unwrap(), "hello");
        assert_eq!(client.complete("b").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn mock_sequence_runs_out() {
        let client = MockCompletionClient::sequence(vec!["one".into()]);
        assert_eq!(client.complete("a").await.unwrap(), "one");
        let err = client.complete("b").await.unwrap_err();
        assert!(matches!(err, LlmError::InvocationFailed(_)));
    }

    #[tokio::test]
    async fn mock_unavailable_client_returns_error() {
        let client = MockCompletionClient::unavailable();
        let err = client.complete("input").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[test]
    fn command_line_split() {
        let client = CommandCompletionClient::from_command_line("ollama run dolphin-llama3")
            .expect("non-empty");
        assert_eq!(client.program, "ollama");
        assert_eq!(client.args, vec!["run", "dolphin-llama3"]);
        assert!(CommandCompletionClient::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_client_echoes_through_cat() {
        let client = CommandCompletionClient::new("cat", Vec::new());
        let reply = client.complete("{\"ok\": true}").await.unwrap();
        assert_eq!(reply, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn command_client_missing_program_is_unavailable() {
        let client = CommandCompletionClient::new("definitely-not-a-real-binary-xyz", Vec::new());
        let err = client.complete("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
