use async_trait::async_trait;

use super::LanguageModel;
use crate::error::ModelError;
use crate::pty::PtyManager;

/// Claude Code CLI driven through a pseudo-terminal.
pub struct ClaudeCliModel {
    timeout_secs: u64,
}

impl ClaudeCliModel {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl LanguageModel for ClaudeCliModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let pty = PtyManager::new().with_timeout(self.timeout_secs);
        let prompt = prompt.to_string();
        // The PTY read loop blocks; keep it off the async workers.
        tokio::task::spawn_blocking(move || pty.spawn_claude(&prompt))
            .await
            .map_err(|e| ModelError::IoError(format!("Claude task failed: {e}")))?
    }
}
