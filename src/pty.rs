//! PTY Manager for Claude Code subprocess management
//!
//! Spawns `claude --print <prompt>` via pseudo-terminal with timeout handling.
//! Claude Code expects an interactive terminal, so plain pipes are not enough.

use std::io::Read;
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use portable_pty::{CommandBuilder, NativePtySystem, PtySize, PtySystem};

use crate::error::ModelError;

/// Default timeout for one completion (2 minutes)
pub const DEFAULT_CLAUDE_TIMEOUT_SECS: u64 = 120;

/// PTY Manager for spawning Claude Code
pub struct PtyManager {
    timeout_secs: u64,
}

impl Default for PtyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PtyManager {
    pub fn new() -> Self {
        Self {
            timeout_secs: DEFAULT_CLAUDE_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check if Claude Code CLI is available
    pub fn is_claude_available() -> bool {
        Command::new("which")
            .arg("claude")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Run one prompt through Claude Code and return its captured output.
    pub fn spawn_claude(&self, prompt: &str) -> Result<String, ModelError> {
        if !Self::is_claude_available() {
            return Err(ModelError::ClaudeCodeNotFound);
        }

        let pty_system = NativePtySystem::default();

        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ModelError::IoError(format!("Failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new("claude");
        cmd.args(["--print", prompt]);

        let _child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ModelError::IoError(format!("Failed to spawn claude: {}", e)))?;

        // Drop the slave to avoid blocking
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ModelError::IoError(format!("Failed to clone PTY reader: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        let timeout = Duration::from_secs(self.timeout_secs);

        thread::spawn(move || {
            let mut output = String::new();
            let mut buf = [0u8; 1024];

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF
                    Ok(n) => output.push_str(&String::from_utf8_lossy(&buf[..n])),
                    Err(_) => break,
                }
            }

            let _ = tx.send(output);
        });

        let output = rx
            .recv_timeout(timeout)
            .map_err(|_| ModelError::Timeout(self.timeout_secs))?;

        classify_output(output)
    }
}

/// Map known failure banners in CLI output to typed errors.
fn classify_output(output: String) -> Result<String, ModelError> {
    let lower = output.to_lowercase();
    if lower.contains("not authenticated")
        || lower.contains("please login")
        || lower.contains("login required")
    {
        return Err(ModelError::ClaudeCodeNotAuthenticated);
    }

    if lower.contains("rate limit") || lower.contains("too many requests") {
        return Err(ModelError::ApiRateLimit);
    }

    // PTYs translate \n into \r\n
    Ok(output.replace("\r\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_banner() {
        let err = classify_output("Error: not authenticated".to_string()).unwrap_err();
        assert!(matches!(err, ModelError::ClaudeCodeNotAuthenticated));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_output("429 Too Many Requests".to_string()).unwrap_err();
        assert!(matches!(err, ModelError::ApiRateLimit));
    }

    #[test]
    fn test_classify_normalizes_line_endings() {
        let out = classify_output("{\"a\":1}\r\n\r\n{\"b\":2}\r\n".to_string()).unwrap();
        assert_eq!(out, "{\"a\":1}\n\n{\"b\":2}\n");
    }

    #[test]
    fn test_with_timeout() {
        assert_eq!(PtyManager::new().with_timeout(5).timeout_secs, 5);
    }
}
