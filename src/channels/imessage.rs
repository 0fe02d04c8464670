//! Messages sink — delivers text through the macOS Messages app via
//! `osascript`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::channels::MessagingSink;
use crate::error::ChannelError;

/// AppleScript taking `(handle, text)` as run arguments, so neither value is
/// ever interpolated into script source.
pub const SEND_SCRIPT: &str = r#"on run argv
    set theBuddy to item 1 of argv
    set theMessage to item 2 of argv
    tell application "Messages"
        set targetService to 1st service whose service type = iMessage
        set targetBuddy to buddy theBuddy of targetService
        send theMessage to targetBuddy
    end tell
end run"#;

/// Sends texts by running [`SEND_SCRIPT`].
#[derive(Debug, Clone)]
pub struct AppleScriptSink {
    program: String,
}

impl AppleScriptSink {
    pub fn new() -> Self {
        Self::with_program("osascript")
    }

    /// Use a different interpreter binary (tests substitute `true`/`false`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AppleScriptSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingSink for AppleScriptSink {
    async fn send_text(&self, handle: &str, text: &str) -> Result<(), ChannelError> {
        tracing::debug!(handle, "Sending message");

        let output = Command::new(&self.program)
            .arg("-e")
            .arg(SEND_SCRIPT)
            .arg(handle)
            .arg(text)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChannelError::SendFailed {
                name: "imessage".into(),
                reason: format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}
