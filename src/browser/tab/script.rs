//! JavaScript execution methods.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::protocol::{Command, ScriptCommand, ScriptWorld};

use super::Tab;

// ============================================================================
// Tab - Script Execution
// ============================================================================

impl Tab {
    /// Executes synchronous JavaScript in the bridge's isolated world.
    ///
    /// The script should use `return` to return a value.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let title = tab.execute_script("return document.title").await?;
    /// ```
    pub async fn execute_script(&self, script: &str) -> Result<Value> {
        self.execute_script_in(script, ScriptWorld::Isolated).await
    }

    /// Executes synchronous JavaScript in the given world.
    pub async fn execute_script_in(&self, script: &str, world: ScriptWorld) -> Result<Value> {
        debug!(tab_id = %self.inner.tab_id, script_len = script.len(), ?world, "Executing script");

        let command = Command::Script(ScriptCommand::Evaluate {
            script: script.to_string(),
            args: vec![],
            world,
        });

        let value = self.send_command(command).await?.script_value();
        Ok(value)
    }

    /// Executes asynchronous JavaScript in the isolated world.
    ///
    /// The script should return a Promise. `timeout` bounds the whole round
    /// trip, including the time the promise takes to settle.
    pub async fn execute_async_script(&self, script: &str, timeout: Duration) -> Result<Value> {
        debug!(
            tab_id = %self.inner.tab_id,
            script_len = script.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Executing async script"
        );

        let command = Command::Script(ScriptCommand::EvaluateAsync {
            script: script.to_string(),
            args: vec![],
            world: ScriptWorld::Isolated,
        });

        let value = self
            .send_command_within(command, timeout)
            .await?
            .script_value();
        Ok(value)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Escapes a string for safe use in JavaScript.
pub(crate) fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::json_string;

    #[test]
    fn test_json_string_escapes() {
        assert_eq!(json_string("#page-number"), "\"#page-number\"");
        assert_eq!(json_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(json_string("</script>"), "\"</script>\"");
    }
}
