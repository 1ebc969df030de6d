//! Tab location methods.

use tracing::debug;

use crate::error::Result;
use crate::protocol::{BrowsingContextCommand, Command};

use super::Tab;

// ============================================================================
// Tab - Navigation
// ============================================================================

impl Tab {
    /// Reloads the current page.
    pub async fn reload(&self) -> Result<()> {
        debug!(tab_id = %self.inner.tab_id, "Reloading page");
        let command = Command::BrowsingContext(BrowsingContextCommand::Reload);
        self.send_command(command).await?;
        Ok(())
    }

    /// Gets the current URL.
    pub async fn get_url(&self) -> Result<String> {
        let command = Command::BrowsingContext(BrowsingContextCommand::GetUrl);
        let url = self.send_command(command).await?.get_string("url");

        debug!(tab_id = %self.inner.tab_id, url = %url, "Got page URL");
        Ok(url)
    }
}
