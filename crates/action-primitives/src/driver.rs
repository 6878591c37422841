//! The UI action capability consumed by the runner.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ActionError;
use crate::types::{AnchorDescriptor, PostSignals};
use crate::waiting::poll_until;

/// Abstract browser session.
///
/// One driver owns one page. Calls are suspension points: each either
/// completes, or fails with a timeout or lookup error once its bounded
/// wait elapses.
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Load `url` in the session's page.
    async fn navigate(&self, url: &str) -> Result<PostSignals, ActionError>;

    /// Click the element matched by `target` exactly once.
    async fn click(&self, target: &AnchorDescriptor) -> Result<PostSignals, ActionError>;

    /// Report whether `target` is currently visible.
    async fn query_visible(&self, target: &AnchorDescriptor) -> Result<bool, ActionError>;

    /// Interval used by the default [`UiDriver::wait_for`] polling.
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    /// Wait until `target` is visible, failing with a timeout otherwise.
    async fn wait_for(
        &self,
        target: &AnchorDescriptor,
        timeout: Duration,
    ) -> Result<(), ActionError> {
        let visible = poll_until(timeout, self.poll_interval(), || self.query_visible(target)).await?;
        if visible {
            Ok(())
        } else {
            Err(ActionError::timeout(format!(
                "{} not visible within {}ms",
                target,
                timeout.as_millis()
            )))
        }
    }
}
