//! Explicit dispatch table from [`UiAction`] variants to driver calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::driver::UiDriver;
use crate::errors::ActionError;
use crate::types::{ActionReport, PostSignals, UiAction};
use crate::waiting::WaitPolicy;

/// Handler for a named [`UiAction::Custom`] action.
#[async_trait]
pub trait CustomAction: Send + Sync {
    async fn run(&self, driver: &dyn UiDriver, payload: &Value)
        -> Result<PostSignals, ActionError>;
}

/// `pause` custom action: sleeps for `payload.ms` milliseconds, at most `max`.
///
/// Steps such as "Wait for up to 3 seconds" without a target compile to this.
#[derive(Debug, Clone)]
pub struct PauseAction {
    max: Duration,
}

impl PauseAction {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

#[async_trait]
impl CustomAction for PauseAction {
    async fn run(
        &self,
        _driver: &dyn UiDriver,
        payload: &Value,
    ) -> Result<PostSignals, ActionError> {
        let ms = payload.get("ms").and_then(Value::as_u64).unwrap_or(1_000);
        let pause = Duration::from_millis(ms).min(self.max);
        if pause < Duration::from_millis(ms) {
            debug!(requested_ms = ms, max_ms = self.max.as_millis() as u64, "pause capped");
        }
        tokio::time::sleep(pause).await;
        Ok(PostSignals::default())
    }
}

/// Routes actions to the driver. Unknown custom names are a typed error.
#[derive(Clone)]
pub struct ActionDispatcher {
    custom: HashMap<String, Arc<dyn CustomAction>>,
    policy: WaitPolicy,
}

impl ActionDispatcher {
    /// Dispatcher with an empty custom table.
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            custom: HashMap::new(),
            policy,
        }
    }

    /// Dispatcher with the built-in custom actions registered.
    ///
    /// `pause` is bounded by the policy's action timeout.
    pub fn with_builtins(policy: WaitPolicy) -> Self {
        let pause = PauseAction::new(policy.action_timeout());
        Self::new(policy).register("pause", pause)
    }

    pub fn register(mut self, name: impl Into<String>, handler: impl CustomAction + 'static) -> Self {
        self.custom.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    pub fn knows(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    /// Execute one action against the driver.
    pub async fn dispatch(
        &self,
        driver: &dyn UiDriver,
        action: &UiAction,
    ) -> Result<ActionReport, ActionError> {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!(action = %action, "dispatching UI action");

        let report = match action {
            UiAction::Navigate { url } => {
                let signals = driver.navigate(url).await?;
                ActionReport::new(started_at, 0).with_signals(signals)
            }
            UiAction::Click { target } => {
                let signals = driver.click(target).await?;
                ActionReport::new(started_at, 0).with_signals(signals)
            }
            UiAction::Query { target, .. } => {
                let visible = driver.query_visible(target).await?;
                ActionReport::new(started_at, 0).with_observation(visible)
            }
            UiAction::WaitFor { target, timeout_ms } => {
                let bound = Duration::from_millis(*timeout_ms).min(self.policy.action_timeout());
                driver.wait_for(target, bound).await?;
                ActionReport::new(started_at, 0)
            }
            UiAction::Custom { name, payload } => {
                let handler = self
                    .custom
                    .get(name)
                    .ok_or_else(|| ActionError::UnknownAction(name.clone()))?;
                let signals = handler.run(driver, payload).await?;
                ActionReport::new(started_at, 0).with_signals(signals)
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(action = action.kind(), latency_ms, "UI action completed");
        Ok(ActionReport {
            latency_ms,
            ..report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnchorDescriptor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UiDriver for RecordingDriver {
        async fn navigate(&self, url: &str) -> Result<PostSignals, ActionError> {
            self.calls.lock().unwrap().push(format!("navigate {url}"));
            Ok(PostSignals::default())
        }

        async fn click(&self, target: &AnchorDescriptor) -> Result<PostSignals, ActionError> {
            self.calls.lock().unwrap().push(format!("click {target}"));
            Ok(PostSignals {
                dom_changed: true,
                ..PostSignals::default()
            })
        }

        async fn query_visible(&self, target: &AnchorDescriptor) -> Result<bool, ActionError> {
            self.calls.lock().unwrap().push(format!("query {target}"));
            Ok(true)
        }
    }

    #[tokio::test]
    async fn dispatch_routes_variants_to_driver() {
        let driver = RecordingDriver::default();
        let dispatcher = ActionDispatcher::with_builtins(WaitPolicy::default());

        let click = dispatcher
            .dispatch(&driver, &UiAction::click(AnchorDescriptor::text("Apply")))
            .await
            .unwrap();
        assert!(click.post_signals.dom_changed);

        let query = dispatcher
            .dispatch(&driver, &UiAction::query(AnchorDescriptor::css("#nav")))
            .await
            .unwrap();
        assert_eq!(query.observed_visible, Some(true));

        dispatcher
            .dispatch(
                &driver,
                &UiAction::wait_for(AnchorDescriptor::css("#dashboard"), 100),
            )
            .await
            .unwrap();

        let calls = driver.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["click text:Apply", "query css:#nav", "query css:#dashboard"]
        );
    }

    #[tokio::test]
    async fn unknown_custom_action_is_typed_error() {
        let driver = RecordingDriver::default();
        let dispatcher = ActionDispatcher::with_builtins(WaitPolicy::default());
        let err = dispatcher
            .dispatch(
                &driver,
                &UiAction::Custom {
                    name: "drag_and_drop".to_string(),
                    payload: Value::Null,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownAction("drag_and_drop".to_string()));
        assert!(driver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pause_is_registered_as_builtin() {
        let driver = RecordingDriver::default();
        let dispatcher = ActionDispatcher::with_builtins(WaitPolicy::default());
        assert!(dispatcher.knows("pause"));
        dispatcher
            .dispatch(
                &driver,
                &UiAction::Custom {
                    name: "pause".to_string(),
                    payload: serde_json::json!({"ms": 1}),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pause_never_outlasts_action_timeout() {
        let driver = RecordingDriver::default();
        let dispatcher = ActionDispatcher::with_builtins(WaitPolicy {
            action_timeout_ms: 20,
            ..WaitPolicy::default()
        });
        let pause = UiAction::Custom {
            name: "pause".to_string(),
            payload: serde_json::json!({"ms": u64::MAX / 2}),
        };
        let finished =
            tokio::time::timeout(Duration::from_secs(2), dispatcher.dispatch(&driver, &pause)).await;
        assert!(matches!(finished, Ok(Ok(_))));
    }
}
