//! Core data types for UI actions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ActionError;

/// Anchor descriptor for element targeting
///
/// Serialized as its prefixed string form (`css:#save`, `text:Apply`,
/// `partial:Owner`, `xpath://li`, `aria:button[name='Close']`) so that
/// completion-service output can name targets directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnchorDescriptor {
    /// CSS selector
    Css(String),

    /// XPath expression
    XPath(String),

    /// ARIA/AX role and accessible name
    Aria { role: String, name: String },

    /// Visible text content (exact or partial match)
    Text { content: String, exact: bool },
}

// Constructors trim so that the string form parses back to the same value.
impl AnchorDescriptor {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(trimmed(selector.into()))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: trimmed(content.into()),
            exact: true,
        }
    }

    pub fn partial_text(content: impl Into<String>) -> Self {
        Self::Text {
            content: trimmed(content.into()),
            exact: false,
        }
    }
}

fn trimmed(value: String) -> String {
    match value.trim() {
        t if t.len() == value.len() => value,
        t => t.to_string(),
    }
}

impl fmt::Display for AnchorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorDescriptor::Css(s) => write!(f, "css:{}", s),
            AnchorDescriptor::XPath(s) => write!(f, "xpath:{}", s),
            AnchorDescriptor::Aria { role, name } => write!(f, "aria:{}[name='{}']", role, name),
            AnchorDescriptor::Text { content, exact } => {
                if *exact {
                    write!(f, "text:{}", content)
                } else {
                    write!(f, "partial:{}", content)
                }
            }
        }
    }
}

impl FromStr for AnchorDescriptor {
    type Err = ActionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ActionError::InvalidSelector("empty selector".to_string()));
        }

        let anchor = if let Some(rest) = raw.strip_prefix("css:") {
            AnchorDescriptor::Css(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("xpath:") {
            AnchorDescriptor::XPath(rest.trim().to_string())
        } else if let Some(rest) = raw.strip_prefix("text:") {
            AnchorDescriptor::text(rest.trim())
        } else if let Some(rest) = raw.strip_prefix("partial:") {
            AnchorDescriptor::partial_text(rest.trim())
        } else if let Some(rest) = raw.strip_prefix("aria:") {
            let (role, name) = rest
                .strip_suffix("']")
                .and_then(|body| body.split_once("[name='"))
                .ok_or_else(|| ActionError::InvalidSelector(raw.to_string()))?;
            AnchorDescriptor::Aria {
                role: role.trim().to_string(),
                name: name.to_string(),
            }
        } else {
            AnchorDescriptor::Css(raw.to_string())
        };

        match &anchor {
            AnchorDescriptor::Css(s) | AnchorDescriptor::XPath(s) if s.is_empty() => {
                Err(ActionError::InvalidSelector(raw.to_string()))
            }
            AnchorDescriptor::Text { content, .. } if content.is_empty() => {
                Err(ActionError::InvalidSelector(raw.to_string()))
            }
            _ => Ok(anchor),
        }
    }
}

impl TryFrom<String> for AnchorDescriptor {
    type Error = ActionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnchorDescriptor> for String {
    fn from(anchor: AnchorDescriptor) -> Self {
        anchor.to_string()
    }
}

/// UI events that look benign but are treated as terminal for a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientSignal {
    NewElementAppeared,
    ElementIndexChanged,
    ScrolledUp,
    ScrolledDown,
}

impl fmt::Display for TransientSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransientSignal::NewElementAppeared => "Something new appeared after action",
            TransientSignal::ElementIndexChanged => "Element index changed after action",
            TransientSignal::ScrolledUp => "Scrolled up the page",
            TransientSignal::ScrolledDown => "Scrolled down the page",
        };
        f.write_str(text)
    }
}

/// Post-action signals captured after execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSignals {
    /// URL before the action (if known)
    pub url_before: Option<String>,

    /// URL after the action (if known)
    pub url_after: Option<String>,

    /// Whether the document changed as a result of the action
    pub dom_changed: bool,

    /// Transient events reported by the driver, in observation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transient: Vec<TransientSignal>,
}

impl PostSignals {
    pub fn navigated(&self) -> bool {
        match (&self.url_before, &self.url_after) {
            (Some(before), Some(after)) => before != after,
            _ => false,
        }
    }

    /// No navigation and no DOM update: the control did not respond.
    pub fn is_inert(&self) -> bool {
        !self.navigated() && !self.dom_changed
    }

    pub fn with_transient(mut self, signal: TransientSignal) -> Self {
        self.transient.push(signal);
        self
    }
}

fn default_visible() -> bool {
    true
}

fn default_wait_ms() -> u64 {
    5_000
}

/// Closed set of UI actions the runner can dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    /// Navigate to a URL.
    Navigate { url: String },

    /// Click the target element once.
    Click { target: AnchorDescriptor },

    /// Observe whether the target is visible.
    Query {
        target: AnchorDescriptor,
        #[serde(default = "default_visible")]
        expect_visible: bool,
    },

    /// Wait for the target to become visible within the timeout.
    WaitFor {
        target: AnchorDescriptor,
        #[serde(default = "default_wait_ms")]
        timeout_ms: u64,
    },

    /// Named action resolved through the dispatch table.
    Custom {
        name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl UiAction {
    pub fn click(target: AnchorDescriptor) -> Self {
        Self::Click { target }
    }

    pub fn query(target: AnchorDescriptor) -> Self {
        Self::Query {
            target,
            expect_visible: true,
        }
    }

    pub fn wait_for(target: AnchorDescriptor, timeout_ms: u64) -> Self {
        Self::WaitFor { target, timeout_ms }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UiAction::Navigate { .. } => "navigate",
            UiAction::Click { .. } => "click",
            UiAction::Query { .. } => "query",
            UiAction::WaitFor { .. } => "wait_for",
            UiAction::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for UiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiAction::Navigate { url } => write!(f, "navigate {}", url),
            UiAction::Click { target } => write!(f, "click {}", target),
            UiAction::Query {
                target,
                expect_visible,
            } => {
                if *expect_visible {
                    write!(f, "query {} is visible", target)
                } else {
                    write!(f, "query {} is hidden", target)
                }
            }
            UiAction::WaitFor { target, timeout_ms } => {
                write!(f, "wait for {} ({}ms)", target, timeout_ms)
            }
            UiAction::Custom { name, .. } => write!(f, "custom {}", name),
        }
    }
}

/// Report of a dispatched action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// Post-execution signals (clicks and navigations only)
    pub post_signals: PostSignals,

    /// Visibility observed by a query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_visible: Option<bool>,
}

impl ActionReport {
    pub fn new(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            started_at,
            latency_ms,
            post_signals: PostSignals::default(),
            observed_visible: None,
        }
    }

    pub fn with_signals(mut self, signals: PostSignals) -> Self {
        self.post_signals = signals;
        self
    }

    pub fn with_observation(mut self, visible: bool) -> Self {
        self.observed_visible = Some(visible);
        self
    }
}
