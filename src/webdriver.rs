//! W3C WebDriver client implementing [`UiDriver`].
//!
//! Talks plain HTTP/JSON to a WebDriver server (chromedriver, geckodriver,
//! Selenium). Post-action signals come from page snapshots taken before
//! and after each navigation or click: a URL change is navigation, a
//! change in element count or markup size is a DOM change, and a scroll
//! offset change on the same page is reported as a transient signal.

use std::time::Duration;

use action_primitives::{
    poll_for, ActionError, AnchorDescriptor, PostSignals, TransientSignal, UiDriver, WaitPolicy,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::WebDriverConfig;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const SNAPSHOT_SCRIPT: &str = "return [window.location.href, \
     document.getElementsByTagName('*').length, \
     Math.round(window.scrollY || 0), \
     document.documentElement ? document.documentElement.outerHTML.length : 0];";

/// Page state compared across an action.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageSnapshot {
    url: String,
    element_count: u64,
    scroll_y: i64,
    markup_len: u64,
}

impl PageSnapshot {
    fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        Some(Self {
            url: items.first()?.as_str()?.to_string(),
            element_count: items.get(1)?.as_u64()?,
            scroll_y: items.get(2)?.as_i64()?,
            markup_len: items.get(3)?.as_u64()?,
        })
    }

    fn signals_to(&self, after: &PageSnapshot) -> PostSignals {
        let mut signals = PostSignals {
            url_before: Some(self.url.clone()),
            url_after: Some(after.url.clone()),
            dom_changed: self.element_count != after.element_count
                || self.markup_len != after.markup_len,
            transient: Vec::new(),
        };
        if self.url == after.url {
            if after.scroll_y > self.scroll_y {
                signals.transient.push(TransientSignal::ScrolledDown);
            } else if after.scroll_y < self.scroll_y {
                signals.transient.push(TransientSignal::ScrolledUp);
            }
        }
        signals
    }
}

/// One browser session on a WebDriver server.
pub struct WebDriverSession {
    client: Client,
    base: String,
    session_id: String,
    policy: WaitPolicy,
}

impl WebDriverSession {
    /// Open a new session.
    pub async fn connect(settings: &WebDriverConfig, policy: WaitPolicy) -> Result<Self, ActionError> {
        let client = Client::builder()
            .timeout(policy.action_timeout() + Duration::from_secs(30))
            .build()
            .map_err(|err| ActionError::driver(format!("failed to build HTTP client: {err}")))?;
        let base = settings.url.trim_end_matches('/').to_string();

        let response = send(
            &client,
            Method::POST,
            &format!("{}/session", base),
            Some(capabilities(settings)),
        )
        .await?;
        let session_id = response
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::driver("new session response carried no sessionId"))?
            .to_string();

        info!(session = %session_id, server = %base, browser = %settings.browser, "WebDriver session started");
        Ok(Self {
            client,
            base,
            session_id,
            policy,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// End the session and close the browser.
    pub async fn close(&self) -> Result<(), ActionError> {
        self.command(Method::DELETE, "", None).await?;
        info!(session = %self.session_id, "WebDriver session closed");
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ActionError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        send(&self.client, method, &url, body).await
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ActionError> {
        let value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": SNAPSHOT_SCRIPT, "args": [] })),
            )
            .await?;
        PageSnapshot::from_value(&value)
            .ok_or_else(|| ActionError::driver(format!("unexpected snapshot payload: {value}")))
    }

    /// First element matching `target`, without waiting.
    async fn find(&self, target: &AnchorDescriptor) -> Result<Option<String>, ActionError> {
        let (using, value) = locator(target);
        let found = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        Ok(found
            .as_array()
            .and_then(|elements| elements.first())
            .and_then(|element| element.get(ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// First element matching `target` within the action timeout.
    async fn locate(&self, target: &AnchorDescriptor) -> Result<String, ActionError> {
        poll_for(self.policy.action_timeout(), self.policy.poll_interval(), || {
            self.find(target)
        })
        .await?
        .ok_or_else(|| ActionError::not_found(target.to_string()))
    }
}

#[async_trait]
impl UiDriver for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<PostSignals, ActionError> {
        let before = self.snapshot().await?;
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    err
                } else {
                    ActionError::Navigation(format!("{url}: {err}"))
                }
            })?;
        let after = self.snapshot().await?;
        debug!(from = %before.url, to = %after.url, "navigated");
        Ok(before.signals_to(&after))
    }

    async fn click(&self, target: &AnchorDescriptor) -> Result<PostSignals, ActionError> {
        let element = self.locate(target).await?;
        let before = self.snapshot().await?;
        self.command(
            Method::POST,
            &format!("/element/{}/click", element),
            Some(json!({})),
        )
        .await?;
        let after = self.snapshot().await?;
        Ok(before.signals_to(&after))
    }

    async fn query_visible(&self, target: &AnchorDescriptor) -> Result<bool, ActionError> {
        let Some(element) = self.find(target).await? else {
            return Ok(false);
        };
        match self
            .command(Method::GET, &format!("/element/{}/displayed", element), None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            // The element went away between lookup and probe.
            Err(ActionError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.policy.poll_interval()
    }
}

async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, ActionError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.map_err(|err| {
        if err.is_timeout() {
            ActionError::timeout(format!("WebDriver request timed out: {err}"))
        } else {
            ActionError::driver(format!("WebDriver request failed: {err}"))
        }
    })?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|err| ActionError::driver(format!("WebDriver response invalid ({status}): {err}")))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    warn!(%status, code, "WebDriver command failed");
    Err(wire_error(code, message))
}

/// Map a W3C error code onto the action error taxonomy.
fn wire_error(code: &str, message: &str) -> ActionError {
    match code {
        "no such element" | "stale element reference" => ActionError::NotFound(message.to_string()),
        "element not interactable" | "element click intercepted" => {
            ActionError::NotInteractable(message.to_string())
        }
        "timeout" | "script timeout" => ActionError::timeout(message),
        "invalid selector" => ActionError::InvalidSelector(message.to_string()),
        other => ActionError::driver(format!("{other}: {message}")),
    }
}

fn capabilities(settings: &WebDriverConfig) -> Value {
    let mut always = json!({ "browserName": settings.browser });
    if settings.headless {
        always["goog:chromeOptions"] = json!({ "args": ["--headless=new", "--window-size=1920,1080"] });
        always["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
    }
    json!({ "capabilities": { "alwaysMatch": always } })
}

/// W3C location strategy and value for a selector descriptor.
fn locator(target: &AnchorDescriptor) -> (&'static str, String) {
    match target {
        AnchorDescriptor::Css(selector) => ("css selector", selector.clone()),
        AnchorDescriptor::XPath(path) => ("xpath", path.clone()),
        AnchorDescriptor::Text { content, exact } => {
            let literal = xpath_literal(content);
            if *exact {
                ("xpath", format!("//*[normalize-space(text())={literal}]"))
            } else {
                ("xpath", format!("//*[contains(normalize-space(text()), {literal})]"))
            }
        }
        AnchorDescriptor::Aria { role, name } => {
            let role = xpath_literal(role);
            let name = xpath_literal(name);
            (
                "xpath",
                format!(
                    "//*[(@role={role} or local-name()={role}) and (@aria-label={name} or normalize-space(.)={name})]"
                ),
            )
        }
    }
}

/// Quote `text` as an XPath 1.0 string literal.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(url: &str, count: u64, scroll: i64) -> PageSnapshot {
        PageSnapshot {
            url: url.to_string(),
            element_count: count,
            scroll_y: scroll,
            markup_len: count * 10,
        }
    }

    #[test]
    fn xpath_literals_quote_safely() {
        assert_eq!(xpath_literal("Apply"), "'Apply'");
        assert_eq!(xpath_literal("Don't save"), "\"Don't save\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }

    #[test]
    fn text_anchors_become_xpath() {
        assert_eq!(
            locator(&AnchorDescriptor::text("Log in with SSO")),
            ("xpath", "//*[normalize-space(text())='Log in with SSO']".to_string())
        );
        assert_eq!(
            locator(&AnchorDescriptor::partial_text("Owner")),
            ("xpath", "//*[contains(normalize-space(text()), 'Owner')]".to_string())
        );
        assert_eq!(
            locator(&AnchorDescriptor::css("#dashboard")),
            ("css selector", "#dashboard".to_string())
        );
    }

    #[test]
    fn unchanged_page_is_inert() {
        let before = snapshot("https://app/home", 120, 0);
        let signals = before.signals_to(&before.clone());
        assert!(signals.is_inert());
        assert!(signals.transient.is_empty());
    }

    #[test]
    fn scrolling_on_same_page_is_transient() {
        let before = snapshot("https://app/home", 120, 0);
        let signals = before.signals_to(&snapshot("https://app/home", 120, 300));
        assert_eq!(signals.transient, vec![TransientSignal::ScrolledDown]);

        let signals = snapshot("https://app/home", 120, 300).signals_to(&before);
        assert_eq!(signals.transient, vec![TransientSignal::ScrolledUp]);
    }

    #[test]
    fn navigation_resets_scroll_without_transient_signal() {
        let before = snapshot("https://app/home", 120, 500);
        let signals = before.signals_to(&snapshot("https://app/plans", 90, 0));
        assert!(signals.navigated());
        assert!(signals.transient.is_empty());
    }

    #[test]
    fn snapshot_payload_is_decoded() {
        let value = json!(["https://app/home", 42, 10, 2048]);
        assert_eq!(
            PageSnapshot::from_value(&value),
            Some(PageSnapshot {
                url: "https://app/home".to_string(),
                element_count: 42,
                scroll_y: 10,
                markup_len: 2048,
            })
        );
        assert_eq!(PageSnapshot::from_value(&json!({"url": "x"})), None);
    }

    #[test]
    fn wire_errors_map_to_action_errors() {
        assert_eq!(
            wire_error("no such element", "gone"),
            ActionError::NotFound("gone".to_string())
        );
        assert!(wire_error("timeout", "slow").is_timeout());
        assert_eq!(
            wire_error("session not created", "no chrome"),
            ActionError::driver("session not created: no chrome")
        );
    }

    #[test]
    fn headless_capabilities_carry_browser_args() {
        let caps = capabilities(&WebDriverConfig::default());
        assert_eq!(caps["capabilities"]["alwaysMatch"]["browserName"], "chrome");
        assert_eq!(
            caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"][0],
            "--headless=new"
        );
    }
}
