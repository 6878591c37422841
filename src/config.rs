//! Application configuration
//!
//! One [`Config`] value is loaded at startup (YAML, every field optional)
//! and handed to each component when it is built. Nothing reads process
//! state afterwards except the completion-service key, which is resolved
//! once from the environment variable named in `llm.api_key_env`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use action_primitives::{AnchorDescriptor, WaitPolicy};
use serde::{Deserialize, Serialize};
use spec_compiler::{
    ExecutionPolicy, LoginPreamble, SpecExtractor, DEFAULT_BOUNDARY_MARKER, DEFAULT_MAX_TOKENS,
    DEFAULT_START_MARKER,
};
use url::Url;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub llm: LlmConfig,
    pub login: LoginConfig,
    pub execution: ExecutionConfig,
    pub webdriver: WebDriverConfig,
    pub output: OutputConfig,
}

/// Where the test document lives and how its case section is delimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub start_marker: String,
    pub boundary_marker: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("test_cases.md"),
            start_marker: DEFAULT_START_MARKER.to_string(),
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
        }
    }
}

/// Chat-completions endpoint settings.
///
/// With `api_version` set the endpoint is addressed as an Azure OpenAI
/// resource and `deployment` names the deployment; otherwise `endpoint` is
/// an OpenAI-compatible API base and `deployment` is the model name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub refine_fallbacks: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            deployment: "gpt-4o".to_string(),
            api_version: Some("2024-02-01".to_string()),
            api_key_env: "AZURE_OPENAI_KEY".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            timeout_secs: 120,
            refine_fallbacks: false,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the key from the environment variable named by `api_key_env`.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        match env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ConfigError::MissingSecret(self.api_key_env.clone())),
        }
    }

    /// Checks needed before any completion request is made.
    pub fn require_endpoint(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::empty("llm.endpoint"));
        }
        check_url("llm.endpoint", &self.endpoint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub app_url: String,
    pub account: String,
    pub sso_trigger: String,
    pub mfa_prompt: String,
    pub mfa_denied: String,
    pub mfa_timeout_secs: u64,
    pub mfa_poll_secs: u64,
    /// Prefixed selector (`css:`, `xpath:`, `text:`, `partial:`, `aria:`).
    pub dashboard_selector: String,
    pub dashboard_timeout_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        let preamble = LoginPreamble::new("", "");
        Self {
            app_url: preamble.app_url,
            account: preamble.account,
            sso_trigger: preamble.sso_trigger,
            mfa_prompt: preamble.mfa_prompt,
            mfa_denied: preamble.mfa_denied,
            mfa_timeout_secs: preamble.mfa_timeout.as_secs(),
            mfa_poll_secs: preamble.mfa_poll_interval.as_secs(),
            dashboard_selector: preamble.dashboard.to_string(),
            dashboard_timeout_secs: preamble.dashboard_timeout.as_secs(),
        }
    }
}

impl LoginConfig {
    pub fn dashboard(&self) -> Result<AnchorDescriptor, ConfigError> {
        self.dashboard_selector
            .parse()
            .map_err(|err: action_primitives::ActionError| ConfigError::Selector(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Page each case returns to; the login URL when unset.
    pub home_url: Option<String>,
    pub poll_interval_ms: u64,
    pub action_timeout_ms: u64,
    pub dialog_close_timeout_ms: u64,
    pub recovery_labels: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let wait = WaitPolicy::default();
        Self {
            home_url: None,
            poll_interval_ms: wait.poll_interval_ms,
            action_timeout_ms: wait.action_timeout_ms,
            dialog_close_timeout_ms: wait.dialog_close_timeout_ms,
            recovery_labels: ExecutionPolicy::default().recovery_labels,
        }
    }
}

impl ExecutionConfig {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            poll_interval_ms: self.poll_interval_ms,
            action_timeout_ms: self.action_timeout_ms,
            dialog_close_timeout_ms: self.dialog_close_timeout_ms,
        }
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::standard(self.recovery_labels.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub url: String,
    pub browser: String,
    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_string(),
            browser: "chrome".to_string(),
            headless: true,
        }
    }
}

/// Directory and file names of the persisted artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub extraction_log: String,
    pub report: String,
    pub history: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            extraction_log: "extraction_results.txt".to_string(),
            report: "test_case_results.txt".to_string(),
            history: "run_history.json".to_string(),
        }
    }
}

impl Config {
    /// Structural checks that hold for every command. Values only needed by
    /// `run` (login URL, account) and by the completion client (endpoint,
    /// key) are checked where they are used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.start_marker.trim().is_empty() {
            return Err(ConfigError::empty("source.start_marker"));
        }
        if self.source.boundary_marker.trim().is_empty() {
            return Err(ConfigError::empty("source.boundary_marker"));
        }
        if !self.llm.endpoint.trim().is_empty() {
            check_url("llm.endpoint", &self.llm.endpoint)?;
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(ConfigError::empty("llm.api_key_env"));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::zero("llm.max_tokens"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::zero("llm.timeout_secs"));
        }
        if !self.login.app_url.trim().is_empty() {
            check_url("login.app_url", &self.login.app_url)?;
        }
        if let Some(home) = &self.execution.home_url {
            check_url("execution.home_url", home)?;
        }
        self.login.dashboard()?;
        if self.login.mfa_poll_secs == 0 {
            return Err(ConfigError::zero("login.mfa_poll_secs"));
        }
        if self.execution.poll_interval_ms == 0 {
            return Err(ConfigError::zero("execution.poll_interval_ms"));
        }
        if self.execution.action_timeout_ms == 0 {
            return Err(ConfigError::zero("execution.action_timeout_ms"));
        }
        if self
            .execution
            .recovery_labels
            .iter()
            .all(|label| label.trim().is_empty())
        {
            return Err(ConfigError::empty("execution.recovery_labels"));
        }
        check_url("webdriver.url", &self.webdriver.url)?;
        Ok(())
    }

    pub fn extractor(&self) -> SpecExtractor {
        SpecExtractor::new(
            self.source.start_marker.clone(),
            self.source.boundary_marker.clone(),
        )
    }

    /// Login parameters; the login URL and account are mandatory here.
    pub fn login_preamble(&self) -> Result<LoginPreamble, ConfigError> {
        if self.login.app_url.trim().is_empty() {
            return Err(ConfigError::empty("login.app_url"));
        }
        check_url("login.app_url", &self.login.app_url)?;
        if self.login.account.trim().is_empty() {
            return Err(ConfigError::empty("login.account"));
        }

        let mut preamble = LoginPreamble::new(self.login.app_url.trim(), self.login.account.trim())
            .with_dashboard(self.login.dashboard()?);
        preamble.sso_trigger = self.login.sso_trigger.clone();
        preamble.mfa_prompt = self.login.mfa_prompt.clone();
        preamble.mfa_denied = self.login.mfa_denied.clone();
        preamble.mfa_timeout = Duration::from_secs(self.login.mfa_timeout_secs);
        preamble.mfa_poll_interval = Duration::from_secs(self.login.mfa_poll_secs);
        preamble.dashboard_timeout = Duration::from_secs(self.login.dashboard_timeout_secs);
        Ok(preamble)
    }

    pub fn home_url(&self) -> String {
        self.execution
            .home_url
            .clone()
            .unwrap_or_else(|| self.login.app_url.trim().to_string())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value.trim())
        .map(|_| ())
        .map_err(|err| ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_carry_documented_values() {
        let config = Config::default();
        assert_eq!(config.source.start_marker, "### TEST CASES:");
        assert_eq!(config.source.boundary_marker, "---");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.login.sso_trigger, "Log in with SSO");
        assert_eq!(config.login.mfa_timeout_secs, 300);
        assert_eq!(config.login.mfa_poll_secs, 5);
        assert_eq!(config.login.dashboard_timeout_secs, 10);
        assert_eq!(config.execution.recovery_labels, vec!["Cancel", "Close", "Exit"]);
        assert_eq!(config.output.report, "test_case_results.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = r#"
login:
  app_url: https://app.example.com/login
  account: qa@example.com
execution:
  recovery_labels: [Dismiss]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.login.mfa_prompt, "Approve sign in request");
        assert_eq!(config.execution.action_timeout_ms, 10_000);
        assert_eq!(config.home_url(), "https://app.example.com/login");

        let preamble = config.login_preamble().unwrap();
        assert_eq!(preamble.account, "qa@example.com");
        assert_eq!(preamble.dashboard, AnchorDescriptor::css("#dashboard"));
        assert_eq!(
            config.execution.execution_policy().recovery_labels,
            vec!["Dismiss".to_string()]
        );
    }

    #[test]
    fn login_preamble_requires_url_and_account() {
        let mut config = Config::default();
        assert_eq!(
            config.login_preamble().unwrap_err(),
            ConfigError::empty("login.app_url")
        );
        config.login.app_url = "https://app.example.com".to_string();
        assert_eq!(
            config.login_preamble().unwrap_err(),
            ConfigError::empty("login.account")
        );
    }

    #[test]
    fn validation_reports_bad_values() {
        let mut config = Config::default();
        config.login.dashboard_selector = "aria:button".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Selector(_))));

        let mut config = Config::default();
        config.llm.endpoint = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "llm.endpoint", .. })
        ));

        let mut config = Config::default();
        config.execution.recovery_labels = vec![" ".to_string()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::empty("execution.recovery_labels"))
        );
    }

    #[test]
    #[serial]
    fn api_key_is_read_from_named_variable() {
        let llm = LlmConfig {
            api_key_env: "CASEFORGE_CONFIG_TEST_KEY".to_string(),
            ..LlmConfig::default()
        };
        env::remove_var("CASEFORGE_CONFIG_TEST_KEY");
        assert_eq!(
            llm.resolve_api_key(),
            Err(ConfigError::MissingSecret("CASEFORGE_CONFIG_TEST_KEY".to_string()))
        );

        env::set_var("CASEFORGE_CONFIG_TEST_KEY", " secret ");
        assert_eq!(llm.resolve_api_key().unwrap(), "secret");
        env::remove_var("CASEFORGE_CONFIG_TEST_KEY");
    }
}
