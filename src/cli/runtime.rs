use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crate::config::Config;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOCAL_ENV_PATH: &str = "config/local.env";
const LOCAL_CONFIG_PATH: &str = "config/caseforge.yaml";

/// Seed the environment from `config/local.env`, if present.
///
/// Runs before logging is initialised, so its own log lines are dropped.
pub fn load_local_env_overrides() {
    load_env_file(Path::new(LOCAL_ENV_PATH));
}

/// Export each `KEY=VALUE` entry of a dotenv-style file.
///
/// Returns how many variables were exported. Variables already present in
/// the environment win over the file.
pub fn load_env_file(path: &Path) -> usize {
    let contents = match stdfs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "env file unreadable");
            return 0;
        }
    };

    let mut exported = 0;
    for (number, line) in contents.lines().enumerate().map(|(idx, line)| (idx + 1, line.trim())) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(path = %path.display(), line = number, "env entry without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, unescape_value(value.trim()));
        exported += 1;
    }
    info!(path = %path.display(), exported, "env file applied");
    exported
}

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// `config/caseforge.yaml` in the working directory, then the user config dir.
fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Ok(local);
    }
    let user = dirs::config_dir().context("no user configuration directory")?;
    Ok(user.join("caseforge").join("config.yaml"))
}

/// Read the YAML config, or fall back to defaults when the file is absent.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if !fs::try_exists(&path).await.unwrap_or(false) {
        warn!(path = %path.display(), "config file not found; using defaults");
        return Ok(LoadedConfig {
            config: Config::default(),
            path,
        });
    }

    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(LoadedConfig { config, path })
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn quoted_values_are_unescaped() {
        assert_eq!(unescape_value("\"a\\tb\""), "a\tb");
        assert_eq!(unescape_value("\"say \\\"hi\\\"\""), "say \"hi\"");
        assert_eq!(unescape_value("plain"), "plain");
        assert_eq!(unescape_value("\""), "\"");
    }

    #[test]
    #[serial]
    fn env_file_does_not_override_existing_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.env");
        stdfs::write(
            &path,
            "# comment\nCASEFORGE_T_NEW=\"fresh value\"\nCASEFORGE_T_SET=ignored\nnot a pair\nexport CASEFORGE_T_EXP=yes\n",
        )
        .unwrap();

        env::remove_var("CASEFORGE_T_NEW");
        env::remove_var("CASEFORGE_T_EXP");
        env::set_var("CASEFORGE_T_SET", "kept");

        assert_eq!(load_env_file(&dir.path().join("absent.env")), 0);
        assert_eq!(load_env_file(&path), 2);
        assert_eq!(env::var("CASEFORGE_T_EXP").unwrap(), "yes");
        assert_eq!(env::var("CASEFORGE_T_NEW").unwrap(), "fresh value");
        assert_eq!(env::var("CASEFORGE_T_SET").unwrap(), "kept");

        env::remove_var("CASEFORGE_T_NEW");
        env::remove_var("CASEFORGE_T_EXP");
        env::remove_var("CASEFORGE_T_SET");
    }

    #[tokio::test]
    async fn explicit_config_file_is_parsed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("caseforge.yaml");
        stdfs::write(&path, "login:\n  account: qa@example.com\n").unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config.login.account, "qa@example.com");
        assert_eq!(loaded.path, path);
    }

    #[tokio::test]
    async fn missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config, Config::default());
    }
}
