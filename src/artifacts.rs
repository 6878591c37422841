//! Persisted outputs: extraction log, markdown report, run history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use spec_compiler::{render_extraction_log, CompiledArtifacts};
use suite_runner::{RunHistory, TestReport};
use tokio::fs;
use tracing::info;

use crate::config::OutputConfig;

pub struct ArtifactWriter {
    dir: PathBuf,
    files: OutputConfig,
}

impl ArtifactWriter {
    /// Writer for the configured files, optionally redirected to `dir`.
    pub fn new(files: &OutputConfig, dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(|| files.dir.clone()),
            files: files.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_extraction_log(&self, artifacts: &CompiledArtifacts) -> Result<PathBuf> {
        let name = self.files.extraction_log.clone();
        self.write(&name, render_extraction_log(artifacts)).await
    }

    pub async fn write_report(&self, report: &TestReport) -> Result<PathBuf> {
        let name = self.files.report.clone();
        self.write(&name, report.render_markdown()).await
    }

    pub async fn write_history(&self, history: &RunHistory) -> Result<PathBuf> {
        let json = history
            .to_json_pretty()
            .context("serializing run history")?;
        let name = self.files.history.clone();
        self.write(&name, json).await
    }

    async fn write(&self, name: &str, contents: String) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(name);
        fs::write(&path, contents)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "artifact written");
        Ok(path)
    }
}
