//! Vault-local settings (`<vault>/.wfo-pages/settings.json`).

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use url::Url;
use wfo_pages_lookup::client::{DEFAULT_API_URL, DEFAULT_CLASSIFICATION_VERSION};
use wfo_pages_lookup::ClientConfig;

pub const SETTINGS_DIR: &str = ".wfo-pages";
pub const SETTINGS_FILE: &str = "settings.json";

pub const ENV_API_URL: &str = "WFO_API_URL";
pub const ENV_CLASSIFICATION_VERSION: &str = "WFO_CLASSIFICATION_VERSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Classification version, `yyyy-mm`.
    pub classification_version: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            classification_version: DEFAULT_CLASSIFICATION_VERSION.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn path(vault: &Path) -> PathBuf {
        vault.join(SETTINGS_DIR).join(SETTINGS_FILE)
    }

    /// Saved settings for `vault`, or defaults when none were saved.
    pub fn load(vault: &Path) -> Result<Self> {
        let path = Self::path(vault);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, vault: &Path) -> Result<PathBuf> {
        self.validate()?;
        let path = Self::path(vault);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, format!("{json}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(%url, "api url from environment");
            self.api_url = url.trim().to_string();
        }
        if let Some(version) = var(ENV_CLASSIFICATION_VERSION).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(%version, "classification version from environment");
            self.classification_version = version.trim().to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_classification_version(&self.classification_version)?;
        validate_api_url(&self.api_url)?;
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeoutSecs must be at least 1"));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.api_url.clone(),
            classification_version: self.classification_version.clone(),
            timeout_secs: self.timeout_secs,
            ..ClientConfig::default()
        }
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-(\d{2})$").expect("static regex"))
}

pub fn validate_classification_version(version: &str) -> Result<()> {
    let month = version_regex()
        .captures(version)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .ok_or_else(|| {
            anyhow!("classification version `{version}` must have the form yyyy-mm")
        })?;
    if !(1..=12).contains(&month) {
        return Err(anyhow!(
            "classification version `{version}` has an invalid month"
        ));
    }
    Ok(())
}

pub fn validate_api_url(api_url: &str) -> Result<()> {
    let url = Url::parse(api_url).with_context(|| format!("invalid api url `{api_url}`"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("api url must use http or https, not `{other}`")),
    }
}
