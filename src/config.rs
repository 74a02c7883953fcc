//! Configuration management.
//!
//! A config file is optional. Resolution order, lowest first: built-in
//! defaults, the config file, `PAGEPACK_*` environment variables, CLI flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::{
    default_strategies, BrowserEngineConfig, LoadStrategy, RevealPlan, WaitUntil,
};
use crate::error::PackError;
use crate::fetch::{
    ResourceFetcher, RetryPolicy, DEFAULT_MAX_RESOURCE_BYTES, DEFAULT_REQUEST_TIMEOUT,
};

/// Default cap on image downloads per run.
pub const DEFAULT_MAX_IMAGES: usize = 200;

/// Environment variables consulted after the config file.
pub const ENV_USER_AGENT: &str = "PAGEPACK_USER_AGENT";
pub const ENV_REMOTE_URL: &str = "PAGEPACK_REMOTE_URL";
pub const ENV_PROXY: &str = "PAGEPACK_PROXY";

/// One entry of the load cascade as written in a config file.
#[derive(Debug, Clone, Serialize, Deserialize, prefer::FromValue)]
pub struct StrategyConfig {
    /// `networkidle0`, `networkidle2`, `load` or `domcontentloaded`.
    pub wait_until: String,
    /// Seconds; defaults to the built-in timeout for the same condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl StrategyConfig {
    fn to_strategy(&self) -> Result<LoadStrategy, PackError> {
        let wait_until = WaitUntil::from_str(&self.wait_until).map_err(PackError::Config)?;
        let timeout = match self.timeout {
            Some(secs) => Duration::from_secs(secs),
            None => default_strategies()
                .into_iter()
                .find(|s| s.wait_until == wait_until)
                .map(|s| s.timeout)
                .unwrap_or(Duration::from_secs(60)),
        };
        Ok(LoadStrategy::new(wait_until, timeout))
    }
}

/// Configuration file contents. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// User agent, or "impersonate" for a rotating real-browser agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Per-request timeout for resource downloads, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,

    /// Attempts per resource, including the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_images: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resource_bytes: Option<u64>,

    /// Seconds to wait after load before scrolling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_images: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Proxy for both the browser and resource downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Extra Chrome arguments, appended to the built-in ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub chrome_args: Vec<String>,

    /// Load cascade override, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub strategies: Vec<StrategyConfig>,

    /// Path to the config file this was loaded from.
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load a config file; falls back to defaults.
    pub async fn load() -> Self {
        match prefer::load("pagepack").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) -> Result<(), PackError> {
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(retries) = self.retries {
            settings.retry = RetryPolicy::new(retries, settings.retry.base_delay);
        }
        if let Some(delay) = self.retry_base_delay_ms {
            settings.retry = RetryPolicy::new(
                settings.retry.max_attempts,
                Duration::from_millis(delay),
            );
        }
        if let Some(max) = self.max_images {
            settings.max_images = max as usize;
        }
        if let Some(max) = self.max_resource_bytes {
            settings.max_resource_bytes = max;
        }
        if let Some(secs) = self.settle_secs {
            settings.settle = Duration::from_secs(secs);
        }
        if let Some(inline) = self.inline_images {
            settings.inline_images = inline;
        }
        if let Some(headless) = self.headless {
            settings.headless = headless;
        }
        if let Some(ref remote) = self.remote_url {
            settings.remote_url = Some(remote.clone());
        }
        if let Some(ref proxy) = self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        settings.chrome_args.extend(self.chrome_args.iter().cloned());
        if !self.strategies.is_empty() {
            settings.strategies = self
                .strategies
                .iter()
                .map(StrategyConfig::to_strategy)
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user_agent: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_images: usize,
    pub max_resource_bytes: u64,
    pub settle: Duration,
    pub inline_images: bool,
    pub headless: bool,
    pub remote_url: Option<String>,
    pub proxy: Option<String>,
    pub chrome_args: Vec<String>,
    pub strategies: Vec<LoadStrategy>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            max_images: DEFAULT_MAX_IMAGES,
            max_resource_bytes: DEFAULT_MAX_RESOURCE_BYTES,
            settle: RevealPlan::default().settle,
            inline_images: false,
            headless: true,
            remote_url: None,
            proxy: None,
            chrome_args: Vec::new(),
            strategies: default_strategies(),
        }
    }
}

impl Settings {
    /// Apply `PAGEPACK_*` overrides read through `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

        if let Some(user_agent) = var(ENV_USER_AGENT) {
            tracing::debug!("Using {} from environment", ENV_USER_AGENT);
            self.user_agent = Some(user_agent);
        }
        if let Some(remote) = var(ENV_REMOTE_URL) {
            tracing::debug!("Using {} from environment: {}", ENV_REMOTE_URL, remote);
            self.remote_url = Some(remote);
        }
        if let Some(proxy) = var(ENV_PROXY) {
            tracing::debug!("Using {} from environment: {}", ENV_PROXY, proxy);
            self.proxy = Some(proxy);
        }
    }

    /// Browser launch settings. Commands may run as long as the slowest strategy.
    pub fn browser_config(&self) -> BrowserEngineConfig {
        let command_timeout = self
            .strategies
            .iter()
            .map(|s| s.timeout)
            .max()
            .unwrap_or_else(crate::browser::default_command_timeout);

        BrowserEngineConfig {
            headless: self.headless,
            proxy: self.proxy.clone(),
            chrome_args: self.chrome_args.clone(),
            remote_url: self.remote_url.clone(),
            user_agent: self.user_agent.clone(),
            command_timeout,
        }
    }

    /// Resource fetcher sending `referer` with each request.
    pub fn fetcher(&self, referer: &str) -> Result<ResourceFetcher, PackError> {
        ResourceFetcher::builder()
            .user_agent(self.user_agent.as_deref())
            .referer(referer)
            .proxy(self.proxy.as_deref())
            .timeout(self.request_timeout)
            .retry(self.retry)
            .max_bytes(self.max_resource_bytes)
            .build()
    }
}

/// Expand `~` in a user-supplied config path.
pub fn resolve_config_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Load settings: defaults, then the config file, then the environment.
///
/// An explicit `config_path` must exist and parse; a discovered file that
/// fails to parse is skipped with a warning.
pub async fn load_settings(config_path: Option<&str>) -> Result<Settings, PackError> {
    let config = match config_path {
        Some(path) => {
            let path = resolve_config_path(path);
            Config::load_from_path(&path)
                .await
                .map_err(|e| PackError::Config(format!("{}: {}", path.display(), e)))?
        }
        None => Config::load().await,
    };
    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings)?;
    settings.apply_env(|name| std::env::var(name).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
user_agent = "impersonate"
retries = 2
max_images = 10
chrome_args = ["--lang=de"]

[[strategies]]
wait_until = "load"
timeout = 30
"#,
        );
        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.user_agent.as_deref(), Some("impersonate"));
        assert_eq!(config.retries, Some(2));
        assert_eq!(config.max_images, Some(10));
        assert_eq!(config.chrome_args, vec!["--lang=de"]);
        assert_eq!(config.strategies.len(), 1);
        assert_eq!(config.source_path.as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let file = write_config(
            ".yaml",
            "inline_images: true\nsettle_secs: 5\nstrategies:\n  - wait_until: domcontentloaded\n",
        );
        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.inline_images, Some(true));
        assert_eq!(config.settle_secs, Some(5));
        assert_eq!(config.strategies[0].timeout, None);
    }

    #[tokio::test]
    async fn test_load_json_for_unknown_extension() {
        let file = write_config(".conf", r#"{"headless": false, "proxy": "socks5://127.0.0.1:1080"}"#);
        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.headless, Some(false));
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let file = write_config(".toml", "retries = \"many\"");
        let err = Config::load_from_path(file.path()).await.unwrap_err();
        assert!(err.contains("TOML"));
    }

    #[tokio::test]
    async fn test_load_settings_with_missing_explicit_path_fails() {
        let err = load_settings(Some("/nonexistent/pagepack.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_images, 200);
        assert_eq!(settings.max_resource_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.settle, Duration::from_secs(20));
        assert!(settings.headless);
        assert_eq!(settings.strategies.len(), 4);
    }

    #[test]
    fn test_config_overrides_defaults() {
        let config = Config {
            retries: Some(3),
            retry_base_delay_ms: Some(250),
            max_images: Some(5),
            strategies: vec![StrategyConfig {
                wait_until: "networkidle2".to_string(),
                timeout: None,
            }],
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings).unwrap();

        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(250));
        assert_eq!(settings.max_images, 5);
        assert_eq!(settings.strategies.len(), 1);
        assert_eq!(settings.strategies[0].wait_until, WaitUntil::NetworkIdle2);
        assert_eq!(settings.strategies[0].timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_strategy_is_rejected() {
        let config = Config {
            strategies: vec![StrategyConfig {
                wait_until: "whenever".to_string(),
                timeout: Some(1),
            }],
            ..Default::default()
        };
        let err = config.apply_to_settings(&mut Settings::default()).unwrap_err();
        assert!(err.to_string().contains("whenever"));
    }

    #[test]
    fn test_env_overrides_config() {
        let config = Config {
            user_agent: Some("from-config".to_string()),
            proxy: Some("http://config-proxy:8080".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings).unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_USER_AGENT, "from-env"),
            (ENV_PROXY, ""),
            (ENV_REMOTE_URL, "ws://localhost:9222"),
        ]
        .into_iter()
        .collect();
        settings.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.user_agent.as_deref(), Some("from-env"));
        // empty values don't override
        assert_eq!(settings.proxy.as_deref(), Some("http://config-proxy:8080"));
        assert_eq!(settings.remote_url.as_deref(), Some("ws://localhost:9222"));
    }

    #[test]
    fn test_browser_config_uses_longest_strategy() {
        let mut settings = Settings::default();
        settings.headless = false;
        settings.strategies = vec![
            LoadStrategy::new(WaitUntil::Load, Duration::from_secs(30)),
            LoadStrategy::new(WaitUntil::DomContentLoaded, Duration::from_secs(45)),
        ];
        let browser = settings.browser_config();
        assert!(!browser.headless);
        assert_eq!(browser.command_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_resolve_config_path_expands_tilde() {
        let path = resolve_config_path("~/pagepack.toml");
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("pagepack.toml"));
    }
}
