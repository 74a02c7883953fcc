//! Browser session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Viewport emulated on every page.
pub const VIEWPORT: (u32, u32) = (1920, 1080);

/// How to obtain a browser and how to set up its pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent config value; see `fetch::resolve_user_agent`.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Upper bound for a single CDP command, including navigation.
    #[serde(default = "default_command_timeout", with = "secs")]
    pub command_timeout: Duration,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: None,
            command_timeout: default_command_timeout(),
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_command_timeout() -> Duration {
    Duration::from_secs(180)
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
