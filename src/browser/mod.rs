//! Headless Chrome over CDP: launch, load, reveal and extract.

mod config;
#[cfg(feature = "browser")]
mod extract;
mod load;
mod network;
mod reveal;
pub mod scripts;

pub use config::{default_command_timeout, default_headless, BrowserEngineConfig, VIEWPORT};
#[cfg(feature = "browser")]
pub use extract::{collect_resources, extract_inline_js, extract_page_css, page_html, MAX_COMPUTED_RULES};
#[cfg(feature = "browser")]
pub use load::load_page;
pub use load::{default_strategies, LoadOutcome, LoadStrategy, WaitUntil};
#[cfg(feature = "browser")]
pub use network::InflightTracker;
pub use network::{IdleWindow, QUIET_WINDOW};
#[cfg(feature = "browser")]
pub use reveal::reveal;
pub use reveal::RevealPlan;

#[cfg(feature = "browser")]
use std::path::{Path, PathBuf};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, Headers, SetCacheDisabledParams, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info};

use crate::error::PackError;
#[cfg(feature = "browser")]
use crate::fetch::resolve_user_agent;

/// A launched or connected browser.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserEngineConfig,
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    /// Arguments every launched browser gets.
    const LAUNCH_ARGS: &'static [&'static str] = &[
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-web-security",
        "--disable-features=IsolateOrigins,site-per-process",
        "--disable-dev-shm-usage",
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--window-size=1920,1080",
        "--start-maximized",
        "--disable-extensions",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-software-rasterizer",
        "--disable-gpu",
    ];

    /// Find a Chrome executable on this machine.
    pub fn find_chrome() -> Result<PathBuf, PackError> {
        if let Ok(path) = std::env::var("CHROME_PATH") {
            if Path::new(&path).exists() {
                return Ok(PathBuf::from(path));
            }
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in Self::CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(PackError::BrowserUnavailable(
            "Chrome/Chromium not found. Install it, set CHROME_PATH, \
             connect with --remote-url, or use --no-browser"
                .to_string(),
        ))
    }

    /// Launch a browser, or connect to `remote_url` when configured.
    pub async fn start(config: BrowserEngineConfig) -> Result<Self, PackError> {
        if let Some(remote_url) = config.remote_url.clone() {
            return Self::connect_remote(config, &remote_url).await;
        }

        info!("Launching browser (headless={})", config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(config.command_timeout);

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        for arg in Self::LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        let browser_config = builder
            .build()
            .map_err(|e| PackError::BrowserLaunch(format!("invalid browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| PackError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config,
            browser,
            handler,
            remote: false,
        })
    }

    /// Connect to a remote Chrome instance through its `/json/version` endpoint.
    async fn connect_remote(config: BrowserEngineConfig, url: &str) -> Result<Self, PackError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| PackError::BrowserUnavailable(format!("{}: {}", version_url, e)))?
            .json()
            .await
            .map_err(|e| {
                PackError::BrowserUnavailable(format!("bad browser version info: {}", e))
            })?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PackError::BrowserUnavailable("no webSocketDebuggerUrl in response".to_string())
            })?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: config.command_timeout,
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| PackError::BrowserUnavailable(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config,
            browser,
            handler,
            remote: true,
        })
    }

    /// Open a blank page with the user agent, viewport, headers and cache
    /// settings applied.
    pub async fn new_page(&self) -> Result<Page, PackError> {
        let page = self.browser.new_page("about:blank").await?;

        let user_agent = resolve_user_agent(self.config.user_agent.as_deref());
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await?;

        let (width, height) = VIEWPORT;
        page.execute(SetDeviceMetricsOverrideParams::new(
            width as i64,
            height as i64,
            1.0,
            false,
        ))
        .await?;

        page.execute(EnableParams::default()).await?;
        page.execute(SetCacheDisabledParams::new(true)).await?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::json!({
                "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8",
                "Accept-Language": "en-US,en;q=0.9",
                "Cache-Control": "no-cache",
                "Pragma": "no-cache",
            }),
        )))
        .await?;

        Ok(page)
    }

    /// Close the browser. A remote browser is left running.
    pub async fn close(mut self) {
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession;

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn start(_config: BrowserEngineConfig) -> Result<Self, PackError> {
        Err(PackError::BrowserUnavailable(
            "browser support not compiled; rebuild with --features browser or use --no-browser"
                .to_string(),
        ))
    }

    pub async fn close(self) {}
}
