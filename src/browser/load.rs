//! Page loading with a cascade of progressively looser completion strategies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load-completion condition for one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitUntil {
    /// Document complete and no requests in flight for the quiet window.
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    /// Document complete and at most two requests in flight for the quiet window.
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkIdle0 => "networkidle0",
            Self::NetworkIdle2 => "networkidle2",
            Self::Load => "load",
            Self::DomContentLoaded => "domcontentloaded",
        }
    }

    /// Longer label used in progress output.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NetworkIdle0 => "Network Idle 0 (wait for all resources)",
            Self::NetworkIdle2 => "Network Idle 2 (wait for most resources)",
            Self::Load => "Load Event (wait for page load)",
            Self::DomContentLoaded => "DOM Content Loaded (minimum)",
        }
    }

    /// In-flight request threshold for the network-idle strategies.
    pub fn max_inflight(&self) -> Option<usize> {
        match self {
            Self::NetworkIdle0 => Some(0),
            Self::NetworkIdle2 => Some(2),
            Self::Load | Self::DomContentLoaded => None,
        }
    }

    /// Whether `readyState` is far enough along for this strategy.
    pub fn accepts_ready_state(&self, state: &str) -> bool {
        match self {
            Self::DomContentLoaded => matches!(state, "interactive" | "complete"),
            _ => state == "complete",
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "networkidle0" => Ok(Self::NetworkIdle0),
            "networkidle2" => Ok(Self::NetworkIdle2),
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            _ => Err(format!(
                "Invalid wait condition '{}'. Valid options: networkidle0, networkidle2, load, domcontentloaded",
                s
            )),
        }
    }
}

/// One entry of the load cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStrategy {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl LoadStrategy {
    pub fn new(wait_until: WaitUntil, timeout: Duration) -> Self {
        Self {
            wait_until,
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.wait_until.as_str()
    }
}

/// networkidle0 (180 s), networkidle2 (120 s), load (90 s), domcontentloaded (60 s).
pub fn default_strategies() -> Vec<LoadStrategy> {
    vec![
        LoadStrategy::new(WaitUntil::NetworkIdle0, Duration::from_secs(180)),
        LoadStrategy::new(WaitUntil::NetworkIdle2, Duration::from_secs(120)),
        LoadStrategy::new(WaitUntil::Load, Duration::from_secs(90)),
        LoadStrategy::new(WaitUntil::DomContentLoaded, Duration::from_secs(60)),
    ]
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub strategy: LoadStrategy,
    /// Location after redirects.
    pub final_url: String,
    pub elapsed: Duration,
}

#[cfg(feature = "browser")]
pub use driver::load_page;

#[cfg(feature = "browser")]
mod driver {
    use std::time::{Duration, Instant};

    use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
    use chromiumoxide::Page;
    use tracing::{debug, info, warn};

    use super::{LoadOutcome, LoadStrategy, WaitUntil};
    use crate::browser::network::{IdleWindow, InflightTracker, QUIET_WINDOW};
    use crate::browser::scripts;
    use crate::error::PackError;

    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Navigate to `url`, trying each strategy in order until one succeeds.
    pub async fn load_page(
        page: &Page,
        url: &str,
        strategies: &[LoadStrategy],
    ) -> Result<LoadOutcome, PackError> {
        let tracker = InflightTracker::attach(page).await?;
        let mut tried = Vec::with_capacity(strategies.len());

        for strategy in strategies {
            info!("   Attempting: {}...", strategy.wait_until.describe());
            let started = Instant::now();

            let attempt = navigate_and_wait(page, url, strategy.wait_until, &tracker);
            match tokio::time::timeout(strategy.timeout, attempt).await {
                Ok(Ok(final_url)) => {
                    info!("   SUCCESS with {}", strategy.wait_until.describe());
                    return Ok(LoadOutcome {
                        strategy: *strategy,
                        final_url,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(Err(e)) => warn!("   Failed ({}): {}", strategy.name(), e),
                Err(_) => warn!(
                    "   Failed ({}): timed out after {}s",
                    strategy.name(),
                    strategy.timeout.as_secs()
                ),
            }
            tried.push(strategy.name().to_string());
        }

        Err(PackError::PageLoad { tried })
    }

    async fn navigate_and_wait(
        page: &Page,
        url: &str,
        wait_until: WaitUntil,
        tracker: &InflightTracker,
    ) -> Result<String, PackError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|reason| PackError::InvalidUrl {
                url: url.to_string(),
                reason,
            })?;
        let response = page.execute(params).await?;
        if let Some(ref error) = response.result.error_text {
            return Err(PackError::Browser(format!("navigation failed: {}", error)));
        }

        let mut idle = wait_until
            .max_inflight()
            .map(|max| IdleWindow::new(max, QUIET_WINDOW));

        loop {
            match ready_state(page).await {
                Some((state, href)) if wait_until.accepts_ready_state(&state) && href != "about:blank" => {
                    match idle.as_mut() {
                        None => return Ok(href),
                        Some(window) => {
                            if window.observe(tracker.inflight(), Instant::now()) {
                                return Ok(href);
                            }
                        }
                    }
                }
                _ => {
                    if let Some(window) = idle.as_mut() {
                        window.reset();
                    }
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// `(readyState, href)`, or `None` while the execution context is being replaced.
    async fn ready_state(page: &Page) -> Option<(String, String)> {
        match page.evaluate(scripts::READY_STATE.to_string()).await {
            Ok(result) => {
                let raw: String = result.into_value().ok()?;
                let (state, href) = raw.split_once('|')?;
                Some((state.to_string(), href.to_string()))
            }
            Err(e) => {
                debug!("readyState check failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cascade_order_and_timeouts() {
        let strategies = default_strategies();
        let names: Vec<&str> = strategies.iter().map(LoadStrategy::name).collect();
        assert_eq!(
            names,
            vec!["networkidle0", "networkidle2", "load", "domcontentloaded"]
        );
        let secs: Vec<u64> = strategies.iter().map(|s| s.timeout.as_secs()).collect();
        assert_eq!(secs, vec![180, 120, 90, 60]);
    }

    #[test]
    fn test_wait_until_from_str() {
        assert_eq!("networkidle0".parse::<WaitUntil>(), Ok(WaitUntil::NetworkIdle0));
        assert_eq!("network-idle-2".parse::<WaitUntil>(), Ok(WaitUntil::NetworkIdle2));
        assert_eq!("DOMContentLoaded".parse::<WaitUntil>(), Ok(WaitUntil::DomContentLoaded));
        assert!("whenever".parse::<WaitUntil>().is_err());
    }

    #[test]
    fn test_wait_until_serde_names() {
        let parsed: WaitUntil = serde_json::from_str(r#""networkidle2""#).unwrap();
        assert_eq!(parsed, WaitUntil::NetworkIdle2);
        assert_eq!(
            serde_json::to_string(&WaitUntil::DomContentLoaded).unwrap(),
            r#""domcontentloaded""#
        );
    }

    #[test]
    fn test_ready_state_acceptance() {
        assert!(WaitUntil::DomContentLoaded.accepts_ready_state("interactive"));
        assert!(!WaitUntil::Load.accepts_ready_state("interactive"));
        assert!(WaitUntil::NetworkIdle0.accepts_ready_state("complete"));
        assert!(!WaitUntil::NetworkIdle2.accepts_ready_state("loading"));
    }

    #[test]
    fn test_idle_thresholds() {
        assert_eq!(WaitUntil::NetworkIdle0.max_inflight(), Some(0));
        assert_eq!(WaitUntil::NetworkIdle2.max_inflight(), Some(2));
        assert_eq!(WaitUntil::Load.max_inflight(), None);
    }
}
