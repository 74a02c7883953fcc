//! User agent selection shared by the browser and the resource fetcher.

/// Desktop Chrome user agent sent by default.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Pool for `user_agent = "impersonate"`.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

fn random_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    IMPERSONATE_USER_AGENTS[nanos % IMPERSONATE_USER_AGENTS.len()]
}

/// Resolve the configured value.
/// - None => [`USER_AGENT`]
/// - "impersonate" => a random entry of [`IMPERSONATE_USER_AGENTS`]
/// - anything else is used verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_desktop_chrome() {
        let ua = resolve_user_agent(None);
        assert!(ua.contains("Chrome/"));
        assert_eq!(resolve_user_agent(Some("  ")), USER_AGENT);
    }

    #[test]
    fn test_impersonate_picks_from_pool() {
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(IMPERSONATE_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_custom_passthrough() {
        assert_eq!(resolve_user_agent(Some("MyBot/1.0")), "MyBot/1.0");
    }
}
