//! In-flight request tracking for the network-idle load strategies.

use std::time::{Duration, Instant};

/// How long the request count must stay at or below the threshold.
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Tracks whether the in-flight request count has stayed at or below
/// `max_inflight` for a continuous quiet window.
#[derive(Debug, Clone)]
pub struct IdleWindow {
    max_inflight: usize,
    quiet: Duration,
    since: Option<Instant>,
}

impl IdleWindow {
    pub fn new(max_inflight: usize, quiet: Duration) -> Self {
        Self {
            max_inflight,
            quiet,
            since: None,
        }
    }

    /// Feed one observation. Returns true once the window is satisfied.
    pub fn observe(&mut self, inflight: usize, now: Instant) -> bool {
        if inflight > self.max_inflight {
            self.since = None;
            return false;
        }
        let since = *self.since.get_or_insert(now);
        now.saturating_duration_since(since) >= self.quiet
    }

    pub fn reset(&mut self) {
        self.since = None;
    }
}

#[cfg(feature = "browser")]
pub use tracker::InflightTracker;

#[cfg(feature = "browser")]
mod tracker {
    use std::collections::HashSet;

    use chromiumoxide::cdp::browser_protocol::network::{
        EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    };
    use chromiumoxide::Page;
    use futures::StreamExt;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tracing::trace;

    use crate::error::PackError;

    /// Counts requests between `Network.requestWillBeSent` and
    /// `Network.loadingFinished`/`loadingFailed` on one page.
    pub struct InflightTracker {
        count: watch::Receiver<usize>,
        task: JoinHandle<()>,
    }

    impl InflightTracker {
        pub async fn attach(page: &Page) -> Result<Self, PackError> {
            let mut sent = page.event_listener::<EventRequestWillBeSent>().await?;
            let mut finished = page.event_listener::<EventLoadingFinished>().await?;
            let mut failed = page.event_listener::<EventLoadingFailed>().await?;
            let (tx, rx) = watch::channel(0usize);

            let task = tokio::spawn(async move {
                let mut inflight: HashSet<String> = HashSet::new();
                loop {
                    tokio::select! {
                        Some(event) = sent.next() => {
                            inflight.insert(event.request_id.inner().clone());
                        }
                        Some(event) = finished.next() => {
                            inflight.remove(event.request_id.inner());
                        }
                        Some(event) = failed.next() => {
                            inflight.remove(event.request_id.inner());
                        }
                        else => break,
                    }
                    trace!("in-flight requests: {}", inflight.len());
                    if tx.send(inflight.len()).is_err() {
                        break;
                    }
                }
            });

            Ok(Self { count: rx, task })
        }

        /// Requests currently in flight.
        pub fn inflight(&self) -> usize {
            *self.count.borrow()
        }
    }

    impl Drop for InflightTracker {
        fn drop(&mut self) {
            self.task.abort();
        }
    }
}
