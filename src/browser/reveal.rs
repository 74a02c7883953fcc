//! Force lazy and hidden content into the DOM before extraction.

use std::time::Duration;

/// Step counts and pauses for the reveal sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealPlan {
    /// Wait after load for late scripts to render.
    pub settle: Duration,
    /// Pass 1: fixed-size scroll steps.
    pub scroll_steps: u32,
    pub scroll_step_px: u32,
    pub scroll_step_delay: Duration,
    /// Pass 3: evenly spaced positions.
    pub scroll_positions: u32,
    pub scroll_position_delay: Duration,
    /// Pause after each scroll pass and each jump in pass 2.
    pub pass_pause: Duration,
    pub lazy_pause: Duration,
    pub reveal_pause: Duration,
}

impl Default for RevealPlan {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(20),
            scroll_steps: 80,
            scroll_step_px: 100,
            scroll_step_delay: Duration::from_millis(100),
            scroll_positions: 40,
            scroll_position_delay: Duration::from_millis(150),
            pass_pause: Duration::from_secs(3),
            lazy_pause: Duration::from_secs(5),
            reveal_pause: Duration::from_secs(3),
        }
    }
}

impl RevealPlan {
    /// Same steps with every pause removed.
    pub fn fast() -> Self {
        Self {
            settle: Duration::ZERO,
            scroll_step_delay: Duration::ZERO,
            scroll_position_delay: Duration::ZERO,
            pass_pause: Duration::ZERO,
            lazy_pause: Duration::ZERO,
            reveal_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Lower bound on wall time spent waiting.
    pub fn total_pause(&self) -> Duration {
        self.settle
            + self.scroll_step_delay * self.scroll_steps
            + self.scroll_position_delay * self.scroll_positions
            + self.pass_pause * 4
            + self.lazy_pause
            + self.reveal_pause
    }
}

#[cfg(feature = "browser")]
pub use driver::reveal;

#[cfg(feature = "browser")]
mod driver {
    use std::time::Duration;

    use chromiumoxide::Page;
    use tracing::{debug, info};

    use super::RevealPlan;
    use crate::browser::scripts;

    async fn pause(duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Evaluate a best-effort step; failures are logged and ignored.
    async fn run_step(page: &Page, step: &str, script: String) {
        if let Err(e) = page.evaluate(script).await {
            debug!("{} skipped: {}", step, e);
        }
    }

    /// Run the whole reveal sequence.
    pub async fn reveal(page: &Page, plan: &RevealPlan) {
        if !plan.settle.is_zero() {
            info!(
                "Waiting for dynamic content ({} seconds)...",
                plan.settle.as_secs()
            );
            pause(plan.settle).await;
        }

        info!("Scroll pass 1: loading lazy content...");
        let step_delay = plan.scroll_step_delay.as_millis() as u64;
        run_step(
            page,
            "scroll pass 1",
            scripts::scroll_steps(plan.scroll_steps, plan.scroll_step_px, step_delay),
        )
        .await;
        pause(plan.pass_pause).await;

        info!("Scroll pass 2: bottom to top...");
        run_step(page, "scroll to bottom", scripts::SCROLL_TO_BOTTOM.to_string()).await;
        pause(plan.pass_pause).await;
        run_step(page, "scroll to top", scripts::SCROLL_TO_TOP.to_string()).await;
        pause(plan.pass_pause).await;

        info!("Scroll pass 3: middle sections...");
        let position_delay = plan.scroll_position_delay.as_millis() as u64;
        run_step(
            page,
            "scroll pass 3",
            scripts::scroll_positions(plan.scroll_positions, position_delay),
        )
        .await;
        pause(plan.pass_pause).await;

        info!("Force loading images and icons...");
        run_step(
            page,
            "force lazy content",
            scripts::FORCE_LAZY_CONTENT.to_string(),
        )
        .await;
        pause(plan.lazy_pause).await;

        info!("Revealing hidden content...");
        run_step(page, "reveal hidden", scripts::REVEAL_HIDDEN.to_string()).await;
        pause(plan.reveal_pause).await;
    }
}
