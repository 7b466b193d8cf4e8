use crate::config::ScrollConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScrollSettings {
    pub round_cap: u32,
    pub stable_target: u32,
    pub idle_window: Duration,
    pub hard_timeout: Duration,
    pub viewport_factor: f64,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl From<&ScrollConfig> for ScrollSettings {
    fn from(config: &ScrollConfig) -> Self {
        Self {
            round_cap: config.round_cap,
            stable_target: config.stable_target,
            idle_window: config.idle_window(),
            hard_timeout: config.hard_timeout(),
            viewport_factor: config.viewport_factor,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The card count held still for `stable_target` consecutive rounds.
    Stable,
    /// The list was still growing when the round cap was reached.
    RoundCap,
    /// A round failed after the listing had rendered.
    PageError,
}

/// Counters for one scrape run.
#[derive(Debug, Clone)]
pub struct PageSession {
    round: u32,
    last_count: usize,
    stable_rounds: u32,
    settings: ScrollSettings,
}

impl PageSession {
    pub fn new(settings: ScrollSettings) -> Self {
        Self {
            round: 0,
            last_count: 0,
            stable_rounds: 0,
            settings,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn last_count(&self) -> usize {
        self.last_count
    }

    pub fn stable_rounds(&self) -> u32 {
        self.stable_rounds
    }

    pub fn settings(&self) -> &ScrollSettings {
        &self.settings
    }

    /// Records the card count observed after a round and reports whether
    /// scrolling should stop.
    pub fn evaluate_round(&mut self, current_count: usize) -> Option<StopReason> {
        if current_count == self.last_count {
            self.stable_rounds += 1;
        } else {
            self.stable_rounds = 0;
        }
        self.last_count = current_count;
        self.round += 1;

        if self.stable_rounds >= self.settings.stable_target {
            Some(StopReason::Stable)
        } else if self.round >= self.settings.round_cap {
            Some(StopReason::RoundCap)
        } else {
            None
        }
    }
}
