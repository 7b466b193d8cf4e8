use super::page::ListingPage;
use super::quiescence::{await_quiescence, Quiescence};
use super::session::{PageSession, StopReason};
use crate::error::Result;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub count: usize,
    pub stable_rounds: u32,
    pub quiescence: Quiescence,
    pub stop: Option<StopReason>,
}

/// Base delay plus a uniform random share of `jitter`.
pub fn jittered_delay(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

/// One scroll round: scroll, pause, wait for the network to settle,
/// then sample the card count.
pub async fn run_round<P>(
    page: &P,
    session: &mut PageSession,
    card_selector: &str,
) -> Result<RoundReport>
where
    P: ListingPage + ?Sized,
{
    let settings = session.settings().clone();

    // Subscribe before scrolling so requests triggered by the scroll are seen.
    let events = page.network_events().await?;
    page.scroll_viewport(settings.viewport_factor).await?;
    tokio::time::sleep(jittered_delay(settings.base_delay, settings.jitter)).await;

    let quiescence = await_quiescence(events, settings.idle_window, settings.hard_timeout).await;
    let count = page.count(card_selector).await?;
    let stop = session.evaluate_round(count);

    Ok(RoundReport {
        round: session.round(),
        count,
        stable_rounds: session.stable_rounds(),
        quiescence,
        stop,
    })
}
