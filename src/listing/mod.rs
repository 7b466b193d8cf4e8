mod page;
mod quiescence;
mod scroll;
mod session;

pub use page::ListingPage;
pub use quiescence::{NetworkEvent, NetworkEvents};
pub use session::StopReason;

use scroll::run_round;
use session::{PageSession, ScrollSettings};

use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::scraper::{retain_identified, CardExtractor, CardRecord, Scraper};
use crate::utils;
pub use crate::{log_debug, log_info, log_warn};
use std::path::PathBuf;
use std::time::Duration;

const LISTING_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Scrolling,
    Stopped(StopReason),
}

#[derive(Debug)]
pub struct ScrapeReport {
    pub records: Vec<CardRecord>,
    pub rounds: u32,
    pub stop_reason: StopReason,
    /// Cards found before noise filtering.
    pub extracted: usize,
    /// Rounds whose network wait ended on the hard timeout.
    pub network_timeouts: u32,
    pub snapshot: Option<PathBuf>,
}

/// Scrolls a lazily loaded listing until it stops growing, then extracts
/// every card from the final DOM in one pass.
pub struct ListingScraper {
    settings: ScrollSettings,
    card_selector: String,
    extractor: CardExtractor,
    listing_timeout: Duration,
    snapshot_dir: Option<PathBuf>,
}

impl ListingScraper {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            settings: ScrollSettings::from(&config.scroll),
            card_selector: config.selectors.card.clone(),
            extractor: CardExtractor::new(&config.selectors, &config.site.origin)?,
            listing_timeout: Duration::from_millis(config.browser.listing_timeout_ms),
            snapshot_dir: config.output.snapshot_dir.as_ref().map(PathBuf::from),
        })
    }

    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.snapshot_dir = dir;
        }
        self
    }

    pub async fn run<P>(&self, page: &P) -> Result<ScrapeReport>
    where
        P: ListingPage + ?Sized,
    {
        let initial = self.wait_for_listing(page).await?;
        log_info!(
            "[listing] {} card(s) rendered at {}, scrolling",
            initial,
            page.url()
        );

        let mut session = PageSession::new(self.settings.clone());
        let mut state = ScrapeState::Scrolling;
        let mut network_timeouts = 0;
        let stop_reason = loop {
            match state {
                ScrapeState::Scrolling => {
                    // The listing has rendered, so a failing round ends scrolling
                    // instead of the run.
                    let report = match run_round(page, &mut session, &self.card_selector).await {
                        Ok(report) => report,
                        Err(e) => {
                            log_warn!(
                                "[listing] Round {} failed, extracting what is loaded: {}",
                                session.round() + 1,
                                e
                            );
                            state = ScrapeState::Stopped(StopReason::PageError);
                            continue;
                        }
                    };
                    log_debug!(
                        "[listing] Round {}: {} card(s), stable for {} round(s), network {:?}",
                        report.round,
                        report.count,
                        report.stable_rounds,
                        report.quiescence
                    );
                    if report.quiescence.timed_out() {
                        network_timeouts += 1;
                    }
                    if let Some(reason) = report.stop {
                        state = ScrapeState::Stopped(reason);
                    }
                }
                ScrapeState::Stopped(reason) => break reason,
            }
        };

        match stop_reason {
            StopReason::Stable => {
                log_info!(
                    "[listing] Listing settled at {} card(s) after {} round(s)",
                    session.last_count(),
                    session.round()
                );
            }
            StopReason::RoundCap => {
                log_warn!(
                    "[listing] Still growing after {} round(s), extracting {} card(s) as they stand",
                    session.round(),
                    session.last_count()
                );
            }
            StopReason::PageError => {}
        }

        let html = page.html().await?;
        let snapshot = match &self.snapshot_dir {
            Some(dir) => Some(utils::save_snapshot(dir, &html)?),
            None => None,
        };

        let (records, extracted) = self.extract(&html);
        Ok(ScrapeReport {
            records,
            rounds: session.round(),
            stop_reason,
            extracted,
            network_timeouts,
            snapshot,
        })
    }

    /// Extracts and filters records from a DOM snapshot. Also returns the
    /// number of cards seen before filtering.
    pub fn extract(&self, html: &str) -> (Vec<CardRecord>, usize) {
        let scraper = Scraper::new(html);
        let cards = scraper.cards(&self.extractor);
        let extracted = cards.len();
        (retain_identified(cards), extracted)
    }

    async fn wait_for_listing<P>(&self, page: &P) -> Result<usize>
    where
        P: ListingPage + ?Sized,
    {
        let poll = async {
            loop {
                match page.count(&self.card_selector).await {
                    Ok(count) if count > 0 => return count,
                    Ok(_) => {}
                    Err(e) => {
                        log_debug!("[listing] Card count not available yet: {}", e);
                    }
                }
                tokio::time::sleep(LISTING_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(self.listing_timeout, poll)
            .await
            .map_err(|_| {
                ScraperError::NavigationFailure {
                    url: page.url().to_string(),
                    selector: self.card_selector.clone(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, BrowserError};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CARD: &str = r#"<div class="hot-ranking-cell-wrapper">
        <div class="home-cell-desc-title">Show</div>
    </div>"#;

    /// Replays a fixed sequence of card counts, one per count() call.
    struct ScriptedPage {
        counts: Mutex<Vec<usize>>,
        calls: Mutex<Vec<&'static str>>,
        html: String,
        count_calls: AtomicUsize,
        fail_on_count: Option<usize>,
        chatty_network: bool,
    }

    impl ScriptedPage {
        fn new(counts: Vec<usize>, html: String) -> Self {
            let mut counts = counts;
            counts.reverse();
            Self {
                counts: Mutex::new(counts),
                calls: Mutex::new(Vec::new()),
                html,
                count_calls: AtomicUsize::new(0),
                fail_on_count: None,
                chatty_network: false,
            }
        }

        /// Makes the nth count() call (1-based) fail.
        fn failing_count(mut self, call: usize) -> Self {
            self.fail_on_count = Some(call);
            self
        }

        /// Emits a network event every 100ms, so rounds never go quiet.
        fn chatty_network(mut self) -> Self {
            self.chatty_network = true;
            self
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingPage for ScriptedPage {
        fn url(&self) -> &str {
            "https://www.bilibili.com/anime/"
        }

        async fn scroll_viewport(&self, _factor: f64) -> Result<()> {
            self.calls.lock().unwrap().push("scroll");
            Ok(())
        }

        async fn count(&self, _selector: &str) -> Result<usize> {
            let call = self.count_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_count == Some(call) {
                return Err(BrowserError::Evaluation("context destroyed".into()).into());
            }
            let mut counts = self.counts.lock().unwrap();
            match counts.len() {
                0 => Err(BrowserError::Evaluation("script exhausted".into()).into()),
                // the last scripted value repeats forever
                1 => Ok(counts[0]),
                _ => Ok(counts.pop().unwrap_or_default()),
            }
        }

        async fn network_events(&self) -> Result<NetworkEvents> {
            if !self.chatty_network {
                return Ok(futures::stream::empty().boxed());
            }
            Ok(futures::stream::unfold((), |()| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Some((NetworkEvent::RequestStarted, ()))
            })
            .boxed())
        }

        async fn html(&self) -> Result<String> {
            self.calls.lock().unwrap().push("html");
            Ok(self.html.clone())
        }
    }

    fn listing(cards: usize) -> String {
        let mut html = String::from("<html><body>");
        for _ in 0..cards {
            html.push_str(CARD);
        }
        html.push_str(r#"<div class="hot-ranking-cell-wrapper"></div></body></html>"#);
        html
    }

    fn scraper() -> ListingScraper {
        ListingScraper::new(&Config::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_count_holds_for_two_rounds() {
        // first value is consumed by the listing wait
        let page = ScriptedPage::new(vec![5, 5, 10, 10, 15, 15, 15, 99], listing(3));

        let report = scraper().run(&page).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Stable);
        assert_eq!(report.rounds, 6);
        assert_eq!(report.extracted, 4);
        let ranks: Vec<usize> = report.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn endless_growth_stops_at_round_cap_and_still_extracts() {
        let counts: Vec<usize> = (1..=100).collect();
        let page = ScriptedPage::new(counts, listing(2));

        let report = scraper().run(&page).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::RoundCap);
        assert_eq!(report.rounds, 20);
        assert_eq!(report.records.len(), 2);
        let scrolls = page.calls().iter().filter(|c| **c == "scroll").count();
        assert_eq!(scrolls, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_happens_once_after_scrolling() {
        let page = ScriptedPage::new(vec![4, 4, 4], listing(4));

        scraper().run(&page).await.unwrap();

        let calls = page.calls();
        assert_eq!(calls.iter().filter(|c| **c == "html").count(), 1);
        assert_eq!(calls.last(), Some(&"html"));
    }

    #[tokio::test(start_paused = true)]
    async fn listing_that_never_renders_is_fatal() {
        let page = ScriptedPage::new(vec![0], listing(0));

        let err = scraper().run(&page).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Scraper(ScraperError::NavigationFailure { .. })
        ));
        assert!(page.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn saves_snapshot_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let page = ScriptedPage::new(vec![1, 1, 1], listing(1));

        let report = scraper()
            .with_snapshot_dir(Some(dir.path().to_path_buf()))
            .run(&page)
            .await
            .unwrap();

        let snapshot = report.snapshot.expect("snapshot path");
        assert_eq!(std::fs::read_to_string(snapshot).unwrap(), listing(1));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_round_stops_scrolling_and_still_extracts() {
        // call 1 is the listing wait, call 3 is round two
        let page = ScriptedPage::new(vec![3, 4, 5], listing(2)).failing_count(3);

        let report = scraper().run(&page).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::PageError);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.records.len(), 2);
        assert_eq!(page.calls().last(), Some(&"html"));
    }

    #[tokio::test(start_paused = true)]
    async fn rounds_that_never_go_quiet_still_count_cards() {
        let page = ScriptedPage::new(vec![3], listing(3)).chatty_network();

        let report = scraper().run(&page).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Stable);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.network_timeouts, report.rounds);
        assert_eq!(report.records.len(), 3);
    }
}
