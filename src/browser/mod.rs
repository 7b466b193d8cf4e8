//! Chromium control through the DevTools protocol.

mod builder;

pub use builder::BrowserBuilder;

use crate::error::{BrowserError, Result};
use crate::listing::{ListingPage, NetworkEvent, NetworkEvents};
pub use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_agent: Option<String>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Opens a tab on `url` with network events enabled.
    pub async fn open(&self, url: &str) -> Result<ChromePage> {
        let page = self.browser.new_page("about:blank").await?;

        if let Some(user_agent) = &self.user_agent {
            page.set_user_agent(user_agent.as_str()).await?;
        }
        page.execute(EnableParams::default()).await?;

        log_info!("[browser] Navigating to {}", url);
        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: self.navigation_timeout.as_millis() as u64,
            })??;

        Ok(ChromePage {
            page,
            url: url.to_string(),
        })
    }

    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            log_warn!("[browser] Close request failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            log_debug!("[browser] Waiting for Chromium exit failed: {}", e);
        }
        self.handler.abort();
        log_info!("[browser] Chromium closed");
        Ok(())
    }
}

pub struct ChromePage {
    page: Page,
    url: String,
}

impl ChromePage {
    async fn evaluate<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self.page.evaluate(script).await?;
        result
            .into_value()
            .map_err(|e| BrowserError::Evaluation(format!("{e:?}")).into())
    }
}

#[async_trait]
impl ListingPage for ChromePage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn scroll_viewport(&self, factor: f64) -> Result<()> {
        let script = format!(
            "(() => {{ window.scrollBy(0, Math.round(window.innerHeight * {})); return window.scrollY; }})()",
            factor
        );
        let offset: f64 = self.evaluate(script).await?;
        log_debug!("[browser] Scrolled to y={}", offset);
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll({}).length",
            serde_json::to_string(selector)?
        );
        self.evaluate(script).await
    }

    async fn network_events(&self) -> Result<NetworkEvents> {
        let started = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|_| NetworkEvent::RequestStarted);
        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|_| NetworkEvent::RequestFinished);
        let failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await?
            .map(|_| NetworkEvent::RequestFailed);

        Ok(futures::stream::select_all([
            started.boxed(),
            finished.boxed(),
            failed.boxed(),
        ])
        .boxed())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }
}
