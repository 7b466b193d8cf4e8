use super::BrowserSession;
use crate::config::BrowserConfig;
use crate::error::{BrowserError, Result};
pub use crate::{log_debug, log_info};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub struct BrowserBuilder {
    headless: bool,
    window: (u32, u32),
    user_agent: Option<String>,
    executable: Option<PathBuf>,
    proxy: Option<String>,
    navigation_timeout: Duration,
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1280, 1200),
            user_agent: None,
            executable: None,
            proxy: None,
            navigation_timeout: Duration::from_secs(60),
        }
    }
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, config: &BrowserConfig) -> Self {
        let mut builder = self
            .headless(config.headless)
            .window_size(config.viewport_width, config.viewport_height)
            .user_agent(&config.user_agent)
            .navigation_timeout(Duration::from_millis(config.navigation_timeout_ms));
        if let Some(path) = &config.executable {
            builder = builder.executable(path);
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy);
        }
        builder
    }

    pub fn headless(mut self, enabled: bool) -> Self {
        self.headless = enabled;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window = (width, height);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    fn chrome_config(&self) -> Result<ChromeConfig> {
        let (width, height) = self.window;
        let mut builder = ChromeConfig::builder()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        if let Some(proxy) = &self.proxy {
            Url::parse(proxy)
                .map_err(|e| BrowserError::Launch(format!("Invalid proxy {}: {}", proxy, e)))?;
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("Invalid browser config: {}", e)).into())
    }

    pub async fn launch(self) -> Result<BrowserSession> {
        let config = self.chrome_config()?;

        log_info!(
            "[browser] Launching Chromium (headless: {}, window: {}x{})",
            self.headless,
            self.window.0,
            self.window.1
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log_debug!("[browser] Handler event error: {}", e);
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler,
            user_agent: self.user_agent,
            navigation_timeout: self.navigation_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn copies_settings_from_config() {
        let config = BrowserConfig {
            headless: false,
            proxy: Some("socks5://127.0.0.1:9050".into()),
            ..BrowserConfig::default()
        };

        let builder = BrowserBuilder::new().with_config(&config);

        assert!(!builder.headless);
        assert_eq!(builder.window, (1280, 1200));
        assert_eq!(builder.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        assert_eq!(builder.navigation_timeout, Duration::from_secs(60));
        assert!(builder.user_agent.unwrap().contains("Chrome/120"));
    }

    #[test]
    fn rejects_malformed_proxy() {
        let err = BrowserBuilder::new()
            .proxy("not a proxy")
            .chrome_config()
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Browser(BrowserError::Launch(_))));
    }
}
