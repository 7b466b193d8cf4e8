use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin prepended to root-relative URLs.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_listing_url")]
    pub listing_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollConfig {
    #[serde(default = "default_round_cap")]
    pub round_cap: u32,
    #[serde(default = "default_stable_target")]
    pub stable_target: u32,
    #[serde(default = "default_idle_window_ms")]
    pub idle_window_ms: u64,
    #[serde(default = "default_hard_timeout_ms")]
    pub hard_timeout_ms: u64,
    #[serde(default = "default_viewport_factor")]
    pub viewport_factor: f64,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_listing_timeout_ms")]
    pub listing_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_card_selector")]
    pub card: String,
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_subtitle_selector")]
    pub subtitle: String,
    #[serde(default = "default_rating_selector")]
    pub rating: String,
    #[serde(default = "default_cover_avif_selector")]
    pub cover_avif: String,
    #[serde(default = "default_cover_webp_selector")]
    pub cover_webp: String,
    #[serde(default = "default_cover_img_selector")]
    pub cover_img: String,
    #[serde(default = "default_cover_img_fallback_selector")]
    pub cover_img_fallback: String,
    #[serde(default = "default_link_selector")]
    pub link: String,
    #[serde(default = "default_link_fallback_selector")]
    pub link_fallback: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub snapshot_dir: Option<String>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

// Default implementations
impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            filename: default_log_filename(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            listing_url: default_listing_url(),
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            round_cap: default_round_cap(),
            stable_target: default_stable_target(),
            idle_window_ms: default_idle_window_ms(),
            hard_timeout_ms: default_hard_timeout_ms(),
            viewport_factor: default_viewport_factor(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agent: default_user_agent(),
            executable: None,
            proxy: None,
            navigation_timeout_ms: default_navigation_timeout_ms(),
            listing_timeout_ms: default_listing_timeout_ms(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: default_card_selector(),
            title: default_title_selector(),
            subtitle: default_subtitle_selector(),
            rating: default_rating_selector(),
            cover_avif: default_cover_avif_selector(),
            cover_webp: default_cover_webp_selector(),
            cover_img: default_cover_img_selector(),
            cover_img_fallback: default_cover_img_fallback_selector(),
            link: default_link_selector(),
            link_fallback: default_link_fallback_selector(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            pretty: default_pretty(),
        }
    }
}

impl ScrollConfig {
    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_millis(self.hard_timeout_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::FileRead)?;
        Self::from_toml(&content)
    }

    /// Like [`Config::from_file`], but a missing file at the default
    /// location falls back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_http_url("site.origin", &self.site.origin)?;
        validate_http_url("site.listing_url", &self.site.listing_url)?;

        if self.scroll.round_cap == 0 {
            return Err(ConfigError::InvalidValue(
                "scroll.round_cap must be greater than 0".to_string(),
            )
            .into());
        }

        if self.scroll.stable_target == 0 {
            return Err(ConfigError::InvalidValue(
                "scroll.stable_target must be greater than 0".to_string(),
            )
            .into());
        }

        if self.scroll.idle_window_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "scroll.idle_window_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.scroll.hard_timeout_ms < self.scroll.idle_window_ms {
            return Err(ConfigError::InvalidValue(format!(
                "scroll.hard_timeout_ms ({}) must not be shorter than scroll.idle_window_ms ({})",
                self.scroll.hard_timeout_ms, self.scroll.idle_window_ms
            ))
            .into());
        }

        if !(self.scroll.viewport_factor > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "scroll.viewport_factor must be positive: {}",
                self.scroll.viewport_factor
            ))
            .into());
        }

        if self.selectors.card.trim().is_empty() {
            return Err(ConfigError::MissingField("selectors.card".to_string()).into());
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ConfigError::MissingField(field.to_string()).into());
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be an absolute http(s) URL: {}",
            field, value
        ))
        .into()),
    }
}

fn default_origin() -> String {
    "https://www.bilibili.com".to_string()
}

fn default_listing_url() -> String {
    "https://www.bilibili.com/anime/".to_string()
}

fn default_round_cap() -> u32 {
    20
}

fn default_stable_target() -> u32 {
    2
}

fn default_idle_window_ms() -> u64 {
    800
}

fn default_hard_timeout_ms() -> u64 {
    8000
}

fn default_viewport_factor() -> f64 {
    1.2
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    1200
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

fn default_listing_timeout_ms() -> u64 {
    15_000
}

fn default_card_selector() -> String {
    ".hot-ranking-cell-wrapper".to_string()
}

fn default_title_selector() -> String {
    ".home-cell-desc-title".to_string()
}

fn default_subtitle_selector() -> String {
    ".home-cell-desc-subtitle".to_string()
}

fn default_rating_selector() -> String {
    ".season-cover-score".to_string()
}

fn default_cover_avif_selector() -> String {
    ".season-cover-img picture source[type='image/avif']".to_string()
}

fn default_cover_webp_selector() -> String {
    ".season-cover-img picture source[type='image/webp']".to_string()
}

fn default_cover_img_selector() -> String {
    ".season-cover-img img".to_string()
}

fn default_cover_img_fallback_selector() -> String {
    "img".to_string()
}

fn default_link_selector() -> String {
    "a.season-cover".to_string()
}

fn default_link_fallback_selector() -> String {
    ".home-cell-desc a".to_string()
}

fn default_pretty() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_filename() -> String {
    "scraper.log".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.scroll.round_cap, 20);
        assert_eq!(config.scroll.stable_target, 2);
        assert_eq!(config.scroll.idle_window(), Duration::from_millis(800));
        assert_eq!(config.scroll.hard_timeout(), Duration::from_millis(8000));
        assert_eq!(config.site.origin, "https://www.bilibili.com");
        assert_eq!(config.selectors.card, ".hot-ranking-cell-wrapper");
        assert!(config.output.pretty);
        assert!(config.output.snapshot_dir.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            [site]
            origin = "https://example.com"

            [scroll]
            round_cap = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.site.origin, "https://example.com");
        assert_eq!(config.site.listing_url, "https://www.bilibili.com/anime/");
        assert_eq!(config.scroll.round_cap, 5);
        assert_eq!(config.scroll.stable_target, 2);
    }

    #[test]
    fn rejects_relative_origin() {
        let err = Config::from_toml("[site]\norigin = \"/anime\"").unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn rejects_zero_round_cap() {
        let err = Config::from_toml("[scroll]\nround_cap = 0").unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn rejects_hard_timeout_shorter_than_idle_window() {
        let err = Config::from_toml("[scroll]\nidle_window_ms = 900\nhard_timeout_ms = 500")
            .unwrap_err();
        assert!(err.to_string().contains("hard_timeout_ms"));
    }

    #[test]
    fn rejects_blank_card_selector() {
        let err = Config::from_toml("[selectors]\ncard = \"  \"").unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingField(_))));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[browser]\nheadless = false\nproxy = \"socks5://127.0.0.1:9050\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/ranklist.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::FileRead(_))));
    }
}
