use crate::errors::{Result, SeleneError};
use crate::utils::screenshot::ScreenshotManager;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);
pub const DEFAULT_BROWSER_NAME: &str = "firefox";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Deadline of every wait.
    pub timeout: Duration,
    /// Pause between two attempts of a wait.
    pub poll: Duration,
    /// Prefix of relative urls passed to `Browser::open`.
    pub base_url: String,
    pub browser_name: String,
    /// WebDriver server used by the `firefox` backend.
    pub webdriver_url: String,
    pub headless: bool,
    pub start_maximized: bool,
    /// Keep the shared browser alive when the process exits.
    pub hold_browser_open: bool,
    pub save_screenshot_on_failure: bool,
    pub screenshot_folder: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll: DEFAULT_POLL,
            base_url: String::new(),
            browser_name: DEFAULT_BROWSER_NAME.to_string(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: false,
            start_maximized: true,
            hold_browser_open: false,
            save_screenshot_on_failure: true,
            screenshot_folder: ScreenshotManager::default_folder(),
        }
    }
}

impl Config {
    /// Reads `SELENE_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(raw) = lookup("SELENE_TIMEOUT") {
            config.timeout = parse_seconds("SELENE_TIMEOUT", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_POLL") {
            config.poll = parse_seconds("SELENE_POLL", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_BASE_URL").or_else(|| lookup("SELENE_APP_HOST")) {
            config.base_url = raw;
        }
        if let Some(raw) = lookup("SELENE_BROWSER_NAME") {
            config.browser_name = raw.trim().to_ascii_lowercase();
        }
        if let Some(raw) = lookup("SELENE_WEBDRIVER_URL") {
            config.webdriver_url = raw.trim().to_string();
        }
        if let Some(raw) = lookup("SELENE_HEADLESS") {
            config.headless = parse_flag("SELENE_HEADLESS", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_START_MAXIMIZED") {
            config.start_maximized = parse_flag("SELENE_START_MAXIMIZED", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_HOLD_BROWSER_OPEN") {
            config.hold_browser_open = parse_flag("SELENE_HOLD_BROWSER_OPEN", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_SAVE_SCREENSHOT_ON_FAILURE") {
            config.save_screenshot_on_failure =
                parse_flag("SELENE_SAVE_SCREENSHOT_ON_FAILURE", &raw)?;
        }
        if let Some(raw) = lookup("SELENE_SCREENSHOT_FOLDER") {
            config.screenshot_folder = PathBuf::from(raw);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.is_zero() {
            return Err(SeleneError::Config("poll interval must be positive".into()));
        }
        if self.browser_name.trim().is_empty() {
            return Err(SeleneError::Config("browser name must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration> {
    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SeleneError::Config(format!("{} must be a number of seconds, got '{}'", key, raw)))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SeleneError::Config(format!(
            "{} must be a non-negative number of seconds, got '{}'",
            key, raw
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SeleneError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}

static CURRENT: OnceLock<RwLock<Config>> = OnceLock::new();

fn holder() -> &'static RwLock<Config> {
    CURRENT.get_or_init(|| {
        let config = Config::from_env().unwrap_or_else(|err| {
            warn!("ignoring environment configuration: {}", err);
            Config::default()
        });
        RwLock::new(config)
    })
}

/// Snapshot of the process-wide configuration.
pub fn get() -> Config {
    holder()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set(config: Config) -> Result<()> {
    config.validate()?;
    *holder().write().unwrap_or_else(PoisonError::into_inner) = config;
    Ok(())
}

pub fn update(change: impl FnOnce(&mut Config)) -> Result<()> {
    let mut config = get();
    change(&mut config);
    set(config)
}

/// Re-reads the environment, surfacing malformed values instead of ignoring them.
pub fn reload_from_env() -> Result<()> {
    set(Config::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout, Duration::from_secs(4));
        assert_eq!(config.poll, Duration::from_millis(100));
        assert_eq!(config.base_url, "");
        assert_eq!(config.browser_name, "firefox");
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert!(config.start_maximized);
        assert!(!config.hold_browser_open);
        assert!(config
            .screenshot_folder
            .to_string_lossy()
            .contains(".selene"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SELENE_TIMEOUT", "2.5"),
            ("SELENE_POLL", "0.05"),
            ("SELENE_APP_HOST", "http://localhost:8000"),
            ("SELENE_BROWSER_NAME", " Chromium "),
            ("SELENE_WEBDRIVER_URL", "http://grid:4444/wd/hub"),
            ("SELENE_HOLD_BROWSER_OPEN", "yes"),
            ("SELENE_SCREENSHOT_FOLDER", "/tmp/shots"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.poll, Duration::from_millis(50));
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.browser_name, "chromium");
        assert_eq!(config.webdriver_url, "http://grid:4444/wd/hub");
        assert!(config.hold_browser_open);
        assert_eq!(config.screenshot_folder, PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn test_base_url_wins_over_app_host() {
        let config = Config::from_lookup(lookup(&[
            ("SELENE_BASE_URL", "http://a"),
            ("SELENE_APP_HOST", "http://b"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://a");
    }

    #[test]
    fn test_malformed_values_are_usage_errors() {
        let err = Config::from_lookup(lookup(&[("SELENE_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, SeleneError::Config(_)));

        let err = Config::from_lookup(lookup(&[("SELENE_TIMEOUT", "-1")])).unwrap_err();
        assert!(matches!(err, SeleneError::Config(_)));

        let err = Config::from_lookup(lookup(&[("SELENE_HEADLESS", "maybe")])).unwrap_err();
        assert!(matches!(err, SeleneError::Config(_)));

        let err = Config::from_lookup(lookup(&[("SELENE_POLL", "0")])).unwrap_err();
        assert!(matches!(err, SeleneError::Config(_)));
    }
}
