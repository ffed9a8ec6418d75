use super::shared;
use crate::conditions::Condition;
use crate::core::{config, Config, Driver, SearchContext, WebElement};
use crate::elements::locator::{CollectionLocator, ElementLocator};
use crate::elements::{Collection, Element};
use crate::errors::Result;
use crate::types::{Cookie, ScriptArg, Selector};
use crate::utils::ScreenshotManager;
use crate::wait::{Entity, Wait};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
enum DriverSource {
    /// The process-wide driver, launched lazily.
    Shared,
    Owned(Arc<dyn Driver>),
}

/// Handle to a browser: entry point for element lookups and page-level
/// operations.
///
/// Configuration comes from the process-wide [`Config`] unless overridden
/// with [`Browser::with_config`].
#[derive(Clone)]
pub struct Browser {
    source: DriverSource,
    config: Option<Arc<Config>>,
}

impl Browser {
    /// Browser over an explicitly supplied driver.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            source: DriverSource::Owned(driver),
            config: None,
        }
    }

    /// Browser over the shared driver.
    pub fn shared() -> Self {
        Self {
            source: DriverSource::Shared,
            config: None,
        }
    }

    pub fn with_config(&self, config: Config) -> Self {
        Self {
            source: self.source.clone(),
            config: Some(Arc::new(config)),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_config(self.config().with_timeout(timeout))
    }

    pub fn config(&self) -> Config {
        match &self.config {
            Some(config) => Config::clone(config),
            None => config::get(),
        }
    }

    pub fn driver(&self) -> Result<Arc<dyn Driver>> {
        match &self.source {
            DriverSource::Shared => shared::driver(),
            DriverSource::Owned(driver) => Ok(Arc::clone(driver)),
        }
    }

    /// Navigates to `url`. Urls that do not parse as absolute are prefixed
    /// with the configured `base_url`.
    pub fn open(&self, url: &str) -> Result<&Self> {
        let target = match url::Url::parse(url) {
            Ok(_) => url.to_string(),
            Err(_) => format!("{}{}", self.config().base_url, url),
        };
        info!("opening {}", target);
        self.driver()?.get(&target)?;
        Ok(self)
    }

    pub fn element(&self, selector: impl Into<Selector>) -> Element {
        Element::new(ElementLocator::ByContext(selector.into()), self.clone())
    }

    pub fn all(&self, selector: impl Into<Selector>) -> Collection {
        Collection::new(CollectionLocator::ByContext(selector.into()), self.clone())
    }

    pub fn should(&self, condition: impl Condition<Browser>) -> Result<&Self> {
        Wait::for_entity(self).until(self, &condition)?;
        Ok(self)
    }

    /// Alias of [`Browser::should`].
    pub fn wait_to(&self, condition: impl Condition<Browser>) -> Result<&Self> {
        self.should(condition)
    }

    /// Runs `script` as a function body with `args` bound to `arguments`.
    pub fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        self.driver()?.execute_script(script, args)
    }

    pub fn title(&self) -> Result<String> {
        self.driver()?.title()
    }

    pub fn current_url(&self) -> Result<String> {
        self.driver()?.current_url()
    }

    pub fn page_source(&self) -> Result<String> {
        self.driver()?.page_source()
    }

    pub fn back(&self) -> Result<&Self> {
        self.driver()?.back()?;
        Ok(self)
    }

    pub fn forward(&self) -> Result<&Self> {
        self.driver()?.forward()?;
        Ok(self)
    }

    pub fn refresh(&self) -> Result<&Self> {
        self.driver()?.refresh()?;
        Ok(self)
    }

    pub fn window_size(&self) -> Result<(u32, u32)> {
        self.driver()?.window_size()
    }

    pub fn cookies(&self) -> Result<Vec<Cookie>> {
        self.driver()?.cookies()
    }

    pub fn add_cookie(&self, cookie: &Cookie) -> Result<&Self> {
        self.driver()?.add_cookie(cookie)?;
        Ok(self)
    }

    pub fn delete_cookie(&self, name: &str) -> Result<&Self> {
        self.driver()?.delete_cookie(name)?;
        Ok(self)
    }

    pub fn delete_all_cookies(&self) -> Result<&Self> {
        self.driver()?.delete_all_cookies()?;
        Ok(self)
    }

    /// PNG bytes of the viewport.
    pub fn screenshot_bytes(&self) -> Result<Vec<u8>> {
        self.driver()?.screenshot()
    }

    pub fn screenshot_as_base64(&self) -> Result<String> {
        Ok(ScreenshotManager::to_base64(&self.screenshot_bytes()?))
    }

    /// Saves the viewport as `<screenshot_folder>/<name>_<index>.png`.
    pub fn screenshot(&self, name: &str) -> Result<PathBuf> {
        let png = self.screenshot_bytes()?;
        ScreenshotManager::save(&png, &self.config().screenshot_folder, name)
    }

    /// Quits the driver. The shared driver is relaunched on next use; an
    /// owned one reports `DriverClosed` from then on.
    pub fn quit(&self) -> Result<()> {
        match &self.source {
            DriverSource::Shared => shared::quit(),
            DriverSource::Owned(driver) => driver.quit(),
        }
    }

    /// Best-effort screenshot attached to timeout errors.
    pub(crate) fn failure_screenshot(&self) -> Option<PathBuf> {
        let config = self.config();
        if !config.save_screenshot_on_failure {
            return None;
        }
        let driver = match &self.source {
            DriverSource::Owned(driver) => Arc::clone(driver),
            // never launch a browser just to photograph a failure
            DriverSource::Shared if shared::is_started() => shared::driver().ok()?,
            DriverSource::Shared => return None,
        };
        match driver
            .screenshot()
            .and_then(|png| ScreenshotManager::save(&png, &config.screenshot_folder, "screen"))
        {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("failed to capture failure screenshot: {}", err);
                None
            }
        }
    }
}

impl SearchContext for Browser {
    fn find_element(&self, selector: &Selector) -> Result<WebElement> {
        let driver = self.driver()?;
        let id = driver.find_element(None, selector)?;
        Ok(WebElement::new(id, driver))
    }

    fn find_elements(&self, selector: &Selector) -> Result<Vec<WebElement>> {
        let driver = self.driver()?;
        let ids = driver.find_elements(None, selector)?;
        Ok(ids
            .into_iter()
            .map(|id| WebElement::new(id, Arc::clone(&driver)))
            .collect())
    }
}

impl Entity for Browser {
    fn description(&self) -> String {
        "browser".to_string()
    }

    fn browser(&self) -> &Browser {
        self
    }
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            DriverSource::Shared => "shared",
            DriverSource::Owned(driver) => driver.name(),
        };
        f.debug_struct("Browser")
            .field("driver", &source)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{title, url_containing};
    use crate::errors::SeleneError;
    use crate::testing::{fast_config, FakeDriver};

    fn browser_on(driver: &Arc<FakeDriver>) -> Browser {
        Browser::new(driver.clone()).with_config(fast_config())
    }

    #[test]
    fn test_open_prefixes_relative_urls_with_base_url() {
        let driver = Arc::new(FakeDriver::new());
        driver.route("http://app.test/login", "Login", "<form></form>");
        let browser = Browser::new(driver.clone())
            .with_config(fast_config().with_base_url("http://app.test"));

        browser.open("/login").unwrap();
        assert_eq!(browser.current_url().unwrap(), "http://app.test/login");
        assert_eq!(browser.title().unwrap(), "Login");

        browser.open("about:blank").unwrap();
        assert_eq!(browser.current_url().unwrap(), "about:blank");
    }

    #[test]
    fn test_wait_to_polls_browser_conditions() {
        let driver = Arc::new(FakeDriver::new());
        driver.route("http://app.test/", "Home", "<p>home</p>");
        let browser = browser_on(&driver);
        browser.open("http://app.test/").unwrap();
        browser.wait_to(title("Home")).unwrap();

        let err = browser.wait_to(url_containing("/admin")).unwrap_err();
        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.entity, "browser");
        assert_eq!(timeout.condition, "url_containing('/admin')");
    }

    #[test]
    fn test_history_navigation() {
        let driver = Arc::new(FakeDriver::new());
        driver.route("http://app.test/a", "A", "<p>a</p>");
        driver.route("http://app.test/b", "B", "<p>b</p>");
        let browser = browser_on(&driver);
        browser.open("http://app.test/a").unwrap();
        browser.open("http://app.test/b").unwrap();

        browser.back().unwrap();
        assert_eq!(browser.title().unwrap(), "A");
        browser.forward().unwrap();
        assert_eq!(browser.title().unwrap(), "B");
    }

    #[test]
    fn test_cookies_round_through_driver() {
        let driver = Arc::new(FakeDriver::new());
        let browser = browser_on(&driver);
        browser
            .add_cookie(&Cookie::new("a", "1"))
            .unwrap()
            .add_cookie(&Cookie::new("b", "2"))
            .unwrap();
        assert_eq!(browser.cookies().unwrap().len(), 2);
        browser.delete_cookie("a").unwrap();
        assert_eq!(browser.cookies().unwrap()[0].name, "b");
        browser.delete_all_cookies().unwrap();
        assert!(browser.cookies().unwrap().is_empty());
    }

    #[test]
    fn test_screenshot_is_saved_with_counter_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FakeDriver::new());
        let config = Config {
            screenshot_folder: dir.path().to_path_buf(),
            ..fast_config()
        };
        let browser = Browser::new(driver.clone()).with_config(config);

        let path = browser.screenshot("home").unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
        assert!(!browser.screenshot_as_base64().unwrap().is_empty());
    }

    #[test]
    fn test_timeout_carries_failure_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FakeDriver::with_body("<p>x</p>"));
        let config = Config {
            screenshot_folder: dir.path().to_path_buf(),
            save_screenshot_on_failure: true,
            ..fast_config()
        };
        let browser = Browser::new(driver.clone()).with_config(config);

        let err = browser.element("#missing").click().unwrap_err();
        let screenshot = err.as_timeout().unwrap().screenshot.clone().unwrap();
        assert!(screenshot.starts_with(dir.path()));
        assert!(screenshot.exists());
    }

    #[test]
    fn test_quit_closes_owned_driver() {
        let driver = Arc::new(FakeDriver::with_body("<p>x</p>"));
        let browser = browser_on(&driver);
        browser.quit().unwrap();
        assert!(driver.is_closed());

        let err = browser.element("p").text().unwrap_err();
        assert!(matches!(err, SeleneError::DriverClosed));
    }

    #[test]
    fn test_with_timeout_overrides_only_this_handle() {
        let driver = Arc::new(FakeDriver::new());
        let browser = browser_on(&driver);
        let slower = browser.with_timeout(Duration::from_secs(9));
        assert_eq!(slower.config().timeout, Duration::from_secs(9));
        assert_eq!(browser.config().timeout, fast_config().timeout);
    }
}
