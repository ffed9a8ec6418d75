use crate::core::{Config, Driver};
use crate::errors::{Result, SeleneError};
use crate::types::{Cookie, ElementId, ElementRect, Key, ScriptArg, Selector};
use crate::utils::javascript::{scripts, JavaScriptRunner};
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser as ChromeProcess, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

const WINDOW_SIZE_ARG: &str = "--window-size=1280,720";

struct ChromeSession {
    // dropping the process handle shuts chrome down
    _process: ChromeProcess,
    tab: Arc<Tab>,
}

/// [`Driver`] over a local Chrome or Chromium controlled through the
/// DevTools protocol.
pub struct ChromeDriver {
    session: Mutex<Option<ChromeSession>>,
}

impl ChromeDriver {
    pub fn launch(config: &Config) -> Result<Self> {
        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
        ];
        if config.start_maximized {
            args.push(OsStr::new("--start-maximized"));
        } else {
            args.push(OsStr::new(WINDOW_SIZE_ARG));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| SeleneError::LaunchFailed(e.to_string()))?;

        let process =
            ChromeProcess::new(launch_options).map_err(|e| SeleneError::LaunchFailed(e.to_string()))?;
        let tab = process
            .new_tab()
            .map_err(|e| SeleneError::LaunchFailed(e.to_string()))?;

        info!(
            "launched {} (headless: {})",
            config.browser_name, config.headless
        );
        Ok(Self {
            session: Mutex::new(Some(ChromeSession {
                _process: process,
                tab,
            })),
        })
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| Arc::clone(&session.tab))
            .ok_or(SeleneError::DriverClosed)
    }

    fn call(&self, body: &str, args: &[ScriptArg]) -> Result<Value> {
        let tab = self.tab()?;
        let expression = JavaScriptRunner::wrap(body, args)?;
        let result = tab
            .evaluate(&expression, false)
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        let raw = result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| SeleneError::JavaScript("script produced no result".to_string()))?;
        JavaScriptRunner::unwrap(&raw)
    }

    fn call_as<T: DeserializeOwned>(&self, body: &str, args: &[ScriptArg]) -> Result<T> {
        Ok(serde_json::from_value(self.call(body, args)?)?)
    }

    fn call_on<T: DeserializeOwned>(&self, element: &ElementId, body: &str, extra: &[Value]) -> Result<T> {
        let mut args = vec![ScriptArg::Element(element.clone())];
        args.extend(extra.iter().cloned().map(ScriptArg::Value));
        self.call_as(body, &args)
    }

    fn run_on(&self, element: &ElementId, body: &str) -> Result<()> {
        self.call(body, &[ScriptArg::Element(element.clone())])
            .map(|_| ())
    }
}

impl Driver for ChromeDriver {
    fn name(&self) -> &str {
        "chrome"
    }

    fn find_elements(&self, root: Option<&ElementId>, selector: &Selector) -> Result<Vec<ElementId>> {
        let root = match root {
            Some(id) => ScriptArg::Element(id.clone()),
            None => ScriptArg::Value(Value::Null),
        };
        let found = self.call(
            scripts::FIND_ELEMENTS,
            &[
                root,
                json!(selector.strategy.as_str()).into(),
                json!(selector.value).into(),
            ],
        )?;
        JavaScriptRunner::element_ids(&found)
    }

    fn text(&self, element: &ElementId) -> Result<String> {
        self.call_on(element, scripts::TEXT, &[])
    }

    fn tag_name(&self, element: &ElementId) -> Result<String> {
        self.call_on(element, scripts::TAG_NAME, &[])
    }

    fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        self.call_on(element, scripts::ATTRIBUTE, &[json!(name)])
    }

    fn css_value(&self, element: &ElementId, name: &str) -> Result<String> {
        self.call_on(element, scripts::CSS_VALUE, &[json!(name)])
    }

    fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        self.call_on(element, scripts::IS_DISPLAYED, &[])
    }

    fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        self.call_on(element, scripts::IS_ENABLED, &[])
    }

    fn is_selected(&self, element: &ElementId) -> Result<bool> {
        self.call_on(element, scripts::IS_SELECTED, &[])
    }

    fn rect(&self, element: &ElementId) -> Result<ElementRect> {
        self.call_on(element, scripts::RECT, &[])
    }

    fn click(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::CLICK)
    }

    fn double_click(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::DOUBLE_CLICK)
    }

    fn hover(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::HOVER)
    }

    fn clear(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::CLEAR)
    }

    fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        self.run_on(element, scripts::FOCUS_END)?;
        self.tab()?
            .type_str(text)
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        Ok(())
    }

    fn press_key(&self, element: &ElementId, key: Key) -> Result<()> {
        self.run_on(element, scripts::FOCUS_END)?;
        self.tab()?
            .press_key(key.as_str())
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        Ok(())
    }

    fn submit(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::SUBMIT)
    }

    fn scroll_into_view(&self, element: &ElementId) -> Result<()> {
        self.run_on(element, scripts::SCROLL_INTO_VIEW)
    }

    fn element_screenshot(&self, element: &ElementId) -> Result<Vec<u8>> {
        let rect: ElementRect = self.call_on(element, scripts::VIEWPORT_RECT, &[])?;
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(SeleneError::NotInteractable(format!(
                "{} has an empty bounding box",
                element
            )));
        }
        let clip = Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        };
        self.tab()?
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| SeleneError::Driver(e.to_string()))
    }

    fn get(&self, url: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        debug!("navigated to {}", url);
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.tab()?.get_url())
    }

    fn title(&self) -> Result<String> {
        self.call_as(scripts::TITLE, &[])
    }

    fn page_source(&self) -> Result<String> {
        self.call_as(scripts::PAGE_SOURCE, &[])
    }

    fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        self.call(script, args)
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab()?
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| SeleneError::Driver(e.to_string()))
    }

    fn back(&self) -> Result<()> {
        self.call(scripts::BACK, &[]).map(|_| ())
    }

    fn forward(&self) -> Result<()> {
        self.call(scripts::FORWARD, &[]).map(|_| ())
    }

    fn refresh(&self) -> Result<()> {
        self.tab()?
            .reload(false, None)
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        Ok(())
    }

    fn window_size(&self) -> Result<(u32, u32)> {
        let [width, height]: [u32; 2] = self.call_as(scripts::WINDOW_SIZE, &[])?;
        Ok((width, height))
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        self.call_as(scripts::COOKIES, &[])
    }

    fn add_cookie(&self, cookie: &Cookie) -> Result<()> {
        self.call(scripts::SET_COOKIE, &[json!(cookie_string(cookie)).into()])
            .map(|_| ())
    }

    fn delete_cookie(&self, name: &str) -> Result<()> {
        self.call(scripts::DELETE_COOKIE, &[json!(name).into()])
            .map(|_| ())
    }

    fn delete_all_cookies(&self) -> Result<()> {
        self.call(scripts::DELETE_ALL_COOKIES, &[]).map(|_| ())
    }

    fn quit(&self) -> Result<()> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match session {
            Some(_) => {
                info!("chrome closed");
                Ok(())
            }
            None => Err(SeleneError::DriverClosed),
        }
    }
}

/// `document.cookie` assignment for `cookie`.
fn cookie_string(cookie: &Cookie) -> String {
    let mut parts = vec![format!("{}={}", cookie.name, cookie.value)];
    parts.push(format!("path={}", cookie.path.as_deref().unwrap_or("/")));
    if let Some(domain) = &cookie.domain {
        parts.push(format!("domain={}", domain));
    }
    if let Some(expires) = cookie.expires {
        let max_age = (expires - chrono::Utc::now().timestamp()).max(0);
        parts.push(format!("max-age={}", max_age));
    }
    if cookie.secure {
        parts.push("secure".to_string());
    }
    parts.join("; ")
}
