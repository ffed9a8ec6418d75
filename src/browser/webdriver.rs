//! W3C WebDriver backend, used for Firefox through geckodriver
//! (`geckodriver --port 4444`) or any other WebDriver server.

use crate::core::{Config, Driver};
use crate::errors::{Result, SeleneError};
use crate::types::{Cookie, ElementId, ElementRect, Key, ScriptArg, Selector, Strategy};
use crate::utils::javascript::{scripts, ELEMENT_KEY};
use base64::{engine::general_purpose, Engine as _};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Key of a web element reference on the wire.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a6ab-4d4b8c4a4b4e";

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// [`Driver`] speaking the W3C WebDriver protocol to a remote end.
///
/// Element ids are the remote end's own references. Script results carry
/// elements in the same `{"__selene_element": id}` shape as the Chrome
/// backend, so callers see one format.
pub struct RemoteDriver {
    name: String,
    base_url: String,
    http: Client,
    session: Mutex<Option<String>>,
}

impl RemoteDriver {
    /// Opens a Firefox session on the server at `config.webdriver_url`.
    pub fn firefox(config: &Config) -> Result<Self> {
        let driver = Self::connect(&config.webdriver_url, "firefox", firefox_capabilities(config))?;
        if config.start_maximized && !config.headless {
            if let Err(err) = driver.post("/window/maximize", json!({})) {
                warn!("failed to maximize firefox window: {}", err);
            }
        }
        Ok(driver)
    }

    /// Starts a new session with `capabilities` as the `alwaysMatch` set.
    pub fn connect(url: &str, name: &str, capabilities: Value) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SeleneError::LaunchFailed(e.to_string()))?;
        let base_url = url.trim_end_matches('/').to_string();

        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let created = send(&http, Method::POST, &format!("{}/session", base_url), Some(body))
            .map_err(|err| {
                SeleneError::LaunchFailed(format!("no WebDriver session at {}: {}", base_url, err))
            })?;
        let session = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SeleneError::LaunchFailed(format!("unexpected new session response: {}", created))
            })?
            .to_string();

        info!("started {} session {} at {}", name, session, base_url);
        Ok(Self {
            name: name.to_string(),
            base_url,
            http,
            session: Mutex::new(Some(session)),
        })
    }

    fn session_url(&self) -> Result<String> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match session.as_deref() {
            Some(id) => Ok(format!("{}/session/{}", self.base_url, id)),
            None => Err(SeleneError::DriverClosed),
        }
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.session_url()?, path);
        send(&self.http, method, &url, body)
    }

    fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(serde_json::from_value(self.command(Method::GET, path, None)?)?)
    }

    fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.command(Method::POST, path, Some(body))
    }

    fn script(&self, body: &str, args: &[ScriptArg]) -> Result<Value> {
        let args: Vec<Value> = args.iter().map(encode_arg).collect();
        let value = self.post("/execute/sync", json!({ "script": body, "args": args }))?;
        Ok(decode_value(value))
    }

    fn script_on<T: DeserializeOwned>(&self, element: &ElementId, body: &str, extra: &[Value]) -> Result<T> {
        let mut args = vec![ScriptArg::Element(element.clone())];
        args.extend(extra.iter().cloned().map(ScriptArg::Value));
        Ok(serde_json::from_value(self.script(body, &args)?)?)
    }

    /// Moves the mouse onto the element and clicks `clicks` times.
    fn pointer(&self, element: &ElementId, clicks: usize) -> Result<()> {
        let mut steps = vec![json!({
            "type": "pointerMove",
            "duration": 0,
            "origin": element_ref(element),
            "x": 0,
            "y": 0,
        })];
        for _ in 0..clicks {
            steps.push(json!({ "type": "pointerDown", "button": 0 }));
            steps.push(json!({ "type": "pointerUp", "button": 0 }));
        }
        self.post(
            "/actions",
            json!({ "actions": [{
                "type": "pointer",
                "id": "mouse",
                "parameters": { "pointerType": "mouse" },
                "actions": steps,
            }]}),
        )?;
        self.command(Method::DELETE, "/actions", None).map(|_| ())
    }

    fn screenshot_at(&self, path: &str) -> Result<Vec<u8>> {
        let encoded: String = self.get_as(path)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SeleneError::Driver(format!("invalid screenshot data: {}", e)))
    }
}

fn on(element: &ElementId, path: &str) -> String {
    format!("/element/{}{}", element, path)
}

impl Driver for RemoteDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_elements(&self, root: Option<&ElementId>, selector: &Selector) -> Result<Vec<ElementId>> {
        let path = match root {
            Some(id) => on(id, "/elements"),
            None => "/elements".to_string(),
        };
        let found = self.post(&path, locator(selector))?;
        element_ids(&found)
    }

    fn text(&self, element: &ElementId) -> Result<String> {
        self.get_as(&on(element, "/text"))
    }

    fn tag_name(&self, element: &ElementId) -> Result<String> {
        let name: String = self.get_as(&on(element, "/name"))?;
        Ok(name.to_ascii_lowercase())
    }

    fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        self.script_on(element, scripts::ATTRIBUTE, &[json!(name)])
    }

    fn css_value(&self, element: &ElementId, name: &str) -> Result<String> {
        self.get_as(&on(element, &format!("/css/{}", name)))
    }

    fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        self.get_as(&on(element, "/displayed"))
    }

    fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        self.get_as(&on(element, "/enabled"))
    }

    fn is_selected(&self, element: &ElementId) -> Result<bool> {
        self.get_as(&on(element, "/selected"))
    }

    fn rect(&self, element: &ElementId) -> Result<ElementRect> {
        self.get_as(&on(element, "/rect"))
    }

    fn click(&self, element: &ElementId) -> Result<()> {
        self.post(&on(element, "/click"), json!({})).map(|_| ())
    }

    fn double_click(&self, element: &ElementId) -> Result<()> {
        self.pointer(element, 2)
    }

    fn hover(&self, element: &ElementId) -> Result<()> {
        self.pointer(element, 0)
    }

    fn clear(&self, element: &ElementId) -> Result<()> {
        self.post(&on(element, "/clear"), json!({})).map(|_| ())
    }

    fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        self.post(&on(element, "/value"), json!({ "text": text }))
            .map(|_| ())
    }

    fn press_key(&self, element: &ElementId, key: Key) -> Result<()> {
        self.post(&on(element, "/value"), json!({ "text": key_code(key) }))
            .map(|_| ())
    }

    fn submit(&self, element: &ElementId) -> Result<()> {
        self.script_on::<Value>(element, scripts::SUBMIT, &[]).map(|_| ())
    }

    fn scroll_into_view(&self, element: &ElementId) -> Result<()> {
        self.script_on::<Value>(element, scripts::SCROLL_INTO_VIEW, &[])
            .map(|_| ())
    }

    fn element_screenshot(&self, element: &ElementId) -> Result<Vec<u8>> {
        self.screenshot_at(&on(element, "/screenshot"))
    }

    fn get(&self, url: &str) -> Result<()> {
        self.post("/url", json!({ "url": url }))?;
        debug!("navigated to {}", url);
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        self.get_as("/url")
    }

    fn title(&self) -> Result<String> {
        self.get_as("/title")
    }

    fn page_source(&self) -> Result<String> {
        self.get_as("/source")
    }

    fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        self.script(script, args)
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.screenshot_at("/screenshot")
    }

    fn back(&self) -> Result<()> {
        self.post("/back", json!({})).map(|_| ())
    }

    fn forward(&self) -> Result<()> {
        self.post("/forward", json!({})).map(|_| ())
    }

    fn refresh(&self) -> Result<()> {
        self.post("/refresh", json!({})).map(|_| ())
    }

    fn window_size(&self) -> Result<(u32, u32)> {
        let [width, height]: [u32; 2] = serde_json::from_value(self.script(scripts::WINDOW_SIZE, &[])?)?;
        Ok((width, height))
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies: Vec<WireCookie> = self.get_as("/cookie")?;
        Ok(cookies.into_iter().map(Cookie::from).collect())
    }

    fn add_cookie(&self, cookie: &Cookie) -> Result<()> {
        self.post("/cookie", json!({ "cookie": WireCookie::from(cookie) }))
            .map(|_| ())
    }

    fn delete_cookie(&self, name: &str) -> Result<()> {
        let mut url = url::Url::parse(&format!("{}/cookie", self.session_url()?))
            .map_err(|e| SeleneError::Driver(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SeleneError::Driver(format!("cannot address cookie '{}'", name)))?
            .push(name);
        send(&self.http, Method::DELETE, url.as_str(), None).map(|_| ())
    }

    fn delete_all_cookies(&self) -> Result<()> {
        self.command(Method::DELETE, "/cookie", None).map(|_| ())
    }

    fn quit(&self) -> Result<()> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let session = session.ok_or(SeleneError::DriverClosed)?;
        send(
            &self.http,
            Method::DELETE,
            &format!("{}/session/{}", self.base_url, session),
            None,
        )?;
        info!("{} session {} closed", self.name, session);
        Ok(())
    }
}

impl Drop for RemoteDriver {
    fn drop(&mut self) {
        let open = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if open {
            if let Err(err) = self.quit() {
                warn!("failed to close {} session: {}", self.name, err);
            }
        }
    }
}

/// Sends one command and returns its `value`, or the mapped WebDriver error.
fn send(http: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
    trace!("{} {}", method, url);
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request
        .send()
        .map_err(|e| SeleneError::Driver(e.to_string()))?;
    let status = response.status();
    let mut payload: Value = response
        .json()
        .map_err(|e| SeleneError::Driver(format!("{} from {}: {}", status, url, e)))?;
    let value = payload
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);
    if status.is_success() {
        Ok(value)
    } else {
        Err(wire_error(&value))
    }
}

fn wire_error(value: &Value) -> SeleneError {
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match code {
        "no such element" => SeleneError::NoSuchElement(message),
        "stale element reference" => SeleneError::StaleElement(message),
        "element not interactable" | "element click intercepted" | "invalid element state" => {
            SeleneError::NotInteractable(message)
        }
        "invalid selector" => SeleneError::InvalidSelector(message),
        "javascript error" => SeleneError::JavaScript(message),
        "invalid session id" => SeleneError::DriverClosed,
        other => SeleneError::Driver(format!("{}: {}", other, message)),
    }
}

fn firefox_capabilities(config: &Config) -> Value {
    let mut args = Vec::new();
    if config.headless {
        args.push("-headless".to_string());
    }
    if !config.start_maximized {
        args.push("--width=1280".to_string());
        args.push("--height=720".to_string());
    }
    json!({
        "browserName": "firefox",
        "moz:firefoxOptions": { "args": args },
    })
}

/// Location strategies without a W3C counterpart are expressed as CSS.
fn locator(selector: &Selector) -> Value {
    let quoted = || Value::String(selector.value.clone()).to_string();
    let (using, value) = match selector.strategy {
        Strategy::Css => ("css selector", selector.value.clone()),
        Strategy::XPath => ("xpath", selector.value.clone()),
        Strategy::Id => ("css selector", format!("[id={}]", quoted())),
        Strategy::Name => ("css selector", format!("[name={}]", quoted())),
        Strategy::Class => ("css selector", format!("[class~={}]", quoted())),
        Strategy::Tag => ("tag name", selector.value.clone()),
        Strategy::LinkText => ("link text", selector.value.clone()),
        Strategy::PartialLinkText => ("partial link text", selector.value.clone()),
    };
    json!({ "using": using, "value": value })
}

fn key_code(key: Key) -> &'static str {
    match key {
        Key::Enter => "\u{E007}",
        Key::Tab => "\u{E004}",
        Key::Escape => "\u{E00C}",
        Key::Backspace => "\u{E003}",
        Key::ArrowUp => "\u{E013}",
        Key::ArrowDown => "\u{E015}",
    }
}

fn element_ref(id: &ElementId) -> Value {
    json!({ W3C_ELEMENT_KEY: id.as_str() })
}

fn element_ids(value: &Value) -> Result<Vec<ElementId>> {
    let items = value
        .as_array()
        .ok_or_else(|| SeleneError::Driver(format!("expected element list, got {}", value)))?;
    items
        .iter()
        .map(|item| {
            item.get(W3C_ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| ElementId(id.to_string()))
                .ok_or_else(|| SeleneError::Driver(format!("expected element reference, got {}", item)))
        })
        .collect()
}

fn encode_arg(arg: &ScriptArg) -> Value {
    match arg {
        ScriptArg::Value(value) => value.clone(),
        ScriptArg::Element(id) => element_ref(id),
    }
}

/// Rewrites wire element references into the crate's script format.
fn decode_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(decode_value).collect()),
        Value::Object(object) => {
            if object.len() == 1 {
                if let Some(Value::String(id)) = object.get(W3C_ELEMENT_KEY) {
                    return json!({ ELEMENT_KEY: id });
                }
            }
            Value::Object(
                object
                    .into_iter()
                    .map(|(key, value)| (key, decode_value(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        other => other,
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCookie {
    name: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
    #[serde(default)]
    secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<i64>,
}

impl From<&Cookie> for WireCookie {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            path: cookie.path.clone(),
            domain: cookie.domain.clone(),
            secure: cookie.secure,
            expiry: cookie.expires,
        }
    }
}

impl From<WireCookie> for Cookie {
    fn from(wire: WireCookie) -> Self {
        Cookie {
            name: wire.name,
            value: wire.value,
            domain: wire.domain,
            path: wire.path,
            expires: wire.expiry,
            secure: wire.secure,
        }
    }
}
