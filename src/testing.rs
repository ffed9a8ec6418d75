//! In-memory driver for exercising page logic without a browser.
//!
//! [`FakeDriver`] keeps one page (url, title and body HTML) and re-parses it
//! with `scraper` on every call, so tests can rewrite the page at any time,
//! immediately or after a delay, and watch lazy handles catch up.

use crate::core::{Config, Driver};
use crate::errors::{Result, SeleneError};
use crate::types::{Cookie, ElementId, ElementRect, Key, ScriptArg, Selector, Strategy};
use regex::Regex;
use scraper::{ElementRef, Html, Selector as CssSelector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// 1x1 transparent PNG returned for every screenshot.
pub const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Short waits for tests: 300ms timeout, 10ms poll, no failure screenshots.
pub fn fast_config() -> Config {
    Config {
        timeout: Duration::from_millis(300),
        poll: Duration::from_millis(10),
        save_screenshot_on_failure: false,
        ..Config::default()
    }
}

/// The document a [`FakeDriver`] serves.
#[derive(Debug, Clone)]
pub struct FakePage {
    pub url: String,
    pub title: String,
    body: String,
    revision: u64,
}

impl FakePage {
    fn new(url: &str, title: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            revision: 0,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replaces the body. Elements found before become stale.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.revision += 1;
    }

    fn load(&mut self, url: &str, title: &str, body: &str) {
        self.url = url.to_string();
        self.title = title.to_string();
        self.set_body(body);
    }

    fn parse(&self) -> Html {
        Html::parse_document(&self.document())
    }

    fn document(&self) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>{}</title></head><body>{}</body></html>",
            self.title, self.body
        )
    }
}

type Handler = Arc<dyn Fn(&mut FakePage, &str) + Send + Sync>;
type ScriptHandler = Arc<dyn Fn(&[ScriptArg]) -> Value + Send + Sync>;
type Change = Box<dyn FnOnce(&mut FakePage) + Send>;

struct Listener {
    event: String,
    css: String,
    handler: Handler,
}

/// Element position: page revision plus child indices from the document root.
type NodeKey = (u64, Vec<usize>);

struct FakeState {
    page: FakePage,
    routes: HashMap<String, (String, String)>,
    back: Vec<String>,
    forward: Vec<String>,
    ids: HashMap<String, NodeKey>,
    minted: HashMap<NodeKey, String>,
    values: HashMap<NodeKey, String>,
    checked: HashMap<NodeKey, bool>,
    listeners: Vec<Listener>,
    scripts: HashMap<String, ScriptHandler>,
    scheduled: Vec<(Instant, Change)>,
    cookies: Vec<Cookie>,
    actions: Vec<String>,
    closed: bool,
}

/// Scripted, browser-free [`Driver`].
///
/// ```
/// use selene::testing::{fast_config, FakeDriver};
/// use selene::{conditions::has_text, Browser};
/// use std::sync::Arc;
///
/// let driver = Arc::new(FakeDriver::with_body("<p id='msg'>hello</p>"));
/// let browser = Browser::new(driver.clone()).with_config(fast_config());
/// browser.element("#msg").should(has_text("hell")).unwrap();
/// ```
pub struct FakeDriver {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::with_page("about:blank", "", "")
    }

    pub fn with_body(body: &str) -> Self {
        Self::with_page("about:blank", "", body)
    }

    pub fn with_page(url: &str, title: &str, body: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                page: FakePage::new(url, title, body),
                routes: HashMap::new(),
                back: Vec::new(),
                forward: Vec::new(),
                ids: HashMap::new(),
                minted: HashMap::new(),
                values: HashMap::new(),
                checked: HashMap::new(),
                listeners: Vec::new(),
                scripts: HashMap::new(),
                scheduled: Vec::new(),
                cookies: Vec::new(),
                actions: Vec::new(),
                closed: false,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Page served when `url` is opened or followed.
    pub fn route(&self, url: &str, title: &str, body: &str) {
        self.lock()
            .routes
            .insert(url.to_string(), (title.to_string(), body.to_string()));
    }

    pub fn set_body(&self, body: &str) {
        self.lock().page.set_body(body);
    }

    pub fn set_title(&self, title: &str) {
        self.lock().page.title = title.to_string();
    }

    /// Applies `change` to the page on the first driver call at least
    /// `after` from now.
    pub fn schedule(&self, after: Duration, change: impl FnOnce(&mut FakePage) + Send + 'static) {
        self.lock()
            .scheduled
            .push((Instant::now() + after, Box::new(change)));
    }

    /// Answers `execute_script` calls whose source equals `script`. Other
    /// scripts return `null`.
    pub fn on_script(
        &self,
        script: &str,
        handler: impl Fn(&[ScriptArg]) -> Value + Send + Sync + 'static,
    ) {
        self.lock()
            .scripts
            .insert(script.to_string(), Arc::new(handler));
    }

    /// Runs `handler` when an element matching `css` is clicked. The handler
    /// gets the clicked element's current value (empty for non-fields).
    pub fn on_click(&self, css: &str, handler: impl Fn(&mut FakePage, &str) + Send + Sync + 'static) {
        self.listen("click", css, Arc::new(handler));
    }

    /// Runs `handler` when `key` is pressed in an element matching `css`.
    pub fn on_key(
        &self,
        css: &str,
        key: Key,
        handler: impl Fn(&mut FakePage, &str) + Send + Sync + 'static,
    ) {
        self.listen(&format!("key:{}", key.as_str()), css, Arc::new(handler));
    }

    /// Runs `handler` when a form matching `css` is submitted.
    pub fn on_submit(&self, css: &str, handler: impl Fn(&mut FakePage, &str) + Send + Sync + 'static) {
        self.listen("submit", css, Arc::new(handler));
    }

    /// Number of [`Driver`] calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Log of performed interactions, e.g. `click button#save`.
    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn listen(&self, event: &str, css: &str, handler: Handler) {
        self.lock().listeners.push(Listener {
            event: event.to_string(),
            css: css.to_string(),
            handler,
        });
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry of every [`Driver`] call.
    fn enter(&self) -> Result<MutexGuard<'_, FakeState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.closed {
            return Err(SeleneError::DriverClosed);
        }
        state.apply_due();
        Ok(state)
    }

    fn with_element<R>(
        &self,
        id: &ElementId,
        action: impl FnOnce(&mut FakeState, ElementRef<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.enter()?;
        let html = state.page.parse();
        let element = state.locate(&html, id)?;
        action(&mut *state, element)
    }

    /// Like [`FakeDriver::with_element`] for interactions, which need a
    /// displayed and enabled target.
    fn interact(
        &self,
        id: &ElementId,
        verb: &str,
        action: impl FnOnce(&mut FakeState, ElementRef<'_>) -> Result<()>,
    ) -> Result<()> {
        self.with_element(id, |state, element| {
            if !displayed(element) {
                return Err(SeleneError::NotInteractable(format!(
                    "{} is not displayed",
                    describe(element)
                )));
            }
            state.actions.push(format!("{} {}", verb, describe(element)));
            action(state, element)
        })
    }
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeState {
    fn apply_due(&mut self) {
        let now = Instant::now();
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|(at, _)| *at <= now);
        self.scheduled = pending;
        due.sort_by_key(|(at, _)| *at);
        for (_, change) in due {
            change(&mut self.page);
        }
    }

    fn mint(&mut self, element: ElementRef<'_>) -> ElementId {
        let key = (self.page.revision, path_of(element));
        if let Some(id) = self.minted.get(&key) {
            return ElementId(id.clone());
        }
        let id = Uuid::new_v4().to_string();
        self.ids.insert(id.clone(), key.clone());
        self.minted.insert(key, id.clone());
        ElementId(id)
    }

    fn locate<'a>(&self, html: &'a Html, id: &ElementId) -> Result<ElementRef<'a>> {
        let (revision, path) = self
            .ids
            .get(id.as_str())
            .ok_or_else(|| SeleneError::NoSuchElement(format!("unknown element id {}", id)))?;
        if *revision != self.page.revision {
            return Err(SeleneError::StaleElement(format!(
                "{} belongs to a previous version of the page",
                id
            )));
        }
        node_at(html, path)
            .ok_or_else(|| SeleneError::StaleElement(format!("{} is no longer attached", id)))
    }

    fn key(&self, element: ElementRef<'_>) -> NodeKey {
        (self.page.revision, path_of(element))
    }

    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        self.values
            .get(&self.key(element))
            .cloned()
            .or_else(|| element.value().attr("value").map(str::to_string))
    }

    /// Runs the listeners registered for `event` on `element`.
    fn fire(&mut self, event: &str, element: ElementRef<'_>) {
        let value = self.value_of(element).unwrap_or_default();
        let handlers: Vec<Handler> = self
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .filter(|listener| {
                CssSelector::parse(&listener.css)
                    .map(|css| css.matches(&element))
                    .unwrap_or(false)
            })
            .map(|listener| Arc::clone(&listener.handler))
            .collect();
        for handler in handlers {
            handler(&mut self.page, &value);
        }
    }

    fn navigate(&mut self, url: &str) {
        let previous = std::mem::take(&mut self.page.url);
        self.back.push(previous);
        self.forward.clear();
        self.load(url);
    }

    fn load(&mut self, url: &str) {
        let (title, body) = self.routes.get(url).cloned().unwrap_or_default();
        self.page.load(url, &title, &body);
    }

    fn follow(&mut self, href: &str) {
        if let Some(fragment) = href.strip_prefix('#') {
            let base = self.page.url.split('#').next().unwrap_or_default().to_string();
            self.page.url = format!("{}#{}", base, fragment);
            return;
        }
        let target = url::Url::parse(&self.page.url)
            .and_then(|base| base.join(href))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string());
        self.navigate(&target);
    }
}

impl Driver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    fn find_elements(&self, root: Option<&ElementId>, selector: &Selector) -> Result<Vec<ElementId>> {
        let mut state = self.enter()?;
        let html = state.page.parse();
        let root = match root {
            Some(id) => state.locate(&html, id)?,
            None => html.root_element(),
        };
        let found = query(root, selector)?;
        Ok(found.into_iter().map(|element| state.mint(element)).collect())
    }

    fn text(&self, element: &ElementId) -> Result<String> {
        self.with_element(element, |_, element| Ok(visible_text(element)))
    }

    fn tag_name(&self, element: &ElementId) -> Result<String> {
        self.with_element(element, |_, element| Ok(element.value().name().to_string()))
    }

    fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        self.with_element(element, |state, element| {
            if name == "value" {
                return Ok(state.value_of(element));
            }
            Ok(element.value().attr(name).map(str::to_string))
        })
    }

    fn css_value(&self, element: &ElementId, name: &str) -> Result<String> {
        self.with_element(element, |_, element| {
            Ok(inline_style(element, name).unwrap_or_default())
        })
    }

    fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        self.with_element(element, |_, element| Ok(displayed(element)))
    }

    fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        self.with_element(element, |_, element| Ok(element.value().attr("disabled").is_none()))
    }

    fn is_selected(&self, element: &ElementId) -> Result<bool> {
        self.with_element(element, |state, element| {
            let attributes = element.value();
            let initial =
                attributes.attr("checked").is_some() || attributes.attr("selected").is_some();
            Ok(*state.checked.get(&state.key(element)).unwrap_or(&initial))
        })
    }

    fn rect(&self, element: &ElementId) -> Result<ElementRect> {
        self.with_element(element, |_, element| {
            if !displayed(element) {
                return Ok(ElementRect {
                    x: 0.0,
                    y: 0.0,
                    width: 0.0,
                    height: 0.0,
                });
            }
            let path = path_of(element);
            Ok(ElementRect {
                x: 8.0 * path.len() as f64,
                y: 20.0 * path.iter().sum::<usize>() as f64,
                width: 100.0,
                height: 20.0,
            })
        })
    }

    fn click(&self, element: &ElementId) -> Result<()> {
        self.interact(element, "click", |state, element| {
            let attributes = element.value();
            if attributes.attr("disabled").is_some() {
                return Ok(());
            }
            if attributes.name() == "input"
                && matches!(attributes.attr("type"), Some("checkbox") | Some("radio"))
            {
                let key = state.key(element);
                let initial = attributes.attr("checked").is_some();
                let current = *state.checked.get(&key).unwrap_or(&initial);
                state.checked.insert(key, !current);
            }
            let href = match attributes.name() {
                "a" => attributes.attr("href").map(str::to_string),
                _ => None,
            };
            state.fire("click", element);
            if let Some(href) = href {
                state.follow(&href);
            }
            Ok(())
        })
    }

    fn double_click(&self, element: &ElementId) -> Result<()> {
        self.interact(element, "double_click", |_, _| Ok(()))
    }

    fn hover(&self, element: &ElementId) -> Result<()> {
        self.interact(element, "hover", |_, _| Ok(()))
    }

    fn clear(&self, element: &ElementId) -> Result<()> {
        self.interact(element, "clear", |state, element| {
            require_editable(element)?;
            let key = state.key(element);
            state.values.insert(key, String::new());
            Ok(())
        })
    }

    fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        self.interact(element, &format!("type '{}' into", text), |state, element| {
            require_editable(element)?;
            let mut value = state.value_of(element).unwrap_or_default();
            value.push_str(text);
            let key = state.key(element);
            state.values.insert(key, value);
            Ok(())
        })
    }

    fn press_key(&self, element: &ElementId, key: Key) -> Result<()> {
        self.interact(element, &format!("press {} on", key.as_str()), |state, element| {
            state.fire(&format!("key:{}", key.as_str()), element);
            Ok(())
        })
    }

    fn submit(&self, element: &ElementId) -> Result<()> {
        self.with_element(element, |state, element| {
            let form = std::iter::once(element)
                .chain(element.ancestors().filter_map(ElementRef::wrap))
                .find(|candidate| candidate.value().name() == "form")
                .ok_or_else(|| {
                    SeleneError::NotInteractable(format!(
                        "{} is not inside a form",
                        describe(element)
                    ))
                })?;
            state.actions.push(format!("submit {}", describe(form)));
            state.fire("submit", form);
            Ok(())
        })
    }

    fn scroll_into_view(&self, element: &ElementId) -> Result<()> {
        self.with_element(element, |_, _| Ok(()))
    }

    fn element_screenshot(&self, element: &ElementId) -> Result<Vec<u8>> {
        self.with_element(element, |_, element| {
            if displayed(element) {
                Ok(BLANK_PNG.to_vec())
            } else {
                Err(SeleneError::NotInteractable(format!(
                    "{} has an empty bounding box",
                    describe(element)
                )))
            }
        })
    }

    fn get(&self, url: &str) -> Result<()> {
        self.enter()?.navigate(url);
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.enter()?.page.url.clone())
    }

    fn title(&self) -> Result<String> {
        Ok(self.enter()?.page.title.clone())
    }

    fn page_source(&self) -> Result<String> {
        Ok(self.enter()?.page.document())
    }

    fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        let handler = {
            let mut state = self.enter()?;
            state.actions.push(format!("script {}", script));
            state.scripts.get(script).cloned()
        };
        Ok(handler.map(|handler| handler(args)).unwrap_or(Value::Null))
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.enter()?;
        Ok(BLANK_PNG.to_vec())
    }

    fn back(&self) -> Result<()> {
        let mut state = self.enter()?;
        if let Some(previous) = state.back.pop() {
            let current = state.page.url.clone();
            state.forward.push(current);
            state.load(&previous);
        }
        Ok(())
    }

    fn forward(&self) -> Result<()> {
        let mut state = self.enter()?;
        if let Some(next) = state.forward.pop() {
            let current = state.page.url.clone();
            state.back.push(current);
            state.load(&next);
        }
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let mut state = self.enter()?;
        let body = state.page.body.clone();
        state.page.set_body(body);
        Ok(())
    }

    fn window_size(&self) -> Result<(u32, u32)> {
        drop(self.enter()?);
        Ok((1280, 720))
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.enter()?.cookies.clone())
    }

    fn add_cookie(&self, cookie: &Cookie) -> Result<()> {
        let mut state = self.enter()?;
        state.cookies.retain(|existing| existing.name != cookie.name);
        state.cookies.push(cookie.clone());
        Ok(())
    }

    fn delete_cookie(&self, name: &str) -> Result<()> {
        self.enter()?.cookies.retain(|cookie| cookie.name != name);
        Ok(())
    }

    fn delete_all_cookies(&self) -> Result<()> {
        self.enter()?.cookies.clear();
        Ok(())
    }

    fn quit(&self) -> Result<()> {
        self.enter()?.closed = true;
        Ok(())
    }
}

fn query<'a>(root: ElementRef<'a>, selector: &Selector) -> Result<Vec<ElementRef<'a>>> {
    let value = selector.value.as_str();
    match selector.strategy {
        Strategy::Css | Strategy::Tag => css(root, value),
        Strategy::Id => css(root, &format!("[id=\"{}\"]", value.replace('"', "\\\""))),
        Strategy::Name => css(root, &format!("[name=\"{}\"]", value.replace('"', "\\\""))),
        Strategy::Class => css(root, &format!(".{}", value)),
        Strategy::LinkText => Ok(css(root, "a")?
            .into_iter()
            .filter(|link| visible_text(*link) == value)
            .collect()),
        Strategy::PartialLinkText => Ok(css(root, "a")?
            .into_iter()
            .filter(|link| visible_text(*link).contains(value))
            .collect()),
        Strategy::XPath => xpath(root, value),
    }
}

fn css<'a>(root: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>> {
    let parsed = CssSelector::parse(css)
        .map_err(|_| SeleneError::InvalidSelector(format!("'{}' is not a valid css selector", css)))?;
    Ok(root
        .select(&parsed)
        .filter(|element| element.id() != root.id())
        .collect())
}

fn nth_child_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\./\*\[(\d+)\]$").expect("valid pattern"))
}

/// The relative XPath forms the handles generate, and nothing more.
fn xpath<'a>(root: ElementRef<'a>, path: &str) -> Result<Vec<ElementRef<'a>>> {
    let children = || root.children().filter_map(ElementRef::wrap);
    let following = || root.next_siblings().filter_map(ElementRef::wrap);
    let found: Vec<ElementRef<'a>> = match path.trim() {
        ".." => root.parent().and_then(ElementRef::wrap).into_iter().collect(),
        "./*" => children().collect(),
        "./following-sibling::*" => following().collect(),
        "./following-sibling::*[1]" => following().take(1).collect(),
        "./preceding-sibling::*[1]" => root
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .take(1)
            .collect(),
        other => {
            let index = nth_child_pattern()
                .captures(other)
                .and_then(|captures| captures[1].parse::<usize>().ok())
                .ok_or_else(|| {
                    SeleneError::InvalidSelector(format!("unsupported xpath '{}'", other))
                })?;
            match index.checked_sub(1) {
                Some(index) => children().nth(index).into_iter().collect(),
                None => Vec::new(),
            }
        }
    };
    Ok(found)
}

fn path_of(element: ElementRef<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut node = *element;
    while let Some(parent) = node.parent() {
        path.push(node.prev_siblings().count());
        node = parent;
    }
    path.reverse();
    path
}

fn node_at<'a>(html: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut node = html.tree.root();
    for index in path {
        node = node.children().nth(*index)?;
    }
    ElementRef::wrap(node)
}

fn inline_style(element: ElementRef<'_>, property: &str) -> Option<String> {
    element
        .value()
        .attr("style")?
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .map(|(_, value)| value.trim().to_string())
}

fn hidden_itself(element: ElementRef<'_>) -> bool {
    let attributes = element.value();
    matches!(
        attributes.name(),
        "head" | "script" | "style" | "template" | "title"
    ) || attributes.attr("hidden").is_some()
        || (attributes.name() == "input" && attributes.attr("type") == Some("hidden"))
        || inline_style(element, "display").as_deref() == Some("none")
        || inline_style(element, "visibility").as_deref() == Some("hidden")
}

fn displayed(element: ElementRef<'_>) -> bool {
    !hidden_itself(element)
        && element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .all(|ancestor| !hidden_itself(ancestor))
}

/// Rendered text: hidden subtrees skipped, whitespace collapsed.
fn visible_text(element: ElementRef<'_>) -> String {
    if !displayed(element) {
        return String::new();
    }
    let mut text = String::new();
    collect_text(element, &mut text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if hidden_itself(child) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&child.value().name());
            if block {
                out.push(' ');
            }
            collect_text(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}

fn require_editable(element: ElementRef<'_>) -> Result<()> {
    let attributes = element.value();
    if attributes.attr("disabled").is_some() || attributes.attr("readonly").is_some() {
        return Err(SeleneError::NotInteractable(format!(
            "{} is not editable",
            describe(element)
        )));
    }
    Ok(())
}

/// `tag#id` or bare tag, for the action log.
fn describe(element: ElementRef<'_>) -> String {
    let attributes = element.value();
    match attributes.attr("id") {
        Some(id) => format!("{}#{}", attributes.name(), id),
        None => attributes.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(driver: &FakeDriver, css: &str) -> Vec<ElementId> {
        driver.find_elements(None, &Selector::css(css)).unwrap()
    }

    #[test]
    fn test_find_by_each_strategy() {
        let driver = FakeDriver::with_body(
            r#"<form name="login"><input id="user" name="user" class="field wide">
               <a href="/help">Need help?</a></form>"#,
        );
        let find = |selector: Selector| driver.find_elements(None, &selector).unwrap().len();
        assert_eq!(find(Selector::css("form input")), 1);
        assert_eq!(find(Selector::id("user")), 1);
        assert_eq!(find(Selector::name("login")), 1);
        assert_eq!(find(Selector::tag("input")), 1);
        assert_eq!(find(Selector::class("wide")), 1);
        assert_eq!(find(Selector::link_text("Need help?")), 1);
        assert_eq!(find(Selector::partial_link_text("help")), 1);
        assert_eq!(find(Selector::link_text("help")), 0);
    }

    #[test]
    fn test_invalid_selectors() {
        let driver = FakeDriver::with_body("<p>x</p>");
        let css = driver.find_elements(None, &Selector::css("p[[")).unwrap_err();
        assert!(matches!(css, SeleneError::InvalidSelector(_)));
        let xpath = driver.find_elements(None, &Selector::xpath("//p")).unwrap_err();
        assert!(matches!(xpath, SeleneError::InvalidSelector(_)));
    }

    #[test]
    fn test_ids_are_stable_until_the_body_changes() {
        let driver = FakeDriver::with_body("<p>x</p>");
        let first = ids(&driver, "p");
        assert_eq!(first, ids(&driver, "p"));

        driver.set_body("<p>x</p>");
        let err = driver.text(&first[0]).unwrap_err();
        assert!(matches!(err, SeleneError::StaleElement(_)));
        assert_ne!(first, ids(&driver, "p"));
    }

    #[test]
    fn test_relative_xpath_subset() {
        let driver = FakeDriver::with_body("<ul><li>a</li><li id='b'>b</li><li>c</li></ul>");
        let b = ids(&driver, "#b").remove(0);
        let find = |xpath: &str| {
            let found = driver.find_elements(Some(&b), &Selector::xpath(xpath)).unwrap();
            found.iter().map(|id| driver.text(id).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(find(".."), vec!["a b c"]);
        assert_eq!(find("./following-sibling::*[1]"), vec!["c"]);
        assert_eq!(find("./preceding-sibling::*[1]"), vec!["a"]);

        let list = ids(&driver, "ul").remove(0);
        let second = driver.find_elements(Some(&list), &Selector::xpath("./*[2]")).unwrap();
        assert_eq!(driver.text(&second[0]).unwrap(), "b");
    }

    #[test]
    fn test_visibility_and_text() {
        let driver = FakeDriver::with_body(
            r#"<div style="display: none"><p id="inner">hidden</p></div>
               <p id="shown">Hello <span hidden>secret</span><b>world</b></p>"#,
        );
        let inner = ids(&driver, "#inner").remove(0);
        let shown = ids(&driver, "#shown").remove(0);
        assert!(!driver.is_displayed(&inner).unwrap());
        assert_eq!(driver.text(&inner).unwrap(), "");
        assert_eq!(driver.text(&shown).unwrap(), "Hello world");
    }

    #[test]
    fn test_hash_links_and_routes() {
        let driver = FakeDriver::with_page(
            "http://app.test/",
            "Home",
            r##"<a id="frag" href="#top">top</a><a id="next" href="/next">next</a>"##,
        );
        driver.route("http://app.test/next", "Next", "<p>next page</p>");

        driver.click(&ids(&driver, "#frag")[0]).unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://app.test/#top");

        driver.click(&ids(&driver, "#next")[0]).unwrap();
        assert_eq!(driver.current_url().unwrap(), "http://app.test/next");
        assert_eq!(driver.title().unwrap(), "Next");
    }

    #[test]
    fn test_listeners_receive_field_value() {
        let driver = FakeDriver::with_body(r#"<input id="new"><ul id="list"></ul>"#);
        driver.on_key("#new", Key::Enter, |page, value| {
            let body = page.body().replace("</ul>", &format!("<li>{}</li></ul>", value));
            page.set_body(body);
        });
        let input = ids(&driver, "#new").remove(0);
        driver.send_keys(&input, "milk").unwrap();
        driver.press_key(&input, Key::Enter).unwrap();

        let items = ids(&driver, "li");
        assert_eq!(driver.text(&items[0]).unwrap(), "milk");
        assert_eq!(
            driver.actions(),
            vec!["type 'milk' into input#new", "press Enter on input#new"]
        );
    }

    #[test]
    fn test_checkbox_toggles_on_click() {
        let driver = FakeDriver::with_body(r#"<input id="c" type="checkbox">"#);
        let checkbox = ids(&driver, "#c").remove(0);
        assert!(!driver.is_selected(&checkbox).unwrap());
        driver.click(&checkbox).unwrap();
        assert!(driver.is_selected(&checkbox).unwrap());
    }

    #[test]
    fn test_interactions_require_display_and_editability() {
        let driver = FakeDriver::with_body(
            r#"<input id="h" style="display:none"><input id="d" disabled>"#,
        );
        let hidden = ids(&driver, "#h").remove(0);
        let disabled = ids(&driver, "#d").remove(0);
        assert!(matches!(driver.click(&hidden), Err(SeleneError::NotInteractable(_))));
        assert!(matches!(
            driver.send_keys(&disabled, "x"),
            Err(SeleneError::NotInteractable(_))
        ));
    }

    #[test]
    fn test_scheduled_changes_apply_lazily() {
        let driver = FakeDriver::with_body("<p>before</p>");
        driver.schedule(Duration::from_millis(30), |page| page.set_body("<p>after</p>"));
        let before = ids(&driver, "p");
        assert_eq!(driver.text(&before[0]).unwrap(), "before");

        std::thread::sleep(Duration::from_millis(40));
        assert!(driver.text(&before[0]).is_err());
        assert_eq!(driver.text(&ids(&driver, "p")[0]).unwrap(), "after");
    }

    #[test]
    fn test_calls_are_counted_and_quit_is_final() {
        let driver = FakeDriver::new();
        assert_eq!(driver.calls(), 0);
        driver.title().unwrap();
        assert_eq!(driver.calls(), 1);

        driver.quit().unwrap();
        assert!(driver.is_closed());
        assert!(matches!(driver.title(), Err(SeleneError::DriverClosed)));
    }

    #[test]
    fn test_window_size_is_a_counted_call() {
        let driver = FakeDriver::new();
        assert_eq!(driver.window_size().unwrap(), (1280, 720));
        assert_eq!(driver.calls(), 1);
        // the page lock is released again
        driver.set_title("after");
        assert_eq!(driver.title().unwrap(), "after");

        driver.quit().unwrap();
        assert!(matches!(driver.window_size(), Err(SeleneError::DriverClosed)));
    }
}
