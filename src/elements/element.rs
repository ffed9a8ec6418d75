use super::locator::ElementLocator;
use super::Collection;
use crate::browser::Browser;
use crate::conditions::element::require_visible;
use crate::conditions::{in_dom, not_, Condition};
use crate::core::{Driver, WebElement};
use crate::errors::{Result, SeleneError};
use crate::types::{ElementId, ElementRect, Key, Point, ScriptArg, Selector, Size};
use crate::wait::{Entity, Wait};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Lazy handle to one element of the page.
///
/// Nothing is looked up when the handle is built. Every action, read or
/// assertion re-resolves the locator inside a wait, so the handle survives
/// re-renders of the page.
#[derive(Clone)]
pub struct Element {
    locator: Arc<ElementLocator>,
    browser: Browser,
}

impl Element {
    pub(crate) fn new(locator: ElementLocator, browser: Browser) -> Self {
        Self {
            locator: Arc::new(locator),
            browser,
        }
    }

    /// One lookup attempt, without waiting.
    pub fn resolve(&self) -> Result<WebElement> {
        self.locator
            .resolve(&self.browser)
            .map_err(|err| self.bind(err))
    }

    /// Same element, waiting at most `timeout` in operations on this handle.
    pub fn with_timeout(&self, timeout: Duration) -> Element {
        Element {
            locator: Arc::clone(&self.locator),
            browser: self.browser.with_timeout(timeout),
        }
    }

    pub fn element(&self, selector: impl Into<Selector>) -> Element {
        Element::new(
            ElementLocator::Inner {
                selector: selector.into(),
                parent: self.clone(),
            },
            self.browser.clone(),
        )
    }

    pub fn all(&self, selector: impl Into<Selector>) -> Collection {
        Collection::inner(selector.into(), self.clone())
    }

    pub fn parent_element(&self) -> Element {
        self.element(Selector::xpath(".."))
    }

    pub fn following_sibling(&self) -> Element {
        self.element(Selector::xpath("./following-sibling::*[1]"))
    }

    pub fn first_child(&self) -> Element {
        self.element(Selector::xpath("./*[1]"))
    }

    /// Waits for the element to be present, then pins the native reference.
    ///
    /// The returned handle never looks the element up again; once the page
    /// drops the node, operations fail with
    /// [`SeleneError::CachedElementStale`] instead of retrying.
    pub fn cached(&self) -> Result<Element> {
        let cached = Element::new(
            ElementLocator::Cached {
                source: self.clone(),
                cell: Arc::new(OnceLock::new()),
            },
            self.browser.clone(),
        );
        cached.should(in_dom())?;
        Ok(cached)
    }

    pub fn should(&self, condition: impl Condition<Element>) -> Result<&Self> {
        let name = condition.name();
        self.wait().query(self, &name, |element| {
            condition.apply(element).map_err(|err| element.bind(err))
        })?;
        Ok(self)
    }

    pub fn should_not<C: Condition<Element>>(&self, condition: C) -> Result<&Self> {
        self.should(not_(condition))
    }

    pub fn click(&self) -> Result<&Self> {
        self.act("click", |element| element.click())
    }

    pub fn double_click(&self) -> Result<&Self> {
        self.act("double_click", |element| element.double_click())
    }

    pub fn hover(&self) -> Result<&Self> {
        self.act("hover", |element| element.hover())
    }

    pub fn clear(&self) -> Result<&Self> {
        self.act("clear", |element| element.clear())
    }

    /// Clears the field, then types `text`.
    pub fn set_value(&self, text: &str) -> Result<&Self> {
        self.act("set_value", |element| {
            element.clear()?;
            element.send_keys(text)
        })
    }

    /// Types `text` after whatever the field already holds.
    pub fn send_keys(&self, text: &str) -> Result<&Self> {
        self.act("send_keys", |element| element.send_keys(text))
    }

    /// Alias of [`Element::send_keys`].
    pub fn type_text(&self, text: &str) -> Result<&Self> {
        self.send_keys(text)
    }

    pub fn press(&self, key: Key) -> Result<&Self> {
        self.act(&format!("press({})", key.as_str()), |element| element.press(key))
    }

    pub fn press_enter(&self) -> Result<&Self> {
        self.press(Key::Enter)
    }

    pub fn press_tab(&self) -> Result<&Self> {
        self.press(Key::Tab)
    }

    pub fn press_escape(&self) -> Result<&Self> {
        self.press(Key::Escape)
    }

    pub fn submit(&self) -> Result<&Self> {
        self.act("submit", |element| element.submit())
    }

    pub fn scroll_into_view(&self) -> Result<&Self> {
        self.act("scroll_into_view", |element| element.scroll_into_view())
    }

    pub fn text(&self) -> Result<String> {
        self.read_visible("text", |element| element.text())
    }

    /// Waits for the element to be visible, so only ever returns `true`.
    pub fn is_displayed(&self) -> Result<bool> {
        self.read_visible("is_displayed", |element| element.is_displayed())
    }

    pub fn is_enabled(&self) -> Result<bool> {
        self.read_visible("is_enabled", |element| element.is_enabled())
    }

    pub fn is_selected(&self) -> Result<bool> {
        self.read_visible("is_selected", |element| element.is_selected())
    }

    pub fn rect(&self) -> Result<ElementRect> {
        self.read_visible("rect", |element| element.rect())
    }

    pub fn location(&self) -> Result<Point> {
        self.read_visible("location", |element| element.location())
    }

    pub fn size(&self) -> Result<Size> {
        self.read_visible("size", |element| element.size())
    }

    /// PNG bytes of the element's bounding box.
    pub fn screenshot(&self) -> Result<Vec<u8>> {
        self.read_visible("screenshot", |element| element.screenshot())
    }

    pub fn tag_name(&self) -> Result<String> {
        self.read_in_dom("tag_name", |element| element.tag_name())
    }

    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.read_in_dom(&format!("attribute('{}')", name), |element| {
            element.attribute(name)
        })
    }

    /// Alias of `attribute("value")`.
    pub fn value(&self) -> Result<Option<String>> {
        self.attribute("value")
    }

    pub fn css_value(&self, name: &str) -> Result<String> {
        self.read_in_dom(&format!("css_value('{}')", name), |element| {
            element.css_value(name)
        })
    }

    /// Driver owning the resolved element.
    pub fn parent(&self) -> Result<Arc<dyn Driver>> {
        self.read_in_dom("parent", |element| Ok(Arc::clone(element.driver())))
    }

    /// Driver-level id of the resolved element.
    pub fn id(&self) -> Result<ElementId> {
        self.read_in_dom("id", |element| Ok(element.id().clone()))
    }

    /// Runs `script` with the element as `arguments[0]`.
    pub fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        self.read_in_dom("execute_script", |element| {
            element.execute_script(script, args)
        })
    }

    fn wait(&self) -> Wait {
        Wait::for_entity(self)
    }

    /// Resolves and checks visibility once. Used by nested locators.
    pub(crate) fn visible_native(&self) -> Result<WebElement> {
        self.wait().query_nested(self, "visible", |element| {
            let native = element.resolve()?;
            require_visible(&native).map_err(|err| element.bind(err))?;
            Ok(native)
        })
    }

    fn act(&self, name: &str, action: impl Fn(&WebElement) -> Result<()>) -> Result<&Self> {
        self.read_visible(name, action)?;
        debug!("{}: {}", self.description(), name);
        Ok(self)
    }

    fn read_visible<R>(&self, name: &str, read: impl Fn(&WebElement) -> Result<R>) -> Result<R> {
        self.wait().query(self, name, |element| {
            let native = element.resolve()?;
            require_visible(&native)
                .and_then(|_| read(&native))
                .map_err(|err| element.bind(err))
        })
    }

    fn read_in_dom<R>(&self, name: &str, read: impl Fn(&WebElement) -> Result<R>) -> Result<R> {
        self.wait().query(self, name, |element| {
            let native = element.resolve()?;
            read(&native).map_err(|err| element.bind(err))
        })
    }

    /// Stale references of a cached handle are terminal.
    fn bind(&self, err: SeleneError) -> SeleneError {
        match err {
            SeleneError::StaleElement(reason) if self.locator.is_cached() => {
                SeleneError::CachedElementStale(format!("{}: {}", self.description(), reason))
            }
            err => err,
        }
    }
}

impl Entity for Element {
    fn description(&self) -> String {
        self.locator.to_string()
    }

    fn browser(&self) -> &Browser {
        &self.browser
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Element").field(&self.description()).finish()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
