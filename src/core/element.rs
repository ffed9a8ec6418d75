use crate::core::driver::{Driver, SearchContext};
use crate::errors::Result;
use crate::types::{ElementId, ElementRect, Key, Point, ScriptArg, Selector, Size};
use std::fmt;
use std::sync::Arc;

/// A resolved, native element reference.
///
/// Lives only as long as one wait attempt, unless captured by
/// `Element::cached`. Once the node leaves the document every call reports
/// a stale-element error.
#[derive(Clone)]
pub struct WebElement {
    id: ElementId,
    driver: Arc<dyn Driver>,
}

impl WebElement {
    pub fn new(id: ElementId, driver: Arc<dyn Driver>) -> Self {
        Self { id, driver }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn text(&self) -> Result<String> {
        self.driver.text(&self.id)
    }

    pub fn tag_name(&self) -> Result<String> {
        self.driver.tag_name(&self.id)
    }

    pub fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.driver.attribute(&self.id, name)
    }

    pub fn css_value(&self, name: &str) -> Result<String> {
        self.driver.css_value(&self.id, name)
    }

    pub fn is_displayed(&self) -> Result<bool> {
        self.driver.is_displayed(&self.id)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        self.driver.is_enabled(&self.id)
    }

    pub fn is_selected(&self) -> Result<bool> {
        self.driver.is_selected(&self.id)
    }

    pub fn rect(&self) -> Result<ElementRect> {
        self.driver.rect(&self.id)
    }

    pub fn location(&self) -> Result<Point> {
        Ok(self.rect()?.location())
    }

    pub fn size(&self) -> Result<Size> {
        Ok(self.rect()?.size())
    }

    pub fn click(&self) -> Result<()> {
        self.driver.click(&self.id)
    }

    pub fn double_click(&self) -> Result<()> {
        self.driver.double_click(&self.id)
    }

    pub fn hover(&self) -> Result<()> {
        self.driver.hover(&self.id)
    }

    pub fn clear(&self) -> Result<()> {
        self.driver.clear(&self.id)
    }

    pub fn send_keys(&self, text: &str) -> Result<()> {
        self.driver.send_keys(&self.id, text)
    }

    pub fn press(&self, key: Key) -> Result<()> {
        self.driver.press_key(&self.id, key)
    }

    pub fn submit(&self) -> Result<()> {
        self.driver.submit(&self.id)
    }

    pub fn scroll_into_view(&self) -> Result<()> {
        self.driver.scroll_into_view(&self.id)
    }

    pub fn screenshot(&self) -> Result<Vec<u8>> {
        self.driver.element_screenshot(&self.id)
    }

    /// Runs `script` with this element as `arguments[0]`, followed by `args`.
    pub fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<serde_json::Value> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(ScriptArg::Element(self.id.clone()));
        all.extend_from_slice(args);
        self.driver.execute_script(script, &all)
    }
}

impl SearchContext for WebElement {
    fn find_element(&self, selector: &Selector) -> Result<WebElement> {
        let id = self.driver.find_element(Some(&self.id), selector)?;
        Ok(WebElement::new(id, self.driver.clone()))
    }

    fn find_elements(&self, selector: &Selector) -> Result<Vec<WebElement>> {
        Ok(self
            .driver
            .find_elements(Some(&self.id), selector)?
            .into_iter()
            .map(|id| WebElement::new(id, self.driver.clone()))
            .collect())
    }
}

impl PartialEq for WebElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for WebElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebElement")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .finish()
    }
}
