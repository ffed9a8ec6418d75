use crate::core::element::WebElement;
use crate::errors::{Result, SeleneError};
use crate::types::{Cookie, ElementId, ElementRect, Key, ScriptArg, Selector};
use serde_json::Value;

/// Blocking WebDriver surface consumed by the handles.
///
/// Element operations take the [`ElementId`] the driver minted during a
/// search. A reference whose node left the document reports
/// [`SeleneError::StaleElement`]; any call after [`Driver::quit`] reports
/// [`SeleneError::DriverClosed`].
pub trait Driver: Send + Sync {
    /// Backend name, e.g. `chrome`
    fn name(&self) -> &str;

    /// Find all elements matching `selector`, in document order, below
    /// `root` or in the whole document.
    fn find_elements(&self, root: Option<&ElementId>, selector: &Selector)
        -> Result<Vec<ElementId>>;

    /// Find the first element matching `selector`
    fn find_element(&self, root: Option<&ElementId>, selector: &Selector) -> Result<ElementId> {
        self.find_elements(root, selector)?
            .into_iter()
            .next()
            .ok_or_else(|| SeleneError::NoSuchElement(selector.to_string()))
    }

    /// Rendered text of the element, empty when not displayed
    fn text(&self, element: &ElementId) -> Result<String>;

    fn tag_name(&self, element: &ElementId) -> Result<String>;

    /// Attribute, falling back to the DOM property of the same name
    fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>>;

    /// Computed CSS property value
    fn css_value(&self, element: &ElementId, name: &str) -> Result<String>;

    fn is_displayed(&self, element: &ElementId) -> Result<bool>;

    fn is_enabled(&self, element: &ElementId) -> Result<bool>;

    fn is_selected(&self, element: &ElementId) -> Result<bool>;

    fn rect(&self, element: &ElementId) -> Result<ElementRect>;

    fn click(&self, element: &ElementId) -> Result<()>;

    fn double_click(&self, element: &ElementId) -> Result<()>;

    fn hover(&self, element: &ElementId) -> Result<()>;

    fn clear(&self, element: &ElementId) -> Result<()>;

    fn send_keys(&self, element: &ElementId, text: &str) -> Result<()>;

    fn press_key(&self, element: &ElementId, key: Key) -> Result<()>;

    /// Submit the form the element belongs to
    fn submit(&self, element: &ElementId) -> Result<()>;

    fn scroll_into_view(&self, element: &ElementId) -> Result<()>;

    /// PNG of the element's bounding box
    fn element_screenshot(&self, element: &ElementId) -> Result<Vec<u8>>;

    /// Navigate to an absolute url
    fn get(&self, url: &str) -> Result<()>;

    fn current_url(&self) -> Result<String>;

    fn title(&self) -> Result<String>;

    fn page_source(&self) -> Result<String>;

    /// Run `script` as a function body; `arguments[i]` holds `args[i]`
    fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value>;

    /// PNG of the viewport
    fn screenshot(&self) -> Result<Vec<u8>>;

    fn back(&self) -> Result<()>;

    fn forward(&self) -> Result<()>;

    fn refresh(&self) -> Result<()>;

    /// Inner window size in CSS pixels
    fn window_size(&self) -> Result<(u32, u32)>;

    fn cookies(&self) -> Result<Vec<Cookie>>;

    fn add_cookie(&self, cookie: &Cookie) -> Result<()>;

    fn delete_cookie(&self, name: &str) -> Result<()>;

    fn delete_all_cookies(&self) -> Result<()>;

    /// Close the browser. Further calls fail with `DriverClosed`.
    fn quit(&self) -> Result<()>;
}

/// Anything that can locate elements: the document or an element subtree.
pub trait SearchContext {
    fn find_element(&self, selector: &Selector) -> Result<WebElement>;

    fn find_elements(&self, selector: &Selector) -> Result<Vec<WebElement>>;
}
