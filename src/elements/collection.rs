use super::locator::{CollectionLocator, ElementLocator};
use super::Element;
use crate::browser::Browser;
use crate::conditions::{not_, size_at_least, Condition, CollectionCondition};
use crate::core::WebElement;
use crate::errors::Result;
use crate::types::Selector;
use crate::wait::{Entity, Wait};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lazy handle to every element matching a locator.
#[derive(Clone)]
pub struct Collection {
    locator: Arc<CollectionLocator>,
    browser: Browser,
}

impl Collection {
    pub(crate) fn new(locator: CollectionLocator, browser: Browser) -> Self {
        Self {
            locator: Arc::new(locator),
            browser,
        }
    }

    pub(crate) fn inner(selector: Selector, parent: Element) -> Self {
        let browser = parent.browser().clone();
        Self::new(CollectionLocator::Inner { selector, parent }, browser)
    }

    /// One lookup attempt, without waiting. Members come in document order.
    pub fn resolve(&self) -> Result<Vec<WebElement>> {
        self.locator.resolve(&self.browser)
    }

    pub fn with_timeout(&self, timeout: Duration) -> Collection {
        Collection {
            locator: Arc::clone(&self.locator),
            browser: self.browser.with_timeout(timeout),
        }
    }

    /// Member count right now. Waits only while the lookup itself fails.
    pub fn size(&self) -> Result<usize> {
        self.wait()
            .query(self, "size", |collection| collection.resolve().map(|list| list.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    pub fn first(&self) -> Element {
        self.get(0)
    }

    /// Lazy member at `index`; waits for the collection to grow that large
    /// when the member is used.
    pub fn get(&self, index: usize) -> Element {
        Element::new(
            ElementLocator::Indexed {
                index,
                collection: self.clone(),
            },
            self.browser.clone(),
        )
    }

    /// Lazy sub-collection `[start:stop:step]`; waits for at least `stop`
    /// members when resolved.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero.
    pub fn slice(&self, start: usize, stop: usize, step: usize) -> Collection {
        assert!(step > 0, "slice step must be positive");
        Collection::new(
            CollectionLocator::Sliced {
                start,
                stop,
                step,
                collection: self.clone(),
            },
            self.browser.clone(),
        )
    }

    /// Members `[start:stop]`.
    pub fn range(&self, start: usize, stop: usize) -> Collection {
        self.slice(start, stop, 1)
    }

    /// Members the condition currently holds for. Filtering never waits.
    pub fn filtered_by(&self, condition: impl Condition<Element> + 'static) -> Collection {
        Collection::new(
            CollectionLocator::Filtered {
                condition: Arc::new(condition),
                collection: self.clone(),
            },
            self.browser.clone(),
        )
    }

    /// First member the condition holds for.
    pub fn element_by(&self, condition: impl Condition<Element> + 'static) -> Element {
        Element::new(
            ElementLocator::FoundBy {
                condition: Arc::new(condition),
                collection: self.clone(),
            },
            self.browser.clone(),
        )
    }

    pub fn should(&self, condition: impl Condition<Collection>) -> Result<&Self> {
        self.wait().until(self, &condition)?;
        Ok(self)
    }

    pub fn should_not<C: Condition<Collection>>(&self, condition: C) -> Result<&Self> {
        self.should(not_(condition))
    }

    /// Asserts `condition` on every member, in order. Each member gets its
    /// own full timeout.
    pub fn should_each(&self, condition: impl Condition<Element>) -> Result<&Self> {
        for element in self.iter()? {
            element.should(&condition)?;
        }
        Ok(self)
    }

    /// Indexed handles over the members present now.
    pub fn iter(&self) -> Result<impl Iterator<Item = Element> + '_> {
        let count = self.size()?;
        Ok((0..count).map(move |index| self.get(index)))
    }

    /// Visible texts of the members, read in one pass.
    pub fn texts(&self) -> Result<Vec<String>> {
        self.wait().query(self, "texts", |collection| {
            collection.resolve()?.iter().map(WebElement::text).collect()
        })
    }

    /// Waits until at least `count` members exist and returns them.
    pub(crate) fn wait_size_at_least(&self, count: usize) -> Result<Vec<WebElement>> {
        let condition: CollectionCondition = size_at_least(count);
        self.wait().query_nested(self, &condition.name(), |collection| {
            let members = collection.resolve()?;
            condition.check(&members)?;
            Ok(members)
        })
    }

    /// Handle over an already resolved member, for per-member checks.
    pub(crate) fn member(&self, index: usize, element: WebElement) -> Element {
        Element::new(
            ElementLocator::Snapshot {
                element,
                path: format!("{}[{}]", self.description(), index),
            },
            self.browser.clone(),
        )
    }

    fn wait(&self) -> Wait {
        Wait::for_entity(self)
    }
}

impl Entity for Collection {
    fn description(&self) -> String {
        self.locator.to_string()
    }

    fn browser(&self) -> &Browser {
        &self.browser
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Collection").field(&self.description()).finish()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{exact_texts, has_css_class, has_text, size, visible};
    use crate::testing::{fast_config, FakeDriver};

    const LIST: &str = r#"<ul>
        <li class="item">a</li>
        <li class="item warning">b</li>
        <li class="item">c</li>
        <li class="item warning">d</li>
    </ul>"#;

    fn browser_with(body: &str) -> (Arc<FakeDriver>, Browser) {
        let driver = Arc::new(FakeDriver::with_body(body));
        let browser = Browser::new(driver.clone()).with_config(fast_config());
        (driver, browser)
    }

    #[test]
    fn test_descriptions() {
        let (_, browser) = browser_with(LIST);
        let items = browser.all("li");
        assert_eq!(items.description(), "browser.all(css,'li')");
        assert_eq!(items.range(1, 3).description(), "browser.all(css,'li')[1:3]");
        assert_eq!(items.slice(0, 4, 2).description(), "browser.all(css,'li')[0:4:2]");
        assert_eq!(
            items.filtered_by(has_css_class("warning")).description(),
            "browser.all(css,'li').filtered_by(has_css_class('warning'))"
        );
        assert_eq!(
            items.element_by(has_text("c")).description(),
            "browser.all(css,'li').element_by(has_text('c'))"
        );
    }

    #[test]
    fn test_slices() {
        let (_, browser) = browser_with(LIST);
        let items = browser.all("li");
        assert_eq!(items.range(1, 3).texts().unwrap(), vec!["b", "c"]);
        assert_eq!(items.slice(0, 4, 2).texts().unwrap(), vec!["a", "c"]);
        assert_eq!(items.range(3, 3).size().unwrap(), 0);
    }

    #[test]
    fn test_slice_waits_for_stop_members() {
        let (_, browser) = browser_with(LIST);
        let err = browser.all("li").range(0, 5).texts().unwrap_err();
        // the inner size wait gives up first and its timeout surfaces as-is
        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.entity, "browser.all(css,'li')");
        assert_eq!(timeout.condition, "size_at_least(5)");
    }

    #[test]
    #[should_panic(expected = "slice step must be positive")]
    fn test_zero_step_is_a_usage_error() {
        let (_, browser) = browser_with(LIST);
        browser.all("li").slice(0, 2, 0);
    }

    #[test]
    fn test_filter_and_find() {
        let (_, browser) = browser_with(LIST);
        let items = browser.all("li");
        let warnings = items.filtered_by(has_css_class("warning"));
        warnings.should(exact_texts(["b", "d"])).unwrap();
        assert_eq!(items.element_by(has_css_class("warning")).text().unwrap(), "b");
    }

    #[test]
    fn test_filtered_collection_is_empty_when_nothing_matches() {
        let (_, browser) = browser_with(LIST);
        let none = browser.all("li").filtered_by(has_css_class("missing"));
        assert_eq!(none.size().unwrap(), 0);
        none.should(size(0)).unwrap();
    }

    #[test]
    fn test_indexed_member_waits_for_size() {
        let (driver, browser) = browser_with("<ul><li>a</li></ul>");
        driver.schedule(Duration::from_millis(60), |page| {
            page.set_body("<ul><li>a</li><li>b</li><li>c</li></ul>")
        });
        browser.all("li").get(2).should(has_text("c")).unwrap();
    }

    #[test]
    fn test_indexed_member_timeout_reports_size_query() {
        let (_, browser) = browser_with("<ul><li>a</li></ul>");
        let err = browser.all("li").get(3).text().unwrap_err();
        let timeout = err.as_timeout().unwrap();
        assert_eq!(timeout.entity, "browser.all(css,'li')");
        assert_eq!(timeout.condition, "size_at_least(4)");
        assert_eq!(timeout.expected.as_deref(), Some(">= 4"));
        assert_eq!(timeout.actual.as_deref(), Some("1"));
    }

    #[test]
    fn test_swallowed_size_timeout_leaves_no_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let driver = Arc::new(FakeDriver::with_body("<ul><li>a</li></ul>"));
        let config = crate::core::Config {
            screenshot_folder: dir.path().to_path_buf(),
            save_screenshot_on_failure: true,
            ..fast_config()
        };
        let browser = Browser::new(driver.clone()).with_config(config);
        let missing = browser.all("li").get(3);

        missing.should_not(crate::conditions::in_dom()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let err = missing.text().unwrap_err();
        let screenshot = err.as_timeout().unwrap().screenshot.clone().unwrap();
        assert!(screenshot.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_should_each_checks_every_member() {
        let (_, browser) = browser_with(LIST);
        let items = browser.all("li");
        items.should_each(has_css_class("item")).unwrap();

        let err = items.should_each(has_css_class("warning")).unwrap_err();
        assert_eq!(err.as_timeout().unwrap().entity, "browser.all(css,'li')[0]");
    }

    #[test]
    fn test_iter_yields_indexed_handles() {
        let (_, browser) = browser_with(LIST);
        let handles: Vec<String> = browser
            .all("li")
            .iter()
            .unwrap()
            .map(|item| item.description())
            .collect();
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[3], "browser.all(css,'li')[3]");
    }

    #[test]
    fn test_inner_collection_scopes_to_parent() {
        let (_, browser) = browser_with(
            r#"<div id="one"><span>x</span><span>y</span></div><div><span>z</span></div>"#,
        );
        let spans = browser.element("#one").all("span");
        assert_eq!(spans.description(), "browser.element(css,'#one').all(css,'span')");
        assert_eq!(spans.texts().unwrap(), vec!["x", "y"]);
        spans.first().should(visible()).unwrap();
    }
}
