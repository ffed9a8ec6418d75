use super::{mismatch, quoted, Condition};
use crate::core::WebElement;
use crate::elements::Element;
use crate::errors::{Result, SeleneError};

/// Built-in conditions over a single element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCondition {
    Visible,
    /// Present but not displayed, or absent from the document.
    Hidden,
    InDom,
    Enabled,
    /// Visible and enabled.
    Clickable,
    Selected,
    /// Visible text contains the substring.
    Text(String),
    ExactText(String),
    CssClass(String),
    Attribute { name: String, value: String },
    Value(String),
    /// Value attribute is empty.
    Blank,
}

pub fn visible() -> ElementCondition {
    ElementCondition::Visible
}

pub fn hidden() -> ElementCondition {
    ElementCondition::Hidden
}

pub fn in_dom() -> ElementCondition {
    ElementCondition::InDom
}

pub fn enabled() -> ElementCondition {
    ElementCondition::Enabled
}

pub fn clickable() -> ElementCondition {
    ElementCondition::Clickable
}

pub fn selected() -> ElementCondition {
    ElementCondition::Selected
}

pub fn has_text(substring: impl Into<String>) -> ElementCondition {
    ElementCondition::Text(substring.into())
}

pub fn has_exact_text(text: impl Into<String>) -> ElementCondition {
    ElementCondition::ExactText(text.into())
}

pub fn has_css_class(name: impl Into<String>) -> ElementCondition {
    ElementCondition::CssClass(name.into())
}

pub fn has_attribute(name: impl Into<String>, value: impl Into<String>) -> ElementCondition {
    ElementCondition::Attribute {
        name: name.into(),
        value: value.into(),
    }
}

pub fn has_value(value: impl Into<String>) -> ElementCondition {
    ElementCondition::Value(value.into())
}

pub fn blank() -> ElementCondition {
    ElementCondition::Blank
}

impl ElementCondition {
    /// Checks an already resolved element.
    pub fn check(&self, element: &WebElement) -> Result<()> {
        match self {
            ElementCondition::Visible => require_visible(element),
            ElementCondition::Hidden => match element.is_displayed() {
                Ok(true) => Err(mismatch(self.label(), "hidden", "visible")),
                Ok(false) | Err(SeleneError::StaleElement(_)) => Ok(()),
                Err(err) => Err(err),
            },
            // a cached reference resolves without the driver; ask it once
            ElementCondition::InDom => element.tag_name().map(|_| ()),
            ElementCondition::Enabled => require_enabled(element),
            ElementCondition::Clickable => {
                require_visible(element)?;
                require_enabled(element)
            }
            ElementCondition::Selected => {
                if element.is_selected()? {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), "selected", "not selected"))
                }
            }
            ElementCondition::Text(expected) => {
                let actual = element.text()?;
                if actual.contains(expected.as_str()) {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), quoted(expected), quoted(&actual)))
                }
            }
            ElementCondition::ExactText(expected) => {
                let actual = element.text()?;
                if &actual == expected {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), quoted(expected), quoted(&actual)))
                }
            }
            ElementCondition::CssClass(name) => {
                let classes = element.attribute("class")?.unwrap_or_default();
                if classes.split_whitespace().any(|class| class == name) {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), quoted(name), quoted(&classes)))
                }
            }
            ElementCondition::Attribute { name, value } => {
                check_attribute(element, self.label(), name, value)
            }
            ElementCondition::Value(value) => check_attribute(element, self.label(), "value", value),
            ElementCondition::Blank => check_attribute(element, self.label(), "value", ""),
        }
    }

    fn label(&self) -> String {
        match self {
            ElementCondition::Visible => "visible".to_string(),
            ElementCondition::Hidden => "hidden".to_string(),
            ElementCondition::InDom => "in_dom".to_string(),
            ElementCondition::Enabled => "enabled".to_string(),
            ElementCondition::Clickable => "clickable".to_string(),
            ElementCondition::Selected => "selected".to_string(),
            ElementCondition::Text(text) => format!("has_text({})", quoted(text)),
            ElementCondition::ExactText(text) => format!("has_exact_text({})", quoted(text)),
            ElementCondition::CssClass(name) => format!("has_css_class({})", quoted(name)),
            ElementCondition::Attribute { name, value } => {
                format!("has_attribute({},{})", quoted(name), quoted(value))
            }
            ElementCondition::Value(value) => format!("has_value({})", quoted(value)),
            ElementCondition::Blank => "blank".to_string(),
        }
    }
}

impl Condition<Element> for ElementCondition {
    fn name(&self) -> String {
        self.label()
    }

    fn apply(&self, entity: &Element) -> Result<()> {
        let resolved = match entity.resolve() {
            Ok(resolved) => resolved,
            // absent, including behind a parent that never showed up
            Err(err) if *self == ElementCondition::Hidden && err.is_condition_failure() => {
                return Ok(())
            }
            Err(err) => return Err(err),
        };
        self.check(&resolved)
    }
}

pub(crate) fn require_visible(element: &WebElement) -> Result<()> {
    if element.is_displayed()? {
        Ok(())
    } else {
        Err(mismatch("visible".to_string(), "visible", "hidden"))
    }
}

fn require_enabled(element: &WebElement) -> Result<()> {
    if element.is_enabled()? {
        Ok(())
    } else {
        Err(mismatch("enabled".to_string(), "enabled", "disabled"))
    }
}

fn check_attribute(element: &WebElement, label: String, name: &str, expected: &str) -> Result<()> {
    match element.attribute(name)? {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(mismatch(label, quoted(expected), quoted(&actual))),
        None => Err(mismatch(label, quoted(expected), "<absent>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::not_;
    use crate::testing::FakeDriver;
    use crate::Browser;
    use std::sync::Arc;

    fn page(body: &str) -> Browser {
        let driver = FakeDriver::with_body(body);
        Browser::new(Arc::new(driver))
    }

    #[test]
    fn test_visibility_conditions() {
        let browser = page(r#"<p id="a">A</p><p id="b" style="display: none">B</p>"#);
        assert!(visible().apply(&browser.element("#a")).is_ok());
        assert!(hidden().apply(&browser.element("#a")).is_err());
        assert!(hidden().apply(&browser.element("#b")).is_ok());
        assert!(hidden().apply(&browser.element("#missing")).is_ok());

        let err = visible().apply(&browser.element("#b")).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.actual.as_deref(), Some("hidden"));
    }

    #[test]
    fn test_hidden_holds_below_a_missing_parent() {
        let driver = Arc::new(FakeDriver::with_body("<p>x</p>"));
        let browser = Browser::new(driver).with_config(crate::testing::fast_config());
        let child = browser.element("#missing").element(".child");

        assert!(hidden().apply(&child).is_ok());
        assert!(not_(visible()).apply(&child).is_ok());
        child.should(hidden()).unwrap();
    }

    #[test]
    fn test_in_dom_and_its_negation() {
        let browser = page(r#"<p id="a">A</p>"#);
        assert!(in_dom().apply(&browser.element("#a")).is_ok());
        let err = in_dom().apply(&browser.element("#b")).unwrap_err();
        assert!(matches!(err, SeleneError::NoSuchElement(_)));
        assert!(not_(in_dom()).apply(&browser.element("#b")).is_ok());
    }

    #[test]
    fn test_text_conditions_report_expected_and_actual() {
        let browser = page("<h1>Hello, wörld</h1>");
        let heading = browser.element("h1");
        assert!(has_text("wörld").apply(&heading).is_ok());
        assert!(has_exact_text("Hello, wörld").apply(&heading).is_ok());

        let err = has_exact_text("Hello").apply(&heading).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.condition, "has_exact_text('Hello')");
        assert_eq!(mismatch.expected.as_deref(), Some("'Hello'"));
        assert_eq!(mismatch.actual.as_deref(), Some("'Hello, wörld'"));
    }

    #[test]
    fn test_css_class_membership_splits_on_whitespace() {
        let browser = page(r#"<li class="item  warning">x</li>"#);
        let item = browser.element("li");
        assert!(has_css_class("warning").apply(&item).is_ok());
        assert!(has_css_class("warn").apply(&item).is_err());
    }

    #[test]
    fn test_attribute_value_and_blank() {
        let browser = page(
            r#"<input id="q" value="rust"><input id="e" value=""><button disabled>b</button>"#,
        );
        assert!(has_attribute("id", "q").apply(&browser.element("#q")).is_ok());
        assert!(has_value("rust").apply(&browser.element("#q")).is_ok());
        assert!(blank().apply(&browser.element("#e")).is_ok());
        assert!(blank().apply(&browser.element("#q")).is_err());
        assert!(enabled().apply(&browser.element("#q")).is_ok());
        assert!(enabled().apply(&browser.element("button")).is_err());
        assert!(clickable().apply(&browser.element("button")).is_err());
    }
}
