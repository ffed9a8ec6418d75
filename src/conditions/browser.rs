use super::{mismatch, quoted, Condition};
use crate::browser::Browser;
use crate::errors::Result;
use serde_json::Value;

/// Built-in document-level conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCondition {
    Title(String),
    TitleContaining(String),
    Url(String),
    UrlContaining(String),
    /// The script, run as a function body, returns exactly `true`.
    JsReturnedTrue(String),
}

pub fn title(expected: impl Into<String>) -> BrowserCondition {
    BrowserCondition::Title(expected.into())
}

pub fn title_containing(substring: impl Into<String>) -> BrowserCondition {
    BrowserCondition::TitleContaining(substring.into())
}

pub fn url(expected: impl Into<String>) -> BrowserCondition {
    BrowserCondition::Url(expected.into())
}

pub fn url_containing(substring: impl Into<String>) -> BrowserCondition {
    BrowserCondition::UrlContaining(substring.into())
}

pub fn js_returned_true(script: impl Into<String>) -> BrowserCondition {
    BrowserCondition::JsReturnedTrue(script.into())
}

impl Condition<Browser> for BrowserCondition {
    fn name(&self) -> String {
        match self {
            BrowserCondition::Title(expected) => format!("title({})", quoted(expected)),
            BrowserCondition::TitleContaining(expected) => {
                format!("title_containing({})", quoted(expected))
            }
            BrowserCondition::Url(expected) => format!("url({})", quoted(expected)),
            BrowserCondition::UrlContaining(expected) => {
                format!("url_containing({})", quoted(expected))
            }
            BrowserCondition::JsReturnedTrue(script) => {
                format!("js_returned_true({})", quoted(script))
            }
        }
    }

    fn apply(&self, entity: &Browser) -> Result<()> {
        let driver = entity.driver()?;
        let (holds, expected, actual) = match self {
            BrowserCondition::Title(expected) => {
                let actual = driver.title()?;
                (&actual == expected, quoted(expected), quoted(&actual))
            }
            BrowserCondition::TitleContaining(expected) => {
                let actual = driver.title()?;
                (actual.contains(expected.as_str()), quoted(expected), quoted(&actual))
            }
            BrowserCondition::Url(expected) => {
                let actual = driver.current_url()?;
                (&actual == expected, quoted(expected), quoted(&actual))
            }
            BrowserCondition::UrlContaining(expected) => {
                let actual = driver.current_url()?;
                (actual.contains(expected.as_str()), quoted(expected), quoted(&actual))
            }
            BrowserCondition::JsReturnedTrue(script) => {
                let actual = driver.execute_script(script, &[])?;
                (actual == Value::Bool(true), "true".to_string(), actual.to_string())
            }
        };
        if holds {
            Ok(())
        } else {
            Err(mismatch(self.name(), expected, actual))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_title_and_url() {
        let driver = FakeDriver::new();
        driver.route("http://app.test/todo", "TodoMVC", "<h1>todos</h1>");
        let browser = Browser::new(Arc::new(driver));
        browser.open("http://app.test/todo").unwrap();

        assert!(title("TodoMVC").apply(&browser).is_ok());
        assert!(title_containing("Todo").apply(&browser).is_ok());
        assert!(url("http://app.test/todo").apply(&browser).is_ok());
        assert!(url_containing("/todo").apply(&browser).is_ok());

        let err = title("Other").apply(&browser).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.actual.as_deref(), Some("'TodoMVC'"));
    }

    #[test]
    fn test_js_returned_true_requires_boolean_true() {
        let driver = FakeDriver::new();
        driver.on_script("return window.ready", |_| json!(true));
        driver.on_script("return 1", |_| json!(1));
        let browser = Browser::new(Arc::new(driver));

        assert!(js_returned_true("return window.ready").apply(&browser).is_ok());
        let err = js_returned_true("return 1").apply(&browser).unwrap_err();
        assert_eq!(err.as_mismatch().unwrap().actual.as_deref(), Some("1"));
    }
}
