use crate::errors::{Result, SeleneError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a [`Selector`] value is interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Css,
    XPath,
    Id,
    Name,
    Tag,
    Class,
    LinkText,
    PartialLinkText,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Css => "css",
            Strategy::XPath => "xpath",
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::Tag => "tag",
            Strategy::Class => "class",
            Strategy::LinkText => "link_text",
            Strategy::PartialLinkText => "partial_link_text",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = SeleneError;

    /// Accepts the short names as well as the W3C location strategy names.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "css" | "css selector" => Ok(Strategy::Css),
            "xpath" => Ok(Strategy::XPath),
            "id" => Ok(Strategy::Id),
            "name" => Ok(Strategy::Name),
            "tag" | "tag name" => Ok(Strategy::Tag),
            "class" | "class name" => Ok(Strategy::Class),
            "link_text" | "link text" => Ok(Strategy::LinkText),
            "partial_link_text" | "partial link text" => Ok(Strategy::PartialLinkText),
            other => Err(SeleneError::InvalidSelector(format!(
                "unknown location strategy '{}'",
                other
            ))),
        }
    }
}

/// A `(strategy, value)` pair. A bare string converts to a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub strategy: Strategy,
    pub value: String,
}

impl Selector {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Builds a selector from a strategy name, failing on unknown names.
    pub fn parse(strategy: &str, value: impl Into<String>) -> Result<Self> {
        Ok(Self::new(strategy.parse()?, value))
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Name, value)
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self::new(Strategy::Tag, value)
    }

    pub fn class(value: impl Into<String>) -> Self {
        Self::new(Strategy::Class, value)
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(Strategy::LinkText, value)
    }

    pub fn partial_link_text(value: impl Into<String>) -> Self {
        Self::new(Strategy::PartialLinkText, value)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},'{}'", self.strategy, self.value)
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Selector::css(css)
    }
}

impl From<String> for Selector {
    fn from(css: String) -> Self {
        Selector::css(css)
    }
}

impl From<&String> for Selector {
    fn from(css: &String) -> Self {
        Selector::css(css.as_str())
    }
}

impl<S: Into<String>> From<(Strategy, S)> for Selector {
    fn from((strategy, value): (Strategy, S)) -> Self {
        Selector::new(strategy, value)
    }
}

impl From<&Selector> for Selector {
    fn from(selector: &Selector) -> Self {
        selector.clone()
    }
}

/// Opaque web-element reference minted by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementRect {
    pub fn location(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Special keys that can be pressed on a focused element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Backspace,
    ArrowUp,
    ArrowDown,
}

impl Key {
    /// DOM `KeyboardEvent.key` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
            Key::Backspace => "Backspace",
            Key::ArrowUp => "ArrowUp",
            Key::ArrowDown => "ArrowDown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            secure: false,
        }
    }
}

/// Argument passed to `execute_script`; elements arrive in the page as DOM nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Value(serde_json::Value),
    Element(ElementId),
}

impl From<serde_json::Value> for ScriptArg {
    fn from(value: serde_json::Value) -> Self {
        ScriptArg::Value(value)
    }
}

impl From<ElementId> for ScriptArg {
    fn from(id: ElementId) -> Self {
        ScriptArg::Element(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_string_is_css() {
        let selector = Selector::from("#new-todo");
        assert_eq!(selector.strategy, Strategy::Css);
        assert_eq!(selector.value, "#new-todo");
        assert_eq!(selector.to_string(), "css,'#new-todo'");
    }

    #[test]
    fn test_parse_accepts_w3c_names() {
        let selector = Selector::parse("link text", "Home").unwrap();
        assert_eq!(selector, Selector::link_text("Home"));
        assert_eq!(Strategy::from_str("CSS selector").unwrap(), Strategy::Css);
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        let err = Selector::parse("jquery", "$('a')").unwrap_err();
        assert!(matches!(err, SeleneError::InvalidSelector(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rect_projections() {
        let rect = ElementRect {
            x: 1.0,
            y: 2.0,
            width: 30.0,
            height: 40.0,
        };
        assert_eq!(rect.location(), Point { x: 1.0, y: 2.0 });
        assert_eq!(
            rect.size(),
            Size {
                width: 30.0,
                height: 40.0
            }
        );
    }
}
