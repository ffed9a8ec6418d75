use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeleneError {
    /// A condition was evaluated and did not hold. Only ever seen inside the wait loop.
    #[error("{0}")]
    Mismatch(Mismatch),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("{0}")]
    Timeout(Box<TimeoutError>),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("browser has already been quit")]
    DriverClosed,

    #[error("cached element is no longer attached: {0}")]
    CachedElementStale(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SeleneError>;

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for SeleneError {
    fn from(err: anyhow::Error) -> Self {
        SeleneError::Driver(err.to_string())
    }
}

impl From<Mismatch> for SeleneError {
    fn from(mismatch: Mismatch) -> Self {
        SeleneError::Mismatch(mismatch)
    }
}

impl From<TimeoutError> for SeleneError {
    fn from(timeout: TimeoutError) -> Self {
        SeleneError::Timeout(Box::new(timeout))
    }
}

impl SeleneError {
    /// Errors the wait engine swallows and retries until its deadline.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SeleneError::Mismatch(_)
                | SeleneError::NoSuchElement(_)
                | SeleneError::StaleElement(_)
                | SeleneError::NotInteractable(_)
                | SeleneError::JavaScript(_)
                | SeleneError::Driver(_)
        )
    }

    /// Errors that mean "the condition does not hold right now". A negated
    /// condition treats these as a match.
    pub fn is_condition_failure(&self) -> bool {
        self.is_retryable() || matches!(self, SeleneError::Timeout(_))
    }

    /// Short class name used in timeout reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SeleneError::Mismatch(_) => "Mismatch",
            SeleneError::NoSuchElement(_) => "NoSuchElement",
            SeleneError::StaleElement(_) => "StaleElement",
            SeleneError::NotInteractable(_) => "NotInteractable",
            SeleneError::JavaScript(_) => "JavaScript",
            SeleneError::Driver(_) => "Driver",
            SeleneError::Timeout(_) => "Timeout",
            SeleneError::InvalidSelector(_) => "InvalidSelector",
            SeleneError::Config(_) => "Config",
            SeleneError::DriverClosed => "DriverClosed",
            SeleneError::CachedElementStale(_) => "CachedElementStale",
            SeleneError::LaunchFailed(_) => "LaunchFailed",
            SeleneError::Io(_) => "Io",
            SeleneError::Serialization(_) => "Serialization",
        }
    }

    pub fn as_mismatch(&self) -> Option<&Mismatch> {
        match self {
            SeleneError::Mismatch(mismatch) => Some(mismatch),
            _ => None,
        }
    }

    pub fn as_timeout(&self) -> Option<&TimeoutError> {
        match self {
            SeleneError::Timeout(timeout) => Some(timeout),
            _ => None,
        }
    }
}

/// Report of a condition that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub condition: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl Mismatch {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition {} not matched", self.condition)?;
        if let Some(expected) = &self.expected {
            write!(f, "; expected: {}", expected)?;
        }
        if let Some(actual) = &self.actual {
            write!(f, "; actual: {}", actual)?;
        }
        Ok(())
    }
}

/// The only failure a caller sees from a wait: the deadline passed with the
/// last attempt still failing.
#[derive(Debug, Clone)]
pub struct TimeoutError {
    pub timeout: Duration,
    pub condition: String,
    pub entity: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub reason_kind: String,
    pub reason: String,
    pub screenshot: Option<PathBuf>,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timed out after {}s", self.timeout.as_secs_f64())?;
        writeln!(f, "  condition: {}", self.condition)?;
        write!(f, "  entity: {}", self.entity)?;
        if let Some(expected) = &self.expected {
            write!(f, "\n  expected: {}", expected)?;
        }
        if let Some(actual) = &self.actual {
            write!(f, "\n  actual: {}", actual)?;
        }
        write!(f, "\n  reason: {}: {}", self.reason_kind, self.reason)?;
        if let Some(path) = &self.screenshot {
            write!(f, "\n  screenshot: {}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_taxonomy() {
        assert!(SeleneError::Mismatch(Mismatch::new("visible")).is_retryable());
        assert!(SeleneError::StaleElement("x".into()).is_retryable());
        assert!(SeleneError::Driver("connection reset".into()).is_retryable());
        assert!(!SeleneError::DriverClosed.is_retryable());
        assert!(!SeleneError::InvalidSelector("(".into()).is_retryable());
        assert!(!SeleneError::CachedElementStale("x".into()).is_retryable());
    }

    #[test]
    fn test_nested_timeout_counts_as_condition_failure() {
        let timeout = TimeoutError {
            timeout: Duration::from_millis(100),
            condition: "visible".into(),
            entity: "browser.element(css,'#a')".into(),
            expected: None,
            actual: None,
            reason_kind: "NoSuchElement".into(),
            reason: "#a".into(),
            screenshot: None,
        };
        let err = SeleneError::from(timeout);
        assert!(!err.is_retryable());
        assert!(err.is_condition_failure());
        assert!(!SeleneError::DriverClosed.is_condition_failure());
    }

    #[test]
    fn test_mismatch_message_names_condition_and_values() {
        let mismatch = Mismatch::new("size_at_least(2)").expected(">= 2").actual("1");
        assert_eq!(
            mismatch.to_string(),
            "condition size_at_least(2) not matched; expected: >= 2; actual: 1"
        );
    }

    #[test]
    fn test_timeout_report_layout() {
        let timeout = TimeoutError {
            timeout: Duration::from_millis(1500),
            condition: "has_text('x')".into(),
            entity: "browser.element(css,'h1')".into(),
            expected: Some("x".into()),
            actual: Some("y".into()),
            reason_kind: "Mismatch".into(),
            reason: "condition has_text('x') not matched".into(),
            screenshot: Some(PathBuf::from("/tmp/shots/screen_1.png")),
        };
        let report = timeout.to_string();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Timed out after 1.5s");
        assert_eq!(lines[1], "  condition: has_text('x')");
        assert_eq!(lines[2], "  entity: browser.element(css,'h1')");
        assert_eq!(lines[3], "  expected: x");
        assert_eq!(lines[4], "  actual: y");
        assert!(lines[5].starts_with("  reason: Mismatch:"));
        assert_eq!(lines[6], "  screenshot: /tmp/shots/screen_1.png");
    }
}
