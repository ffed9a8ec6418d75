//! The polling engine behind every action, read and assertion.
//!
//! A wait re-runs an attempt (resolve the handle, test a condition, perform
//! an action) until it succeeds or the deadline passes. Retryable failures
//! are swallowed between attempts; anything else surfaces immediately. When
//! the deadline passes, a screenshot is captured once and a
//! [`SeleneError::Timeout`] carrying the last failure is returned.

use crate::browser::Browser;
use crate::conditions::Condition;
use crate::core::Config;
use crate::errors::{Result, SeleneError, TimeoutError};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Something a wait can be performed on.
pub trait Entity {
    /// Deterministic, human-readable path of the entity, e.g.
    /// `browser.all(css,'li')[2]`.
    fn description(&self) -> String;

    /// Browser supplying configuration and the failure screenshot.
    fn browser(&self) -> &Browser;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    timeout: Duration,
    poll: Duration,
}

impl Wait {
    pub fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.timeout, config.poll)
    }

    /// Wait configured by the entity's browser.
    pub fn for_entity<E: Entity + ?Sized>(entity: &E) -> Self {
        Self::from_config(&entity.browser().config())
    }

    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn every(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll(&self) -> Duration {
        self.poll
    }

    /// Waits until `condition` holds for `entity`.
    pub fn until<E, C>(&self, entity: &E, condition: &C) -> Result<()>
    where
        E: Entity + ?Sized,
        C: Condition<E> + ?Sized,
    {
        self.query(entity, &condition.name(), |entity| condition.apply(entity))
    }

    /// Waits until `attempt` succeeds on `entity` and returns its result.
    pub fn query<E, R, F>(&self, entity: &E, name: &str, mut attempt: F) -> Result<R>
    where
        E: Entity + ?Sized,
        F: FnMut(&E) -> Result<R>,
    {
        self.run(
            || entity.description(),
            name,
            || attempt(entity),
            || entity.browser().failure_screenshot(),
        )
    }

    /// Like [`Wait::query`], for waits made while resolving a locator. These
    /// never capture a screenshot themselves: their timeout is either
    /// swallowed by a negation or filter, or surfaces through an outer wait
    /// that captures one.
    pub(crate) fn query_nested<E, R, F>(&self, entity: &E, name: &str, mut attempt: F) -> Result<R>
    where
        E: Entity + ?Sized,
        F: FnMut(&E) -> Result<R>,
    {
        self.run(|| entity.description(), name, || attempt(entity), || None)
    }

    /// The polling loop. `on_timeout` runs at most once, after the last
    /// failed attempt, and may return the path of a captured screenshot.
    /// A nested timeout without a screenshot gets one from `on_timeout`
    /// on its way out.
    pub fn run<R>(
        &self,
        describe: impl Fn() -> String,
        name: &str,
        mut attempt: impl FnMut() -> Result<R>,
        on_timeout: impl FnOnce() -> Option<PathBuf>,
    ) -> Result<R> {
        let deadline = Instant::now() + self.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let failure = match attempt() {
                Ok(value) => {
                    if attempts > 1 {
                        debug!("{}: {} after {} attempts", describe(), name, attempts);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => err,
                Err(SeleneError::Timeout(mut nested)) if nested.screenshot.is_none() => {
                    nested.screenshot = on_timeout();
                    return Err(SeleneError::Timeout(nested));
                }
                Err(err) => return Err(err),
            };

            if Instant::now() >= deadline {
                let entity = describe();
                debug!(
                    "{}: {} timed out after {} attempts",
                    entity, name, attempts
                );
                return Err(self.timed_out(entity, name, failure, on_timeout()));
            }

            trace!("{}: {} attempt {} failed: {}", describe(), name, attempts, failure);
            thread::sleep(self.poll);
        }
    }

    fn timed_out(
        &self,
        entity: String,
        name: &str,
        failure: SeleneError,
        screenshot: Option<PathBuf>,
    ) -> SeleneError {
        let (expected, actual) = match failure.as_mismatch() {
            Some(mismatch) => (mismatch.expected.clone(), mismatch.actual.clone()),
            None => (None, None),
        };
        TimeoutError {
            timeout: self.timeout,
            condition: name.to_string(),
            entity,
            expected,
            actual,
            reason_kind: failure.kind().to_string(),
            reason: failure.to_string(),
            screenshot,
        }
        .into()
    }
}

impl Default for Wait {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
