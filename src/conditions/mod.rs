//! Named predicates over elements, collections and the browser.
//!
//! A condition either holds for an entity (`Ok(())`) or fails with a
//! [`SeleneError::Mismatch`] describing what was expected and what was
//! found. Resolution errors raised while inspecting the entity (element not
//! found, stale reference) propagate as-is; the wait engine retries both.

pub mod browser;
pub mod collection;
pub mod element;

pub use browser::{js_returned_true, title, title_containing, url, url_containing, BrowserCondition};
pub use collection::{
    empty, exact_texts, size, size_at_least, size_at_most, texts, CollectionCondition,
};
pub use element::{
    blank, clickable, enabled, has_attribute, has_css_class, has_exact_text, has_text,
    has_value, hidden, in_dom, selected, visible, ElementCondition,
};

use crate::errors::{Mismatch, Result, SeleneError};
use std::sync::Arc;

pub trait Condition<E: ?Sized>: Send + Sync {
    /// Printable name used in diagnostics, e.g. `has_text('foo')`.
    fn name(&self) -> String;

    /// Checks the entity without mutating it.
    fn apply(&self, entity: &E) -> Result<()>;
}

impl<E: ?Sized, C: Condition<E> + ?Sized> Condition<E> for &C {
    fn name(&self) -> String {
        (**self).name()
    }

    fn apply(&self, entity: &E) -> Result<()> {
        (**self).apply(entity)
    }
}

impl<E: ?Sized, C: Condition<E> + ?Sized> Condition<E> for Arc<C> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn apply(&self, entity: &E) -> Result<()> {
        (**self).apply(entity)
    }
}

impl<E: ?Sized, C: Condition<E> + ?Sized> Condition<E> for Box<C> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn apply(&self, entity: &E) -> Result<()> {
        (**self).apply(entity)
    }
}

/// Combinators available on every condition.
pub trait ConditionExt<E: ?Sized>: Condition<E> + Sized {
    fn negate(self) -> Not<Self> {
        Not(self)
    }

    fn and<C: Condition<E>>(self, other: C) -> And<Self, C> {
        And(self, other)
    }
}

impl<E: ?Sized, C: Condition<E>> ConditionExt<E> for C {}

/// Holds exactly when the inner condition fails.
#[derive(Debug, Clone)]
pub struct Not<C>(C);

pub fn not_<C>(condition: C) -> Not<C> {
    Not(condition)
}

impl<E: ?Sized, C: Condition<E>> Condition<E> for Not<C> {
    fn name(&self) -> String {
        format!("not({})", self.0.name())
    }

    fn apply(&self, entity: &E) -> Result<()> {
        match self.0.apply(entity) {
            Ok(()) => Err(Mismatch::new(self.name())
                .expected(format!("not {}", self.0.name()))
                .actual(self.0.name())
                .into()),
            Err(err) if err.is_condition_failure() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Holds when both conditions hold; the left one is checked first.
#[derive(Debug, Clone)]
pub struct And<A, B>(A, B);

impl<E: ?Sized, A: Condition<E>, B: Condition<E>> Condition<E> for And<A, B> {
    fn name(&self) -> String {
        format!("{} and {}", self.0.name(), self.1.name())
    }

    fn apply(&self, entity: &E) -> Result<()> {
        self.0.apply(entity)?;
        self.1.apply(entity)
    }
}

/// User-defined condition backed by a closure.
pub struct Predicate<F> {
    name: String,
    check: F,
}

/// Builds a condition from a name and a check. The check signals a
/// non-match by returning a [`Mismatch`] (or any retryable error).
pub fn condition<E, F>(name: impl Into<String>, check: F) -> Predicate<F>
where
    E: ?Sized,
    F: Fn(&E) -> Result<()> + Send + Sync,
{
    Predicate {
        name: name.into(),
        check,
    }
}

impl<E: ?Sized, F> Condition<E> for Predicate<F>
where
    F: Fn(&E) -> Result<()> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(&self, entity: &E) -> Result<()> {
        (self.check)(entity)
    }
}

pub(crate) fn quoted(value: &str) -> String {
    format!("'{}'", value)
}

pub(crate) fn quoted_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quoted(v)).collect();
    format!("[{}]", items.join(","))
}

pub(crate) fn mismatch(name: String, expected: impl Into<String>, actual: impl Into<String>) -> SeleneError {
    Mismatch::new(name).expected(expected).actual(actual).into()
}
