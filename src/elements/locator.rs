use super::{Collection, Element};
use crate::browser::Browser;
use crate::conditions::Condition;
use crate::core::{SearchContext, WebElement};
use crate::errors::{Result, SeleneError};
use crate::types::Selector;
use crate::wait::Entity;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Recipe for a single native element. Building one performs no I/O.
#[derive(Clone)]
pub(crate) enum ElementLocator {
    /// First match in the browser document.
    ByContext(Selector),
    /// First match below a parent that must be visible first.
    Inner { selector: Selector, parent: Element },
    /// Member `index` of a collection that must first grow large enough.
    Indexed { index: usize, collection: Collection },
    /// First collection member the condition holds for.
    FoundBy {
        condition: Arc<dyn Condition<Element>>,
        collection: Collection,
    },
    /// Resolved once, then bound to that native reference for good.
    Cached {
        source: Element,
        cell: Arc<OnceLock<WebElement>>,
    },
    /// An already resolved member, used while scanning a collection.
    Snapshot { element: WebElement, path: String },
}

/// Recipe for a list of native elements.
#[derive(Clone)]
pub(crate) enum CollectionLocator {
    ByContext(Selector),
    Inner { selector: Selector, parent: Element },
    Sliced {
        start: usize,
        stop: usize,
        step: usize,
        collection: Collection,
    },
    /// Snapshot of the members matching the condition; never waits.
    Filtered {
        condition: Arc<dyn Condition<Element>>,
        collection: Collection,
    },
}

impl ElementLocator {
    pub(crate) fn resolve(&self, browser: &Browser) -> Result<WebElement> {
        match self {
            ElementLocator::ByContext(selector) => browser.find_element(selector),
            ElementLocator::Inner { selector, parent } => {
                parent.visible_native()?.find_element(selector)
            }
            ElementLocator::Indexed { index, collection } => {
                let members = collection.wait_size_at_least(index + 1)?;
                Ok(members[*index].clone())
            }
            ElementLocator::FoundBy {
                condition,
                collection,
            } => {
                for (index, member) in collection.resolve()?.into_iter().enumerate() {
                    if holds(condition.as_ref(), &collection.member(index, member.clone()))? {
                        return Ok(member);
                    }
                }
                Err(SeleneError::NoSuchElement(format!(
                    "no member of {} matched {}",
                    collection.description(),
                    condition.name()
                )))
            }
            ElementLocator::Cached { source, cell } => {
                if let Some(element) = cell.get() {
                    return Ok(element.clone());
                }
                let element = source.resolve()?;
                Ok(cell.get_or_init(|| element).clone())
            }
            ElementLocator::Snapshot { element, .. } => Ok(element.clone()),
        }
    }

    pub(crate) fn is_cached(&self) -> bool {
        matches!(self, ElementLocator::Cached { .. })
    }
}

impl CollectionLocator {
    pub(crate) fn resolve(&self, browser: &Browser) -> Result<Vec<WebElement>> {
        match self {
            CollectionLocator::ByContext(selector) => browser.find_elements(selector),
            CollectionLocator::Inner { selector, parent } => {
                parent.visible_native()?.find_elements(selector)
            }
            CollectionLocator::Sliced {
                start,
                stop,
                step,
                collection,
            } => {
                let members = collection.wait_size_at_least(*stop)?;
                Ok(members
                    .into_iter()
                    .take(*stop)
                    .skip(*start)
                    .step_by(*step)
                    .collect())
            }
            CollectionLocator::Filtered {
                condition,
                collection,
            } => {
                let mut matching = Vec::new();
                for (index, member) in collection.resolve()?.into_iter().enumerate() {
                    if holds(condition.as_ref(), &collection.member(index, member.clone()))? {
                        matching.push(member);
                    }
                }
                Ok(matching)
            }
        }
    }
}

/// `Ok(false)` when the condition fails; usage and lifecycle errors propagate.
fn holds(condition: &dyn Condition<Element>, element: &Element) -> Result<bool> {
    match condition.apply(element) {
        Ok(()) => Ok(true),
        Err(err) if err.is_condition_failure() => Ok(false),
        Err(err) => Err(err),
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementLocator::ByContext(selector) => write!(f, "browser.element({})", selector),
            ElementLocator::Inner { selector, parent } => {
                write!(f, "{}.element({})", parent.description(), selector)
            }
            ElementLocator::Indexed { index, collection } => {
                write!(f, "{}[{}]", collection.description(), index)
            }
            ElementLocator::FoundBy {
                condition,
                collection,
            } => write!(
                f,
                "{}.element_by({})",
                collection.description(),
                condition.name()
            ),
            ElementLocator::Cached { source, .. } => write!(f, "{}.cached()", source.description()),
            ElementLocator::Snapshot { path, .. } => f.write_str(path),
        }
    }
}

impl fmt::Display for CollectionLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionLocator::ByContext(selector) => write!(f, "browser.all({})", selector),
            CollectionLocator::Inner { selector, parent } => {
                write!(f, "{}.all({})", parent.description(), selector)
            }
            CollectionLocator::Sliced {
                start,
                stop,
                step,
                collection,
            } => {
                if *step == 1 {
                    write!(f, "{}[{}:{}]", collection.description(), start, stop)
                } else {
                    write!(f, "{}[{}:{}:{}]", collection.description(), start, stop, step)
                }
            }
            CollectionLocator::Filtered {
                condition,
                collection,
            } => write!(
                f,
                "{}.filtered_by({})",
                collection.description(),
                condition.name()
            ),
        }
    }
}
