use super::{mismatch, quoted_list, Condition};
use crate::core::WebElement;
use crate::elements::Collection;
use crate::errors::Result;

/// Built-in conditions over an element collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionCondition {
    Size(usize),
    SizeAtLeast(usize),
    SizeAtMost(usize),
    /// Same length, and each member's text contains its substring.
    Texts(Vec<String>),
    /// Same length, and member-wise text equality.
    ExactTexts(Vec<String>),
}

pub fn size(count: usize) -> CollectionCondition {
    CollectionCondition::Size(count)
}

pub fn size_at_least(count: usize) -> CollectionCondition {
    CollectionCondition::SizeAtLeast(count)
}

pub fn size_at_most(count: usize) -> CollectionCondition {
    CollectionCondition::SizeAtMost(count)
}

pub fn empty() -> CollectionCondition {
    CollectionCondition::Size(0)
}

pub fn texts<I, S>(substrings: I) -> CollectionCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CollectionCondition::Texts(substrings.into_iter().map(Into::into).collect())
}

pub fn exact_texts<I, S>(texts: I) -> CollectionCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CollectionCondition::ExactTexts(texts.into_iter().map(Into::into).collect())
}

impl CollectionCondition {
    /// Checks an already resolved list of elements.
    pub fn check(&self, elements: &[WebElement]) -> Result<()> {
        let actual = elements.len();
        match self {
            CollectionCondition::Size(expected) => {
                if actual == *expected {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), expected.to_string(), actual.to_string()))
                }
            }
            CollectionCondition::SizeAtLeast(expected) => {
                if actual >= *expected {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), format!(">= {}", expected), actual.to_string()))
                }
            }
            CollectionCondition::SizeAtMost(expected) => {
                if actual <= *expected {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), format!("<= {}", expected), actual.to_string()))
                }
            }
            CollectionCondition::Texts(expected) => {
                let actual = collect_texts(elements)?;
                let matched = actual.len() == expected.len()
                    && actual
                        .iter()
                        .zip(expected)
                        .all(|(text, substring)| text.contains(substring.as_str()));
                if matched {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), quoted_list(expected), quoted_list(&actual)))
                }
            }
            CollectionCondition::ExactTexts(expected) => {
                let actual = collect_texts(elements)?;
                if &actual == expected {
                    Ok(())
                } else {
                    Err(mismatch(self.label(), quoted_list(expected), quoted_list(&actual)))
                }
            }
        }
    }

    fn label(&self) -> String {
        match self {
            CollectionCondition::Size(count) => format!("size({})", count),
            CollectionCondition::SizeAtLeast(count) => format!("size_at_least({})", count),
            CollectionCondition::SizeAtMost(count) => format!("size_at_most({})", count),
            CollectionCondition::Texts(texts) => format!("texts({})", quoted_list(texts)),
            CollectionCondition::ExactTexts(texts) => format!("exact_texts({})", quoted_list(texts)),
        }
    }
}

impl Condition<Collection> for CollectionCondition {
    fn name(&self) -> String {
        self.label()
    }

    fn apply(&self, entity: &Collection) -> Result<()> {
        self.check(&entity.resolve()?)
    }
}

fn collect_texts(elements: &[WebElement]) -> Result<Vec<String>> {
    elements.iter().map(WebElement::text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;
    use crate::Browser;
    use std::sync::Arc;

    fn list() -> Browser {
        Browser::new(Arc::new(FakeDriver::with_body(
            "<ul><li>alpha</li><li>beta</li><li>gamma</li></ul>",
        )))
    }

    #[test]
    fn test_size_conditions() {
        let items = list().all("li");
        assert!(size(3).apply(&items).is_ok());
        assert!(size_at_least(2).apply(&items).is_ok());
        assert!(size_at_most(3).apply(&items).is_ok());
        assert!(empty().apply(&list().all("table")).is_ok());

        let err = size_at_least(4).apply(&items).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.condition, "size_at_least(4)");
        assert_eq!(mismatch.expected.as_deref(), Some(">= 4"));
        assert_eq!(mismatch.actual.as_deref(), Some("3"));
    }

    #[test]
    fn test_texts_match_positionally_by_substring() {
        let items = list().all("li");
        assert!(texts(["al", "et", "mm"]).apply(&items).is_ok());
        assert!(texts(["et", "al", "mm"]).apply(&items).is_err());
        assert!(texts(["al", "et"]).apply(&items).is_err());
    }

    #[test]
    fn test_exact_texts_report_actual_list() {
        let items = list().all("li");
        assert!(exact_texts(["alpha", "beta", "gamma"]).apply(&items).is_ok());

        let err = exact_texts(["alpha", "gamma", "beta"]).apply(&items).unwrap_err();
        let mismatch = err.as_mismatch().unwrap();
        assert_eq!(mismatch.actual.as_deref(), Some("['alpha','beta','gamma']"));
        assert_eq!(mismatch.expected.as_deref(), Some("['alpha','gamma','beta']"));
    }
}
