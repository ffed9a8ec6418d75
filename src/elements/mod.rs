//! Lazy element and collection handles.

pub mod collection;
pub mod element;
pub(crate) mod locator;

pub use collection::Collection;
pub use element::Element;
