//! Concise browser automation: lazy element handles, implicit waits and
//! composable conditions over a blocking WebDriver-style [`Driver`].
//!
//! ```no_run
//! use selene::conditions::{has_text, size};
//!
//! fn main() -> selene::Result<()> {
//!     let browser = selene::browser();
//!     browser.open("https://todomvc.com/examples/vanilla-es6/")?;
//!     browser.element("#new-todo").set_value("buy milk")?.press_enter()?;
//!     browser.all("#todo-list li").should(size(1))?;
//!     browser.all("#todo-list li").first().should(has_text("milk"))?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod conditions;
pub mod core;
pub mod elements;
pub mod errors;
pub mod testing;
pub mod types;
pub mod utils;
pub mod wait;

pub use browser::{Browser, ChromeDriver, RemoteDriver};
pub use conditions::{Condition, ConditionExt};
pub use crate::core::{config, Config, Driver, SearchContext, WebElement};
pub use elements::{Collection, Element};
pub use errors::{Mismatch, Result, SeleneError, TimeoutError};
pub use types::*;
pub use wait::{Entity, Wait};

/// Browser handle over the shared driver, launched on first use.
pub fn browser() -> Browser {
    Browser::shared()
}
