pub mod config;
pub mod driver;
pub mod element;

pub use config::Config;
pub use driver::{Driver, SearchContext};
pub use element::WebElement;
