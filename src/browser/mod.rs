pub mod chrome;
pub mod handle;
pub mod shared;
pub mod webdriver;

pub use chrome::ChromeDriver;
pub use handle::Browser;
pub use webdriver::RemoteDriver;
