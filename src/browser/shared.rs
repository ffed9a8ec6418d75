//! Process-wide driver behind [`crate::browser()`].
//!
//! The driver is launched on first use from the current [`Config`] and shut
//! down when the process exits, unless `hold_browser_open` is set by then.

use super::chrome::ChromeDriver;
use super::webdriver::RemoteDriver;
use crate::core::config::{self, Config};
use crate::core::Driver;
use crate::errors::{Result, SeleneError};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use tracing::{info, warn};

static SHARED: Mutex<Option<Arc<dyn Driver>>> = Mutex::new(None);
static EXIT_HOOK: Once = Once::new();

fn slot() -> MutexGuard<'static, Option<Arc<dyn Driver>>> {
    SHARED.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Current shared driver, launching one if none is installed.
pub fn driver() -> Result<Arc<dyn Driver>> {
    let mut slot = slot();
    if let Some(driver) = slot.as_ref() {
        return Ok(Arc::clone(driver));
    }
    let driver = launch(&config::get())?;
    register_exit_hook();
    *slot = Some(Arc::clone(&driver));
    Ok(driver)
}

/// Installs `driver` as the shared one, quitting the previous driver first.
pub fn set_driver(driver: Arc<dyn Driver>) {
    let previous = slot().take();
    if let Some(previous) = previous {
        if let Err(err) = previous.quit() {
            warn!("failed to quit previous {} driver: {}", previous.name(), err);
        }
    }
    register_exit_hook();
    *slot() = Some(driver);
}

pub fn is_started() -> bool {
    slot().is_some()
}

/// Quits and forgets the shared driver. A later [`driver`] call launches a
/// fresh one.
pub fn quit() -> Result<()> {
    let current = slot().take();
    match current {
        Some(driver) => {
            info!("quitting shared {} driver", driver.name());
            driver.quit()
        }
        None => Ok(()),
    }
}

/// Starts the backend named by `config.browser_name`.
pub fn launch(config: &Config) -> Result<Arc<dyn Driver>> {
    match config.browser_name.to_ascii_lowercase().as_str() {
        "firefox" => Ok(Arc::new(RemoteDriver::firefox(config)?)),
        "chrome" | "chromium" => Ok(Arc::new(ChromeDriver::launch(config)?)),
        other => Err(SeleneError::LaunchFailed(format!(
            "unsupported browser '{}'",
            other
        ))),
    }
}

#[cfg(unix)]
fn register_exit_hook() {
    extern "C" fn quit_at_exit() {
        if config::get().hold_browser_open {
            return;
        }
        // never block process exit on a lock held elsewhere
        let current = match SHARED.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(driver) = current {
            let _ = driver.quit();
        }
    }

    EXIT_HOOK.call_once(|| {
        // SAFETY: registers a plain extern "C" function with no captured state
        unsafe {
            libc::atexit(quit_at_exit);
        }
    });
}

#[cfg(not(unix))]
fn register_exit_hook() {
    EXIT_HOOK.call_once(|| {});
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;

    #[test]
    fn test_unknown_browser_fails_to_launch() {
        let config = Config {
            browser_name: "netscape".to_string(),
            ..Config::default()
        };
        let err = launch(&config).err().unwrap();
        assert!(matches!(err, SeleneError::LaunchFailed(ref msg) if msg.contains("netscape")));
    }

    #[test]
    fn test_default_browser_is_firefox_over_webdriver() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let config = Config {
            webdriver_url: url.clone(),
            ..Config::default()
        };
        let err = launch(&config).err().unwrap();
        assert!(matches!(err, SeleneError::LaunchFailed(ref msg) if msg.contains(&url)));
    }

    // the only test touching the process-wide slot
    #[test]
    fn test_set_driver_replaces_and_quits_previous() {
        let first = Arc::new(FakeDriver::new());
        let second = Arc::new(FakeDriver::new());

        set_driver(first.clone());
        assert!(is_started());
        set_driver(second.clone());
        assert!(first.is_closed());
        assert!(!second.is_closed());

        let current = driver().unwrap();
        assert_eq!(current.name(), "fake");

        quit().unwrap();
        assert!(second.is_closed());
        assert!(!is_started());
    }
}
