use crate::errors::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::info;

static SEED: OnceLock<u64> = OnceLock::new();
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Names and stores PNG screenshots.
///
/// File names carry a process-wide counter seeded from the wall clock at
/// first use, so screenshots of one run sort together and never collide.
pub struct ScreenshotManager;

impl ScreenshotManager {
    /// Counter value at first use, in milliseconds since the epoch.
    pub fn seed() -> u64 {
        *SEED.get_or_init(|| {
            let seed = chrono::Utc::now().timestamp_millis().max(0) as u64;
            COUNTER.store(seed, Ordering::SeqCst);
            seed
        })
    }

    pub fn next_index() -> u64 {
        Self::seed();
        COUNTER.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// `<home>/.selene/screenshots/<seed>`
    pub fn default_folder() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".selene")
            .join("screenshots")
            .join(Self::seed().to_string())
    }

    /// Writes `png` as `<folder>/<name>_<index>.png`, creating the folder.
    pub fn save(png: &[u8], folder: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(folder)?;
        let path = folder.join(format!("{}_{}.png", name, Self::next_index()));
        fs::write(&path, png)?;
        info!("screenshot saved to {}", path.display());
        Ok(path)
    }

    pub fn to_base64(png: &[u8]) -> String {
        STANDARD.encode(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_increase() {
        let first = ScreenshotManager::next_index();
        let second = ScreenshotManager::next_index();
        assert!(second > first);
        assert!(first > ScreenshotManager::seed());
    }

    #[test]
    fn test_save_creates_folder_and_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested").join("shots");
        let first = ScreenshotManager::save(b"png", &folder, "page").unwrap();
        let second = ScreenshotManager::save(b"png", &folder, "page").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"png");
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("page_") && name.ends_with(".png"));
    }

    #[test]
    fn test_default_folder_ends_with_seed() {
        let folder = ScreenshotManager::default_folder();
        assert!(folder.ends_with(ScreenshotManager::seed().to_string()));
        assert!(folder.to_string_lossy().contains(".selene"));
    }

    #[test]
    fn test_base64() {
        assert_eq!(ScreenshotManager::to_base64(b"png"), "cG5n");
    }
}
