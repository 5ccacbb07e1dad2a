//! Persistent key/value storage.
//!
//! Values are JSON files in the platform config directory:
//!   - Linux: `~/.config/campus/`
//!   - macOS: `~/Library/Application Support/campus/`
//!   - Windows: `%APPDATA%\campus\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

const APP_DIR: &str = "campus";

/// JSON file store rooted at one directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Store in the platform config directory, if there is one.
    pub fn platform() -> Option<Self> {
        Some(Self::at(dirs::config_dir()?.join(APP_DIR)))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save a value.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save_raw(key, &json),
            Err(e) => {
                crate::log_warn!("failed to encode {}: {}", key, e);
                false
            }
        }
    }

    /// Load a value.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.load_raw(key)?;
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                crate::log_warn!("ignoring unreadable {}: {}", key, e);
                None
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.file_path(key));
    }

    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).is_file()
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.root.join(format!("{}.json", safe_key))
    }

    fn save_raw(&self, key: &str, value: &str) -> bool {
        if let Err(e) = std::fs::create_dir_all(&self.root) {
            crate::log_warn!("cannot create {}: {}", self.root.display(), e);
            return false;
        }
        std::fs::write(self.file_path(key), value).is_ok()
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.file_path(key)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
    }

    #[test]
    fn save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path().join("nested"));
        let prefs = Prefs {
            theme: "dark".into(),
        };

        assert!(!storage.exists("prefs"));
        assert!(storage.save("prefs", &prefs));
        assert_eq!(storage.load::<Prefs>("prefs"), Some(prefs));

        storage.remove("prefs");
        assert!(!storage.exists("prefs"));
        assert_eq!(storage.load::<Prefs>("prefs"), None);
    }

    #[test]
    fn keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::at(dir.path());
        assert!(storage.save("a/b:c", &1));
        assert!(dir.path().join("a_b_c.json").is_file());
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session.json"), "{oops").unwrap();
        let storage = Storage::at(dir.path());
        assert_eq!(storage.load::<Prefs>("session"), None);
    }
}
