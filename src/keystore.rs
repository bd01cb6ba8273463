//! API key persistence
//!
//! The browser version kept the key in local storage under a fixed name; here
//! the same name becomes a file in the platform config directory. Storage is
//! behind a trait so sessions and tests can swap in an in-memory store.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

/// Storage name the key is saved under, shared with the browser version
pub const API_KEY_STORAGE_KEY: &str = "scrapyai-apiKey";

pub trait KeyStore {
    /// Previously saved key, if any
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&mut self, key: &str) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

/// Key store backed by a file in the platform config directory
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new() -> io::Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory"))?;
        let dir = base.join("scrape-assistant");
        fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(API_KEY_STORAGE_KEY),
        })
    }

    /// Store rooted at an explicit path, used by tests
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let key = contents.trim().to_string();
                Ok(if key.is_empty() { None } else { Some(key) })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&mut self, key: &str) -> io::Result<()> {
        debug!(path = %self.path.display(), "saving API key");
        fs::write(&self.path, key)
    }

    fn clear(&mut self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Volatile store for tests and one-off runs
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: Option<String>,
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.key.clone())
    }

    fn save(&mut self, key: &str) -> io::Result<()> {
        self.key = Some(key.to_string());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.key = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryKeyStore::default();
        assert_eq!(store.load().unwrap(), None);
        store.save("sk-123").unwrap();
        assert_eq!(store.load().unwrap(), Some("sk-123".to_string()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn file_store_round_trips() {
        let dir = std::env::temp_dir().join("scrape-assistant-keystore-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(API_KEY_STORAGE_KEY);
        let _ = fs::remove_file(&path);

        let mut store = FileKeyStore::at(path.clone());
        assert_eq!(store.load().unwrap(), None);
        store.save("sk-456").unwrap();
        assert_eq!(store.load().unwrap(), Some("sk-456".to_string()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn blank_file_reads_as_no_key() {
        let dir = std::env::temp_dir().join("scrape-assistant-keystore-blank");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(API_KEY_STORAGE_KEY);
        fs::write(&path, "  \n").unwrap();
        let store = FileKeyStore::at(path);
        assert_eq!(store.load().unwrap(), None);
    }
}
