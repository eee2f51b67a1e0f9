use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use autocheck_core::ResponseCache;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::Result;

/// On-disk response cache with 2-char sharding.
///
/// Layout: `<root>/<first 2 key chars>/<remaining key chars>`. Keys are the
/// hex digests produced by `autocheck_core::cache_key`. Failures are logged and
/// treated as misses.
#[derive(Debug, Clone)]
pub struct FsResponseCache {
    root: PathBuf,
}

impl FsResponseCache {
    /// Create the cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        if key.len() > 2 && key.is_char_boundary(2) {
            self.root.join(&key[..2]).join(&key[2..])
        } else {
            self.root.join(key)
        }
    }

    fn write_entry(&self, path: &Path, value: &[u8]) -> std::io::Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        // Temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(value)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ResponseCache for FsResponseCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, "Cache hit");
                Some(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8]) {
        let path = self.entry_path(key);
        if let Err(e) = self.write_entry(&path, value) {
            warn!(key, error = %e, "Cache write failed");
        }
    }
}
