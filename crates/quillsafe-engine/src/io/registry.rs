use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::DocumentId;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to write identity index {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persistent `identity → display name` index.
///
/// The file is read in full on every query and rewritten in full on every
/// update. It only caches display names, so unreadable or corrupt content
/// is treated as an empty index rather than an error.
#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    path: PathBuf,
}

impl IdentityRegistry {
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, ordered by identifier
    pub fn entries(&self) -> BTreeMap<String, String> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                log::warn!(
                    "Identity index {} unreadable, using an empty index: {e}",
                    self.path.display()
                );
                return BTreeMap::new();
            }
        };
        serde_json::from_slice(&content).unwrap_or_else(|e| {
            log::warn!(
                "Identity index {} is corrupt, using an empty index: {e}",
                self.path.display()
            );
            BTreeMap::new()
        })
    }

    pub fn lookup(&self, identity: &DocumentId) -> Option<String> {
        self.entries().remove(identity.as_str())
    }

    /// Insert or overwrite the name for `identity`
    pub fn register(&self, identity: &DocumentId, name: &str) -> Result<(), RegistryError> {
        let storage_write = |source: std::io::Error| RegistryError::StorageWrite {
            path: self.path.clone(),
            source,
        };

        let mut entries = self.entries();
        if entries.get(identity.as_str()).map(String::as_str) == Some(name) {
            return Ok(());
        }
        entries.insert(identity.to_string(), name.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(storage_write)?;
        }
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| storage_write(std::io::Error::other(e)))?;
        fs::write(&self.path, json).map_err(storage_write)?;
        log::debug!("Registered {identity} as {name:?}");
        Ok(())
    }
}
