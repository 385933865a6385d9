//! Blob store collaborator for uploaded files.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Upload size cap, in bytes.
pub const MAX_BLOB_BYTES: usize = 5 * 1024 * 1024;

/// Storage abstraction for opaque named blobs.
pub trait BlobStore: Send + Sync {
    /// Fetch a blob and its content type, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails.
    fn get(&self, name: &str) -> Result<Option<(Vec<u8>, Option<String>)>>;

    /// Store a blob under a name, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Filesystem-backed blob store rooted at one directory.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        if valid_name(name) {
            Some(self.root.join(name))
        } else {
            None
        }
    }
}

/// Blob names are single path segments; anything that could traverse
/// directories is rejected.
#[must_use]
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn content_type_for(name: &str) -> Option<String> {
    let extension = Path::new(name).extension()?.to_str()?;
    let content_type = match extension.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        _ => return None,
    };
    Some(content_type.to_string())
}

impl BlobStore for FsBlobStore {
    fn get(&self, name: &str) -> Result<Option<(Vec<u8>, Option<String>)>> {
        let Some(path) = self.path_for(name) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some((bytes, content_type_for(name)))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read blob {name}")),
        }
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self
            .path_for(name)
            .with_context(|| format!("invalid blob name: {name}"))?;
        fs::create_dir_all(&self.root).context("failed to create blob directory")?;
        fs::write(&path, bytes).with_context(|| format!("failed to write blob {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn put_then_get_round_trips() -> Result<()> {
        let (_dir, store) = store();
        store.put("avatar.png", b"fake png bytes")?;

        let fetched = store.get("avatar.png")?;
        let (bytes, content_type) = fetched.expect("blob should exist");
        assert_eq!(bytes, b"fake png bytes");
        assert_eq!(content_type.as_deref(), Some("image/png"));
        Ok(())
    }

    #[test]
    fn missing_blob_is_none() -> Result<()> {
        let (_dir, store) = store();
        assert!(store.get("nope.txt")?.is_none());
        Ok(())
    }

    #[test]
    fn traversal_names_are_rejected() -> Result<()> {
        let (_dir, store) = store();
        assert!(store.put("../escape", b"x").is_err());
        assert!(store.put("a/b", b"x").is_err());
        assert!(store.get("..")?.is_none());
        assert!(store.get("")?.is_none());
        Ok(())
    }

    #[test]
    fn unknown_extension_has_no_content_type() -> Result<()> {
        let (_dir, store) = store();
        store.put("data.bin", b"x")?;
        let (_, content_type) = store.get("data.bin")?.expect("blob should exist");
        assert!(content_type.is_none());
        Ok(())
    }
}
