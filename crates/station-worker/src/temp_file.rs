//! Scoped removal of intermediate files.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Deletes its path when removed or dropped. A missing file is not an error.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now.
    pub async fn remove(mut self) {
        self.armed = false;
        remove_quietly(&self.path).await;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Remove `path`, logging anything other than "not found".
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_and_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        TempFile::new(&a).remove().await;
        assert!(!a.exists());

        {
            let _guard = TempFile::new(&b);
        }
        assert!(!b.exists());

        // already gone
        TempFile::new(&a).remove().await;
    }
}
