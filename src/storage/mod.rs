use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{AppError, AppResult};

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// File storage for uploaded content; directories are relative to the store root.
///
/// Uploads are written in two steps: `stage` puts the bytes under a private
/// name in the target directory, `promote` renames them over the final name.
/// Callers promote only once the matching record is committed and `remove`
/// the staged name otherwise.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `bytes` into `dir` and returns the staged file name.
    async fn stage(&self, bytes: Vec<u8>, dir: &Path) -> AppResult<String>;
    /// Atomically replaces `dir/filename` with the staged file.
    async fn promote(&self, dir: &Path, staged: &str, filename: &str) -> AppResult<()>;
    /// Removing a file that is already gone is not an error.
    async fn remove(&self, dir: &Path, filename: &str) -> AppResult<()>;
    async fn exists(&self, dir: &Path, filename: &str) -> AppResult<bool>;
    async fn read(&self, dir: &Path, filename: &str) -> AppResult<Option<Vec<u8>>>;
}

/// Reduces a client-supplied filename to its last path component.
pub fn sanitize_filename(original: &str) -> AppResult<String> {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::Validation(format!(
            "invalid file name {:?}",
            original
        )));
    }
    Ok(name.to_string())
}

/// Lower-cased extension of a filename, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)?;
    Ok(())
}

#[derive(Clone)]
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_of(&self, dir: &Path, filename: &str) -> PathBuf {
        self.root.join(dir).join(filename)
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn stage(&self, bytes: Vec<u8>, dir: &Path) -> AppResult<String> {
        let target_dir = self.root.join(dir);

        fs::create_dir_all(&target_dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", target_dir.display(), e))
        })?;

        let staging_dir = target_dir.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".staged-")
                .suffix(".part")
                .tempfile_in(&staging_dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            let (_, path) = tmp.keep().map_err(|e| e.error)?;
            Ok(path)
        })
        .await
        .map_err(|e| AppError::Storage(format!("File write task failed: {}", e)))?;

        let path = written.map_err(|e| {
            AppError::Storage(format!("Failed to write into {}: {}", target_dir.display(), e))
        })?;
        let staged = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Storage(format!("Bad staged path {}", path.display())))?;

        tracing::debug!("Staged {}", path.display());
        Ok(staged)
    }

    async fn promote(&self, dir: &Path, staged: &str, filename: &str) -> AppResult<()> {
        let from = self.path_of(dir, staged);
        let to = self.path_of(dir, filename);
        fs::rename(&from, &to).await.map_err(|e| {
            AppError::Storage(format!("Failed to move {} into place: {}", to.display(), e))
        })?;

        tracing::debug!("Stored {}", to.display());
        Ok(())
    }

    async fn remove(&self, dir: &Path, filename: &str) -> AppResult<()> {
        let path = self.path_of(dir, filename);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, dir: &Path, filename: &str) -> AppResult<bool> {
        fs::try_exists(self.path_of(dir, filename))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn read(&self, dir: &Path, filename: &str) -> AppResult<Option<Vec<u8>>> {
        let path = self.path_of(dir, filename);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn put(store: &DiskFileStore, bytes: &[u8], dir: &Path, filename: &str) {
        let staged = store.stage(bytes.to_vec(), dir).await.unwrap();
        store.promote(dir, &staged, filename).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_read_remove() {
        let dir = tempdir().unwrap();
        let store = DiskFileStore::new(dir.path().to_path_buf());
        let sub = Path::new("comments/user3/9");

        put(&store, b"draft", sub, "notes.pdf").await;
        assert!(store.exists(sub, "notes.pdf").await.unwrap());
        assert!(dir.path().join("comments/user3/9/notes.pdf").is_file());
        assert_eq!(
            store.read(sub, "notes.pdf").await.unwrap(),
            Some(b"draft".to_vec())
        );

        put(&store, b"final", sub, "notes.pdf").await;
        assert_eq!(
            store.read(sub, "notes.pdf").await.unwrap(),
            Some(b"final".to_vec())
        );

        store.remove(sub, "notes.pdf").await.unwrap();
        assert!(!store.exists(sub, "notes.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_staged_file_is_invisible_until_promoted() {
        let dir = tempdir().unwrap();
        let store = DiskFileStore::new(dir.path().to_path_buf());
        let sub = Path::new("papers/user2/5");
        put(&store, b"ORIGINAL", sub, "paper.pdf").await;

        let staged = store.stage(b"REPLACEMENT".to_vec(), sub).await.unwrap();
        assert_ne!(staged, "paper.pdf");
        assert_eq!(
            store.read(sub, "paper.pdf").await.unwrap(),
            Some(b"ORIGINAL".to_vec())
        );

        store.promote(sub, &staged, "paper.pdf").await.unwrap();
        assert_eq!(
            store.read(sub, "paper.pdf").await.unwrap(),
            Some(b"REPLACEMENT".to_vec())
        );
        assert!(!store.exists(sub, &staged).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        let store = DiskFileStore::new(dir.path().to_path_buf());
        store.remove(Path::new("papers/user1/1"), "gone.pdf").await.unwrap();
        assert_eq!(
            store.read(Path::new("papers/user1/1"), "gone.pdf").await.unwrap(),
            None
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("paper.docx").unwrap(), "paper.docx");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\talk.pdf").unwrap(), "talk.pdf");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/..").is_err());
        assert!(sanitize_filename("uploads/").is_err());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Paper.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("README"), None);
    }
}
