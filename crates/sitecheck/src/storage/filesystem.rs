use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{BlobStore, StorageRef};
use crate::error::StorageError;

/// Blob store writing each object to a file below a root directory.
///
/// Keys map to relative paths. A key that already exists is never
/// overwritten; the write lands on the first free `_N` variant instead and
/// the returned reference names the file actually written.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored reference.
    pub fn path_of(&self, storage_ref: &str) -> PathBuf {
        self.root.join(storage_ref)
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

/// Removes a half-written file when dropped, unless disarmed.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn disarm(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
    }
}

/// Creates the file with O_EXCL, trying numbered variants on collision.
/// Leaves either the complete file or nothing behind.
fn write_exclusive(dir_path: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        None => (filename, None),
    };

    for counter in 1..=1000 {
        let try_filename = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };
        let try_path = dir_path.join(&try_filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&try_path)
        {
            Ok(mut file) => {
                let partial = PartialFile::new(&try_path);
                file.write_all(content)
                    .and_then(|_| file.sync_all())
                    .map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                return Ok(partial.disarm());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: try_path,
                    source: e,
                })
            }
        }
    }

    Err(StorageError::FileExists(dir_path.join(filename)))
}

/// Splits a key into a relative directory and file name, refusing anything
/// that could escape the root.
fn split_key(key: &str) -> Result<(PathBuf, String), StorageError> {
    let path = Path::new(key);
    let clean = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if key.is_empty() || !clean {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((parent, filename.to_string()))
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<StorageRef, StorageError> {
        let (relative_dir, filename) = split_key(key)?;
        let dir_path = self.root.join(&relative_dir);
        self.ensure_directory(&dir_path).await?;

        // The write runs to completion on the blocking pool even if this
        // future is dropped.
        let len = bytes.len();
        let written = tokio::task::spawn_blocking(move || write_exclusive(&dir_path, &filename, &bytes))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;
        let storage_ref = written
            .strip_prefix(&self.root)
            .unwrap_or(&written)
            .to_string_lossy()
            .replace('\\', "/");

        log::debug!("Stored {} bytes at {}", len, written.display());
        Ok(storage_ref)
    }
}
