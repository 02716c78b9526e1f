//! src/services/storage_service.rs
//!
//! StorageService — flat on-disk storage for uploaded photos and videos.
//! Every file lives directly under `base_path/{name}`; the directory listing
//! is the only index. Writes go through a temp file plus rename and are
//! serialized per filename, so a reader never sees a half-written payload.

use crate::models::file::FileEntry;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::{Mutex, OwnedMutexGuard},
};
use tracing::debug;
use uuid::Uuid;

/// Extensions recognised as playable video, matched case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

/// Prefix reserved for in-flight uploads; never listed or addressable.
pub const TEMP_PREFIX: &str = ".upload-";
pub const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file name `{0}` is not allowed")]
    InvalidName(String),
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// An opened stored file, ready for streaming out.
#[derive(Debug)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub file: File,
}

/// StorageService owns the storage directory:
/// - Write a payload under a name (atomic replace, last write wins)
/// - List regular files
/// - Open a file for reading
/// - Delete a file
/// - Locate the first video file
#[derive(Clone)]
pub struct StorageService {
    /// Canonical storage directory. All resolved paths must stay inside it.
    pub base_path: PathBuf,

    /// Per-filename write locks. Idle entries are pruned on the next acquire.
    write_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl StorageService {
    /// Create the storage directory if needed and canonicalize it.
    pub async fn open(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path).await?;
        let base_path = fs::canonicalize(base_path).await?;
        Ok(Self {
            base_path,
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Map a client-supplied name onto a path inside the storage directory.
    ///
    /// The name must be exactly one normal path component: no separators,
    /// no `.`/`..`, no absolute paths, no control bytes.
    pub fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        let invalid = || StorageError::InvalidName(name.to_string());

        if name.is_empty() || name.len() > MAX_FILENAME_LEN || name.starts_with(TEMP_PREFIX) {
            return Err(invalid());
        }
        if name
            .bytes()
            .any(|b| b == b'/' || b == b'\\' || b == b'\0' || b.is_ascii_control())
        {
            return Err(invalid());
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(invalid()),
        }

        let path = self.base_path.join(name);
        if path.parent() != Some(self.base_path.as_path()) {
            return Err(invalid());
        }
        Ok(path)
    }

    /// Resolve a name that must already exist, following symlinks and
    /// verifying the real target is still inside the storage directory.
    async fn resolve_existing(&self, name: &str) -> StorageResult<PathBuf> {
        let path = self.resolve(name)?;
        let canonical = fs::canonicalize(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;
        if !canonical.starts_with(&self.base_path) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(path)
    }

    /// Acquire the write lock for one filename.
    async fn lock_name(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Store an in-memory payload under `name`, replacing any existing file.
    pub async fn write_bytes(&self, name: &str, bytes: Bytes) -> StorageResult<u64> {
        self.write_stream(name, futures::stream::iter([Ok(bytes)]))
            .await
    }

    /// Stream a payload to disk under `name`.
    ///
    /// - Writes chunks to a temp file in the storage directory.
    /// - Flushes and fsyncs before renaming over the target.
    /// - Removes the temp file on any error.
    ///
    /// Returns the number of bytes written.
    pub async fn write_stream<S>(&self, name: &str, stream: S) -> StorageResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let file_path = self.resolve(name)?;
        let _guard = self.lock_name(name).await;

        let tmp_path = self
            .base_path
            .join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!("stored {} ({} bytes)", file_path.display(), size_bytes);
        Ok(size_bytes)
    }

    /// List every regular file in the storage directory, sorted by name.
    ///
    /// Subdirectories, temp files and non UTF-8 names are skipped.
    pub async fn list_files(&self) -> StorageResult<Vec<FileEntry>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names.into_iter().map(FileEntry::new).collect())
    }

    /// Open a stored file for reading.
    pub async fn open_file(&self, name: &str) -> StorageResult<StoredFile> {
        let path = self.resolve_existing(name).await?;
        let metadata = fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok(StoredFile {
            name: name.to_string(),
            path,
            size: metadata.len(),
            file,
        })
    }

    /// Delete a stored file. Returns NotFound if it does not exist.
    pub async fn delete_file(&self, name: &str) -> StorageResult<()> {
        let path = self.resolve_existing(name).await?;
        let _guard = self.lock_name(name).await;

        match fs::remove_file(&path).await {
            Ok(_) => {
                debug!("removed {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Name of the first video file, by name order.
    pub async fn find_first_video(&self) -> StorageResult<Option<String>> {
        let files = self.list_files().await?;
        Ok(files
            .into_iter()
            .map(|entry| entry.name)
            .find(|name| is_video_name(name)))
    }
}

/// True if the name carries one of the known video extensions.
pub fn is_video_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
}

/// Decode a base64 payload, stripping an optional `data:<mime>;base64,` header.
pub fn decode_payload(data: &str) -> StorageResult<Vec<u8>> {
    let data = data.trim();
    let encoded = match data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, body)| body).unwrap_or(rest),
        None => data,
    };
    Ok(general_purpose::STANDARD.decode(encoded.trim())?)
}
