//! Capture history on disk
//!
//! Every capture is stored as a PNG named after its timestamp in a single
//! history directory. The directory is the only index: listing it recovers
//! the history, newest first.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use capture_edit_core::{Bitmap, EditorConfig};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use image::{ImageError, ImageFormat};
use log::{debug, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "capture_";
const FILE_EXTENSION: &str = "png";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to create history directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to save image to {path}: {source}")]
    ImageSaveFailed {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("failed to load image from {path}: {source}")]
    ImageLoadFailed {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("history item not found: {0}")]
    ItemNotFound(PathBuf),
    #[error("invalid image data: {0}")]
    InvalidImageData(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A stored capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub id: Uuid,
    pub timestamp: DateTime<Local>,
    pub path: PathBuf,
}

impl HistoryItem {
    /// The id is derived from the path, so one file keeps the same id
    /// across listings.
    pub fn new(timestamp: DateTime<Local>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()),
            timestamp,
            path,
        }
    }

    /// Name of the stored file, e.g. `capture_20240102_030405.png`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name_for(&self.timestamp))
    }
}

impl Ord for HistoryItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for HistoryItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonical file name for a capture taken at `timestamp`
pub fn file_name_for(timestamp: &DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        FILE_PREFIX,
        timestamp.format(TIMESTAMP_FORMAT),
        FILE_EXTENSION
    )
}

/// Recover the capture time encoded in a history file name
fn parse_file_timestamp(path: &Path) -> Option<DateTime<Local>> {
    let stem = path.file_stem()?.to_str()?;
    let stamp = stem.strip_prefix(FILE_PREFIX)?.get(..15)?;
    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

fn is_history_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'));
    let png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(FILE_EXTENSION));
    visible && png && path.is_file()
}

/// Filesystem-backed capture history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
    limit: usize,
}

impl HistoryStore {
    /// Open (creating if needed) a history directory listing at most `limit` items
    pub fn new(root: impl Into<PathBuf>, limit: usize) -> Result<Self, HistoryError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| HistoryError::DirectoryCreationFailed {
            path: root.clone(),
            source,
        })?;
        debug!("history directory: {}", root.display());

        Ok(Self { root, limit })
    }

    pub fn from_config(config: &EditorConfig) -> Result<Self, HistoryError> {
        Self::new(&config.history_dir, config.history_limit)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Store `image` as a PNG named after `timestamp`
    ///
    /// A capture already stored for the same second is kept; the new file
    /// gets a numeric suffix.
    pub fn save_image(
        &self,
        image: &Bitmap,
        timestamp: DateTime<Local>,
    ) -> Result<HistoryItem, HistoryError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(HistoryError::InvalidImageData(format!(
                "empty {}x{} bitmap",
                image.width(),
                image.height()
            )));
        }

        let path = self.unused_path(&timestamp);
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| HistoryError::ImageSaveFailed {
                path: path.clone(),
                source,
            })?;
        debug!("saved capture {}", path.display());

        Ok(HistoryItem::new(timestamp, path))
    }

    fn unused_path(&self, timestamp: &DateTime<Local>) -> PathBuf {
        let path = self.root.join(file_name_for(timestamp));
        if !path.exists() {
            return path;
        }

        let stem = format!("{}{}", FILE_PREFIX, timestamp.format(TIMESTAMP_FORMAT));
        (1..)
            .map(|n| self.root.join(format!("{}_{}.{}", stem, n, FILE_EXTENSION)))
            .find(|candidate| !candidate.exists())
            .unwrap_or(path)
    }

    fn all_items(&self) -> Result<Vec<HistoryItem>, HistoryError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !is_history_file(&path) {
                continue;
            }

            let timestamp = match parse_file_timestamp(&path) {
                Some(timestamp) => timestamp,
                None => match fs::metadata(&path).and_then(|m| m.modified()) {
                    Ok(modified) => DateTime::<Local>::from(modified),
                    Err(err) => {
                        warn!("skipping {}: {}", path.display(), err);
                        continue;
                    }
                },
            };
            items.push(HistoryItem::new(timestamp, path));
        }

        items.sort_by(|a, b| b.cmp(a));
        Ok(items)
    }

    /// Stored captures, newest first, at most `limit` of them
    ///
    /// Older files beyond the limit stay on disk.
    pub fn load_history(&self) -> Result<Vec<HistoryItem>, HistoryError> {
        let mut items = self.all_items()?;
        items.truncate(self.limit);
        Ok(items)
    }

    pub fn load_image(&self, item: &HistoryItem) -> Result<Bitmap, HistoryError> {
        if !item.path.is_file() {
            return Err(HistoryError::ItemNotFound(item.path.clone()));
        }

        match image::open(&item.path) {
            Ok(image) => Ok(image.to_rgba8()),
            Err(ImageError::IoError(err)) => Err(HistoryError::ImageLoadFailed {
                path: item.path.clone(),
                source: ImageError::IoError(err),
            }),
            Err(err) => Err(HistoryError::InvalidImageData(format!(
                "{}: {}",
                item.path.display(),
                err
            ))),
        }
    }

    pub fn delete_item(&self, item: &HistoryItem) -> Result<(), HistoryError> {
        if !item.path.is_file() {
            return Err(HistoryError::ItemNotFound(item.path.clone()));
        }
        fs::remove_file(&item.path)?;
        debug!("deleted capture {}", item.path.display());
        Ok(())
    }

    /// Delete every stored capture, including those beyond the listing limit
    ///
    /// Returns the number of files removed.
    pub fn delete_all(&self) -> Result<usize, HistoryError> {
        let mut removed = 0;
        for item in self.all_items()? {
            match self.delete_item(&item) {
                Ok(()) => removed += 1,
                Err(err) => warn!("failed to delete {}: {}", item.path.display(), err),
            }
        }
        Ok(removed)
    }
}
