//! Durable, deduplicated, size-bounded clip history.
//!
//! Write order is payload file first, metadata row second; delete order is
//! row first, files second. A crash can therefore orphan a file but never
//! leave a row whose file was never written. Rows whose file went missing
//! later are read as misses.

use crate::database::Database;
use crate::environment::{Environment, SupportPaths};
use crate::interface::{ClipRecord, HistoryOrder, ShelfError};
use crate::models::{generate_thumbnail, ClipData};
use crate::preferences::Preferences;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of `ClipStore::create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Inserted(ClipRecord),
    /// Same hash existed and was refreshed in place
    Overwritten(ClipRecord),
    /// Same hash existed and duplicates are not kept
    SkippedDuplicate,
    /// Nothing captured
    SkippedEmpty,
}

impl CreateOutcome {
    pub fn record(&self) -> Option<&ClipRecord> {
        match self {
            CreateOutcome::Inserted(r) | CreateOutcome::Overwritten(r) => Some(r),
            _ => None,
        }
    }
}

pub struct ClipStore<'a> {
    db: &'a Database,
    paths: &'a SupportPaths,
    env: &'a Environment,
}

impl<'a> ClipStore<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Self {
            db: &env.database,
            paths: &env.paths,
            env,
        }
    }

    pub fn preferences(&self) -> Preferences {
        self.env.preferences.get()
    }

    /// Persist a snapshot, then trim history to the configured cap.
    ///
    /// With `overwrite_same_history` the record is keyed by the content hash
    /// and a repeat copy refreshes it; otherwise each copy gets a synthetic
    /// key. With `copy_same_history` off, a repeat of an existing hash is
    /// dropped before anything is written.
    pub fn create(&self, data: &ClipData) -> Result<CreateOutcome, ShelfError> {
        if data.is_empty() {
            return Ok(CreateOutcome::SkippedEmpty);
        }

        let prefs = self.preferences();
        let content_hash = data.data_hash().to_string();

        if !prefs.copy_same_history && self.db.find_clip(&content_hash)?.is_some() {
            debug!(hash = %content_hash, "duplicate clip ignored");
            return Ok(CreateOutcome::SkippedDuplicate);
        }

        let key = if prefs.overwrite_same_history {
            content_hash
        } else {
            synthetic_key()
        };

        let file_id = uuid::Uuid::new_v4().to_string();
        let data_path = self.paths.history_dir().join(format!("{}.data", file_id));
        if let Err(e) = write_payload(&data_path, data) {
            // No row is written, so nothing dangles
            warn!(path = %data_path.display(), error = %e, "failed to write clip payload");
            return Err(e);
        }

        let thumbnail_path = data.image.as_deref().and_then(|image| {
            let bytes = generate_thumbnail(image, prefs.thumbnail_width, prefs.thumbnail_height)?;
            let path = self.paths.thumbnail_dir().join(format!("{}.png", file_id));
            match fs::create_dir_all(self.paths.thumbnail_dir()).and_then(|_| fs::write(&path, bytes)) {
                Ok(()) => Some(path.to_string_lossy().into_owned()),
                Err(e) => {
                    warn!(error = %e, "failed to write thumbnail");
                    None
                }
            }
        });

        let record = ClipRecord {
            data_hash: key,
            data_path: data_path.to_string_lossy().into_owned(),
            title: data.title(),
            primary_type: data.primary_type().map(|t| t.raw_value().to_string()).unwrap_or_default(),
            update_time: self.env.clock.now_unix(),
            thumbnail_path,
        };

        let previous = match self.db.upsert_clip(&record) {
            Ok(previous) => previous,
            Err(e) => {
                remove_files(&record);
                return Err(e.into());
            }
        };

        let outcome = match previous {
            Some(old) => {
                if old.data_path != record.data_path {
                    remove_file(Path::new(&old.data_path));
                }
                if let Some(thumb) = old.thumbnail_path.as_deref() {
                    if record.thumbnail_path.as_deref() != Some(thumb) {
                        remove_file(Path::new(thumb));
                    }
                }
                debug!(hash = %record.data_hash, "clip overwritten");
                CreateOutcome::Overwritten(record)
            }
            None => {
                debug!(hash = %record.data_hash, "clip inserted");
                CreateOutcome::Inserted(record)
            }
        };

        self.trim(prefs.max_history_size)?;
        Ok(outcome)
    }

    /// Keep only the newest `max_size` clips. Returns how many were removed.
    pub fn trim(&self, max_size: usize) -> Result<usize, ShelfError> {
        if self.db.count_clips()? as usize <= max_size {
            return Ok(0);
        }
        let removed = self.db.delete_clips_beyond(max_size)?;
        for record in &removed {
            remove_files(record);
        }
        if !removed.is_empty() {
            info!(removed = removed.len(), max_size, "trimmed clip history");
        }
        Ok(removed.len())
    }

    /// Delete every clip and every referenced file
    pub fn clear_all(&self) -> Result<usize, ShelfError> {
        let removed = self.db.clear_clips()?;
        for record in &removed {
            remove_files(record);
        }
        info!(removed = removed.len(), "cleared clip history");
        Ok(removed.len())
    }

    pub fn delete(&self, hash: &str) -> Result<bool, ShelfError> {
        match self.db.delete_clip(hash)? {
            Some(record) => {
                remove_files(&record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load a clip's payload. Missing rows, missing files and undecodable
    /// payloads are all misses.
    pub fn read(&self, hash: &str) -> Option<ClipData> {
        let record = match self.db.find_clip(hash) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(hash, error = %e, "clip lookup failed");
                return None;
            }
        };
        read_payload(Path::new(&record.data_path))
    }

    pub fn list(&self, order: HistoryOrder, limit: Option<usize>) -> Result<Vec<ClipRecord>, ShelfError> {
        Ok(self.db.fetch_clips(order, limit)?)
    }

    /// Refresh a clip's update time to now (reorder after paste)
    pub fn touch(&self, hash: &str) -> Result<bool, ShelfError> {
        Ok(self.db.update_clip_time(hash, self.env.clock.now_unix())?)
    }
}

/// Random key for copies that must not collapse onto an existing record
fn synthetic_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn write_payload(path: &PathBuf, data: &ClipData) -> Result<(), ShelfError> {
    let bytes = data
        .encode_payload()
        .map_err(|e| ShelfError::StorageError(e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ShelfError::StorageError(e.to_string()))?;
    }
    fs::write(path, bytes).map_err(|e| ShelfError::StorageError(e.to_string()))
}

pub(crate) fn read_payload(path: &Path) -> Option<ClipData> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "clip payload missing");
            return None;
        }
    };
    match ClipData::decode_payload(&bytes) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "clip payload undecodable");
            None
        }
    }
}

fn remove_files(record: &ClipRecord) {
    remove_file(Path::new(&record.data_path));
    if let Some(thumb) = record.thumbnail_path.as_deref() {
        remove_file(Path::new(thumb));
    }
}

fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove clip file");
        }
    }
}
