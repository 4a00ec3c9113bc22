use crate::ampscript::{normalize_href, normalize_image};
use crate::config::{Config, LinkRules};
use crate::record::{BannerRecord, IdGenerator, MirrorRecord, NewBanner};
use chrono::Utc;
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::fs;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing required field: {0}")]
    Validation(&'static str),
    #[error("sync source not found: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("sync source is not a list")]
    MalformedSource,
    #[error("store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization failure: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// HTTP status the REST surface reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            StoreError::Validation(_) | StoreError::MalformedSource => 400,
            StoreError::SourceMissing(_) => 404,
            StoreError::Io(_) | StoreError::Json(_) => 500,
        }
    }
}

/// Flat-file JSON store for banner records, with a minimal-schema mirror
/// written alongside every write for downstream consumption.
pub struct Store {
    data_file: PathBuf,
    mirror_file: PathBuf,
    rules: LinkRules,
    ids: Mutex<IdGenerator>,
}

impl Store {
    pub fn new(config: &Config) -> Self {
        Self {
            data_file: PathBuf::from(&config.data_file),
            mirror_file: PathBuf::from(&config.mirror_file),
            rules: config.link_rules(),
            ids: Mutex::new(IdGenerator::new()),
        }
    }

    pub fn rules(&self) -> &LinkRules {
        &self.rules
    }

    /// Read every record, creating an empty store on first use. Records from
    /// older files that lack an id or timestamp are normalized and the
    /// normalized list is written back. A corrupt data file degrades to an
    /// empty list rather than failing every caller.
    pub fn read_all(&self) -> Result<Vec<BannerRecord>, StoreError> {
        if !self.data_file.exists() {
            self.write_all(&[])?;
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.data_file)?;
        let records: Vec<BannerRecord> = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                eprintln!(
                    "{}",
                    format!(
                        "Warning: {} is not valid JSON ({}), starting from an empty list",
                        self.data_file.display(),
                        e
                    )
                    .yellow()
                );
                Vec::new()
            }
        };

        let (records, changed) = self.normalize_list(records);
        if changed {
            self.write_all(&records)?;
        }
        Ok(records)
    }

    /// Validate, normalize, and persist a new record.
    pub fn append(&self, new: NewBanner) -> Result<BannerRecord, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Validation("name"));
        }
        if new.image_src.trim().is_empty() {
            return Err(StoreError::Validation("imageSrc"));
        }

        let id = self.next_id();
        let mut record = new.into_record(id, Utc::now());
        record.href = normalize_href(&record.href, &self.rules);
        record.image_src = normalize_image(&record.image_src, &self.rules);

        let mut records = self.read_all()?;
        records.push(record.clone());
        self.write_all(&records)?;
        Ok(record)
    }

    /// Replace the whole list. Missing ids and timestamps are filled before
    /// writing; the returned list is exactly what was persisted.
    pub fn replace_all(
        &self,
        records: Vec<BannerRecord>,
    ) -> Result<Vec<BannerRecord>, StoreError> {
        let (records, _) = self.normalize_list(records);
        self.write_all(&records)?;
        Ok(records)
    }

    /// Re-import the store from the minimal-schema mirror file.
    pub fn sync_from_mirror(&self) -> Result<usize, StoreError> {
        if !self.mirror_file.exists() {
            return Err(StoreError::SourceMissing(self.mirror_file.clone()));
        }
        let content = fs::read_to_string(&self.mirror_file)?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|_| StoreError::MalformedSource)?;
        if !value.is_array() {
            return Err(StoreError::MalformedSource);
        }
        let minimal: Vec<MirrorRecord> =
            serde_json::from_value(value).map_err(|_| StoreError::MalformedSource)?;

        let now = Utc::now();
        // rows without the required fields never reach the store
        let records: Vec<BannerRecord> = minimal
            .into_iter()
            .filter(|m| !m.name.trim().is_empty() && !m.image_src.trim().is_empty())
            .map(|m| {
                NewBanner {
                    name: m.name,
                    href: m.href,
                    image_src: m.image_src,
                    alt: m.alt,
                    ..NewBanner::default()
                }
                .into_record(self.next_id(), now)
            })
            .collect();

        let count = records.len();
        self.write_all(&records)?;
        Ok(count)
    }

    fn next_id(&self) -> u64 {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_id()
    }

    fn normalize_list(&self, records: Vec<BannerRecord>) -> (Vec<BannerRecord>, bool) {
        let mut changed = false;
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.id == 0 {
                    record.id = self.next_id();
                    changed = true;
                }
                if record.created_at.is_none() {
                    record.created_at = Some(Utc::now());
                    changed = true;
                }
                record
            })
            .collect();
        (records, changed)
    }

    /// Write the primary file and the minimal mirror, each atomically via a
    /// temp file in the target directory followed by a rename, so readers
    /// never observe a partially written list.
    fn write_all(&self, records: &[BannerRecord]) -> Result<(), StoreError> {
        write_json_atomic(&self.data_file, &records)?;
        let mirror: Vec<MirrorRecord> = records.iter().map(MirrorRecord::from).collect();
        write_json_atomic(&self.mirror_file, &mirror)?;
        Ok(())
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let tmp = NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(tmp.as_file(), value)?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
