//! File-backed resolution cache
//!
//! One JSON document per artifact path, named by the SHA-256 of the path.
//! Records are written through a temporary file and renamed into place, so a
//! concurrent reader sees either the old file, the new file, or no file.

use super::record::{checksum_target, record_file_name, ResolutionRecord};
use crate::error::{RepoProbeError, RepoProbeResult};
use crate::upstream::{fetch_checksum, Discovery, Upstream};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Persistent map from artifact path to [`ResolutionRecord`]
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    dir: PathBuf,
}

impl ResolutionCache {
    /// Open (creating if needed) a cache rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> RepoProbeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            RepoProbeError::io(format!("creating cache directory {}", dir.display()), e)
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the record files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, path: &str) -> PathBuf {
        self.dir.join(record_file_name(path))
    }

    /// Load the record for `path`, if one exists
    pub fn get(&self, path: &str) -> RepoProbeResult<Option<ResolutionRecord>> {
        let file = self.record_path(path);
        let content = match fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RepoProbeError::io(
                    format!("reading cache record {}", file.display()),
                    e,
                ))
            }
        };

        debug!("Loading cache record {}", file.display());
        let record = serde_json::from_str(&content).map_err(|e| RepoProbeError::RecordCorrupt {
            path: file,
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    /// Resolved URL of a positive record
    pub fn get_url(&self, path: &str) -> RepoProbeResult<Option<String>> {
        Ok(self
            .get(path)?
            .filter(|r| r.found && !r.resolved_url.is_empty())
            .map(|r| r.resolved_url))
    }

    /// Captured headers of a record
    pub fn get_headers(&self, path: &str) -> RepoProbeResult<Option<BTreeMap<String, String>>> {
        Ok(self.get(path)?.map(|r| r.headers))
    }

    /// Stored checksum for a `.sha1` path.
    ///
    /// `None` for non-checksum paths and for bases without a positive record.
    pub fn get_checksum(&self, path: &str) -> RepoProbeResult<Option<String>> {
        let Some(target) = checksum_target(path) else {
            return Ok(None);
        };
        debug!("Looking up checksum for {}", path);
        Ok(self
            .get(target)?
            .filter(|r| r.found)
            .map(|r| r.checksum))
    }

    /// Cache a successful discovery of `path`.
    ///
    /// Fetches the checksum sibling first; if that fails nothing is written
    /// and the error is returned.
    pub fn add(
        &self,
        path: &str,
        discovery: &Discovery,
        upstream: &dyn Upstream,
    ) -> RepoProbeResult<ResolutionRecord> {
        if !discovery.is_ok() {
            return Err(RepoProbeError::Internal(format!(
                "refusing to cache {} from a {} response",
                path, discovery.status
            )));
        }

        let checksum = fetch_checksum(upstream, &discovery.url)?;
        let record = ResolutionRecord::found(
            path,
            discovery.url.clone(),
            checksum,
            discovery.headers.clone(),
        );

        let file = self.record_path(path);
        if !self.write_new(&record, &file)? {
            // Another writer got there first; its record stands
            debug!("cache record for {} already exists", path);
            return Ok(self.get(path)?.unwrap_or(record));
        }
        info!("Cached resolution at {}", file.display());
        Ok(record)
    }

    /// Write a negative record unless any record already exists.
    ///
    /// Returns whether a record was written.
    pub fn mark_lost(&self, path: &str) -> RepoProbeResult<bool> {
        let file = self.record_path(path);
        if file.exists() {
            return Ok(false);
        }

        let written = self.write_new(&ResolutionRecord::lost(path), &file)?;
        if written {
            info!("Marked {} as absent", path);
        }
        Ok(written)
    }

    /// Every readable record in the cache, sorted by target
    pub fn list(&self) -> RepoProbeResult<Vec<ResolutionRecord>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            RepoProbeError::io(format!("reading cache directory {}", self.dir.display()), e)
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RepoProbeError::io("reading cache entry", e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with('.') && name.ends_with(".json")) {
                continue;
            }

            let parsed = fs::read_to_string(entry.path())
                .map_err(|e| e.to_string())
                .and_then(|c| {
                    serde_json::from_str::<ResolutionRecord>(&c).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable cache record {}: {}", name, e),
            }
        }

        records.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(records)
    }

    /// Serialize `record` to a temp file and move it to `file`.
    ///
    /// An existing file is left untouched and `Ok(false)` is returned.
    fn write_new(&self, record: &ResolutionRecord, file: &Path) -> RepoProbeResult<bool> {
        let content = serde_json::to_string(record)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| RepoProbeError::io("creating temporary cache record", e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| RepoProbeError::io("writing temporary cache record", e))?;

        match tmp.persist_noclobber(file) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(RepoProbeError::io(
                format!("writing cache record {}", file.display()),
                e.error,
            )),
        }
    }
}
