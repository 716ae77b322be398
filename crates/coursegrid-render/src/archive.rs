//! Certificate archive bundler
//!
//! Collects every stored file under `<year>/<quarter>/` into one deflate
//! archive, uploads it under `zips/` and returns a time-limited URL. Entries
//! keep their full stored path as the entry name. File contents are streamed
//! into the archive; nothing is held in memory whole.

use crate::publish::{sanitize, temp_file, upload_and_sign, PublishedArtifact, DEFAULT_URL_TTL};
use chrono::{DateTime, Datelike, Utc};
use coursegrid_core::{ObjectStore, ReportError};
use std::io::{self, Seek, Write};
use std::time::Duration;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Maximum deflate level
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 9;

/// Which certificates to bundle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub quarter: String,
    pub year: i32,
}

impl ArchiveRequest {
    /// Validate a request; the year defaults to the year of `now`
    pub fn new(quarter: Option<&str>, year: Option<i32>, now: DateTime<Utc>) -> Result<Self, ReportError> {
        match quarter.map(str::trim) {
            Some(q) if !q.is_empty() => Ok(Self {
                quarter: q.to_string(),
                year: year.unwrap_or_else(|| now.year()),
            }),
            _ => Err(ReportError::MissingParameter("trimestre")),
        }
    }

    /// Stored-object prefix holding this quarter's certificates
    pub fn source_prefix(&self) -> String {
        format!("{}/{}/", self.year, self.quarter)
    }
}

/// Storage path for an archive built at `generated_at`
pub fn archive_path(quarter: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "zips/constancias_{}_{}.zip",
        sanitize(quarter),
        generated_at.timestamp_millis()
    )
}

/// Builds and publishes certificate archives
pub struct ArchiveBundler<'a> {
    store: &'a dyn ObjectStore,
    compression_level: i64,
    ttl: Duration,
}

impl<'a> ArchiveBundler<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            ttl: DEFAULT_URL_TTL,
        }
    }

    /// Deflate level, clamped to 0..=9
    pub fn compression_level(mut self, level: i64) -> Self {
        self.compression_level = level.clamp(0, 9);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bundle, upload and sign
    ///
    /// An empty prefix is `NoMatchingRecords` and uploads nothing.
    pub fn bundle(
        &self,
        request: &ArchiveRequest,
        generated_at: DateTime<Utc>,
    ) -> Result<PublishedArtifact, ReportError> {
        let prefix = request.source_prefix();
        let files = self
            .store
            .list(&prefix)
            .map_err(|e| ReportError::data_unavailable(&prefix, e))?;
        if files.is_empty() {
            return Err(ReportError::NoMatchingRecords(format!("no files under {prefix}")));
        }
        debug!(prefix = %prefix, files = files.len(), "bundling certificates");

        let mut file = temp_file()?;
        self.write_archive(&files, file.as_file_mut())?;

        let remote_path = archive_path(&request.quarter, generated_at);
        let artifact = upload_and_sign(self.store, file, &remote_path, ZIP_CONTENT_TYPE, self.ttl)?;
        info!(
            remote_path = %artifact.remote_path,
            entries = files.len(),
            "published certificate archive"
        );
        Ok(artifact)
    }

    /// Stream `files` from the store into a zip written to `sink`
    pub fn write_archive<W: Write + Seek>(&self, files: &[String], sink: W) -> Result<W, ReportError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.compression_level))
            .large_file(true);

        let mut zip = ZipWriter::new(sink);
        for path in files {
            let mut reader = self
                .store
                .open(path)
                .map_err(|e| ReportError::data_unavailable(path, e))?;
            zip.start_file(path.as_str(), options).map_err(zip_err)?;
            io::copy(&mut reader, &mut zip)
                .map_err(|e| ReportError::Serialization(format!("archiving {path}: {e}")))?;
        }
        zip.finish().map_err(zip_err)
    }
}

fn zip_err(e: zip::result::ZipError) -> ReportError {
    ReportError::Serialization(e.to_string())
}
