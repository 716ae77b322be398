//! Artifact publishing
//!
//! Rendered bytes go to a local temporary file, the file is uploaded to the
//! object store, then a time-limited URL is issued for it. The temporary file
//! is removed whether or not the upload succeeds.

use chrono::{DateTime, Utc};
use coursegrid_core::{ObjectStore, Report, ReportError, ReportRenderer, StoreError};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default lifetime of issued URLs
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// An uploaded artifact and its retrieval handle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub remote_path: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Storage path for a report generated at `generated_at`
///
/// `reports/reporte_capacitacion_20250520_153000.xlsx`, with the quarter
/// inserted before the timestamp for quarter-scoped reports.
pub fn report_path(quarter: Option<&str>, generated_at: DateTime<Utc>, extension: &str) -> String {
    let stamp = generated_at.format("%Y%m%d_%H%M%S");
    match quarter {
        Some(q) => format!("reports/reporte_capacitacion_T{}_{stamp}.{extension}", sanitize(q)),
        None => format!("reports/reporte_capacitacion_{stamp}.{extension}"),
    }
}

/// Keep path segments to `[A-Za-z0-9_-]`
pub(crate) fn sanitize(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Render, upload and sign a report
pub fn publish_report(
    report: &Report,
    renderer: &dyn ReportRenderer,
    store: &dyn ObjectStore,
    generated_at: DateTime<Utc>,
    ttl: Duration,
) -> Result<PublishedArtifact, ReportError> {
    let bytes = renderer.render(report)?;
    let remote_path = report_path(report.quarter.as_deref(), generated_at, renderer.extension());
    debug!(remote_path = %remote_path, bytes = bytes.len(), "rendered report");

    let mut file = temp_file()?;
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|e| ReportError::Serialization(format!("writing temporary artifact: {e}")))?;

    let artifact = upload_and_sign(store, file, &remote_path, renderer.content_type(), ttl)?;
    info!(
        remote_path = %artifact.remote_path,
        rows = report.rows.len(),
        columns = report.header.columns.len(),
        "published report"
    );
    Ok(artifact)
}

pub(crate) fn temp_file() -> Result<NamedTempFile, ReportError> {
    NamedTempFile::new()
        .map_err(|e| ReportError::Serialization(format!("creating temporary artifact: {e}")))
}

/// Upload a finished temporary file and issue its URL
///
/// The temporary file is consumed and deleted on every path.
pub(crate) fn upload_and_sign(
    store: &dyn ObjectStore,
    file: NamedTempFile,
    remote_path: &str,
    content_type: &str,
    ttl: Duration,
) -> Result<PublishedArtifact, ReportError> {
    let uploaded = store.upload(file.path(), remote_path, content_type);
    discard(file);
    uploaded.map_err(|source| upload_error(remote_path, source))?;

    let signed = store
        .signed_url(remote_path, ttl)
        .map_err(|source| upload_error(remote_path, source))?;

    Ok(PublishedArtifact {
        remote_path: remote_path.to_string(),
        url: signed.url,
        expires_at: signed.expires_at,
    })
}

fn upload_error(remote_path: &str, source: StoreError) -> ReportError {
    ReportError::Upload {
        remote_path: remote_path.to_string(),
        source,
    }
}

fn discard(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!(path = %path.display(), error = %e, "failed to remove temporary artifact");
    }
}
