//! # coursegrid-render
//!
//! Output side of the training report pipeline.
//!
//! This crate provides:
//! - `ExcelRenderer`: the report grid as a single XLSX worksheet
//! - `publish_report`: render → temporary file → upload → signed URL
//! - `ArchiveBundler`: certificates under `<year>/<quarter>/` as one zip
//!
//! ## Example
//!
//! ```rust,ignore
//! use coursegrid_render::{publish_report, ExcelRenderer, DEFAULT_URL_TTL};
//!
//! let renderer = ExcelRenderer::new().labels(labels.clone());
//! let artifact = publish_report(&report, &renderer, &objects, Utc::now(), DEFAULT_URL_TTL)?;
//! println!("{}", artifact.url);
//! ```

pub mod archive;
pub mod excel;
pub mod publish;

pub use archive::{archive_path, ArchiveBundler, ArchiveRequest, ZIP_CONTENT_TYPE};
pub use excel::{ExcelRenderer, XLSX_CONTENT_TYPE};
pub use publish::{publish_report, report_path, PublishedArtifact, DEFAULT_URL_TTL};
