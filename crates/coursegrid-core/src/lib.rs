//! # coursegrid-core
//!
//! Core domain model and traits for coursegrid training reports.
//!
//! This crate provides:
//! - Domain types: `CompletionRecord`, `Course`, `EmployeeIdentity`
//! - Grid types shared by the builder and the sinks: `Report`, `HeaderLayout`, `ReportRow`
//! - Collaborator traits: `DocumentStore`, `ObjectStore`, `IdentityResolver`
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use coursegrid_core::{ColumnKey, ColumnMode, Course};
//!
//! let course = Course::new("C1").name("Safety").unit("HR").quarter("2");
//! let keys = ColumnMode::WithDate.keys_for(&course.id);
//! assert_eq!(keys, vec![ColumnKey::Status("C1".into()), ColumnKey::Date("C1".into())]);
//! ```

pub mod grid;
pub mod labels;
pub mod timestamp;

pub use grid::{CellValue, Column, ColumnKey, ColumnMode, HeaderLayout, MergeRange, Report, ReportRow};
pub use labels::{Labels, PeriodSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a course
pub type CourseId = String;

/// Opaque identity key carried by completion records
pub type EmployeeRef = String;

/// Secondary employee identifier (the position/slot code shown in reports)
pub type SlotCode = String;

/// Resolved identities keyed by employee reference
pub type IdentityMap = HashMap<EmployeeRef, EmployeeIdentity>;

/// Number of fixed identity columns ahead of the course columns
pub const LEADING_COLUMNS: u16 = 2;

// ============================================================================
// Records
// ============================================================================

/// Training completions of one employee
///
/// `completion_dates[i]` belongs to `completed_course_ids[i]`. The dates
/// array may be shorter than the ids array; missing entries mean the date
/// is unknown.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    #[serde(default, alias = "empleadoRef")]
    pub employee_ref: EmployeeRef,
    #[serde(default, alias = "cursosCompletados")]
    pub completed_course_ids: Vec<CourseId>,
    #[serde(default, alias = "fechasCompletado")]
    pub completion_dates: Vec<Value>,
}

impl CompletionRecord {
    pub fn new(employee_ref: impl Into<String>) -> Self {
        Self {
            employee_ref: employee_ref.into(),
            ..Self::default()
        }
    }

    /// Add a completed course with a stored timestamp
    pub fn completed(mut self, course_id: impl Into<String>, date: Value) -> Self {
        self.completed_course_ids.push(course_id.into());
        self.completion_dates.push(date);
        self
    }

    /// Add a completed course without a date entry
    pub fn completed_undated(mut self, course_id: impl Into<String>) -> Self {
        self.completed_course_ids.push(course_id.into());
        self
    }

    /// Append another record's completions, keeping ids and dates aligned
    pub fn merge(&mut self, other: CompletionRecord) {
        self.completion_dates
            .resize(self.completed_course_ids.len(), Value::Null);
        self.completed_course_ids.extend(other.completed_course_ids);
        self.completion_dates.extend(other.completion_dates);
    }

    /// Completion lookup by course id.
    ///
    /// Outer `None` means the course was not completed; inner `None` means it
    /// was completed but the aligned date is missing or unparseable. When a
    /// course id appears twice, the first occurrence wins.
    pub fn completions(&self) -> HashMap<&str, Option<NaiveDate>> {
        let mut map = HashMap::with_capacity(self.completed_course_ids.len());
        for (idx, course_id) in self.completed_course_ids.iter().enumerate() {
            map.entry(course_id.as_str()).or_insert_with(|| {
                self.completion_dates
                    .get(idx)
                    .and_then(timestamp::parse_date)
            });
        }
        map
    }
}

/// A catalog course
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: CourseId,
    #[serde(default, alias = "nombre", deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, alias = "area", deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, alias = "trimestre", deserialize_with = "lenient_string")]
    pub quarter: Option<String>,
}

impl Course {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn quarter(mut self, quarter: impl Into<String>) -> Self {
        self.quarter = Some(quarter.into());
        self
    }

    /// Decode a catalog document; the document id fills in a missing `id` field
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut course: Course = serde_json::from_value(doc.data.clone())?;
        if course.id.is_empty() {
            course.id = doc.id.clone();
        }
        Ok(course)
    }

    /// Display label, synthesized from the id when no name is stored
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Curso {}", self.id),
        }
    }
}

/// Accept strings and numbers (quarters are often stored as `2`), treat blanks as absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Result of the two chained identity lookups for one employee
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmployeeIdentity {
    /// `employeeRef → slotCode`, `None` when the employee or its slot is missing
    pub slot_code: Option<SlotCode>,
    /// `slotCode → displayName`, `None` when either lookup missed
    pub display_name: Option<String>,
}

impl EmployeeIdentity {
    pub fn resolved(slot_code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            slot_code: Some(slot_code.into()),
            display_name: Some(display_name.into()),
        }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Leading cells for a report row: slot code, display name
    pub fn leading_cells(&self) -> [CellValue; 2] {
        let slot = match &self.slot_code {
            Some(code) => CellValue::Text(code.clone()),
            None => CellValue::Unresolved(IdentityMiss::SlotUnassigned),
        };
        let name = match &self.display_name {
            Some(name) => CellValue::Text(name.clone()),
            None => CellValue::Unresolved(IdentityMiss::NameNotFound),
        };
        [slot, name]
    }
}

/// Identity lookup that missed; recovered locally as sentinel text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMiss {
    /// No employee document, or the employee has no slot code
    SlotUnassigned,
    /// No slot document, or the slot has no display name
    NameNotFound,
}

// ============================================================================
// Documents
// ============================================================================

/// A stored document: its id plus the raw JSON body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), data }
    }

    /// Field lookup; `"id"` falls back to the document id
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.data.get(name) {
            Some(value) => Some(value.clone()),
            None if name == "id" => Some(Value::String(self.id.clone())),
            None => None,
        }
    }

    /// String field, ignoring blanks
    pub fn str_field(&self, name: &str) -> Option<String> {
        match self.data.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Query filter understood by every document store
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field IN values`
    In { field: String, values: Vec<Value> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.field(field).as_ref() == Some(value),
            Filter::In { field, values } => doc
                .field(field)
                .map(|v| values.contains(&v))
                .unwrap_or(false),
        }
    }
}

/// Time-limited retrieval handle for a stored object
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Traits
// ============================================================================

/// Read access to the document store
///
/// Missing documents and collections are `Ok(None)` / empty, never errors.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

/// Binary object storage
pub trait ObjectStore: Send + Sync {
    /// Copy a local file to `remote_path`
    fn upload(&self, local_path: &Path, remote_path: &str, content_type: &str) -> Result<(), StoreError>;

    /// Issue a read URL valid for `ttl`
    fn signed_url(&self, remote_path: &str, ttl: std::time::Duration) -> Result<SignedUrl, StoreError>;

    /// Stored paths starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Stream an object's contents
    fn open(&self, remote_path: &str) -> Result<Box<dyn Read + Send>, StoreError>;
}

/// Batch identity resolution (`employeeRef → slotCode → displayName`)
///
/// Implementations may parallelize internally. Lookup misses are encoded in
/// `EmployeeIdentity`; only store failures are errors. Every requested
/// reference must be present in the returned map.
pub trait IdentityResolver: Send + Sync {
    fn resolve_batch(&self, refs: &[EmployeeRef]) -> Result<IdentityMap, ReportError>;
}

/// Report serialization
pub trait ReportRenderer {
    /// Serialize a finished grid
    fn render(&self, report: &Report) -> Result<Vec<u8>, ReportError>;

    /// MIME type of the rendered artifact
    fn content_type(&self) -> &'static str;

    /// File extension, without the dot
    fn extension(&self) -> &'static str;
}

// ============================================================================
// Errors
// ============================================================================

/// Storage error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed collection {collection}: {source}")]
    Malformed {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Report generation error
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("No matching records: {0}")]
    NoMatchingRecords(String),

    #[error("Data unavailable while reading {collection}: {source}")]
    DataUnavailable {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Upload of {remote_path} failed: {source}")]
    Upload {
        remote_path: String,
        #[source]
        source: StoreError,
    },
}

impl ReportError {
    pub fn data_unavailable(collection: &str, source: StoreError) -> Self {
        ReportError::DataUnavailable {
            collection: collection.to_string(),
            source,
        }
    }

    /// HTTP status for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            ReportError::MissingParameter(_) => 400,
            ReportError::NoMatchingRecords(_) => 404,
            ReportError::DataUnavailable { .. }
            | ReportError::Serialization(_)
            | ReportError::Upload { .. } => 500,
        }
    }

    /// Pipeline stage that failed, for logs
    pub fn stage(&self) -> &'static str {
        match self {
            ReportError::MissingParameter(_) => "validate",
            ReportError::NoMatchingRecords(_) => "fetch",
            ReportError::DataUnavailable { .. } => "fetch",
            ReportError::Serialization(_) => "serialize",
            ReportError::Upload { .. } => "upload",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

// ============================================================================
// Tests
// ============================================================================
