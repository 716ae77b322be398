//! Report grid types
//!
//! The builder produces a [`Report`]: a [`HeaderLayout`] (three header rows,
//! merge ranges and the generated column list) plus one [`ReportRow`] per
//! employee. Sinks render it without knowing how it was derived.
//!
//! ```text
//! row 0 | Plaza | Nombre | HR ─────────────────────────── | Ops ─────── |
//! row 1 |   ↕   |   ↕    | 1 ──────────── | 2 ──────────  | 1 ───────── |
//! row 2 |   ↕   |   ↕    | Safety | Safety Fecha | Ethics | Forklift   |
//! ```

use crate::{CourseId, EmployeeRef, IdentityMiss, LEADING_COLUMNS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of header rows (unit, quarter, course)
pub const HEADER_ROWS: u32 = 3;

/// Key of one generated column
///
/// Structural rather than string-formatted, so two distinct courses can
/// never produce the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ColumnKey {
    /// Completion status of a course
    Status(CourseId),
    /// Completion date of a course (paired-column reports only)
    Date(CourseId),
}

impl ColumnKey {
    pub fn course_id(&self) -> &str {
        match self {
            ColumnKey::Status(id) | ColumnKey::Date(id) => id,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, ColumnKey::Date(_))
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Status(id) => write!(f, "status:{id}"),
            ColumnKey::Date(id) => write!(f, "date:{id}"),
        }
    }
}

/// How many columns each course contributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnMode {
    /// One column per course: checkmark or completion date
    #[default]
    Single,
    /// Status column followed by a completion date column
    WithDate,
}

impl ColumnMode {
    pub fn width_per_course(self) -> u16 {
        match self {
            ColumnMode::Single => 1,
            ColumnMode::WithDate => 2,
        }
    }

    /// Column keys generated for one course, in column order
    pub fn keys_for(self, course_id: &str) -> Vec<ColumnKey> {
        match self {
            ColumnMode::Single => vec![ColumnKey::Status(course_id.to_string())],
            ColumnMode::WithDate => vec![
                ColumnKey::Status(course_id.to_string()),
                ColumnKey::Date(course_id.to_string()),
            ],
        }
    }
}

impl fmt::Display for ColumnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnMode::Single => write!(f, "single"),
            ColumnMode::WithDate => write!(f, "with-date"),
        }
    }
}

impl std::str::FromStr for ColumnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ColumnMode::Single),
            "with-date" | "paired" => Ok(ColumnMode::WithDate),
            other => Err(format!("unknown column mode '{other}' (expected single or with-date)")),
        }
    }
}

/// A generated course column
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: ColumnKey,
    /// Absolute 0-based sheet column
    pub index: u16,
    /// Leaf header label (header row 2)
    pub label: String,
}

/// Inclusive cell range rendered as one merged cell
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
    pub label: String,
}

impl MergeRange {
    /// Horizontal span on a single row
    pub fn horizontal(row: u32, first_col: u16, last_col: u16, label: impl Into<String>) -> Self {
        Self {
            first_row: row,
            first_col,
            last_row: row,
            last_col,
            label: label.into(),
        }
    }

    /// Vertical span across all header rows
    pub fn vertical(col: u16, label: impl Into<String>) -> Self {
        Self {
            first_row: 0,
            first_col: col,
            last_row: HEADER_ROWS - 1,
            last_col: col,
            label: label.into(),
        }
    }

    pub fn width(&self) -> u16 {
        self.last_col - self.first_col + 1
    }

    pub fn height(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    /// One-cell ranges are written as plain cells
    pub fn is_single_cell(&self) -> bool {
        self.width() == 1 && self.height() == 1
    }
}

/// Three aligned header rows plus the merges that unify repeated labels
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HeaderLayout {
    /// Unit, quarter and course rows; each has exactly `width()` entries
    pub rows: [Vec<String>; 3],
    pub merges: Vec<MergeRange>,
    pub columns: Vec<Column>,
}

impl HeaderLayout {
    /// Total sheet columns including the leading identity columns
    pub fn width(&self) -> usize {
        LEADING_COLUMNS as usize + self.columns.len()
    }

    pub fn column_keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.columns.iter().map(|c| &c.key)
    }

    pub fn column_index(&self, key: &ColumnKey) -> Option<u16> {
        self.columns.iter().find(|c| &c.key == key).map(|c| c.index)
    }
}

/// One rendered cell outcome
///
/// Sinks turn these into display text through `Labels::render_cell`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CellValue {
    /// Resolved identity text
    Text(String),
    /// Identity lookup missed
    Unresolved(IdentityMiss),
    /// Completed, date unknown (or date shown in a paired column)
    Completed,
    /// Completed on a known date
    CompletedOn(NaiveDate),
    NotCompleted,
}

/// One employee row: leading identity cells then one cell per column
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub employee_ref: EmployeeRef,
    pub cells: Vec<CellValue>,
}

/// Complete report grid
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub header: HeaderLayout,
    pub rows: Vec<ReportRow>,
    pub mode: ColumnMode,
    /// Quarter filter the report was generated for
    pub quarter: Option<String>,
}

impl Report {
    /// True when every row has exactly one cell per header column
    pub fn is_rectangular(&self) -> bool {
        let width = self.header.width();
        self.header.rows.iter().all(|r| r.len() == width)
            && self.rows.iter().all(|r| r.cells.len() == width)
    }
}
