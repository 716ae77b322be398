//! Row Materializer
//!
//! Turns completion records into report rows. Each row is
//! `[slot, name, one cell per header column]`; cells are produced by walking
//! the header's column list, so a row can never be ragged or out of order.

use chrono::NaiveDate;
use coursegrid_core::{
    CellValue, ColumnKey, ColumnMode, CompletionRecord, EmployeeIdentity, EmployeeRef,
    HeaderLayout, IdentityMap, ReportRow,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Merge records that share an employee reference, keeping first-seen order.
/// Records without a reference are dropped.
pub fn collate(records: Vec<CompletionRecord>) -> Vec<CompletionRecord> {
    let mut out: Vec<CompletionRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<EmployeeRef, usize> = HashMap::new();

    for record in records {
        let employee_ref = record.employee_ref.trim().to_string();
        if employee_ref.is_empty() {
            warn!("completion record without employee reference, skipping");
            continue;
        }
        match index.get(&employee_ref) {
            Some(&idx) => out[idx].merge(record),
            None => {
                index.insert(employee_ref.clone(), out.len());
                out.push(CompletionRecord {
                    employee_ref,
                    ..record
                });
            }
        }
    }
    out
}

/// Build one row per record, in record order
pub fn materialize(
    records: &[CompletionRecord],
    header: &HeaderLayout,
    identities: &IdentityMap,
    mode: ColumnMode,
) -> Vec<ReportRow> {
    let unresolved = EmployeeIdentity::unresolved();
    let rows: Vec<ReportRow> = records
        .iter()
        .map(|record| {
            let identity = identities.get(&record.employee_ref).unwrap_or(&unresolved);
            let completions = record.completions();

            let mut cells = Vec::with_capacity(header.width());
            cells.extend(identity.leading_cells());
            cells.extend(
                header
                    .column_keys()
                    .map(|key| cell_for(key, completions.get(key.course_id()).copied(), mode)),
            );

            ReportRow {
                employee_ref: record.employee_ref.clone(),
                cells,
            }
        })
        .collect();

    debug!(rows = rows.len(), columns = header.width(), "materialized rows");
    rows
}

/// Cell outcome for one column of one employee.
///
/// `completion` is `None` when the course was not completed and
/// `Some(None)` when it was completed without a usable date.
pub fn cell_for(key: &ColumnKey, completion: Option<Option<NaiveDate>>, mode: ColumnMode) -> CellValue {
    match (key, completion) {
        (_, None) => CellValue::NotCompleted,
        (ColumnKey::Status(_), Some(date)) => match (mode, date) {
            (ColumnMode::Single, Some(date)) => CellValue::CompletedOn(date),
            _ => CellValue::Completed,
        },
        (ColumnKey::Date(_), Some(Some(date))) => CellValue::CompletedOn(date),
        (ColumnKey::Date(_), Some(None)) => CellValue::NotCompleted,
    }
}
