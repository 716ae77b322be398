//! XLSX training report renderer
//!
//! Writes a single worksheet laid out exactly as the report grid:
//!
//! ```text
//! | Plaza | Nombre   |            HR             |   Ops   |
//! |       |          | Trimestre 1 | Trimestre 2 | Trim. 1 |
//! |       |          | Ethics      | Safety      | Forklift|
//! |-------|----------|-------------|-------------|---------|
//! | S1    | Jane Doe | No completado | 20/05/2025 | ✅     |
//! ```
//!
//! Leading columns are merged vertically across the three header rows, units
//! and quarters horizontally. Single-cell ranges are written as plain cells:
//! XLSX rejects one-cell merges.

use coursegrid_core::grid::HEADER_ROWS;
use coursegrid_core::{
    CellValue, HeaderLayout, Labels, MergeRange, Report, ReportError, ReportRenderer, ReportRow,
    LEADING_COLUMNS,
};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::collections::HashSet;

/// MIME type of generated workbooks
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// XLSX report renderer
#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    /// Cell vocabulary; must match the labels the report was built with
    pub labels: Labels,
    pub sheet_name: String,
    /// Freeze the header rows and identity columns
    pub freeze_panes: bool,
    /// Alternate row background
    pub banding: bool,
    pub slot_width: f64,
    pub name_width: f64,
    /// Course columns are sized to their label within these bounds
    pub min_course_width: f64,
    pub max_course_width: f64,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            labels: Labels::default(),
            sheet_name: "Capacitación".into(),
            freeze_panes: true,
            banding: true,
            slot_width: 18.0,
            name_width: 34.0,
            min_course_width: 14.0,
            max_course_width: 40.0,
        }
    }
}

/// Reusable cell formats
struct ExcelFormats {
    unit_header: Format,
    quarter_header: Format,
    header: Format,
    text: [Format; 2],
    completed: [Format; 2],
    not_completed: [Format; 2],
    unresolved: [Format; 2],
}

impl ExcelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn freeze_panes(mut self, freeze: bool) -> Self {
        self.freeze_panes = freeze;
        self
    }

    pub fn banding(mut self, banding: bool) -> Self {
        self.banding = banding;
        self
    }

    /// Generate workbook bytes
    pub fn render_to_bytes(&self, report: &Report) -> Result<Vec<u8>, ReportError> {
        if !report.is_rectangular() {
            return Err(ReportError::Serialization(format!(
                "ragged grid: expected {} cells per row",
                report.header.width()
            )));
        }

        let mut workbook = Workbook::new();
        let formats = self.create_formats();

        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name).map_err(xlsx_err)?;

        self.write_header(sheet, &report.header, &formats)?;
        for (i, row) in report.rows.iter().enumerate() {
            let excel_row = u32::try_from(i)
                .ok()
                .and_then(|i| i.checked_add(HEADER_ROWS))
                .ok_or_else(|| ReportError::Serialization("too many rows for a worksheet".into()))?;
            self.write_row(sheet, excel_row, row, &formats, i % 2 == 1)?;
        }
        self.size_columns(sheet, &report.header)?;

        if self.freeze_panes {
            sheet
                .set_freeze_panes(HEADER_ROWS, LEADING_COLUMNS)
                .map_err(xlsx_err)?;
        }

        workbook.save_to_buffer().map_err(|e| {
            ReportError::Serialization(format!("Failed to create Excel: {e}"))
        })
    }

    fn create_formats(&self) -> ExcelFormats {
        let unit_header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_background_color(0x2F5597)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);

        let quarter_header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x8EA9DB)
            .set_border(FormatBorder::Thin);

        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);

        // Index 1 is the banded (odd) row variant
        let band = |format: Format, banded: bool| {
            if banded && self.banding {
                format.set_background_color(0xDDEBF7)
            } else {
                format
            }
        };
        let text = |banded| band(Format::new().set_border(FormatBorder::Thin), banded);
        let completed = |banded| {
            band(
                Format::new()
                    .set_align(FormatAlign::Center)
                    .set_font_color(0x375623)
                    .set_border(FormatBorder::Thin),
                banded,
            )
        };
        let not_completed = |banded| {
            band(
                Format::new()
                    .set_align(FormatAlign::Center)
                    .set_font_color(0x9C0006)
                    .set_border(FormatBorder::Thin),
                banded,
            )
        };
        let unresolved = |banded| {
            band(
                Format::new()
                    .set_italic()
                    .set_font_color(0x7F7F7F)
                    .set_border(FormatBorder::Thin),
                banded,
            )
        };

        ExcelFormats {
            unit_header,
            quarter_header,
            header,
            text: [text(false), text(true)],
            completed: [completed(false), completed(true)],
            not_completed: [not_completed(false), not_completed(true)],
            unresolved: [unresolved(false), unresolved(true)],
        }
    }

    fn write_header(
        &self,
        sheet: &mut Worksheet,
        header: &HeaderLayout,
        formats: &ExcelFormats,
    ) -> Result<(), ReportError> {
        let mut covered: HashSet<(u32, u16)> = HashSet::new();

        for merge in &header.merges {
            let format = header_format(merge, formats);
            if merge.is_single_cell() {
                sheet
                    .write_with_format(merge.first_row, merge.first_col, merge.label.as_str(), format)
                    .map_err(xlsx_err)?;
            } else {
                sheet
                    .merge_range(
                        merge.first_row,
                        merge.first_col,
                        merge.last_row,
                        merge.last_col,
                        &merge.label,
                        format,
                    )
                    .map_err(xlsx_err)?;
            }
            for row in merge.first_row..=merge.last_row {
                for col in merge.first_col..=merge.last_col {
                    covered.insert((row, col));
                }
            }
        }

        // Leaf labels and anything no merge claimed
        for (r, labels) in header.rows.iter().enumerate() {
            let row = r as u32;
            for (c, label) in labels.iter().enumerate() {
                let col = c as u16;
                if covered.contains(&(row, col)) {
                    continue;
                }
                let format = if row == 0 {
                    &formats.unit_header
                } else if row == 1 {
                    &formats.quarter_header
                } else {
                    &formats.header
                };
                sheet
                    .write_with_format(row, col, label.as_str(), format)
                    .map_err(xlsx_err)?;
            }
        }

        sheet.set_row_height(2, 30).map_err(xlsx_err)?;
        Ok(())
    }

    fn write_row(
        &self,
        sheet: &mut Worksheet,
        excel_row: u32,
        row: &ReportRow,
        formats: &ExcelFormats,
        banded: bool,
    ) -> Result<(), ReportError> {
        let band = usize::from(banded);
        for (c, cell) in row.cells.iter().enumerate() {
            let format = match cell {
                CellValue::Text(_) => &formats.text[band],
                CellValue::Unresolved(_) => &formats.unresolved[band],
                CellValue::Completed | CellValue::CompletedOn(_) => &formats.completed[band],
                CellValue::NotCompleted => &formats.not_completed[band],
            };
            let text = self.labels.render_cell(cell);
            sheet
                .write_with_format(excel_row, c as u16, text.as_str(), format)
                .map_err(xlsx_err)?;
        }
        Ok(())
    }

    fn size_columns(&self, sheet: &mut Worksheet, header: &HeaderLayout) -> Result<(), ReportError> {
        sheet.set_column_width(0, self.slot_width).map_err(xlsx_err)?;
        sheet.set_column_width(1, self.name_width).map_err(xlsx_err)?;

        for column in &header.columns {
            let chars = column.label.chars().count() as f64 + 2.0;
            let width = chars.clamp(self.min_course_width, self.max_course_width);
            sheet.set_column_width(column.index, width).map_err(xlsx_err)?;
        }
        Ok(())
    }

    /// Convert a 0-indexed column to its spreadsheet letters (0 → A, 26 → AA)
    pub fn col_to_letter(col: u16) -> String {
        let mut result = String::new();
        let mut n = u32::from(col);
        loop {
            result.insert(0, char::from(b'A' + (n % 26) as u8));
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        result
    }

    /// A1-style reference for a merge range, e.g. `C1:E1`
    pub fn range_ref(merge: &MergeRange) -> String {
        format!(
            "{}{}:{}{}",
            Self::col_to_letter(merge.first_col),
            merge.first_row + 1,
            Self::col_to_letter(merge.last_col),
            merge.last_row + 1
        )
    }
}

impl ReportRenderer for ExcelRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>, ReportError> {
        self.render_to_bytes(report)
    }

    fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }

    fn extension(&self) -> &'static str {
        "xlsx"
    }
}

fn header_format<'f>(merge: &MergeRange, formats: &'f ExcelFormats) -> &'f Format {
    if merge.height() > 1 {
        &formats.header
    } else if merge.first_row == 0 {
        &formats.unit_header
    } else {
        &formats.quarter_header
    }
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> ReportError {
    ReportError::Serialization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegrid_core::{ColumnKey, ColumnMode, HeaderLayout};

    fn tiny_report() -> Report {
        let header = HeaderLayout {
            rows: [
                vec!["Plaza".into(), "Nombre".into(), "HR".into()],
                vec![String::new(), String::new(), "Trimestre 2".into()],
                vec![String::new(), String::new(), "Safety".into()],
            ],
            merges: vec![
                MergeRange::vertical(0, "Plaza"),
                MergeRange::vertical(1, "Nombre"),
                MergeRange::horizontal(1, 2, 2, "Trimestre 2"),
                MergeRange::horizontal(0, 2, 2, "HR"),
            ],
            columns: vec![coursegrid_core::Column {
                key: ColumnKey::Status("C1".into()),
                index: 2,
                label: "Safety".into(),
            }],
        };
        Report {
            header,
            rows: vec![ReportRow {
                employee_ref: "E1".into(),
                cells: vec![
                    CellValue::Text("S1".into()),
                    CellValue::Text("Jane Doe".into()),
                    CellValue::Completed,
                ],
            }],
            mode: ColumnMode::Single,
            quarter: None,
        }
    }

    #[test]
    fn col_to_letter_works() {
        assert_eq!(ExcelRenderer::col_to_letter(0), "A");
        assert_eq!(ExcelRenderer::col_to_letter(25), "Z");
        assert_eq!(ExcelRenderer::col_to_letter(26), "AA");
        assert_eq!(ExcelRenderer::col_to_letter(51), "AZ");
        assert_eq!(ExcelRenderer::col_to_letter(52), "BA");
    }

    #[test]
    fn range_refs_are_one_indexed_rows() {
        assert_eq!(ExcelRenderer::range_ref(&MergeRange::vertical(1, "Nombre")), "B1:B3");
        assert_eq!(ExcelRenderer::range_ref(&MergeRange::horizontal(0, 2, 4, "HR")), "C1:E1");
    }

    #[test]
    fn single_cell_ranges_render_without_merging() {
        let bytes = ExcelRenderer::new().render_to_bytes(&tiny_report()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn ragged_reports_are_rejected() {
        let mut report = tiny_report();
        report.rows[0].cells.pop();
        let err = ExcelRenderer::new().render_to_bytes(&report).unwrap_err();
        assert!(matches!(err, ReportError::Serialization(_)));
    }

    #[test]
    fn renderer_metadata() {
        let renderer = ExcelRenderer::new().sheet_name("Reporte").banding(false);
        assert_eq!(renderer.extension(), "xlsx");
        assert_eq!(renderer.content_type(), XLSX_CONTENT_TYPE);
        assert_eq!(renderer.sheet_name, "Reporte");
    }
}
