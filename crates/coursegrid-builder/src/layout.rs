//! Header Layout Engine
//!
//! Walks a [`Grouping`] once and emits the three header rows, the merge
//! ranges and the generated column list.
//!
//! # Column bookkeeping
//!
//! `last` is the index of the last column written so far. It starts on the
//! final leading identity column and only ever moves forward:
//!
//! - a unit or quarter starts at `last + 1` on entry
//! - it ends at `last` once all of its courses are written
//! - a group with `last < first` owned no columns and gets no merge
//!
//! Merge ranges are read straight off `last`; nothing recomputes them.

use crate::hierarchy::Grouping;
use coursegrid_core::{
    Column, ColumnMode, HeaderLayout, Labels, MergeRange, ReportError, LEADING_COLUMNS,
};

/// Largest sheet width a workbook accepts
pub const MAX_COLUMNS: usize = 16_384;

/// Build the header for `grouping`
pub fn build_header(
    grouping: &Grouping,
    mode: ColumnMode,
    labels: &Labels,
) -> Result<HeaderLayout, ReportError> {
    let width = LEADING_COLUMNS as usize + grouping.width(mode);
    if width > MAX_COLUMNS {
        return Err(ReportError::Serialization(format!(
            "report needs {width} columns, the sheet limit is {MAX_COLUMNS}"
        )));
    }

    let mut rows: [Vec<String>; 3] = std::array::from_fn(|_| vec![String::new(); width]);
    let mut merges = Vec::new();
    let mut columns = Vec::with_capacity(width - LEADING_COLUMNS as usize);

    // Leading identity columns span all header rows
    for (col, label) in [(0u16, &labels.slot_header), (1u16, &labels.name_header)] {
        rows[0][col as usize] = label.clone();
        merges.push(MergeRange::vertical(col, label.clone()));
    }

    let mut last: u16 = LEADING_COLUMNS - 1;
    for unit in grouping.units() {
        let unit_first = last + 1;

        for quarter in &unit.quarters {
            let quarter_first = last + 1;

            for course in &quarter.courses {
                for key in mode.keys_for(&course.id) {
                    last += 1;
                    let label = if key.is_date() {
                        labels.date_header(&course.name)
                    } else {
                        course.name.clone()
                    };
                    rows[2][last as usize] = label.clone();
                    columns.push(Column {
                        key,
                        index: last,
                        label,
                    });
                }
            }

            if last >= quarter_first {
                let header = labels.quarter_header(&quarter.quarter);
                rows[1][quarter_first as usize] = header.clone();
                merges.push(MergeRange::horizontal(1, quarter_first, last, header));
            }
        }

        if last >= unit_first {
            rows[0][unit_first as usize] = unit.unit.clone();
            merges.push(MergeRange::horizontal(0, unit_first, last, unit.unit.clone()));
        }
    }

    Ok(HeaderLayout {
        rows,
        merges,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegrid_core::{ColumnKey, Course, PeriodSet};
    use pretty_assertions::assert_eq;

    fn grouping(courses: &[Course]) -> Grouping {
        Grouping::build(courses, &PeriodSet::default(), &Labels::default())
    }

    fn catalog() -> Vec<Course> {
        vec![
            Course::new("C1").name("Safety").unit("HR").quarter("2"),
            Course::new("C2").name("Forklift").unit("Ops").quarter("1"),
            Course::new("C3").name("Ethics").unit("HR").quarter("1"),
            Course::new("C4").name("Onboarding").unit("HR").quarter("2"),
        ]
    }

    fn spans(layout: &HeaderLayout, row: u32) -> Vec<(String, u16, u16)> {
        layout
            .merges
            .iter()
            .filter(|m| m.first_row == row && m.last_row == row)
            .map(|m| (m.label.clone(), m.first_col, m.last_col))
            .collect()
    }

    #[test]
    fn single_mode_layout() {
        let layout = build_header(&grouping(&catalog()), ColumnMode::Single, &Labels::default()).unwrap();

        assert_eq!(
            layout.rows[0],
            vec!["Plaza", "Nombre", "HR", "", "", "Ops"]
        );
        assert_eq!(
            layout.rows[1],
            vec!["", "", "Trimestre 1", "Trimestre 2", "", "Trimestre 1"]
        );
        assert_eq!(
            layout.rows[2],
            vec!["", "", "Ethics", "Safety", "Onboarding", "Forklift"]
        );
        assert_eq!(
            spans(&layout, 0),
            vec![("HR".to_string(), 2, 4), ("Ops".to_string(), 5, 5)]
        );
        assert_eq!(
            spans(&layout, 1),
            vec![
                ("Trimestre 1".to_string(), 2, 2),
                ("Trimestre 2".to_string(), 3, 4),
                ("Trimestre 1".to_string(), 5, 5),
            ]
        );
    }

    #[test]
    fn paired_mode_layout() {
        let courses = vec![Course::new("C1").name("Safety").unit("HR").quarter("2")];
        let layout = build_header(&grouping(&courses), ColumnMode::WithDate, &Labels::default()).unwrap();

        assert_eq!(layout.rows[2], vec!["", "", "Safety", "Safety Fecha"]);
        assert_eq!(spans(&layout, 0), vec![("HR".to_string(), 2, 3)]);
        assert_eq!(
            layout.columns.iter().map(|c| (c.key.clone(), c.index)).collect::<Vec<_>>(),
            vec![
                (ColumnKey::Status("C1".into()), 2),
                (ColumnKey::Date("C1".into()), 3)
            ]
        );
    }

    #[test]
    fn leading_columns_merge_vertically() {
        let layout = build_header(&grouping(&catalog()), ColumnMode::Single, &Labels::default()).unwrap();
        let vertical: Vec<_> = layout.merges.iter().filter(|m| m.height() == 3).collect();
        assert_eq!(vertical.len(), 2);
        assert_eq!((vertical[0].first_col, vertical[0].label.as_str()), (0, "Plaza"));
        assert_eq!((vertical[1].first_col, vertical[1].label.as_str()), (1, "Nombre"));
        assert!(vertical.iter().all(|m| m.width() == 1));
    }

    #[test]
    fn unit_merge_spans_min_to_max_course_column() {
        for mode in [ColumnMode::Single, ColumnMode::WithDate] {
            let g = grouping(&catalog());
            let layout = build_header(&g, mode, &Labels::default()).unwrap();
            for unit in g.units() {
                let ids: Vec<&str> = unit.courses().map(|c| c.id.as_str()).collect();
                let indexes: Vec<u16> = layout
                    .columns
                    .iter()
                    .filter(|c| ids.contains(&c.key.course_id()))
                    .map(|c| c.index)
                    .collect();
                let merge = layout
                    .merges
                    .iter()
                    .find(|m| m.first_row == 0 && m.label == unit.unit)
                    .unwrap();
                assert_eq!(merge.first_col, *indexes.iter().min().unwrap());
                assert_eq!(merge.last_col, *indexes.iter().max().unwrap());
                assert!(merge.width() >= 1);
            }
        }
    }

    #[test]
    fn empty_quarters_emit_no_merges() {
        let layout = build_header(&grouping(&catalog()), ColumnMode::WithDate, &Labels::default()).unwrap();
        assert!(layout.merges.iter().all(|m| m.last_col >= m.first_col));
        // leading, quarter (HR/1, HR/2, Ops/1), unit (HR, Ops)
        assert_eq!(layout.merges.len(), 2 + 3 + 2);
    }

    #[test]
    fn columns_are_contiguous_after_leading_block() {
        let layout = build_header(&grouping(&catalog()), ColumnMode::WithDate, &Labels::default()).unwrap();
        let indexes: Vec<u16> = layout.columns.iter().map(|c| c.index).collect();
        let expected: Vec<u16> = (LEADING_COLUMNS..LEADING_COLUMNS + 8).collect();
        assert_eq!(indexes, expected);
        assert!(layout.rows.iter().all(|r| r.len() == layout.width()));
    }

    #[test]
    fn column_order_matches_grouping_keys() {
        let g = grouping(&catalog());
        let layout = build_header(&g, ColumnMode::WithDate, &Labels::default()).unwrap();
        let from_layout: Vec<ColumnKey> = layout.column_keys().cloned().collect();
        assert_eq!(from_layout, g.column_keys(ColumnMode::WithDate));
    }

    #[test]
    fn empty_grouping_keeps_leading_columns() {
        let layout = build_header(&Grouping::default(), ColumnMode::Single, &Labels::default()).unwrap();
        assert_eq!(layout.width(), 2);
        assert!(layout.columns.is_empty());
        assert_eq!(layout.merges.len(), 2);
    }

    #[test]
    fn oversized_reports_are_rejected() {
        let courses: Vec<Course> = (0..MAX_COLUMNS)
            .map(|i| Course::new(format!("C{i}")).unit("HR").quarter("1"))
            .collect();
        let err = build_header(&grouping(&courses), ColumnMode::Single, &Labels::default()).unwrap_err();
        assert!(matches!(err, ReportError::Serialization(_)));
    }
}
