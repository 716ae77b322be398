//! Display labels, sentinels and the closed set of period labels
//!
//! Every piece of user-facing text in a report comes from [`Labels`], so the
//! rendering policy lives in one place instead of being repeated per cell.

use crate::{CellValue, IdentityMiss};
use serde::{Deserialize, Serialize};

/// User-facing text used when rendering a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    /// Header of the slot code column
    pub slot_header: String,
    /// Header of the display name column
    pub name_header: String,
    /// Unit bucket for courses without a unit
    pub unassigned_unit: String,
    /// Quarter bucket for courses without a (valid) quarter
    pub unspecified_quarter: String,
    /// Prefix for quarter headers, e.g. "Trimestre 2"
    pub quarter_prefix: String,
    /// Suffix appended to course names in date columns
    pub date_suffix: String,
    /// `chrono` format for completion dates
    pub date_format: String,
    pub completed: String,
    pub not_completed: String,
    /// Slot code cell when the employee or slot is missing
    pub slot_unassigned: String,
    /// Name cell when the slot or its name is missing
    pub name_not_found: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            slot_header: "Plaza".into(),
            name_header: "Nombre".into(),
            unassigned_unit: "Sin área".into(),
            unspecified_quarter: "Sin trimestre".into(),
            quarter_prefix: "Trimestre".into(),
            date_suffix: "Fecha".into(),
            date_format: "%d/%m/%Y".into(),
            completed: "✅".into(),
            not_completed: "No completado".into(),
            slot_unassigned: "Sin plaza asignada".into(),
            name_not_found: "No encontrado".into(),
        }
    }
}

impl Labels {
    /// Render one cell outcome to display text
    pub fn render_cell(&self, cell: &CellValue) -> String {
        match cell {
            CellValue::Text(text) => text.clone(),
            CellValue::Unresolved(IdentityMiss::SlotUnassigned) => self.slot_unassigned.clone(),
            CellValue::Unresolved(IdentityMiss::NameNotFound) => self.name_not_found.clone(),
            CellValue::Completed => self.completed.clone(),
            CellValue::CompletedOn(date) => date.format(&self.date_format).to_string(),
            CellValue::NotCompleted => self.not_completed.clone(),
        }
    }

    /// Header text for a quarter bucket
    pub fn quarter_header(&self, quarter: &str) -> String {
        if quarter == self.unspecified_quarter || self.quarter_prefix.is_empty() {
            quarter.to_string()
        } else {
            format!("{} {}", self.quarter_prefix, quarter)
        }
    }

    /// Leaf header text for a course's date column
    pub fn date_header(&self, course_name: &str) -> String {
        format!("{} {}", course_name, self.date_suffix)
    }
}

/// The closed, ordered set of valid period (quarter) labels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodSet(Vec<String>);

impl Default for PeriodSet {
    fn default() -> Self {
        Self::new(["1", "2", "3", "4"])
    }
}

impl PeriodSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !out.contains(&label) {
                out.push(label);
            }
        }
        Self(out)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Map a stored quarter to a member of the set, if it is one.
    ///
    /// Accepts the label itself plus the common spellings `Q2`, `T2` and
    /// `Trimestre 2`.
    pub fn normalize(&self, raw: &str) -> Option<&str> {
        let trimmed = raw.trim();
        if let Some(found) = self.find_ignore_case(trimmed) {
            return Some(found);
        }
        let stripped = ["trimestre", "q", "t"]
            .iter()
            .find_map(|prefix| strip_prefix_ignore_case(trimmed, prefix))
            .map(str::trim)?;
        self.find_ignore_case(stripped)
    }

    fn find_ignore_case(&self, label: &str) -> Option<&str> {
        if label.is_empty() {
            return None;
        }
        self.0
            .iter()
            .find(|l| *l == label)
            .or_else(|| self.0.iter().find(|l| l.to_lowercase() == label.to_lowercase()))
            .map(String::as_str)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn renders_every_outcome() {
        let labels = Labels::default();
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(labels.render_cell(&CellValue::Text("S1".into())), "S1");
        assert_eq!(labels.render_cell(&CellValue::Completed), "✅");
        assert_eq!(labels.render_cell(&CellValue::CompletedOn(date)), "14/03/2025");
        assert_eq!(labels.render_cell(&CellValue::NotCompleted), "No completado");
        assert_eq!(
            labels.render_cell(&CellValue::Unresolved(IdentityMiss::SlotUnassigned)),
            "Sin plaza asignada"
        );
        assert_eq!(
            labels.render_cell(&CellValue::Unresolved(IdentityMiss::NameNotFound)),
            "No encontrado"
        );
    }

    #[test]
    fn header_texts() {
        let labels = Labels::default();
        assert_eq!(labels.quarter_header("2"), "Trimestre 2");
        assert_eq!(labels.quarter_header("Sin trimestre"), "Sin trimestre");
        assert_eq!(labels.date_header("Safety"), "Safety Fecha");
    }

    #[test]
    fn period_set_normalizes_spellings() {
        let periods = PeriodSet::default();
        assert_eq!(periods.normalize("2"), Some("2"));
        assert_eq!(periods.normalize(" 3 "), Some("3"));
        assert_eq!(periods.normalize("Q4"), Some("4"));
        assert_eq!(periods.normalize("t1"), Some("1"));
        assert_eq!(periods.normalize("Trimestre 2"), Some("2"));
        assert_eq!(periods.normalize("5"), None);
        assert_eq!(periods.normalize("Q"), None);
        assert_eq!(periods.normalize(""), None);
    }

    #[test]
    fn period_set_matches_labels_regardless_of_case() {
        let periods = PeriodSet::new(["T1", "T2"]);
        assert_eq!(periods.normalize("T1"), Some("T1"));
        assert_eq!(periods.normalize("t1"), Some("T1"));
        assert_eq!(periods.normalize(" t2 "), Some("T2"));
        assert_eq!(periods.normalize("T3"), None);

        let named = PeriodSet::new(["Q1-A", "Q1-B"]);
        assert_eq!(named.normalize("q1-b"), Some("Q1-B"));
        assert_eq!(named.normalize("Trimestre q1-a"), Some("Q1-A"));
    }

    #[test]
    fn period_set_drops_duplicates_and_keeps_order() {
        let periods = PeriodSet::new(["B", "A", "B"]);
        assert_eq!(periods.labels(), ["B".to_string(), "A".to_string()]);
        assert_eq!(periods.position("A"), Some(1));
    }

    #[test]
    fn labels_deserialize_with_defaults() {
        let labels: Labels = serde_json::from_str(r#"{"not_completed": "Pendiente"}"#).unwrap();
        assert_eq!(labels.not_completed, "Pendiente");
        assert_eq!(labels.date_suffix, "Fecha");
    }
}
