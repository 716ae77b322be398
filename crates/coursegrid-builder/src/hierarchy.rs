//! Hierarchy Builder
//!
//! Groups the catalog into `unit → quarter → courses`.
//!
//! # Ordering
//!
//! - Units: first encounter during the catalog scan (not sorted)
//! - Quarters: the order of the configured [`PeriodSet`], then the
//!   "unspecified" bucket. Every unit carries every bucket, empty ones
//!   included; empty buckets have zero width.
//! - Courses: catalog scan order
//!
//! The resulting [`Grouping`] is immutable. The header layout and the row
//! materializer both read its column list, so headers and cells cannot
//! drift apart.

use coursegrid_core::{ColumnKey, ColumnMode, Course, CourseId, Labels, PeriodSet};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A course as placed in the grouping
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupedCourse {
    pub id: CourseId,
    /// Display label (synthesized from the id when the catalog has none)
    pub name: String,
}

/// One quarter bucket inside a unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuarterGroup {
    pub quarter: String,
    pub courses: Vec<GroupedCourse>,
}

impl QuarterGroup {
    /// Columns owned by this quarter
    pub fn width(&self, mode: ColumnMode) -> usize {
        self.courses.len() * mode.width_per_course() as usize
    }
}

/// One organizational unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitGroup {
    pub unit: String,
    pub quarters: Vec<QuarterGroup>,
}

impl UnitGroup {
    /// Columns owned by this unit (sum over its quarters)
    pub fn width(&self, mode: ColumnMode) -> usize {
        self.quarters.iter().map(|q| q.width(mode)).sum()
    }

    pub fn courses(&self) -> impl Iterator<Item = &GroupedCourse> {
        self.quarters.iter().flat_map(|q| q.courses.iter())
    }
}

/// Ordered two-level course grouping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grouping {
    units: Vec<UnitGroup>,
}

impl Grouping {
    /// Group a catalog scan. Later duplicates of a course id are dropped.
    pub fn build(courses: &[Course], periods: &PeriodSet, labels: &Labels) -> Self {
        let mut units: Vec<UnitGroup> = Vec::new();
        let mut unit_index: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        let mut buckets: Vec<&str> = periods.labels().iter().map(String::as_str).collect();
        if !periods.contains(&labels.unspecified_quarter) {
            buckets.push(&labels.unspecified_quarter);
        }

        for course in courses {
            if !seen.insert(course.id.as_str()) {
                warn!(course = %course.id, "duplicate course id in catalog, keeping first");
                continue;
            }

            let unit = unit_label(course, labels);
            let quarter = quarter_label(course, periods, labels);

            let idx = *unit_index.entry(unit.clone()).or_insert_with(|| {
                units.push(UnitGroup {
                    unit,
                    quarters: buckets
                        .iter()
                        .map(|q| QuarterGroup {
                            quarter: (*q).to_string(),
                            courses: Vec::new(),
                        })
                        .collect(),
                });
                units.len() - 1
            });

            // `quarter` is always one of `buckets`
            if let Some(bucket) = units[idx].quarters.iter_mut().find(|q| q.quarter == quarter) {
                bucket.courses.push(GroupedCourse {
                    id: course.id.clone(),
                    name: course.display_name(),
                });
            }
        }

        debug!(units = units.len(), courses = seen.len(), "built course grouping");
        Self { units }
    }

    pub fn units(&self) -> &[UnitGroup] {
        &self.units
    }

    pub fn course_count(&self) -> usize {
        self.units.iter().map(|u| u.courses().count()).sum()
    }

    /// Total generated columns (excluding the leading identity columns)
    pub fn width(&self, mode: ColumnMode) -> usize {
        self.units.iter().map(|u| u.width(mode)).sum()
    }

    /// All generated column keys, in grouping order
    pub fn column_keys(&self, mode: ColumnMode) -> Vec<ColumnKey> {
        self.units
            .iter()
            .flat_map(UnitGroup::courses)
            .flat_map(|c| mode.keys_for(&c.id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Unit bucket for a course; blank or absent units become the sentinel
pub fn unit_label(course: &Course, labels: &Labels) -> String {
    course
        .unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map_or_else(|| labels.unassigned_unit.clone(), str::to_string)
}

/// Quarter bucket for a course
///
/// Labels outside the period set land in the "unspecified" bucket.
pub fn quarter_label(course: &Course, periods: &PeriodSet, labels: &Labels) -> String {
    match course.quarter.as_deref() {
        None => labels.unspecified_quarter.clone(),
        Some(raw) => match periods.normalize(raw) {
            Some(q) => q.to_string(),
            None => {
                if raw.trim() != labels.unspecified_quarter {
                    warn!(course = %course.id, quarter = raw, "quarter outside the period set");
                }
                labels.unspecified_quarter.clone()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(unit: &UnitGroup) -> Vec<(String, Vec<String>)> {
        unit.quarters
            .iter()
            .map(|q| {
                (
                    q.quarter.clone(),
                    q.courses.iter().map(|c| c.id.clone()).collect(),
                )
            })
            .collect()
    }

    fn catalog() -> Vec<Course> {
        vec![
            Course::new("C1").name("Safety").unit("HR").quarter("2"),
            Course::new("C2").name("Forklift").unit("Ops").quarter("1"),
            Course::new("C3").name("Ethics").unit("HR").quarter("1"),
            Course::new("C4").name("Onboarding").unit("HR").quarter("2"),
        ]
    }

    #[test]
    fn units_in_first_encounter_order() {
        let g = Grouping::build(&catalog(), &PeriodSet::default(), &Labels::default());
        let units: Vec<&str> = g.units().iter().map(|u| u.unit.as_str()).collect();
        assert_eq!(units, vec!["HR", "Ops"]);
    }

    #[test]
    fn quarters_follow_period_set_with_empty_buckets() {
        let g = Grouping::build(&catalog(), &PeriodSet::default(), &Labels::default());
        let none: Vec<String> = Vec::new();
        assert_eq!(
            names(&g.units()[0]),
            vec![
                ("1".to_string(), vec!["C3".to_string()]),
                ("2".to_string(), vec!["C1".to_string(), "C4".to_string()]),
                ("3".to_string(), none.clone()),
                ("4".to_string(), none.clone()),
                ("Sin trimestre".to_string(), none),
            ]
        );
    }

    #[test]
    fn sentinels_are_ordinary_buckets() {
        let courses = vec![
            Course::new("X1"),
            Course::new("X2").unit("  ").quarter("Q9"),
            Course::new("X3").unit("HR").quarter("T3"),
        ];
        let labels = Labels::default();
        let g = Grouping::build(&courses, &PeriodSet::default(), &labels);

        assert_eq!(g.units().len(), 2);
        let unassigned = &g.units()[0];
        assert_eq!(unassigned.unit, "Sin área");
        let bucket = unassigned.quarters.last().unwrap();
        assert_eq!(bucket.quarter, "Sin trimestre");
        assert_eq!(bucket.courses.len(), 2);
        assert_eq!(bucket.courses[0].name, "Curso X1");

        let hr = &g.units()[1];
        assert_eq!(hr.quarters[2].courses[0].id, "X3");
    }

    #[test]
    fn widths_depend_on_mode() {
        let g = Grouping::build(&catalog(), &PeriodSet::default(), &Labels::default());
        assert_eq!(g.units()[0].width(ColumnMode::Single), 3);
        assert_eq!(g.units()[0].width(ColumnMode::WithDate), 6);
        assert_eq!(g.units()[1].width(ColumnMode::Single), 1);
        assert_eq!(g.units()[0].quarters[2].width(ColumnMode::WithDate), 0);
        assert_eq!(g.width(ColumnMode::WithDate), 8);
        assert_eq!(g.course_count(), 4);
    }

    #[test]
    fn column_keys_follow_grouping_order() {
        let g = Grouping::build(&catalog(), &PeriodSet::default(), &Labels::default());
        let ids: Vec<String> = g
            .column_keys(ColumnMode::Single)
            .iter()
            .map(|k| k.course_id().to_string())
            .collect();
        assert_eq!(ids, vec!["C3", "C1", "C4", "C2"]);
    }

    #[test]
    fn duplicate_course_ids_keep_first() {
        let courses = vec![
            Course::new("C1").name("First").unit("HR").quarter("1"),
            Course::new("C1").name("Second").unit("Ops").quarter("2"),
        ];
        let g = Grouping::build(&courses, &PeriodSet::default(), &Labels::default());
        assert_eq!(g.units().len(), 1);
        assert_eq!(g.course_count(), 1);
        assert_eq!(g.units()[0].quarters[0].courses[0].name, "First");
    }

    #[test]
    fn custom_period_set_orders_buckets() {
        let periods = PeriodSet::new(["Ene-Mar", "Abr-Jun"]);
        let courses = vec![
            Course::new("A").unit("HR").quarter("Abr-Jun"),
            Course::new("B").unit("HR").quarter("Ene-Mar"),
        ];
        let g = Grouping::build(&courses, &periods, &Labels::default());
        let quarters: Vec<&str> = g.units()[0].quarters.iter().map(|q| q.quarter.as_str()).collect();
        assert_eq!(quarters, vec!["Ene-Mar", "Abr-Jun", "Sin trimestre"]);
        assert_eq!(g.column_keys(ColumnMode::Single)[0].course_id(), "B");
    }

    #[test]
    fn empty_catalog_is_empty_grouping() {
        let g = Grouping::build(&[], &PeriodSet::default(), &Labels::default());
        assert!(g.is_empty());
        assert_eq!(g.width(ColumnMode::Single), 0);
    }
}
