//! Record Fetcher
//!
//! Reads the completion records and the course catalog, then resolves the
//! identity of every employee with a record. A store failure aborts with
//! `DataUnavailable`; an empty completion set does not.

use crate::hierarchy::quarter_label;
use crate::Collections;
use coursegrid_core::{
    CompletionRecord, Course, DocumentStore, EmployeeRef, Filter, IdentityMap, IdentityResolver,
    Labels, PeriodSet, ReportError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Which catalog courses a report considers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogScope {
    /// Every catalog course gets a column, completed or not
    #[default]
    Full,
    /// Only courses referenced by at least one completion record
    Referenced,
}

/// Catalog fetch settings
#[derive(Clone, Debug)]
pub struct FetchOptions<'a> {
    pub collections: &'a Collections,
    pub scope: CatalogScope,
    /// Largest id set sent as a membership query; larger sets filter in memory
    pub max_in_filter: usize,
    /// Restrict the catalog to one quarter
    pub quarter: Option<&'a str>,
    pub periods: &'a PeriodSet,
    pub labels: &'a Labels,
}

/// The three record sets a report joins
#[derive(Clone, Debug, Default)]
pub struct RecordSet {
    /// One record per employee, in store order
    pub completions: Vec<CompletionRecord>,
    /// Catalog courses, in store order
    pub courses: Vec<Course>,
    pub identities: IdentityMap,
}

/// Fetch completions, catalog and identities
pub fn fetch_records(
    store: &dyn DocumentStore,
    resolver: &dyn IdentityResolver,
    options: &FetchOptions<'_>,
) -> Result<RecordSet, ReportError> {
    let completions = fetch_completions(store, options.collections)?;
    let courses = fetch_courses(store, &completions, options)?;

    let refs: Vec<EmployeeRef> = completions.iter().map(|r| r.employee_ref.clone()).collect();
    let identities = if refs.is_empty() {
        IdentityMap::new()
    } else {
        resolver.resolve_batch(&refs)?
    };

    Ok(RecordSet {
        completions,
        courses,
        identities,
    })
}

/// All completion records, collated to one per employee
pub fn fetch_completions(
    store: &dyn DocumentStore,
    collections: &Collections,
) -> Result<Vec<CompletionRecord>, ReportError> {
    let docs = store
        .get_all(&collections.completions)
        .map_err(|e| ReportError::data_unavailable(&collections.completions, e))?;

    let mut records = Vec::with_capacity(docs.len());
    for doc in docs {
        match serde_json::from_value::<CompletionRecord>(doc.data) {
            Ok(mut record) => {
                if record.employee_ref.is_empty() {
                    record.employee_ref = doc.id;
                }
                records.push(record);
            }
            Err(e) => warn!(document = %doc.id, error = %e, "skipping malformed completion record"),
        }
    }

    let records = crate::rows::collate(records);
    debug!(records = records.len(), "fetched completion records");
    Ok(records)
}

/// Catalog courses per scope and quarter filter
pub fn fetch_courses(
    store: &dyn DocumentStore,
    completions: &[CompletionRecord],
    options: &FetchOptions<'_>,
) -> Result<Vec<Course>, ReportError> {
    let collection = &options.collections.courses;

    let docs = match options.scope {
        CatalogScope::Full => store.get_all(collection),
        CatalogScope::Referenced => {
            let mut seen = HashSet::new();
            let referenced: Vec<&str> = completions
                .iter()
                .flat_map(|r| r.completed_course_ids.iter())
                .map(String::as_str)
                .filter(|id| seen.insert(*id))
                .collect();

            let membership = Filter::any_of("id", referenced.iter().copied());
            if referenced.is_empty() {
                Ok(Vec::new())
            } else if referenced.len() <= options.max_in_filter {
                store.query(collection, &membership)
            } else {
                debug!(
                    referenced = referenced.len(),
                    limit = options.max_in_filter,
                    "referenced set too large for a membership query, filtering in memory"
                );
                store.get_all(collection).map(|docs| {
                    docs.into_iter()
                        .filter(|d| membership.matches(d))
                        .collect()
                })
            }
        }
    }
    .map_err(|e| ReportError::data_unavailable(collection, e))?;

    let mut courses = Vec::with_capacity(docs.len());
    for doc in &docs {
        match Course::from_document(doc) {
            Ok(course) => courses.push(course),
            Err(e) => warn!(document = %doc.id, error = %e, "skipping malformed course"),
        }
    }

    if let Some(filter) = options.quarter {
        let wanted = options
            .periods
            .normalize(filter)
            .map_or_else(|| filter.trim().to_string(), str::to_string);
        courses.retain(|c| quarter_label(c, options.periods, options.labels) == wanted);
    }

    debug!(courses = courses.len(), scope = ?options.scope, quarter = ?options.quarter, "fetched catalog");
    Ok(courses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegrid_core::{Document, EmployeeIdentity, StoreError};
    use coursegrid_store::{MemoryDocumentStore, TracedStore};
    use serde_json::json;

    struct NoIdentities;

    impl IdentityResolver for NoIdentities {
        fn resolve_batch(&self, refs: &[EmployeeRef]) -> Result<IdentityMap, ReportError> {
            Ok(refs
                .iter()
                .map(|r| (r.clone(), EmployeeIdentity::unresolved()))
                .collect())
        }
    }

    fn store() -> MemoryDocumentStore {
        MemoryDocumentStore::new()
            .with("completions", "E1", json!({"completedCourseIds": ["C1", "C3"], "completionDates": []}))
            .with("completions", "bad", json!({"completedCourseIds": "C1"}))
            .with("courses", "C1", json!({"name": "Safety", "unit": "HR", "quarter": "2"}))
            .with("courses", "C2", json!({"name": "Ethics", "unit": "HR", "quarter": "1"}))
            .with("courses", "C3", json!({"name": "Forklift", "unit": "Ops", "quarter": "Q2"}))
    }

    fn options<'a>(
        collections: &'a Collections,
        periods: &'a PeriodSet,
        labels: &'a Labels,
    ) -> FetchOptions<'a> {
        FetchOptions {
            collections,
            scope: CatalogScope::Full,
            max_in_filter: 30,
            quarter: None,
            periods,
            labels,
        }
    }

    fn ids(courses: &[Course]) -> Vec<&str> {
        courses.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn completion_ids_default_to_document_id() {
        let records = fetch_completions(&store(), &Collections::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].employee_ref, "E1");
    }

    #[test]
    fn full_scope_keeps_unreferenced_courses() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let set = fetch_records(&store(), &NoIdentities, &options(&c, &p, &l)).unwrap();
        assert_eq!(ids(&set.courses), vec!["C1", "C2", "C3"]);
        assert!(set.identities.contains_key("E1"));
    }

    #[test]
    fn referenced_scope_uses_membership_query() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let traced = TracedStore::new(store());
        let opts = FetchOptions {
            scope: CatalogScope::Referenced,
            ..options(&c, &p, &l)
        };
        let set = fetch_records(&traced, &NoIdentities, &opts).unwrap();
        assert_eq!(ids(&set.courses), vec!["C1", "C3"]);
        assert_eq!(traced.accesses(), 2);
    }

    #[test]
    fn referenced_scope_falls_back_to_memory_filter() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let opts = FetchOptions {
            scope: CatalogScope::Referenced,
            max_in_filter: 1,
            ..options(&c, &p, &l)
        };
        let set = fetch_records(&store(), &NoIdentities, &opts).unwrap();
        assert_eq!(ids(&set.courses), vec!["C1", "C3"]);
    }

    #[test]
    fn both_referenced_paths_match_the_body_id() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let store = MemoryDocumentStore::new()
            .with("completions", "E1", json!({"completedCourseIds": ["C1", "C2"]}))
            .with("courses", "auto-1", json!({"id": "C1", "name": "Safety", "unit": "HR"}))
            .with("courses", "auto-2", json!({"id": "C2", "name": "Ethics", "unit": "HR"}))
            .with("courses", "C9", json!({"name": "Unreferenced", "unit": "HR"}));

        for max_in_filter in [30, 1] {
            let opts = FetchOptions {
                scope: CatalogScope::Referenced,
                max_in_filter,
                ..options(&c, &p, &l)
            };
            let set = fetch_records(&store, &NoIdentities, &opts).unwrap();
            assert_eq!(ids(&set.courses), vec!["C1", "C2"], "max_in_filter = {max_in_filter}");
        }
    }

    #[test]
    fn quarter_filter_normalizes_labels() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let opts = FetchOptions {
            quarter: Some("Q2"),
            ..options(&c, &p, &l)
        };
        let set = fetch_records(&store(), &NoIdentities, &opts).unwrap();
        assert_eq!(ids(&set.courses), vec!["C1", "C3"]);
    }

    #[test]
    fn empty_completions_are_not_an_error() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let store = MemoryDocumentStore::new().with("courses", "C1", json!({}));
        let set = fetch_records(&store, &NoIdentities, &options(&c, &p, &l)).unwrap();
        assert!(set.completions.is_empty());
        assert!(set.identities.is_empty());
        assert_eq!(set.courses.len(), 1);
    }

    struct BrokenCatalog(MemoryDocumentStore);

    impl DocumentStore for BrokenCatalog {
        fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.0.get(collection, id)
        }
        fn query(&self, _: &str, _: &Filter) -> Result<Vec<Document>, StoreError> {
            Err(StoreError::NotFound("courses".into()))
        }
        fn get_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
            if collection == "courses" {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "deadline exceeded",
                )));
            }
            self.0.get_all(collection)
        }
    }

    #[test]
    fn catalog_failure_is_data_unavailable() {
        let (c, p, l) = (Collections::default(), PeriodSet::default(), Labels::default());
        let err = fetch_records(&BrokenCatalog(store()), &NoIdentities, &options(&c, &p, &l)).unwrap_err();
        assert!(matches!(
            err,
            ReportError::DataUnavailable { ref collection, .. } if collection == "courses"
        ));
        assert_eq!(err.status_code(), 500);
    }
}
