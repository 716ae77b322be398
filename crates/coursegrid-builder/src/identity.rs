//! Store-backed identity resolution
//!
//! Two dependent lookups per employee (`employees/<ref>.slotCode`, then
//! `slots/<slotCode>.displayName`) run in parallel across employees on a
//! bounded rayon pool. Results are keyed by reference, so the caller's row
//! order never depends on completion order.

use crate::Collections;
use coursegrid_core::{
    DocumentStore, EmployeeIdentity, EmployeeRef, IdentityMap, IdentityMiss, IdentityResolver,
    ReportError,
};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default number of concurrent identity lookups
pub const DEFAULT_WORKERS: usize = 8;

/// Resolves identities against a document store
pub struct StoreIdentityResolver<'a, S: ?Sized> {
    store: &'a S,
    collections: Collections,
    workers: usize,
}

impl<'a, S: DocumentStore + ?Sized> StoreIdentityResolver<'a, S> {
    pub fn new(store: &'a S, collections: Collections) -> Self {
        Self {
            store,
            collections,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Bound the number of concurrent lookups (minimum 1)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Resolve a single employee
    pub fn resolve_one(&self, employee_ref: &str) -> Result<EmployeeIdentity, ReportError> {
        let c = &self.collections;
        let employee = self
            .store
            .get(&c.employees, employee_ref)
            .map_err(|e| ReportError::data_unavailable(&c.employees, e))?;

        let Some(slot_code) = employee.and_then(|doc| doc.str_field(&c.slot_field)) else {
            debug!(employee_ref, miss = ?IdentityMiss::SlotUnassigned, "identity lookup missed");
            return Ok(EmployeeIdentity::unresolved());
        };

        let slot = self
            .store
            .get(&c.slots, &slot_code)
            .map_err(|e| ReportError::data_unavailable(&c.slots, e))?;
        let display_name = slot.and_then(|doc| doc.str_field(&c.name_field));
        if display_name.is_none() {
            debug!(employee_ref, slot_code = %slot_code, miss = ?IdentityMiss::NameNotFound, "identity lookup missed");
        }

        Ok(EmployeeIdentity {
            slot_code: Some(slot_code),
            display_name,
        })
    }
}

impl<S: DocumentStore + ?Sized> IdentityResolver for StoreIdentityResolver<'_, S> {
    fn resolve_batch(&self, refs: &[EmployeeRef]) -> Result<IdentityMap, ReportError> {
        let mut seen = HashSet::new();
        let unique: Vec<&EmployeeRef> = refs.iter().filter(|r| seen.insert(r.as_str())).collect();

        let lookup = || -> Vec<Result<(EmployeeRef, EmployeeIdentity), ReportError>> {
            unique
                .par_iter()
                .map(|r| self.resolve_one(r).map(|identity| ((*r).clone(), identity)))
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.install(lookup),
            Err(e) => {
                warn!(error = %e, "identity worker pool unavailable, resolving on the current pool");
                lookup()
            }
        };

        let identities = results.into_iter().collect::<Result<IdentityMap, _>>()?;
        debug!(
            requested = unique.len(),
            unresolved = identities.values().filter(|i| i.display_name.is_none()).count(),
            "resolved identities"
        );
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursegrid_core::{Document, Filter, StoreError};
    use coursegrid_store::MemoryDocumentStore;
    use serde_json::json;

    fn store() -> MemoryDocumentStore {
        MemoryDocumentStore::new()
            .with("employees", "E1", json!({"slotCode": "S1"}))
            .with("employees", "E2", json!({"slotCode": "S2"}))
            .with("employees", "E3", json!({"name": "no slot"}))
            .with("slots", "S1", json!({"displayName": "Jane Doe"}))
            .with("slots", "S2", json!({}))
    }

    #[test]
    fn resolves_both_steps() {
        let store = store();
        let resolver = StoreIdentityResolver::new(&store, Collections::default());
        assert_eq!(
            resolver.resolve_one("E1").unwrap(),
            EmployeeIdentity::resolved("S1", "Jane Doe")
        );
    }

    #[test]
    fn misses_degrade_instead_of_failing() {
        let store = store();
        let resolver = StoreIdentityResolver::new(&store, Collections::default());

        let slot_without_name = resolver.resolve_one("E2").unwrap();
        assert_eq!(slot_without_name.slot_code.as_deref(), Some("S2"));
        assert_eq!(slot_without_name.display_name, None);

        assert_eq!(resolver.resolve_one("E3").unwrap(), EmployeeIdentity::unresolved());
        assert_eq!(resolver.resolve_one("E9").unwrap(), EmployeeIdentity::unresolved());
    }

    #[test]
    fn batch_covers_every_reference() {
        let store = store();
        let resolver = StoreIdentityResolver::new(&store, Collections::default()).workers(2);
        let refs: Vec<EmployeeRef> = ["E1", "E2", "E3", "E9", "E1"].iter().map(|s| s.to_string()).collect();
        let map = resolver.resolve_batch(&refs).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map["E1"].display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(map["E9"], EmployeeIdentity::unresolved());
    }

    struct FailingStore;

    impl DocumentStore for FailingStore {
        fn get(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "offline")))
        }
        fn query(&self, _: &str, _: &Filter) -> Result<Vec<Document>, StoreError> {
            Ok(Vec::new())
        }
        fn get_all(&self, _: &str) -> Result<Vec<Document>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn store_failures_are_errors() {
        let resolver = StoreIdentityResolver::new(&FailingStore, Collections::default());
        let err = resolver.resolve_batch(&["E1".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            ReportError::DataUnavailable { ref collection, .. } if collection == "employees"
        ));
    }
}
