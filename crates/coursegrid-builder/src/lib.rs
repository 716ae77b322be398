//! # coursegrid-builder
//!
//! Builds the hierarchical training report grid.
//!
//! This crate provides:
//! - Record fetching (completions, catalog, identities)
//! - Course grouping by unit and quarter
//! - Three-row header layout with merge ranges
//! - Row materialization, one cell per generated column
//! - `StoreIdentityResolver`, a parallel batch identity lookup
//!
//! ## Pipeline
//!
//! ```text
//! fetch_records ─► Grouping::build ─► build_header ─► materialize ─► Report
//!                  (immutable)        (column list)   (reads list)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use coursegrid_builder::{ReportBuilder, ReportRequest};
//! use coursegrid_core::ColumnMode;
//!
//! let builder = ReportBuilder::new().mode(ColumnMode::WithDate);
//! let report = builder.build(&store, &ReportRequest::for_quarter(Some("2"))?)?;
//! assert!(report.is_rectangular());
//! ```

pub mod fetch;
pub mod hierarchy;
pub mod identity;
pub mod layout;
pub mod rows;

pub use fetch::{CatalogScope, FetchOptions, RecordSet};
pub use hierarchy::Grouping;
pub use identity::StoreIdentityResolver;
pub use layout::build_header;

use coursegrid_core::{
    ColumnMode, DocumentStore, IdentityResolver, Labels, PeriodSet, Report, ReportError,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Collection and field names in the document store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub completions: String,
    pub courses: String,
    pub employees: String,
    pub slots: String,
    /// Employee field holding the slot code
    pub slot_field: String,
    /// Slot field holding the display name
    pub name_field: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            completions: "completions".into(),
            courses: "courses".into(),
            employees: "employees".into(),
            slots: "slots".into(),
            slot_field: "slotCode".into(),
            name_field: "displayName".into(),
        }
    }
}

/// One report invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportRequest {
    /// Restrict the catalog to one quarter
    pub quarter: Option<String>,
    /// Override the builder's column mode
    pub mode: Option<ColumnMode>,
}

impl ReportRequest {
    /// Full-catalog report
    pub fn full() -> Self {
        Self::default()
    }

    /// Quarter-scoped report; the quarter is required
    pub fn for_quarter(quarter: Option<&str>) -> Result<Self, ReportError> {
        match quarter.map(str::trim) {
            Some(q) if !q.is_empty() => Ok(Self {
                quarter: Some(q.to_string()),
                mode: None,
            }),
            _ => Err(ReportError::MissingParameter("trimestre")),
        }
    }

    pub fn with_mode(mut self, mode: ColumnMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Report pipeline configuration
#[derive(Clone, Debug)]
pub struct ReportBuilder {
    pub mode: ColumnMode,
    pub periods: PeriodSet,
    pub labels: Labels,
    pub collections: Collections,
    pub catalog_scope: CatalogScope,
    pub max_in_filter: usize,
    pub identity_workers: usize,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            mode: ColumnMode::Single,
            periods: PeriodSet::default(),
            labels: Labels::default(),
            collections: Collections::default(),
            catalog_scope: CatalogScope::Full,
            max_in_filter: 30,
            identity_workers: identity::DEFAULT_WORKERS,
        }
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default column mode
    pub fn mode(mut self, mode: ColumnMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the closed set of quarter labels
    pub fn periods(mut self, periods: PeriodSet) -> Self {
        self.periods = periods;
        self
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn collections(mut self, collections: Collections) -> Self {
        self.collections = collections;
        self
    }

    pub fn catalog_scope(mut self, scope: CatalogScope) -> Self {
        self.catalog_scope = scope;
        self
    }

    pub fn max_in_filter(mut self, max: usize) -> Self {
        self.max_in_filter = max;
        self
    }

    pub fn identity_workers(mut self, workers: usize) -> Self {
        self.identity_workers = workers.max(1);
        self
    }

    /// Build a report, resolving identities from the same store
    pub fn build(&self, store: &dyn DocumentStore, request: &ReportRequest) -> Result<Report, ReportError> {
        let resolver = StoreIdentityResolver::new(store, self.collections.clone())
            .workers(self.identity_workers);
        self.build_with(store, &resolver, request)
    }

    /// Build a report with an explicit identity resolver
    pub fn build_with(
        &self,
        store: &dyn DocumentStore,
        resolver: &dyn IdentityResolver,
        request: &ReportRequest,
    ) -> Result<Report, ReportError> {
        let mode = request.mode.unwrap_or(self.mode);
        let options = FetchOptions {
            collections: &self.collections,
            scope: self.catalog_scope,
            max_in_filter: self.max_in_filter,
            quarter: request.quarter.as_deref(),
            periods: &self.periods,
            labels: &self.labels,
        };

        // Pass 1: immutable grouping and column list
        let records = fetch::fetch_records(store, resolver, &options)?;
        let grouping = Grouping::build(&records.courses, &self.periods, &self.labels);
        let header = build_header(&grouping, mode, &self.labels)?;

        // Pass 2: rows read the column list
        let rows = rows::materialize(&records.completions, &header, &records.identities, mode);

        info!(
            quarter = ?request.quarter,
            %mode,
            units = grouping.units().len(),
            columns = header.columns.len(),
            rows = rows.len(),
            "built report grid"
        );

        Ok(Report {
            header,
            rows,
            mode,
            quarter: request.quarter.clone(),
        })
    }
}
