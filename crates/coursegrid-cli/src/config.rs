//! `coursegrid.toml` configuration
//!
//! Every field has a default, so an absent file is a valid configuration.
//!
//! ```toml
//! column_mode = "with-date"
//! periods = ["1", "2", "3", "4"]
//! url_ttl_secs = 3600
//!
//! [collections]
//! slots = "plazas"
//!
//! [labels]
//! completed = "Sí"
//! ```

use anyhow::{Context, Result};
use coursegrid_builder::{CatalogScope, Collections, ReportBuilder};
use coursegrid_core::{ColumnMode, Labels, PeriodSet};
use coursegrid_render::ExcelRenderer;
use coursegrid_store::LocalObjectStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "coursegrid.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub collections: Collections,
    pub periods: PeriodSet,
    pub labels: Labels,
    pub column_mode: ColumnMode,
    pub catalog_scope: CatalogScope,
    pub max_in_filter: usize,
    pub identity_workers: usize,
    pub url_ttl_secs: u64,
    /// Key for signed object URLs
    pub signing_secret: Option<String>,
    /// Public prefix of signed object URLs
    pub base_url: Option<String>,
    pub bind: String,
    /// Directory of `<collection>.json` snapshots
    pub data_dir: PathBuf,
    /// Object store root
    pub objects_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let builder = ReportBuilder::default();
        Self {
            collections: builder.collections,
            periods: builder.periods,
            labels: builder.labels,
            column_mode: builder.mode,
            catalog_scope: builder.catalog_scope,
            max_in_filter: builder.max_in_filter,
            identity_workers: builder.identity_workers,
            url_ttl_secs: 3600,
            signing_secret: None,
            base_url: None,
            bind: "127.0.0.1:8080".into(),
            data_dir: PathBuf::from("data"),
            objects_dir: PathBuf::from("objects"),
        }
    }
}

impl Config {
    /// Load an explicit file, else `coursegrid.toml` if present, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        anyhow::ensure!(!config.periods.is_empty(), "periods must not be empty");
        Ok(config)
    }

    pub fn report_builder(&self) -> ReportBuilder {
        ReportBuilder::new()
            .mode(self.column_mode)
            .periods(self.periods.clone())
            .labels(self.labels.clone())
            .collections(self.collections.clone())
            .catalog_scope(self.catalog_scope)
            .max_in_filter(self.max_in_filter)
            .identity_workers(self.identity_workers)
    }

    pub fn renderer(&self) -> ExcelRenderer {
        ExcelRenderer::new().labels(self.labels.clone())
    }

    pub fn object_store(&self) -> LocalObjectStore {
        let mut store = LocalObjectStore::new(&self.objects_dir);
        if let Some(base_url) = &self.base_url {
            store = store.base_url(base_url.trim_end_matches('/'));
        }
        if let Some(secret) = &self.signing_secret {
            store = store.secret(secret.as_str());
        }
        if !store.is_keyed() {
            warn!("no signing_secret configured; signed URLs can be forged");
        }
        store
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial_tables_keep_their_defaults() {
        let config = Config::parse(
            r#"
            column_mode = "with-date"
            catalog_scope = "referenced"
            periods = ["Q1", "Q2"]
            url_ttl_secs = 600

            [collections]
            slots = "plazas"

            [labels]
            completed = "Sí"
            "#,
        )
        .unwrap();

        assert_eq!(config.column_mode, ColumnMode::WithDate);
        assert_eq!(config.catalog_scope, CatalogScope::Referenced);
        assert_eq!(config.periods.labels(), ["Q1", "Q2"]);
        assert_eq!(config.collections.slots, "plazas");
        assert_eq!(config.collections.employees, "employees");
        assert_eq!(config.labels.completed, "Sí");
        assert_eq!(config.labels.not_completed, "No completado");
        assert_eq!(config.url_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn unknown_keys_and_empty_periods_are_rejected() {
        assert!(Config::parse("colum_mode = \"single\"").is_err());
        assert!(Config::parse("periods = []").is_err());
    }

    #[test]
    fn builder_reflects_config() {
        let config = Config::parse("identity_workers = 3\nmax_in_filter = 5").unwrap();
        let builder = config.report_builder();
        assert_eq!(builder.identity_workers, 3);
        assert_eq!(builder.max_in_filter, 5);
    }

    #[test]
    fn signing_secret_keys_the_object_store() {
        assert!(!Config::default().object_store().is_keyed());
        let config = Config::parse("signing_secret = \"s3cret\"").unwrap();
        assert!(config.object_store().is_keyed());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
