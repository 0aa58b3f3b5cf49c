//! # Replication Configuration
//!
//! Configuration for the GraphQL source, the file store, the state database
//! and the replicated entity types.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_API_ENDPOINT=https://api.example.com/graphql                 │
//! │     TALLY_API_KEY=...                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, else                                              │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │                                                                         │
//! │  Loaded ONCE at process entry, validated, then passed by reference     │
//! │  into every collaborator. Nothing below reads the environment.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! endpoint = "https://api.example.com/graphql"
//! api_key = "..."
//!
//! [storage]
//! root = "/var/lib/tally/lake"
//! container = "ledger"
//!
//! [state]
//! database_path = "/var/lib/tally/state.db"
//!
//! [sync]
//! page_size = 10000
//! schedule_interval_secs = 3600
//!
//! [[entities]]
//! name = "customers"
//! items_query = "customers"
//! deltas_query = "customer_deltas"
//! fields = """
//!   dbId description email
//!   company { dbId name }
//! """
//!
//! [[reports]]
//! name = "balance"
//! url = "https://reports.example.com/balance.json"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::storage::is_plain_segment;
use tally_core::{flatten_field_selection, DEFAULT_ID_FIELD};

// =============================================================================
// API Settings
// =============================================================================

/// GraphQL source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// GraphQL endpoint (http or https).
    #[serde(default)]
    pub endpoint: String,

    /// API token, sent as `Authorization: token <key>`.
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries of a single transient request failure before the page fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration (milliseconds) between request retries.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds) between request retries.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// File store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the containers.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Top-level directory of this data lake.
    #[serde(default)]
    pub container: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("lake")
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            root: default_storage_root(),
            container: String::new(),
        }
    }
}

// =============================================================================
// State Settings
// =============================================================================

/// Sync state database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    /// Path to the SQLite file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tally", "tally")
        .map(|dirs| dirs.data_dir().join("state.db"))
        .unwrap_or_else(|| PathBuf::from("tally-state.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StateSettings {
    fn default() -> Self {
        StateSettings {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Cycle behavior settings shared by every entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// `first` of every paginated request.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Identifier field of source records and change-log nodes.
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Interval between scheduled cycles of one entity (seconds).
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_secs: u64,

    /// Run a cycle as soon as the scheduler starts.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_page_size() -> usize {
    10_000
}
fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}
fn default_schedule_interval() -> u64 {
    3600
}
fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            page_size: default_page_size(),
            id_field: default_id_field(),
            schedule_interval_secs: default_schedule_interval(),
            run_on_startup: true,
        }
    }
}

impl SyncSettings {
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }
}

// =============================================================================
// Entity Configuration
// =============================================================================

/// One replicated entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Namespace of the entity: state key, storage directory, blob suffix.
    pub name: String,

    /// GraphQL collection holding the records.
    pub items_query: String,

    /// GraphQL change-log collection. Without it only full syncs are possible.
    #[serde(default)]
    pub deltas_query: Option<String>,

    /// GraphQL field selection of a record.
    pub fields: String,

    /// Explicit column list; derived from `fields` when absent.
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    /// GraphQL type of the id list elements.
    #[serde(default = "default_id_type")]
    pub id_type: String,
}

fn default_id_type() -> String {
    "Int".to_string()
}

impl EntityConfig {
    /// Declared output columns (without the trailing `mutationType`).
    pub fn columns(&self) -> SyncResult<Vec<String>> {
        match &self.columns {
            Some(columns) => Ok(columns.clone()),
            None => Ok(flatten_field_selection(&self.fields)?),
        }
    }

    fn validate(&self) -> SyncResult<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(SyncError::Configuration(format!(
                "Entity name must be non-empty and use [A-Za-z0-9_-], got: '{}'",
                self.name
            )));
        }

        if self.items_query.trim().is_empty() {
            return Err(SyncError::Configuration(format!(
                "Entity '{}' has no items_query",
                self.name
            )));
        }

        let columns = self.columns()?;
        if columns.is_empty() {
            return Err(SyncError::Configuration(format!(
                "Entity '{}' declares no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "Entity '{}' declares column '{}' more than once",
                    self.name, column
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Report Configuration
// =============================================================================

/// A JSON document exported verbatim on every schedule tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report name: storage directory and file suffix.
    pub name: String,

    /// Document URL.
    pub url: String,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub state: StateSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,

    #[serde(default)]
    pub reports: Vec<ReportConfig>,
}

impl TallyConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else the platform default `tally.toml`)
    /// 3. Environment variables
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                path => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads a TOML file without applying overrides or validation.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        info!(path = %path.display(), "Loading config from file");
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api.endpoint.is_empty() {
            return Err(SyncError::Configuration(
                "api.endpoint is required (or TALLY_API_ENDPOINT)".into(),
            ));
        }
        let endpoint = Url::parse(&self.api.endpoint)?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API endpoint must start with http:// or https://, got: {}",
                self.api.endpoint
            )));
        }

        if self.api.api_key.is_empty() {
            return Err(SyncError::Configuration(
                "api.api_key is required (or TALLY_API_KEY)".into(),
            ));
        }

        if !is_plain_segment(&self.storage.container) {
            return Err(SyncError::Configuration(format!(
                "storage.container must be a plain directory name, got: '{}'",
                self.storage.container
            )));
        }

        if self.sync.page_size == 0 {
            return Err(SyncError::Configuration(
                "page_size must be greater than 0".into(),
            ));
        }

        if self.sync.schedule_interval_secs == 0 {
            return Err(SyncError::Configuration(
                "schedule_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.id_field.is_empty() {
            return Err(SyncError::Configuration("id_field must not be empty".into()));
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            entity.validate()?;
            if !names.insert(entity.name.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "Duplicate entity name: '{}'",
                    entity.name
                )));
            }
        }

        for report in &self.reports {
            if !is_plain_segment(&report.name) {
                return Err(SyncError::Configuration(format!(
                    "Report name must be a plain directory name, got: '{}'",
                    report.name
                )));
            }
            Url::parse(&report.url)?;
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("TALLY_API_ENDPOINT") {
            debug!(endpoint = %endpoint, "Overriding API endpoint from environment");
            self.api.endpoint = endpoint;
        }

        if let Some(key) = lookup("TALLY_API_KEY") {
            self.api.api_key = key;
        }

        if let Some(root) = lookup("TALLY_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }

        if let Some(container) = lookup("TALLY_STORAGE_CONTAINER") {
            self.storage.container = container;
        }

        if let Some(path) = lookup("TALLY_STATE_DB") {
            self.state.database_path = PathBuf::from(path);
        }

        if let Some(size) = lookup("TALLY_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.sync.page_size = n,
                Err(_) => tracing::warn!(value = %size, "Ignoring invalid TALLY_PAGE_SIZE"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Looks up an entity by name.
    pub fn entity(&self, name: &str) -> SyncResult<&EntityConfig> {
        self.entities
            .iter()
            .find(|entity| entity.name == name)
            .ok_or_else(|| SyncError::Configuration(format!("Unknown entity: '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [api]
        endpoint = "https://api.example.com/graphql"
        api_key = "secret"

        [storage]
        root = "/tmp/lake"
        container = "ledger"

        [[entities]]
        name = "customers"
        items_query = "customers"
        deltas_query = "customer_deltas"
        fields = "dbId description company { dbId name }"

        [[entities]]
        name = "transactions"
        items_query = "transactions"
        fields = "dbId"
        columns = ["dbId", "amount"]
        id_type = "Int64String"
    "#;

    fn sample() -> TallyConfig {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        assert_eq!(config.sync.page_size, 10_000);
        assert_eq!(config.sync.id_field, "dbId");
        assert_eq!(config.sync.schedule_interval_secs, 3600);
        assert!(config.sync.run_on_startup);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.entities[0].id_type, "Int");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_entity_columns() {
        let config = sample();
        assert_eq!(
            config.entity("customers").unwrap().columns().unwrap(),
            vec!["dbId", "description", "company.dbId", "company.name"]
        );
        assert_eq!(
            config.entity("transactions").unwrap().columns().unwrap(),
            vec!["dbId", "amount"]
        );
        assert!(config.entity("suppliers").is_err());
    }

    #[test]
    fn test_missing_required_values() {
        let mut config = sample();
        config.api.api_key.clear();
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = sample();
        config.storage.container.clear();
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = sample();
        config.api.endpoint = "ftp://api.example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_entities() {
        let mut config = sample();
        config.entities[1].name = "customers".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.entities[0].name = "../etc".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.entities[0].fields = "dbId owner { name".into();
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let mut config = sample();
        config.entities[0].fields = "dbId name dbId".into();
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("dbId"));

        let mut config = sample();
        config.entities[1].columns = Some(vec!["dbId".into(), "amount".into(), "amount".into()]);
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = sample();
        config.entities[1].columns = Some(vec!["dbId".into(), "mutationType".into()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_container_must_be_a_plain_name() {
        for container in [".", "..", "", "a/b", "a\\b"] {
            let mut config = sample();
            config.storage.container = container.into();
            assert!(
                config.validate().unwrap_err().is_config_error(),
                "container '{}' was accepted",
                container
            );
        }

        let mut config = sample();
        config.reports.push(ReportConfig {
            name: ".".into(),
            url: "https://reports.example.com/balance.json".into(),
        });
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_example_config_validates() {
        let mut config: TallyConfig =
            toml::from_str(include_str!("../../../config/tally.example.toml")).unwrap();
        config.api.api_key = "k".into();

        assert!(config.validate().is_ok());
        assert_eq!(config.entities.len(), 8);
        assert_eq!(config.entity("employees").unwrap().id_type, "Int64String");
        assert!(config
            .entity("transactions")
            .unwrap()
            .columns()
            .unwrap()
            .contains(&"glDimension.glObject2.objectKind.name".to_string()));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_API_KEY", "from-env"),
            ("TALLY_STORAGE_CONTAINER", "other"),
            ("TALLY_PAGE_SIZE", "500"),
        ]
        .into_iter()
        .collect();

        let mut config = sample();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.api_key, "from-env");
        assert_eq!(config.storage.container, "other");
        assert_eq!(config.sync.page_size, 500);
        assert_eq!(config.api.endpoint, "https://api.example.com/graphql");
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let result = TallyConfig::load(Some(PathBuf::from("/nonexistent/tally.toml")));
        assert!(result.unwrap_err().is_config_error());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = TallyConfig::from_file(&path).unwrap();
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.storage.root, PathBuf::from("/tmp/lake"));
    }
}
