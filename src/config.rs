//! Run configuration and component factory
//!
//! Every stage receives an explicit [`RunConfig`]; nothing in the crate reads
//! partition or connection parameters from process-wide state. Environment
//! variables are only consulted by the `from_env` constructors used by the
//! binaries.

use crate::partition::{IngestionDate, PartitionLayout};
use crate::silver::DuplicateOrderPolicy;
use crate::{Error, Result, StorageBackend, StorageConfig};

use object_store::{local::LocalFileSystem, memory::InMemory, ObjectStore};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Parameters of one pipeline run over one ingestion partition.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Partition every stage reads and writes
    pub ingestion_date: IngestionDate,
    /// Object-store key layout for all tiers
    pub layout: PartitionLayout,
    /// Warehouse connection for the load stage
    pub warehouse: WarehouseConfig,
    /// Which bronze row survives when an order_id repeats
    pub duplicate_policy: DuplicateOrderPolicy,
}

impl RunConfig {
    pub fn new(ingestion_date: IngestionDate) -> Self {
        Self {
            ingestion_date,
            layout: PartitionLayout::new(),
            warehouse: WarehouseConfig::default(),
            duplicate_policy: DuplicateOrderPolicy::default(),
        }
    }

    pub fn with_layout(mut self, layout: PartitionLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_warehouse(mut self, warehouse: WarehouseConfig) -> Self {
        self.warehouse = warehouse;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateOrderPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Postgres connection parameters for the warehouse.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Postgres schema holding the dimension and fact tables
    schema: String,
}

impl WarehouseConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        schema: impl Into<String>,
    ) -> Result<Self> {
        let schema = schema.into();
        validate_identifier(&schema)?;
        Ok(Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
            schema,
        })
    }

    /// Build from environment
    ///
    /// Environment variables:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: 5432)
    /// - DB_NAME (default: retail)
    /// - DB_USER (default: de_user)
    /// - DB_PASSWORD (default: de_pass)
    /// - DB_SCHEMA (default: retail)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let port = match std::env::var("DB_PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|e| {
                Error::Config(format!("DB_PORT must be a port number, got '{}': {}", raw, e))
            })?,
            Err(_) => defaults.port,
        };

        Self::new(
            std::env::var("DB_HOST").unwrap_or(defaults.host),
            port,
            std::env::var("DB_NAME").unwrap_or(defaults.dbname),
            std::env::var("DB_USER").unwrap_or(defaults.user),
            std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
            std::env::var("DB_SCHEMA").unwrap_or(defaults.schema),
        )
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Schema-qualified table name
    pub fn table(&self, name: &str) -> String {
        format!("{}.{}", self.schema, name)
    }

    /// Driver configuration for `tokio_postgres::connect`
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .application_name("retail-lakehouse");
        config
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "retail".to_string(),
            user: "de_user".to_string(),
            password: "de_pass".to_string(),
            schema: "retail".to_string(),
        }
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Schema names are interpolated into SQL, so only plain identifiers are allowed.
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "warehouse schema '{}' must match [A-Za-z_][A-Za-z0-9_]*",
            name
        )))
    }
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Resolve storage settings from CLI values, falling back to environment
    ///
    /// Environment variables:
    /// - STORAGE_BACKEND: "local" (default) or "memory"
    /// - DATA_ROOT: root directory for the local backend (default: data)
    pub fn resolve_storage_config(
        backend: Option<&str>,
        root: Option<&std::path::Path>,
    ) -> Result<StorageConfig> {
        let backend = match backend {
            Some(value) => value.to_string(),
            None => std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string()),
        };
        let backend: StorageBackend = backend.parse().map_err(Error::Config)?;

        let root = match root {
            Some(path) => path.to_path_buf(),
            None => std::env::var("DATA_ROOT")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|_| StorageConfig::default().root),
        };

        Ok(StorageConfig { backend, root })
    }

    /// Create the object store backing all tiers
    pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory object store (development mode)");
                Ok(Arc::new(InMemory::new()))
            }
            StorageBackend::Local => {
                std::fs::create_dir_all(&config.root)?;
                info!(root = %config.root.display(), "Using local filesystem object store");
                Ok(Arc::new(LocalFileSystem::new_with_prefix(&config.root)?))
            }
        }
    }
}
