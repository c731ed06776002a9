//! Error types for the retail lakehouse pipeline

use std::fmt;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the retail lakehouse pipeline
#[derive(Debug)]
pub enum Error {
    /// Arrow-related errors
    Arrow(arrow::error::ArrowError),
    /// Parquet-related errors
    Parquet(parquet::errors::ParquetError),
    /// Object store errors
    ObjectStore(object_store::Error),
    /// Postgres driver errors outside of a load transaction
    Postgres(tokio_postgres::Error),
    /// IO errors
    Io(std::io::Error),
    /// Serialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// A required upstream partition object is absent
    MissingInput { path: String },
    /// An input row or column violates the assumed schema
    SchemaViolation(String),
    /// Failure inside the warehouse load transaction; the transaction was rolled back
    LoadTransaction(String),
    /// An aggregation invariant did not hold
    Invariant(String),
    /// Internal error
    Internal(String),
}

impl Error {
    /// Whether this error means an upstream stage has not produced its output yet.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Error::MissingInput { .. })
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Arrow(e) => Some(e),
            Error::Parquet(e) => Some(e),
            Error::ObjectStore(e) => Some(e),
            Error::Postgres(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Arrow(e) => write!(f, "Arrow error: {}", e),
            Error::Parquet(e) => write!(f, "Parquet error: {}", e),
            Error::ObjectStore(e) => write!(f, "Object store error: {}", e),
            Error::Postgres(e) => write!(f, "Postgres error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::MissingInput { path } => write!(f, "Missing input: {}", path),
            Error::SchemaViolation(msg) => write!(f, "Schema violation: {}", msg),
            Error::LoadTransaction(msg) => {
                write!(f, "Warehouse load failed, transaction rolled back: {}", msg)
            }
            Error::Invariant(msg) => write!(f, "Invariant violated: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(e: arrow::error::ArrowError) -> Self {
        Error::Arrow(e)
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(e: parquet::errors::ParquetError) -> Self {
        Error::Parquet(e)
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => Error::MissingInput { path },
            other => Error::ObjectStore(other),
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Self {
        Error::Postgres(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_missing_input() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err: Error = object_store::Error::NotFound {
            path: "bronze/orders/ingestion_date=2026-01-12/orders.csv".to_string(),
            source,
        }
        .into();

        assert!(err.is_missing_input());
        assert!(err.to_string().contains("orders.csv"));
    }

    #[test]
    fn load_transaction_message_mentions_rollback() {
        let err = Error::LoadTransaction("no dim_time row for 2024-02".to_string());
        assert!(err.to_string().contains("rolled back"));
    }
}
