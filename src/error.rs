//! Error types for sqlshape.

use thiserror::Error;

/// The main error type for sqlshape operations.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The table identifier was never registered.
    #[error("Table not registered: '{0}'")]
    UnknownTable(String),

    /// Column list mode is not select, insert, or update.
    #[error("Invalid column mode: '{0}'. Expected: select, insert, or update")]
    InvalidMode(String),

    /// Sort direction did not normalize to ASC or DESC.
    #[error("Invalid sort order: '{0}'. Expected: ASC or DESC")]
    InvalidSortOrder(String),

    /// No updatable column was present in the value map.
    #[error("No fields to update on table '{table}'")]
    NothingToUpdate { table: String },

    /// The key column's value was absent from the value map.
    #[error("Key column '{column}' not found in values for table '{table}'")]
    MissingKey { table: String, column: String },

    /// The shape description could not be read as a flat list of fields.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement execution failed in the database.
    #[error("Execution error: {0}")]
    Execution(#[from] sqlx::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShapeError {
    /// Create a missing key error.
    pub fn missing_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingKey {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Whether the error reports a caller mistake rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownTable(_)
                | Self::InvalidMode(_)
                | Self::NothingToUpdate { .. }
                | Self::MissingKey { .. }
                | Self::Schema(_)
                | Self::Config(_)
        )
    }
}

/// Result type alias for sqlshape operations.
pub type ShapeResult<T> = Result<T, ShapeError>;
