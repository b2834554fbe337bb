//! Error types for noqli.

use thiserror::Error;

/// The main error type for noqli operations.
#[derive(Debug, Error)]
pub enum NoqliError {
    /// The argument expression could not be parsed.
    #[error("Malformed expression at position {position}: {message}")]
    MalformedExpression { position: usize, message: String },

    /// `lim`/`off` was negative or not an integer.
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// More than one aggregate function was requested.
    #[error("Ambiguous aggregate: only one of COUNT, MIN, MAX, AVG, SUM may be used (got {0})")]
    AmbiguousAggregate(String),

    /// An UPDATE resolved to nothing to set.
    #[error("UPDATE requires fields to update{0}")]
    NoUpdateFields(&'static str),

    /// A command that must identify rows did not.
    #[error("{0} requires an id field")]
    MissingFilter(&'static str),

    /// Aggregate target is not a known column.
    #[error("{func} requires a column name, got {target}")]
    UnknownColumnForAggregate { func: String, target: String },

    /// Invalid value for the given field or option.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A reserved option was given to a command that cannot use it.
    #[error("Option '{option}' is not supported by {command}")]
    UnsupportedOption { option: String, command: String },

    /// A LIKE search had no columns to search in.
    #[error("No text columns available for LIKE query")]
    NoSearchColumns,

    /// Unrecognized command line.
    #[error("Invalid command: '{0}'. Use CREATE, GET, UPDATE, DELETE, USE, or EXIT")]
    InvalidCommand(String),

    #[error("No database selected. Use 'USE database_name' first")]
    NoDatabaseSelected,

    #[error("No table selected. Use 'USE table_name' to select a table")]
    NoTableSelected,

    /// USE named neither a database nor a table.
    #[error("Table '{table}' does not exist in database '{database}'")]
    UnknownTarget { database: String, table: String },

    /// A write matched no rows.
    #[error("{0}")]
    NotFound(&'static str),

    /// The user declined a confirmation prompt.
    #[error("Operation cancelled")]
    Cancelled,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NoqliError {
    /// Create a malformed-expression error at the given position.
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedExpression {
            position,
            message: message.into(),
        }
    }

    /// Create an unsupported-option error.
    pub fn unsupported(option: impl Into<String>, command: impl std::fmt::Display) -> Self {
        Self::UnsupportedOption {
            option: option.into(),
            command: command.to_string(),
        }
    }
}

/// Result type alias for noqli operations.
pub type NoqliResult<T> = Result<T, NoqliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NoqliError::malformed(5, "unbalanced '['");
        assert_eq!(
            err.to_string(),
            "Malformed expression at position 5: unbalanced '['"
        );
    }

    #[test]
    fn test_no_update_fields_display() {
        let err = NoqliError::NoUpdateFields(" (filter only provided)");
        assert_eq!(
            err.to_string(),
            "UPDATE requires fields to update (filter only provided)"
        );
    }
}
