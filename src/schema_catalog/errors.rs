//! # Schema Error Types
//!
//! Errors raised while declaring the logical schema and while resolving field
//! chains against it.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: a table or field name that does not exist
//! - **Definition Errors**: cycles between traversers, invalid declarations,
//!   unflattenable attributes and malformed computed-field fragments
//! - **Compiler Errors**: a join requested with nothing to select, or a query
//!   exceeding its join budget
//!
//! None of these are transient. They reflect a static mis-definition of the
//! schema or a caller bug and always propagate to whoever is building the query.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Field `{field}` not found on table `{table}`")]
    FieldNotFound { table: String, field: String },

    #[error("Table `{table}` not found in database")]
    TableNotFound { table: String },

    #[error("Field traversal cycle at `{table}.{field}` (path: {path})")]
    Cycle {
        table: String,
        field: String,
        path: String,
    },

    #[error("No fields requested from relation `{relation}`")]
    EmptyFieldRequest { relation: String },

    #[error("Cannot expand `{table}.{field}` for wildcard selection: {reason}")]
    UnsupportedSplashField {
        table: String,
        field: String,
        reason: String,
    },

    #[error("Failed to parse expression for field `{field}`: {message} (fragment: `{fragment}`)")]
    FieldExpressionParse {
        field: String,
        fragment: String,
        message: String,
    },

    #[error("Field chain cannot end or continue at `{table}.{field}`")]
    IncompleteChain { table: String, field: String },

    #[error("Invalid schema definition: {message}")]
    InvalidSchema { message: String },

    #[error("Query requires more than {limit} lazy joins")]
    TooManyJoins { limit: u32 },
}

impl SchemaError {
    /// True for the "name not found" family of errors
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            SchemaError::FieldNotFound { .. } | SchemaError::TableNotFound { .. }
        )
    }

    /// Create a FieldNotFound error with context information
    ///
    /// # Example
    /// ```ignore
    /// SchemaError::field_not_found_with_context(
    ///     "persons",
    ///     "emial",
    ///     "Resolving chain events.person.emial"
    /// )
    /// ```
    pub fn field_not_found_with_context(
        table: impl Into<String>,
        field: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let ctx = context.into();
        SchemaError::FieldNotFound {
            table: table.into(),
            field: format!("{}\n  Context: {}", field, ctx),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            message: message.into(),
        }
    }
}
