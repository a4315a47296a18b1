//! Versioned collapse over append-log tables.
//!
//! Persons and distinct-id mappings are stored as append logs: every mutation
//! is a new row with a higher `version` and an `is_deleted` flag. Current
//! state is rebuilt per query:
//!
//! ```sql
//! SELECT argMax(properties, version) AS properties, id
//! FROM person
//! GROUP BY id
//! HAVING argMax(is_deleted, version) = 0
//! ```
//!
//! The subquery is inner-joined on the relation key, so keys whose latest row
//! is a delete disappear from the result instead of showing up as nulls.

use serde::{Deserialize, Serialize};

use super::errors::SchemaError;
use super::lazy_table::{JoinRequest, LazyJoinBuilder, RequestedFields};
use crate::sql_ast::{Join, JoinType, Operator, OperatorApplication, SelectQuery, SqlExpr};

pub const DEFAULT_VERSION_COLUMN: &str = "version";
pub const DEFAULT_DELETED_COLUMN: &str = "is_deleted";

/// Last-writer-wins collapse of one append log, keyed on a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedCollapse {
    pub relation: String,
    pub physical_source: String,
    pub key_column: String,
    pub version_column: String,
    pub deleted_column: String,
}

impl VersionedCollapse {
    pub fn new(
        relation: impl Into<String>,
        physical_source: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        VersionedCollapse {
            relation: relation.into(),
            physical_source: physical_source.into(),
            key_column: key_column.into(),
            version_column: DEFAULT_VERSION_COLUMN.to_string(),
            deleted_column: DEFAULT_DELETED_COLUMN.to_string(),
        }
    }

    pub fn with_version_column(mut self, column: impl Into<String>) -> Self {
        self.version_column = column.into();
        self
    }

    pub fn with_deleted_column(mut self, column: impl Into<String>) -> Self {
        self.deleted_column = column.into();
        self
    }

    /// Persons keyed on `id`
    pub fn persons() -> Self {
        Self::new("persons", "person", "id")
    }

    /// Distinct-id mappings keyed on `distinct_id`
    pub fn distinct_ids() -> Self {
        Self::new("person_distinct_ids", "person_distinct_id2", "distinct_id")
    }

    fn arg_max(&self, column: &str) -> SqlExpr {
        SqlExpr::call(
            "argMax",
            vec![
                SqlExpr::bare_column(column),
                SqlExpr::bare_column(self.version_column.clone()),
            ],
        )
    }

    /// One row per live key with the latest value of every requested column.
    ///
    /// The key column is selected bare exactly once, whether or not it was
    /// requested.
    pub fn subquery(&self, requested: &RequestedFields) -> Result<SelectQuery, SchemaError> {
        if requested.is_empty() {
            return Err(SchemaError::EmptyFieldRequest {
                relation: self.relation.clone(),
            });
        }

        let mut query = SelectQuery::from_table(self.physical_source.clone(), None);
        for field in requested.iter().filter(|f| *f != self.key_column) {
            query.select.push(SqlExpr::alias(self.arg_max(field), field));
        }
        query.select.push(SqlExpr::bare_column(self.key_column.clone()));
        query.group_by = vec![SqlExpr::bare_column(self.key_column.clone())];
        query.having = Some(SqlExpr::binary(
            Operator::Equal,
            self.arg_max(&self.deleted_column),
            SqlExpr::integer(0),
        ));
        Ok(query)
    }
}

impl LazyJoinBuilder for VersionedCollapse {
    fn relation(&self) -> &str {
        &self.relation
    }

    fn physical_source(&self) -> &str {
        &self.physical_source
    }

    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn build_join(&self, request: &JoinRequest<'_>) -> Result<Join, SchemaError> {
        let subquery = self.subquery(request.requested_fields)?;
        Ok(Join {
            source: Box::new(subquery),
            table_alias: request.to_alias.to_string(),
            joining_on: vec![OperatorApplication::binary(
                Operator::Equal,
                SqlExpr::column(request.from_alias, request.from_column),
                SqlExpr::column(request.to_alias, self.key_column.clone()),
            )],
            join_type: JoinType::Inner,
        })
    }
}
