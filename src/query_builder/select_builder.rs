use log::debug;

use super::scope::QueryScope;
use crate::schema_catalog::{Database, SchemaError};
use crate::sql_ast::{SelectQuery, SqlExpr};

/// Assembles `SELECT <fields> FROM <root> <lazy joins>` from dotted field
/// chains. `*` expands to the root table's splash.
pub struct SelectBuilder<'db> {
    scope: QueryScope<'db>,
    select: Vec<SqlExpr>,
}

impl<'db> SelectBuilder<'db> {
    pub fn new(db: &'db Database, table: &str) -> Result<Self, SchemaError> {
        Ok(SelectBuilder {
            scope: QueryScope::new(db, table)?,
            select: Vec::new(),
        })
    }

    pub fn with_alias(db: &'db Database, table: &str, alias: &str) -> Result<Self, SchemaError> {
        Ok(SelectBuilder {
            scope: QueryScope::with_alias(db, table, alias)?,
            select: Vec::new(),
        })
    }

    pub fn max_joins(mut self, max_joins: u32) -> Self {
        self.scope = self.scope.with_max_joins(max_joins);
        self
    }

    pub fn select(&mut self, field: &str) -> Result<&mut Self, SchemaError> {
        if field == "*" {
            for path in self.scope.root_table().splash()? {
                let resolved = self.scope.resolve_dotted(&path)?;
                self.select.push(resolved.expr);
            }
        } else {
            let resolved = self.scope.resolve_dotted(field)?;
            debug_assert!(resolved.expr.is_resolved());
            self.select.push(resolved.expr);
        }
        Ok(self)
    }

    pub fn select_as(&mut self, field: &str, alias: &str) -> Result<&mut Self, SchemaError> {
        let resolved = self.scope.resolve_dotted(field)?;
        self.select.push(SqlExpr::alias(resolved.expr, alias));
        Ok(self)
    }

    /// Finish the query. Nothing selected means `*`.
    pub fn build(mut self) -> Result<SelectQuery, SchemaError> {
        if self.select.is_empty() {
            self.select("*")?;
        }
        let root = self.scope.root_table();
        let source = root.physical_source().ok_or_else(|| {
            SchemaError::invalid_schema(format!("root table `{}` is virtual", root.name()))
        })?;

        let mut query =
            SelectQuery::from_table(source, Some(self.scope.root_alias().to_string()));
        query.select = self.select;
        query.joins = self.scope.finish()?;
        debug!(
            "Built select over `{}` with {} columns and {} joins",
            source,
            query.select.len(),
            query.joins.len()
        );
        Ok(query)
    }
}

/// One-shot helper: select `fields` from `table`
pub fn compile_select<S: AsRef<str>>(
    db: &Database,
    table: &str,
    fields: &[S],
    max_joins: u32,
) -> Result<SelectQuery, SchemaError> {
    let mut builder = SelectBuilder::new(db, table)?.max_joins(max_joins);
    for field in fields {
        builder.select(field.as_ref())?;
    }
    builder.build()
}
