//! Startup validation of a [`Database`].
//!
//! Everything checked here would otherwise only fail when the first query
//! touches the broken attribute:
//!
//! - table, attribute and column names are plain identifiers
//! - lazy relations land on a registered table, join from a column of the
//!   owning table, and collapse the target's own physical table by a column
//!   the target declares
//! - nested tables read from their parent's physical table
//! - every traverser and computed field resolves (surfacing cycles and
//!   malformed fragments)

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use super::database::Database;
use super::errors::SchemaError;
use super::lazy_table::LazyTable;
use super::table::{Attribute, Table, TableSource};
use crate::query_builder::QueryScope;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

/// Counts gathered while validating, logged once at the end
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub tables: usize,
    pub fields: usize,
    pub lazy_relations: usize,
    pub traversers: usize,
    pub computed_fields: usize,
}

pub struct SchemaValidator {
    max_joins: u32,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        SchemaValidator { max_joins: u32::MAX }
    }

    /// Also fail traversers and computed fields that need more joins than
    /// a query is allowed
    pub fn with_max_joins(mut self, max_joins: u32) -> Self {
        self.max_joins = max_joins;
        self
    }

    pub fn validate(&self, db: &Database) -> Result<ValidationSummary, SchemaError> {
        let mut summary = ValidationSummary::default();
        for (name, table) in db.tables() {
            check_identifier(name, "table")?;
            self.validate_table(db, name, table, "", table.physical_source(), &mut summary)?;
            table.splash()?;
            summary.tables += 1;
        }
        info!(
            "Schema validated: {} tables, {} fields, {} lazy relations, {} traversers, {} computed fields",
            summary.tables,
            summary.fields,
            summary.lazy_relations,
            summary.traversers,
            summary.computed_fields
        );
        Ok(summary)
    }

    /// `prefix` is the dotted path from the root table to `table`.
    fn validate_table(
        &self,
        db: &Database,
        root: &str,
        table: &Table,
        prefix: &str,
        source: Option<&str>,
        summary: &mut ValidationSummary,
    ) -> Result<(), SchemaError> {
        for (name, attr) in table.attributes() {
            check_identifier(name, "attribute")?;
            let path = format!("{}{}", prefix, name);
            match attr {
                Attribute::Field(field) => {
                    check_identifier(&field.name, "column")?;
                    summary.fields += 1;
                }
                Attribute::Table(nested) => {
                    let nested_source = match nested.source() {
                        TableSource::Virtual => source,
                        TableSource::Physical(s) if Some(s.as_str()) == source => source,
                        TableSource::Physical(s) => {
                            return Err(SchemaError::invalid_schema(format!(
                                "nested table `{}.{}` reads from `{}`; declare it as a lazy table",
                                root, path, s
                            )));
                        }
                    };
                    self.validate_table(
                        db,
                        root,
                        nested,
                        &format!("{}.", path),
                        nested_source,
                        summary,
                    )?;
                }
                Attribute::Lazy(lazy) => {
                    validate_lazy(db, table, name, lazy)?;
                    summary.lazy_relations += 1;
                }
                Attribute::Traverser(_) => {
                    self.dry_run(db, root, &path)?;
                    summary.traversers += 1;
                }
                Attribute::Computed(_) => {
                    self.dry_run(db, root, &path)?;
                    summary.computed_fields += 1;
                }
            }
        }
        Ok(())
    }

    fn dry_run(&self, db: &Database, root: &str, path: &str) -> Result<(), SchemaError> {
        debug!("Dry-run resolving {}.{}", root, path);
        let chain: Vec<&str> = path.split('.').collect();
        QueryScope::new(db, root)?
            .with_max_joins(self.max_joins)
            .probe(&chain)
            .map_err(|e| match e {
                SchemaError::FieldNotFound { table, field } => {
                    SchemaError::field_not_found_with_context(
                        table,
                        field,
                        format!("resolving {}.{}", root, path),
                    )
                }
                other => other,
            })
    }
}

fn check_identifier(name: &str, what: &str) -> Result<(), SchemaError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::invalid_schema(format!(
            "{} name `{}` is not a valid identifier",
            what, name
        )))
    }
}

fn validate_lazy(
    db: &Database,
    owner: &Table,
    name: &str,
    lazy: &LazyTable,
) -> Result<(), SchemaError> {
    let relation = format!("{}.{}", owner.name(), name);
    let target = db.get_table(&lazy.table).map_err(|_| {
        SchemaError::invalid_schema(format!(
            "lazy table `{}` points at unknown table `{}`",
            relation, lazy.table
        ))
    })?;

    match owner.get_field(&lazy.from_field) {
        Ok(Attribute::Field(_)) => {}
        Ok(other) => {
            return Err(SchemaError::invalid_schema(format!(
                "lazy table `{}` joins on `{}`, which is a {}",
                relation,
                lazy.from_field,
                other.kind_name()
            )));
        }
        Err(_) => {
            return Err(SchemaError::invalid_schema(format!(
                "lazy table `{}` joins on missing field `{}`",
                relation, lazy.from_field
            )));
        }
    }

    let builder = &lazy.join_builder;
    if target.physical_source() != Some(builder.physical_source()) {
        return Err(SchemaError::invalid_schema(format!(
            "lazy table `{}` collapses `{}` but `{}` reads from `{}`",
            relation,
            builder.physical_source(),
            lazy.table,
            target.physical_source().unwrap_or("<virtual>")
        )));
    }

    let key_declared = target.attributes().any(|(_, attr)| {
        matches!(attr, Attribute::Field(field) if field.name == builder.key_column())
    });
    if !key_declared {
        return Err(SchemaError::invalid_schema(format!(
            "lazy table `{}` collapses by `{}`, which `{}` does not declare",
            relation,
            builder.key_column(),
            lazy.table
        )));
    }
    Ok(())
}
