//! YAML schema declaration.
//!
//! ```yaml
//! tables:
//!   - name: events
//!     source: events
//!     fields:
//!       - { name: uuid, type: string }
//!       - { name: properties, type: json }
//!     virtual_tables:
//!       - name: poe
//!         fields:
//!           - { name: id, type: string, column: person_id }
//!     lazy:
//!       - name: pdi
//!         table: person_distinct_ids
//!         from_field: distinct_id
//!         collapse: { source: person_distinct_id2, key: distinct_id }
//!     traversers:
//!       - { name: person_id, chain: [pdi, person_id] }
//!     computed:
//!       - { name: short_event, sql: "substring(event, 1, 10)" }
//!     exclude_from_splash: [uuid]
//! ```
//!
//! Attributes keep their declaration order within each list; lists are
//! applied in the order fields, virtual tables, lazy, traversers, computed.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::collapse::VersionedCollapse;
use super::computed_field::ComputedField;
use super::database::Database;
use super::errors::SchemaError;
use super::field::{FieldDescriptor, FieldKind};
use super::lazy_table::LazyTable;
use super::table::{Table, TableSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub tables: Vec<TableDefinition>,
}

/// A root table, or a nested table when listed under `virtual_tables`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// Physical warehouse table; omitted for virtual tables
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub virtual_tables: Vec<TableDefinition>,
    #[serde(default)]
    pub lazy: Vec<LazyDefinition>,
    #[serde(default)]
    pub traversers: Vec<TraverserDefinition>,
    #[serde(default)]
    pub computed: Vec<ComputedDefinition>,
    #[serde(default)]
    pub exclude_from_splash: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Physical column, defaults to `name`
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub array: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LazyDefinition {
    pub name: String,
    /// Target table in the database
    pub table: String,
    pub from_field: String,
    pub collapse: CollapseDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollapseDefinition {
    pub source: String,
    pub key: String,
    #[serde(default = "default_version_column")]
    pub version: String,
    #[serde(default = "default_deleted_column")]
    pub deleted: String,
}

fn default_version_column() -> String {
    "version".to_string()
}

fn default_deleted_column() -> String {
    "is_deleted".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverserDefinition {
    pub name: String,
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedDefinition {
    pub name: String,
    pub sql: String,
}

impl SchemaDefinition {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SchemaError::invalid_schema(format!(
                "cannot read schema file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SchemaError::invalid_schema(format!("cannot parse schema YAML: {}", e)))
    }

    pub fn into_database(self) -> Result<Arc<Database>, SchemaError> {
        if self.tables.is_empty() {
            return Err(SchemaError::invalid_schema(
                "schema must declare at least one table",
            ));
        }
        let mut builder = Database::builder();
        for definition in self.tables {
            builder = builder.add(definition.into_table()?);
        }
        builder.build()
    }
}

impl TableDefinition {
    fn into_table(self) -> Result<Table, SchemaError> {
        let source = match self.source {
            Some(source) => TableSource::Physical(source),
            None => TableSource::Virtual,
        };
        let mut builder = Table::builder(self.name, source);

        for field in self.fields {
            let column = field.column.unwrap_or_else(|| field.name.clone());
            let mut descriptor = FieldDescriptor::new(column, field.kind);
            if field.array {
                descriptor = descriptor.array();
            }
            builder = builder.field(field.name, descriptor);
        }
        for nested in self.virtual_tables {
            let name = nested.name.clone();
            builder = builder.table(name, nested.into_table()?);
        }
        for lazy in self.lazy {
            let collapse = VersionedCollapse::new(
                lazy.table.clone(),
                lazy.collapse.source,
                lazy.collapse.key,
            )
            .with_version_column(lazy.collapse.version)
            .with_deleted_column(lazy.collapse.deleted);
            builder = builder.lazy(
                lazy.name,
                LazyTable::new(lazy.from_field, lazy.table, Arc::new(collapse)),
            );
        }
        for traverser in self.traversers {
            builder = builder.traverser(traverser.name, traverser.chain.as_slice());
        }
        for computed in self.computed {
            builder = builder.computed(computed.name, ComputedField::raw(computed.sql));
        }
        for excluded in self.exclude_from_splash {
            builder = builder.exclude_from_splash(excluded);
        }
        builder.build()
    }
}
