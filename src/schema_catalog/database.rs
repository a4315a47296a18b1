//! Database registry: the immutable set of root tables.
//!
//! A [`Database`] is built once at startup through [`DatabaseBuilder`] and
//! handed out as `Arc<Database>`. It exposes no mutating methods, so any
//! number of query compilations can read it concurrently without locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::SchemaError;
use super::table::{Table, TableSource};

#[derive(Debug)]
pub struct Database {
    tables: BTreeMap<String, Table>,
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder {
            tables: Vec::new(),
        }
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get_table(&self, name: &str) -> Result<&Table, SchemaError> {
        self.tables.get(name).ok_or_else(|| SchemaError::TableNotFound {
            table: name.to_string(),
        })
    }

    /// Root table names in sorted order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }
}

pub struct DatabaseBuilder {
    tables: Vec<(String, Table)>,
}

impl DatabaseBuilder {
    pub fn table(mut self, name: impl Into<String>, table: Table) -> Self {
        self.tables.push((name.into(), table));
        self
    }

    /// Register a table under its own name
    pub fn add(self, table: Table) -> Self {
        let name = table.name().to_string();
        self.table(name, table)
    }

    pub fn build(self) -> Result<Arc<Database>, SchemaError> {
        let mut tables = BTreeMap::new();
        for (name, table) in self.tables {
            if table.source() == &TableSource::Virtual {
                return Err(SchemaError::invalid_schema(format!(
                    "root table `{}` has no physical source",
                    name
                )));
            }
            if tables.contains_key(&name) {
                return Err(SchemaError::invalid_schema(format!(
                    "table `{}` registered twice",
                    name
                )));
            }
            tables.insert(name, table);
        }
        log::debug!("Built database with {} tables", tables.len());
        Ok(Arc::new(Database { tables }))
    }
}
