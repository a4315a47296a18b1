use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::computed_field::ComputedField;
use super::errors::SchemaError;
use super::field::FieldDescriptor;
use super::lazy_table::LazyTable;

/// Where a table's columns physically live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// Reads from this warehouse table
    Physical(String),
    /// Columns live on the parent's row; no join is ever generated
    Virtual,
}

/// Alias that redirects an attribute access through a chain of attributes
/// resolved from the same starting table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTraverser {
    pub chain: Vec<String>,
}

impl FieldTraverser {
    pub fn new<S: AsRef<str>>(chain: &[S]) -> Self {
        FieldTraverser {
            chain: chain.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// One named attribute of a table
#[derive(Debug, Clone)]
pub enum Attribute {
    Field(FieldDescriptor),
    /// Nested table read through the parent's alias (virtual or same source)
    Table(Arc<Table>),
    Lazy(LazyTable),
    Traverser(FieldTraverser),
    Computed(ComputedField),
}

impl Attribute {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Attribute::Field(_) => "field",
            Attribute::Table(_) => "table",
            Attribute::Lazy(_) => "lazy table",
            Attribute::Traverser(_) => "field traverser",
            Attribute::Computed(_) => "computed field",
        }
    }
}

/// Named, ordered mapping of attributes. Built once through [`TableBuilder`]
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    source: TableSource,
    attributes: Vec<(String, Attribute)>,
    index: HashMap<String, usize>,
    splash_excluded: HashSet<String>,
}

impl Table {
    pub fn builder(name: impl Into<String>, source: TableSource) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            source,
            attributes: Vec::new(),
            splash_excluded: Vec::new(),
        }
    }

    /// Builder for a table reading from `physical_source`
    pub fn physical(name: impl Into<String>, physical_source: impl Into<String>) -> TableBuilder {
        Self::builder(name, TableSource::Physical(physical_source.into()))
    }

    /// Builder for a table whose columns live on the parent row
    pub fn virtual_table(name: impl Into<String>) -> TableBuilder {
        Self::builder(name, TableSource::Virtual)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    /// Physical warehouse table, `None` for virtual tables
    pub fn physical_source(&self) -> Option<&str> {
        match &self.source {
            TableSource::Physical(name) => Some(name),
            TableSource::Virtual => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.source == TableSource::Virtual
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> Result<&Attribute, SchemaError> {
        self.index
            .get(name)
            .map(|&i| &self.attributes[i].1)
            .ok_or_else(|| SchemaError::FieldNotFound {
                table: self.name.clone(),
                field: name.to_string(),
            })
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    pub fn is_splash_excluded(&self, name: &str) -> bool {
        self.splash_excluded.contains(name)
    }

    /// Expand every leaf reachable without a join into dotted paths relative
    /// to this table, for `SELECT *`.
    ///
    /// Lazy tables are skipped and so are traversers (they alias attributes
    /// reachable elsewhere). Computed fields are kept, so one whose body
    /// crosses a lazy relation still joins it unless excluded.
    pub fn splash(&self) -> Result<Vec<String>, SchemaError> {
        let mut out = Vec::new();
        self.splash_into("", self.physical_source(), &mut out)?;
        Ok(out)
    }

    fn splash_into(
        &self,
        prefix: &str,
        source: Option<&str>,
        out: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        for (name, attr) in &self.attributes {
            if self.splash_excluded.contains(name) {
                continue;
            }
            let path = format!("{}{}", prefix, name);
            match attr {
                Attribute::Field(_) | Attribute::Computed(_) => out.push(path),
                Attribute::Table(nested) => {
                    let nested_source = match nested.source() {
                        TableSource::Virtual => source,
                        TableSource::Physical(s) if Some(s.as_str()) == source => source,
                        TableSource::Physical(s) => {
                            return Err(SchemaError::UnsupportedSplashField {
                                table: self.name.clone(),
                                field: name.clone(),
                                reason: format!(
                                    "nested table reads from `{}`, not the parent's source",
                                    s
                                ),
                            });
                        }
                    };
                    nested.splash_into(&format!("{}.", path), nested_source, out)?;
                }
                Attribute::Lazy(_) | Attribute::Traverser(_) => {}
            }
        }
        Ok(())
    }
}

pub struct TableBuilder {
    name: String,
    source: TableSource,
    attributes: Vec<(String, Attribute)>,
    splash_excluded: Vec<String>,
}

impl TableBuilder {
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.push((name.into(), attribute));
        self
    }

    pub fn field(self, name: impl Into<String>, field: FieldDescriptor) -> Self {
        self.attribute(name, Attribute::Field(field))
    }

    /// Field whose attribute name equals its column name
    pub fn column(self, field: FieldDescriptor) -> Self {
        let name = field.name.clone();
        self.attribute(name, Attribute::Field(field))
    }

    pub fn table(self, name: impl Into<String>, table: Table) -> Self {
        self.attribute(name, Attribute::Table(Arc::new(table)))
    }

    pub fn lazy(self, name: impl Into<String>, lazy: LazyTable) -> Self {
        self.attribute(name, Attribute::Lazy(lazy))
    }

    pub fn traverser<S: AsRef<str>>(self, name: impl Into<String>, chain: &[S]) -> Self {
        self.attribute(name, Attribute::Traverser(FieldTraverser::new(chain)))
    }

    pub fn computed(self, name: impl Into<String>, field: ComputedField) -> Self {
        self.attribute(name, Attribute::Computed(field))
    }

    pub fn exclude_from_splash(mut self, name: impl Into<String>) -> Self {
        self.splash_excluded.push(name.into());
        self
    }

    pub fn build(self) -> Result<Table, SchemaError> {
        let mut index = HashMap::with_capacity(self.attributes.len());
        for (i, (name, attr)) in self.attributes.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::invalid_schema(format!(
                    "duplicate attribute `{}` on table `{}`",
                    name, self.name
                )));
            }
            if let Attribute::Traverser(traverser) = attr {
                if traverser.chain.is_empty() {
                    return Err(SchemaError::invalid_schema(format!(
                        "traverser `{}.{}` has an empty chain",
                        self.name, name
                    )));
                }
            }
        }

        let mut splash_excluded = HashSet::new();
        for name in self.splash_excluded {
            if !index.contains_key(&name) {
                return Err(SchemaError::invalid_schema(format!(
                    "cannot exclude unknown attribute `{}` from splash of `{}`",
                    name, self.name
                )));
            }
            splash_excluded.insert(name);
        }

        Ok(Table {
            name: self.name,
            source: self.source,
            attributes: self.attributes,
            index,
            splash_excluded,
        })
    }
}
