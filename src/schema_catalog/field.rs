use serde::{Deserialize, Serialize};

/// Semantic type of a warehouse column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Float,
    String,
    /// JSON object stored as a string column (`properties`)
    #[serde(alias = "json")]
    JsonString,
    #[serde(alias = "datetime")]
    DateTime,
    Date,
    Boolean,
}

/// Leaf schema element: one physical column.
///
/// Descriptors never point back at their owning table; the attribute key a
/// table stores them under is the logical name, `name` is the physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub is_array: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDescriptor {
            name: name.into(),
            kind,
            is_array: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::JsonString)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Same column, as an array of `kind`
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Whether a chain may continue past this field as a JSON property path
    pub fn supports_property_access(&self) -> bool {
        self.kind == FieldKind::JsonString && !self.is_array
    }
}
