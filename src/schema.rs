//! Declarative record shapes.
//!
//! A record shape lists a table's fields in declaration order, each with the
//! column it maps to and a mode string. Shapes are built in code, provided by a
//! [`RecordShape`] impl, or loaded from a TOML/JSON schema file.
//!
//! # Example
//! ```
//! use sqlshape::schema::SchemaFile;
//!
//! let toml = r#"
//!     [[tables]]
//!     name = "realm"
//!     fields = [
//!         { name = "UUID", column = "uuid", mode = "i" },
//!         { name = "CreatedAt", column = "created_at", mode = "i", default = "NOW()" },
//!         { name = "Name", column = "name", mode = "i,u" },
//!     ]
//! "#;
//!
//! let schema = SchemaFile::from_toml(toml).unwrap();
//! assert_eq!(schema.tables[0].fields.len(), 3);
//! ```

use crate::error::{ShapeError, ShapeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column value that marks a field as ignored.
pub const IGNORE_COLUMN: &str = "-";

/// How a field participates in generated statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub insert: bool,
    pub update: bool,
    pub skip: bool,
    pub linked: bool,
}

impl ModeFlags {
    /// Parse a comma separated mode string such as `"i,u"`.
    ///
    /// Unknown tokens are ignored.
    pub fn parse(mode: &str) -> Self {
        let mut flags = Self::default();
        for token in mode.split(',').map(str::trim) {
            match token {
                "i" | "insert" => flags.insert = true,
                "u" | "update" => flags.update = true,
                "s" | "skip" => flags.skip = true,
                "l" | "link" | "linked" => flags.linked = true,
                _ => {}
            }
        }
        flags
    }

    /// Selectable unless skipped or join-only.
    pub fn selectable(&self) -> bool {
        !self.skip && !self.linked
    }
}

/// One declared field of a record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Structural field name, used as the key in filters and sorts.
    pub name: String,
    /// Column name; for linked fields this is the join alias.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub mode: String,
    /// Literal used by INSERT when the caller supplies no value.
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            mode: String::new(),
            default: None,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// The mapped column, or `None` when the field is ignored.
    pub fn mapped_column(&self) -> Option<&str> {
        match self.column.as_deref() {
            None | Some("") | Some(IGNORE_COLUMN) => None,
            Some(col) => Some(col),
        }
    }
}

/// Ordered field list describing one record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableShape {
    pub fields: Vec<FieldSpec>,
}

impl TableShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping declaration order.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}

/// Types that can describe their own shape.
///
/// ```
/// use sqlshape::schema::{FieldSpec, RecordShape, TableShape};
///
/// struct Realm;
///
/// impl RecordShape for Realm {
///     fn shape() -> TableShape {
///         TableShape::new()
///             .field(FieldSpec::new("UUID").column("uuid").mode("i"))
///             .field(FieldSpec::new("Name").column("name").mode("i,u"))
///     }
/// }
///
/// assert_eq!(Realm::shape().fields.len(), 2);
/// ```
pub trait RecordShape {
    fn shape() -> TableShape;
}

/// A named table inside a schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl TableDef {
    pub fn shape(&self) -> TableShape {
        TableShape {
            fields: self.fields.clone(),
        }
    }
}

/// Schema file holding several table shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub tables: Vec<TableDef>,
}

impl SchemaFile {
    pub fn from_toml(text: &str) -> ShapeResult<Self> {
        toml::from_str(text).map_err(|e| ShapeError::Schema(e.to_string()))
    }

    pub fn from_json(text: &str) -> ShapeResult<Self> {
        serde_json::from_str(text).map_err(|e| ShapeError::Schema(e.to_string()))
    }

    /// Load a schema file; `.json` is parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> ShapeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_toml(&text),
        }
    }
}
