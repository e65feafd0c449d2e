//! Field metadata registry.
//!
//! Derives per-table column lists from a [`TableShape`] once and caches them
//! for the life of the registry. The registry is an ordinary value owned by
//! the application; share it behind an `Arc` to use it from many tasks.

use crate::engine::JsonRow;
use crate::error::{ShapeError, ShapeResult};
use crate::schema::{ModeFlags, SchemaFile, TableShape};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Which column list to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMode {
    Select,
    Insert,
    Update,
}

impl FromStr for ColumnMode {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Self::Select),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            other => Err(ShapeError::InvalidMode(other.to_string())),
        }
    }
}

/// One parsed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub column: String,
    pub flags: ModeFlags,
    pub insert_default: Option<String>,
}

/// Immutable column metadata for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
    /// Field name to column, for every non-linked field.
    pub field_columns: HashMap<String, String>,
    pub select: Vec<String>,
    pub insert: Vec<String>,
    pub insert_defaults: HashMap<String, String>,
    pub update: Vec<String>,
    /// Field name to join alias.
    pub linked: HashMap<String, String>,
}

impl TableMetadata {
    /// Derive the column lists from a shape, in declaration order.
    pub fn from_shape(table: &str, shape: &TableShape) -> Self {
        let mut meta = Self {
            table: table.to_string(),
            fields: Vec::new(),
            field_columns: HashMap::new(),
            select: Vec::new(),
            insert: Vec::new(),
            insert_defaults: HashMap::new(),
            update: Vec::new(),
            linked: HashMap::new(),
        };

        for field in &shape.fields {
            let Some(column) = field.mapped_column() else {
                continue;
            };
            let flags = ModeFlags::parse(&field.mode);
            meta.fields.push(FieldDescriptor {
                name: field.name.clone(),
                column: column.to_string(),
                flags,
                insert_default: field.default.clone(),
            });

            if flags.linked {
                meta.linked.insert(field.name.clone(), column.to_string());
                continue;
            }

            meta.field_columns
                .insert(field.name.clone(), column.to_string());

            if flags.skip {
                continue;
            }
            if flags.insert {
                meta.insert.push(column.to_string());
                if let Some(default) = field.default.as_ref().filter(|d| !d.is_empty()) {
                    meta.insert_defaults
                        .insert(column.to_string(), default.clone());
                }
            }
            if flags.update {
                meta.update.push(column.to_string());
            }
            meta.select.push(column.to_string());
        }

        meta
    }

    /// Column for a structural field name; linked fields have none.
    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.field_columns.get(field).map(String::as_str)
    }

    pub fn columns(&self, mode: ColumnMode) -> &[String] {
        match mode {
            ColumnMode::Select => &self.select,
            ColumnMode::Insert => &self.insert,
            ColumnMode::Update => &self.update,
        }
    }

    /// Fold `"<alias>.<column>"` keys of a fetched row under their linked field.
    ///
    /// A joined record whose columns are all NULL (no matching row) becomes
    /// NULL. Keys under an alias no linked field names are left flat.
    pub fn nest_row(&self, row: JsonRow) -> JsonRow {
        if self.linked.is_empty() {
            return row;
        }

        let mut nested: HashMap<&str, serde_json::Map<String, serde_json::Value>> = HashMap::new();
        let mut flat = JsonRow::with_capacity(row.len());

        for (key, value) in row {
            let target = key.split_once('.').and_then(|(alias, column)| {
                self.linked
                    .iter()
                    .find(|(_, linked_alias)| linked_alias.as_str() == alias)
                    .map(|(field, _)| (field.as_str(), column.to_string()))
            });
            match target {
                Some((field, column)) => {
                    nested.entry(field).or_default().insert(column, value);
                }
                None => {
                    flat.insert(key, value);
                }
            }
        }

        for (field, record) in nested {
            let value = if record.values().all(serde_json::Value::is_null) {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(record)
            };
            flat.insert(field.to_string(), value);
        }

        flat
    }
}

/// Double-quote an identifier, dropping any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', ""))
}

/// Rendered column list: SQL fragments plus the raw column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnList {
    pub fragments: Vec<String>,
    pub names: Vec<String>,
}

/// Thread-safe cache of table metadata, first registration wins.
#[derive(Debug, Default)]
pub struct Registry {
    tables: DashMap<String, Arc<TableMetadata>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table shape. A known table keeps its existing entry.
    pub fn register(&self, table: &str, shape: &TableShape) -> Arc<TableMetadata> {
        self.insert_if_absent(table, || TableMetadata::from_shape(table, shape))
    }

    /// Register lazily; `shape` is only called when the table is new.
    pub fn register_with<F>(&self, table: &str, shape: F) -> Arc<TableMetadata>
    where
        F: FnOnce() -> TableShape,
    {
        self.insert_if_absent(table, || TableMetadata::from_shape(table, &shape()))
    }

    /// Register a type's own shape under `table`.
    pub fn register_record<R: crate::schema::RecordShape>(&self, table: &str) -> Arc<TableMetadata> {
        self.register_with(table, R::shape)
    }

    /// Register every table of a schema file, returning how many tables it held.
    pub fn load_schema_file(&self, path: &Path) -> ShapeResult<usize> {
        let schema = SchemaFile::load(path)?;
        for def in &schema.tables {
            self.register_with(&def.name, || def.shape());
        }
        tracing::info!("Loaded {} table shapes from {}", schema.tables.len(), path.display());
        Ok(schema.tables.len())
    }

    fn insert_if_absent<F>(&self, table: &str, build: F) -> Arc<TableMetadata>
    where
        F: FnOnce() -> TableMetadata,
    {
        if let Some(existing) = self.tables.get(table) {
            tracing::debug!(table, "table already registered, keeping first shape");
            return Arc::clone(existing.value());
        }

        match self.tables.entry(table.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let meta = Arc::new(build());
                tracing::debug!(
                    table,
                    select = meta.select.len(),
                    insert = meta.insert.len(),
                    update = meta.update.len(),
                    "registered table"
                );
                Arc::clone(entry.insert(meta).value())
            }
        }
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Metadata for a table, if registered.
    pub fn get(&self, table: &str) -> Option<Arc<TableMetadata>> {
        self.tables.get(table).map(|m| Arc::clone(m.value()))
    }

    pub fn try_lookup(&self, table: &str) -> ShapeResult<Arc<TableMetadata>> {
        self.get(table)
            .ok_or_else(|| ShapeError::UnknownTable(table.to_string()))
    }

    /// Metadata for a registered table.
    ///
    /// # Panics
    ///
    /// Panics if the table was never registered.
    pub fn lookup(&self, table: &str) -> Arc<TableMetadata> {
        match self.try_lookup(table) {
            Ok(meta) => meta,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_columns(
        &self,
        table: &str,
        mode: ColumnMode,
        alias: Option<&str>,
    ) -> ShapeResult<ColumnList> {
        let meta = self.try_lookup(table)?;
        let mut list = ColumnList::default();

        for column in meta.columns(mode) {
            let fragment = match alias.filter(|a| !a.is_empty()) {
                Some(alias) if mode == ColumnMode::Select => {
                    let alias = alias.replace('"', "");
                    let column = column.replace('"', "");
                    format!("\"{alias}\".\"{column}\" AS \"{alias}.{column}\"")
                }
                _ => format!("{}.{}", quote_ident(table), quote_ident(column)),
            };
            list.fragments.push(fragment);
            list.names.push(column.clone());
        }

        Ok(list)
    }

    /// Render a column list for `mode`, optionally under a join alias.
    ///
    /// # Panics
    ///
    /// Panics if the table was never registered.
    pub fn columns(&self, table: &str, mode: ColumnMode, alias: Option<&str>) -> ColumnList {
        match self.try_columns(table, mode, alias) {
            Ok(list) => list,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn select_columns(&self, table: &str, alias: Option<&str>) -> ColumnList {
        self.columns(table, ColumnMode::Select, alias)
    }

    pub fn insert_columns(&self, table: &str) -> ColumnList {
        self.columns(table, ColumnMode::Insert, None)
    }

    pub fn update_columns(&self, table: &str) -> ColumnList {
        self.columns(table, ColumnMode::Update, None)
    }

    /// Default literals registered for insertable columns.
    pub fn insert_defaults(&self, table: &str) -> HashMap<String, String> {
        self.lookup(table).insert_defaults.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use std::thread;

    fn website() -> TableShape {
        TableShape::new()
            .field(FieldSpec::new("UUID").column("uuid").mode("i"))
            .field(FieldSpec::new("CreatedAt").column("created_at").mode("i").default_value("NOW()"))
            .field(FieldSpec::new("Domain").column("domain").mode("i,u"))
            .field(FieldSpec::new("Secret").column("secret").mode("s"))
            .field(FieldSpec::new("Realm").column("r").mode("l"))
            .field(FieldSpec::new("Scratch").column("-"))
            .field(FieldSpec::new("Transient"))
            .field(FieldSpec::new("RealmUUID").column("realm_uuid").mode("i"))
    }

    #[test]
    fn test_derived_lists() {
        let registry = Registry::new();
        let meta = registry.register("website", &website());

        assert_eq!(meta.select, vec!["uuid", "created_at", "domain", "realm_uuid"]);
        assert_eq!(meta.insert, vec!["uuid", "created_at", "domain", "realm_uuid"]);
        assert_eq!(meta.update, vec!["domain"]);
        assert_eq!(meta.insert_defaults.get("created_at").map(String::as_str), Some("NOW()"));
        assert_eq!(meta.linked.get("Realm").map(String::as_str), Some("r"));
        assert_eq!(meta.column_for("Secret"), Some("secret"));
        assert_eq!(meta.column_for("Realm"), None);
        assert_eq!(meta.fields.len(), 6);
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = Registry::new();
        let first = registry.register("website", &website());
        let second = registry.register_with("website", || panic!("shape consulted twice"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*registry.lookup("website"), *first);
    }

    #[test]
    fn test_render_without_alias() {
        let registry = Registry::new();
        registry.register("website", &website());
        let list = registry.update_columns("website");
        assert_eq!(list.fragments, vec![r#""website"."domain""#]);
        assert_eq!(list.names, vec!["domain"]);
    }

    #[test]
    fn test_render_with_alias() {
        let registry = Registry::new();
        registry.register("website", &website());
        let list = registry.select_columns("website", Some("w"));
        assert_eq!(list.fragments[0], r#""w"."uuid" AS "w.uuid""#);
        assert_eq!(list.fragments.len(), 4);
    }

    #[test]
    fn test_nest_row_groups_linked_columns() {
        let registry = Registry::new();
        let meta = registry.register("website", &website());

        let row: JsonRow = [
            ("uuid", serde_json::json!("w1")),
            ("domain", serde_json::json!("example.org")),
            ("r.uuid", serde_json::json!("r1")),
            ("r.name", serde_json::json!("North")),
            ("x.name", serde_json::json!("stray")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let nested = meta.nest_row(row);
        assert_eq!(nested["Realm"], serde_json::json!({"uuid": "r1", "name": "North"}));
        assert_eq!(nested["uuid"], serde_json::json!("w1"));
        assert_eq!(nested["x.name"], serde_json::json!("stray"));
        assert!(!nested.contains_key("r.uuid"));
    }

    #[test]
    fn test_nest_row_unmatched_join_is_null() {
        let registry = Registry::new();
        let meta = registry.register("website", &website());

        let row: JsonRow = [
            ("uuid".to_string(), serde_json::json!("w1")),
            ("r.uuid".to_string(), serde_json::Value::Null),
            ("r.name".to_string(), serde_json::Value::Null),
        ]
        .into_iter()
        .collect();

        assert_eq!(meta.nest_row(row)["Realm"], serde_json::Value::Null);
    }

    #[test]
    #[should_panic(expected = "Table not registered: 'ghost'")]
    fn test_lookup_unknown_panics() {
        Registry::new().lookup("ghost");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("insert".parse::<ColumnMode>().unwrap(), ColumnMode::Insert);
        assert!(matches!(
            "upsert".parse::<ColumnMode>(),
            Err(ShapeError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let shape = TableShape::new()
                        .field(FieldSpec::new("Id").column(format!("id_{i}")).mode("i"));
                    registry.register("race", &shape)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = registry.lookup("race");
        assert!(results.iter().all(|m| Arc::ptr_eq(m, &winner)));
    }
}
