//! INSERT and UPDATE statements from registered column lists.

use std::collections::HashMap;

use crate::error::{ShapeError, ShapeResult};
use crate::filter::CompiledQuery;
use crate::registry::{Registry, quote_ident};
use crate::value::Value;

/// Column name to value supplied by the caller.
pub type Values = HashMap<String, Value>;

/// Default literals spliced into the statement as-is.
///
/// Any other default text is bound as a parameter.
pub const SQL_KEYWORD_DEFAULTS: [&str; 5] = ["NOW()", "NULL", "true", "false", "DEFAULT"];

pub fn is_sql_keyword_default(literal: &str) -> bool {
    SQL_KEYWORD_DEFAULTS.contains(&literal)
}

impl Registry {
    /// Build `INSERT INTO "<table>" (...) VALUES (...) [RETURNING "<col>"]`.
    ///
    /// Every insertable column appears in declaration order. A column missing
    /// from `values` takes its registered default, or `DEFAULT` when it has none.
    /// A [`Value::Null`] is written as a literal `NULL` so it fits any column type.
    ///
    /// # Panics
    ///
    /// Panics if the table was never registered.
    pub fn insert_query(&self, table: &str, values: &Values, returning: Option<&str>) -> CompiledQuery {
        let meta = self.lookup(table);

        let mut columns = Vec::with_capacity(meta.insert.len());
        let mut placeholders = Vec::with_capacity(meta.insert.len());
        let mut args = Vec::new();

        for column in &meta.insert {
            columns.push(quote_ident(column));
            if let Some(Value::Null) = values.get(column) {
                placeholders.push("NULL".to_string());
            } else if let Some(value) = values.get(column) {
                args.push(value.clone());
                placeholders.push(format!("${}", args.len()));
            } else if let Some(default) = meta.insert_defaults.get(column) {
                if is_sql_keyword_default(default) {
                    placeholders.push(default.clone());
                } else {
                    args.push(Value::Text(default.clone()));
                    placeholders.push(format!("${}", args.len()));
                }
            } else {
                placeholders.push("DEFAULT".to_string());
            }
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(returning) = returning.filter(|r| !r.is_empty()) {
            sql.push_str(" RETURNING ");
            sql.push_str(&quote_ident(returning));
        }

        CompiledQuery { sql, args }
    }

    /// Build `UPDATE "<table>" SET ... WHERE "<key>" = $N RETURNING "<key>"`.
    ///
    /// Only updatable columns present in `values` are assigned; the key
    /// column's value binds last. [`Value::Null`] assigns a literal `NULL`.
    pub fn try_update_query(&self, table: &str, values: &Values, key: &str) -> ShapeResult<CompiledQuery> {
        let meta = self.try_lookup(table)?;

        let mut assignments = Vec::new();
        let mut args = Vec::new();
        for column in &meta.update {
            match values.get(column) {
                Some(Value::Null) => assignments.push(format!("{} = NULL", quote_ident(column))),
                Some(value) => {
                    args.push(value.clone());
                    assignments.push(format!("{} = ${}", quote_ident(column), args.len()));
                }
                None => {}
            }
        }

        if assignments.is_empty() {
            return Err(ShapeError::NothingToUpdate {
                table: table.to_string(),
            });
        }
        let Some(key_value) = values.get(key) else {
            return Err(ShapeError::missing_key(table, key));
        };
        args.push(key_value.clone());

        let key = quote_ident(key);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
            quote_ident(table),
            assignments.join(", "),
            key,
            args.len(),
            key
        );

        Ok(CompiledQuery { sql, args })
    }

    /// Like [`Registry::try_update_query`], for callers that treat a bad value map as a bug.
    ///
    /// # Panics
    ///
    /// Panics if the table is unregistered, no updatable column is present,
    /// or the key value is missing.
    pub fn update_query(&self, table: &str, values: &Values, key: &str) -> CompiledQuery {
        match self.try_update_query(table, values, key) {
            Ok(query) => query,
            Err(e) => panic!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, TableShape};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            "realm",
            &TableShape::new()
                .field(FieldSpec::new("UUID").column("uuid").mode("i"))
                .field(FieldSpec::new("CreatedAt").column("created_at").mode("i").default_value("NOW()"))
                .field(FieldSpec::new("Kind").column("kind").mode("i,u").default_value("basic"))
                .field(FieldSpec::new("Name").column("name").mode("i,u"))
                .field(FieldSpec::new("Note").column("note").mode("i,u").default_value("NULL")),
        );
        registry
    }

    fn values(pairs: &[(&str, Value)]) -> Values {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_insert_defaults() {
        let query = registry().insert_query(
            "realm",
            &values(&[("uuid", "u1".into()), ("name", "n".into())]),
            Some("uuid"),
        );
        assert_eq!(
            query.sql,
            r#"INSERT INTO "realm" ("uuid", "created_at", "kind", "name", "note") VALUES ($1, NOW(), $2, $3, NULL) RETURNING "uuid""#
        );
        assert_eq!(query.args, vec![Value::from("u1"), Value::from("basic"), Value::from("n")]);
    }

    #[test]
    fn test_insert_bare_default() {
        let query = registry().insert_query("realm", &Values::new(), None);
        assert!(query.sql.starts_with(r#"INSERT INTO "realm""#));
        assert!(query.sql.ends_with("VALUES (DEFAULT, NOW(), $1, DEFAULT, NULL)"));
        assert_eq!(query.args, vec![Value::from("basic")]);
    }

    #[test]
    fn test_keyword_defaults() {
        assert!(is_sql_keyword_default("NOW()"));
        assert!(!is_sql_keyword_default("now()"));
        assert!(!is_sql_keyword_default("1); DROP TABLE realm; --"));
    }

    #[test]
    fn test_update() {
        let query = registry().update_query(
            "realm",
            &values(&[("uuid", "u1".into()), ("note", Value::Null), ("name", "n".into())]),
            "uuid",
        );
        assert_eq!(
            query.sql,
            r#"UPDATE "realm" SET "name" = $1, "note" = NULL WHERE "uuid" = $2 RETURNING "uuid""#
        );
        assert_eq!(query.args, vec![Value::from("n"), Value::from("u1")]);
    }

    #[test]
    fn test_insert_null_value_is_literal() {
        let query = registry().insert_query(
            "realm",
            &values(&[("uuid", "u1".into()), ("kind", Value::Null), ("name", "n".into())]),
            None,
        );
        assert!(query.sql.ends_with("VALUES ($1, NOW(), NULL, $2, NULL)"));
        assert_eq!(query.args, vec![Value::from("u1"), Value::from("n")]);
        assert!(!query.args.contains(&Value::Null));
    }

    #[test]
    fn test_update_without_assignments() {
        let err = registry()
            .try_update_query("realm", &values(&[("uuid", "u1".into())]), "uuid")
            .unwrap_err();
        assert!(matches!(err, ShapeError::NothingToUpdate { .. }));
    }

    #[test]
    #[should_panic(expected = "Key column 'uuid' not found")]
    fn test_update_missing_key_panics() {
        registry().update_query("realm", &values(&[("name", "n".into())]), "uuid");
    }
}
