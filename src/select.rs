//! SELECT statements with LEFT JOINs.
//!
//! Join conditions are spliced verbatim. Only pass literal identifiers and
//! operators there, never values that came from outside the program.

use crate::registry::{Registry, quote_ident};

/// A LEFT JOIN against another registered table.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: String,
}

impl Join {
    fn to_sql(&self) -> String {
        let target = if self.alias.is_empty() {
            quote_ident(&self.table)
        } else {
            format!("{} AS {}", quote_ident(&self.table), quote_ident(&self.alias))
        };
        format!("LEFT JOIN {} ON {}", target, self.on)
    }
}

/// Builds `SELECT <columns> FROM "<table>" [LEFT JOIN ...]*`.
#[derive(Debug, Clone)]
pub struct SelectBuilder<'r> {
    registry: &'r Registry,
    table: String,
    joins: Vec<Join>,
}

impl<'r> SelectBuilder<'r> {
    pub fn new(registry: &'r Registry, table: impl Into<String>) -> Self {
        Self {
            registry,
            table: table.into(),
            joins: Vec::new(),
        }
    }

    /// Append a LEFT JOIN; joins are emitted in the order added.
    pub fn left(mut self, table: impl Into<String>, alias: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            table: table.into(),
            alias: alias.into(),
            on: on.into(),
        });
        self
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Render the statement.
    ///
    /// # Panics
    ///
    /// Panics if the base table or any joined table is unregistered.
    pub fn build(&self) -> String {
        let mut columns = self.registry.select_columns(&self.table, None).fragments;
        for join in &self.joins {
            let alias = Some(join.alias.as_str()).filter(|a| !a.is_empty());
            columns.extend(self.registry.select_columns(&join.table, alias).fragments);
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(&self.table)
        );
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }
        sql
    }
}

impl Registry {
    /// Start a SELECT on `table`.
    pub fn select(&self, table: impl Into<String>) -> SelectBuilder<'_> {
        SelectBuilder::new(self, table)
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
                .field(FieldSpec::new("Name").column("name").mode("i,u")),
        );
        registry.register(
            "website",
            &TableShape::new()
                .field(FieldSpec::new("UUID").column("uuid").mode("i"))
                .field(FieldSpec::new("Realm").column("r").mode("l"))
                .field(FieldSpec::new("RealmUUID").column("realm_uuid").mode("i")),
        );
        registry
    }

    #[test]
    fn test_select_base() {
        let registry = registry();
        assert_eq!(
            registry.select("realm").build(),
            r#"SELECT "realm"."uuid", "realm"."name" FROM "realm""#
        );
    }

    #[test]
    fn test_select_with_left_join() {
        let registry = registry();
        let sql = registry
            .select("website")
            .left("realm", "r", "website.realm_uuid = r.uuid")
            .build();
        assert_eq!(
            sql,
            concat!(
                r#"SELECT "website"."uuid", "website"."realm_uuid", "#,
                r#""r"."uuid" AS "r.uuid", "r"."name" AS "r.name" "#,
                r#"FROM "website" LEFT JOIN "realm" AS "r" ON website.realm_uuid = r.uuid"#
            )
        );
    }

    #[test]
    fn test_join_order_preserved() {
        let registry = registry();
        let builder = registry
            .select("website")
            .left("realm", "a", "true")
            .left("realm", "b", "true");
        let sql = builder.build();
        assert!(sql.find(r#"AS "a" ON"#).unwrap() < sql.find(r#"AS "b" ON"#).unwrap());
        assert_eq!(builder.joins().len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_unregistered_join_panics() {
        registry().select("website").left("ghost", "g", "true").build();
    }
}
