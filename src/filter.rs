//! Filter and sort compilation.
//!
//! Turns a generic filter/sort description into a `WHERE` / `ORDER BY` /
//! `LIMIT` / `OFFSET` suffix plus the positional arguments it references.
//!
//! # Filter keys
//!
//! ```text
//! Name              Name = $N
//! Age[$gt]          Age > $N
//! Tags[$in]         Tags = ANY($N)
//! Email[€eq]        LOWER(Email) = $N   (value lower-cased when textual)
//! ```
//!
//! Keys naming a field the table does not have are dropped without error, so
//! callers may pass a superset of filters. Placeholders are numbered in the
//! insertion order of the [`Filter`].

use nom::{
    IResult,
    bytes::complete::take_till,
    character::complete::char,
    combinator::opt,
    sequence::{pair, preceded, terminated},
};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::marker::PhantomData;

use crate::count::Page;
use crate::error::{ShapeError, ShapeResult};
use crate::registry::{Registry, quote_ident};
use crate::value::Value;

/// Marker selecting case-insensitive comparison, e.g. `name[€like]`.
pub const CASE_INSENSITIVE_MARKER: char = '€';

/// Insertion-ordered key/value list with map semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordered<V> {
    entries: Vec<(String, V)>,
}

/// Filter key (`field` or `field[op]`) to value.
pub type Filter = Ordered<Value>;

/// Field name to direction (`asc` / `desc`, any case).
pub type Sort = Ordered<String>;

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> Ordered<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<V>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<V>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Ordered<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = Ordered::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Comparison selected by a filter key's operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Prefix,
    Suffix,
    In,
    NotIn,
}

impl Operator {
    /// Map a token (without the case marker) to an operator.
    ///
    /// A leading `$` is optional; unknown tokens compare for equality.
    pub fn from_token(token: &str) -> Self {
        match token.strip_prefix('$').unwrap_or(token) {
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "prefix" => Self::Prefix,
            "suffix" => Self::Suffix,
            "in" => Self::In,
            "nin" => Self::NotIn,
            _ => Self::Eq,
        }
    }

    /// Render `<lhs> <op> $n`.
    ///
    /// Prefix and suffix match the same as like; wildcards belong in the value.
    pub fn render(&self, lhs: &str, n: usize) -> String {
        match self {
            Self::Eq => format!("{lhs} = ${n}"),
            Self::Ne => format!("{lhs} != ${n}"),
            Self::Gt => format!("{lhs} > ${n}"),
            Self::Gte => format!("{lhs} >= ${n}"),
            Self::Lt => format!("{lhs} < ${n}"),
            Self::Lte => format!("{lhs} <= ${n}"),
            Self::Like | Self::Prefix | Self::Suffix => format!("{lhs} LIKE ${n}"),
            Self::In => format!("{lhs} = ANY(${n})"),
            Self::NotIn => format!("{lhs} != ALL(${n})"),
        }
    }

    pub fn takes_array(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// A filter key split into field name and operator.
///
/// The `€` marker is accepted in front of every operator, not only the
/// equality and like family: `Age[€gt]` renders `LOWER(age) > $N` and
/// `Tags[€in]` still coerces its value to an array for `= ANY($N)`. Only
/// `Text` values are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey<'a> {
    pub field: &'a str,
    pub op: Operator,
    pub case_insensitive: bool,
}

/// Parse `field` or `field[token]`; a missing closing bracket is tolerated.
fn parse_key(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        take_till(|c: char| c == '['),
        opt(preceded(
            char('['),
            terminated(take_till(|c: char| c == ']'), opt(char(']'))),
        )),
    )(input)
}

impl<'a> FilterKey<'a> {
    pub fn parse(key: &'a str) -> Self {
        let (field, token) = match parse_key(key) {
            Ok((_, parsed)) => parsed,
            Err(_) => (key, None),
        };
        let token = token.unwrap_or("");
        let (token, case_insensitive) = match token.strip_prefix(CASE_INSENSITIVE_MARKER) {
            Some(rest) => (rest, true),
            None => (token, false),
        };

        Self {
            field,
            op: Operator::from_token(token),
            case_insensitive,
        }
    }
}

/// Compiled statement text and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Compiles filter, sort and page onto a base SELECT for one table.
///
/// ```
/// use sqlshape::prelude::*;
///
/// let registry = Registry::new();
/// registry.register(
///     "person",
///     &TableShape::new()
///         .field(FieldSpec::new("age").column("age").mode("i,u"))
///         .field(FieldSpec::new("name").column("name").mode("i,u")),
/// );
///
/// let query = FilterQuery::new(&registry, "person")
///     .filter(Filter::new().with("age[$gt]", 18))
///     .sort(Sort::new().with("name", "desc"))
///     .page(Page::new(1, 10))
///     .compile(r#"SELECT * FROM "person""#)
///     .unwrap();
///
/// assert_eq!(
///     query.sql,
///     r#"SELECT * FROM "person" WHERE "person"."age" > $1 ORDER BY "person"."name" DESC LIMIT 10 OFFSET 0"#
/// );
/// assert_eq!(query.args, vec![Value::Int(18)]);
/// ```
#[derive(Debug, Clone)]
pub struct FilterQuery<'r> {
    registry: &'r Registry,
    table: String,
    alias: Option<String>,
    filter: Filter,
    sort: Sort,
    page: Page,
}

impl<'r> FilterQuery<'r> {
    pub fn new(registry: &'r Registry, table: impl Into<String>) -> Self {
        Self {
            registry,
            table: table.into(),
            alias: None,
            filter: Filter::new(),
            sort: Sort::new(),
            page: Page::default(),
        }
    }

    /// Qualify columns with `alias` instead of the table name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    /// Append WHERE, ORDER BY, LIMIT and OFFSET to `base`.
    ///
    /// # Panics
    ///
    /// Panics if the table was never registered.
    pub fn compile(&self, base: &str) -> ShapeResult<CompiledQuery> {
        let meta = self.registry.lookup(&self.table);
        let qualifier = quote_ident(self.alias.as_deref().unwrap_or(&self.table));

        let mut conditions = Vec::new();
        let mut args = Vec::new();

        for (key, value) in self.filter.iter() {
            let key = FilterKey::parse(key);
            let Some(column) = meta.column_for(key.field) else {
                tracing::trace!(table = %self.table, field = key.field, "ignoring unknown filter field");
                continue;
            };

            let column_ref = format!("{}.{}", qualifier, quote_ident(column));
            let mut value = value.clone();
            let lhs = if key.case_insensitive {
                value = value.lowercased();
                format!("LOWER({})", column_ref)
            } else {
                column_ref
            };
            if key.op.takes_array() {
                value = value.into_array();
            }

            args.push(value);
            conditions.push(key.op.render(&lhs, args.len()));
        }

        let mut sql = base.to_string();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let mut order = Vec::new();
        for (field, direction) in self.sort.iter() {
            let direction = normalize_direction(direction)?;
            match meta.column_for(field) {
                Some(column) => {
                    order.push(format!("{}.{} {}", qualifier, quote_ident(column), direction))
                }
                None => {
                    tracing::trace!(table = %self.table, field, "ignoring unknown sort field");
                }
            }
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        sql.push_str(&self.page.limit_offset());

        Ok(CompiledQuery { sql, args })
    }
}

/// Normalize a sort direction to `ASC` or `DESC`.
pub fn normalize_direction(direction: &str) -> ShapeResult<&'static str> {
    match direction.trim().to_ascii_uppercase().as_str() {
        "ASC" => Ok("ASC"),
        "DESC" => Ok("DESC"),
        _ => Err(ShapeError::InvalidSortOrder(direction.to_string())),
    }
}

/// Compile `filter`/`sort`/`page` for `table` onto `base`.
pub fn filter_query(
    registry: &Registry,
    base: &str,
    table: &str,
    filter: &Filter,
    sort: &Sort,
    page: Page,
) -> ShapeResult<CompiledQuery> {
    FilterQuery::new(registry, table)
        .filter(filter.clone())
        .sort(sort.clone())
        .page(page)
        .compile(base)
}

/// Append a caller-written ORDER BY plus the page window; `args` pass through.
///
/// `order_by` is spliced verbatim.
pub fn ordered_page_query(base: &str, order_by: &str, args: Vec<Value>, page: Page) -> CompiledQuery {
    CompiledQuery {
        sql: format!("{} ORDER BY {}{}", base, order_by, page.limit_offset()),
        args,
    }
}
