//! # sqlshape: schema-driven SQL statements
//!
//! Declare a table's fields once; get parameterized SELECT, INSERT, UPDATE,
//! filtered page and row-count statements back.
//!
//! ## Quick Example
//!
//! ```rust
//! use sqlshape::prelude::*;
//!
//! let registry = Registry::new();
//! registry.register(
//!     "realm",
//!     &TableShape::new()
//!         .field(FieldSpec::new("UUID").column("uuid").mode("i"))
//!         .field(FieldSpec::new("Name").column("name").mode("i,u")),
//! );
//!
//! let base = registry.select("realm").build();
//! assert_eq!(base, r#"SELECT "realm"."uuid", "realm"."name" FROM "realm""#);
//!
//! let page = FilterQuery::new(&registry, "realm")
//!     .filter(Filter::new().with("Name[€like]", "%north%"))
//!     .page(Page::new(2, 10))
//!     .compile(&base)
//!     .unwrap();
//! assert!(page.sql.ends_with(r#"WHERE LOWER("realm"."name") LIKE $1 LIMIT 10 OFFSET 10"#));
//!
//! let count = build_count(&page.sql);
//! assert!(count.starts_with("SELECT COUNT(*) FROM (SELECT"));
//! ```
//!
//! ## Mode flags
//!
//! | Token        | Effect                                  |
//! |--------------|-----------------------------------------|
//! | `i`          | Column is written by INSERT             |
//! | `u`          | Column is written by UPDATE             |
//! | `s`          | Column is never selected or written     |
//! | `l`          | Join-only field; column is the alias    |
//!
//! Fields without a `skip` or `link` flag are always selected.

pub mod config;
pub mod count;
pub mod engine;
pub mod error;
pub mod filter;
pub mod mutation;
pub mod registry;
pub mod schema;
pub mod select;
pub mod value;

pub mod prelude {
    pub use crate::count::{Page, Pagination, build_count};
    pub use crate::engine::{Db, generate_identifier};
    pub use crate::error::*;
    pub use crate::filter::{CompiledQuery, Filter, FilterQuery, Sort, filter_query, ordered_page_query};
    pub use crate::mutation::Values;
    pub use crate::registry::{ColumnList, ColumnMode, Registry, TableMetadata};
    pub use crate::schema::{FieldSpec, RecordShape, SchemaFile, TableShape};
    pub use crate::select::SelectBuilder;
    pub use crate::value::Value;
}
