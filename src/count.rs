//! Count rewriting and pagination.
//!
//! [`build_count`] turns a paginated query into a total-row count by
//! stripping `LIMIT`, `OFFSET` and `ORDER BY` with pattern matching, not a
//! parser. An `ORDER BY` inside a parenthesized subquery can be cut
//! incorrectly; keep ordering at the outermost level.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sLIMIT\s+\d+").expect("valid LIMIT pattern"));
static OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sOFFSET\s+\d+").expect("valid OFFSET pattern"));
static ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sORDER\s+BY\s+[^)]+").expect("valid ORDER BY pattern"));

/// Alias given to the wrapped query.
pub const COUNT_SUBQUERY_ALIAS: &str = "count_subquery";

/// Rewrite `query` into `SELECT COUNT(*) FROM (<query>) AS count_subquery`.
///
/// ```
/// use sqlshape::count::build_count;
///
/// assert_eq!(
///     build_count("SELECT * FROM t ORDER BY x LIMIT 10 OFFSET 20"),
///     "SELECT COUNT(*) FROM (SELECT * FROM t) AS count_subquery"
/// );
/// ```
pub fn build_count(query: &str) -> String {
    let stripped = LIMIT.replace_all(query, "");
    let stripped = OFFSET.replace_all(&stripped, "");
    let stripped = ORDER_BY.replace_all(stripped.trim(), "");
    format!(
        "SELECT COUNT(*) FROM ({}) AS {}",
        stripped.trim(),
        COUNT_SUBQUERY_ALIAS
    )
}

/// A requested page: 1-based number and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: 1, size: 20 }
    }
}

impl Page {
    pub fn new(number: u64, size: u64) -> Self {
        Self { number, size }
    }

    /// Rows skipped before this page; page 0 is treated as page 1.
    ///
    /// Saturates at `u64::MAX` instead of overflowing.
    pub fn offset(&self) -> u64 {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }

    /// ` LIMIT <size> OFFSET <offset>`, with the leading space.
    pub fn limit_offset(&self) -> String {
        format!(" LIMIT {} OFFSET {}", self.size, self.offset())
    }
}

/// Page position reported alongside a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_no: u64,
    pub results_per_page: u64,
    pub page_max: u64,
    pub count: u64,
}

impl Pagination {
    /// `page_max` is `ceil(count / size)`, or 0 for a zero page size.
    pub fn new(page: Page, count: u64) -> Self {
        let page_max = if page.size == 0 {
            0
        } else {
            count.div_ceil(page.size)
        };
        Self {
            page_no: page.number,
            results_per_page: page.size,
            page_max,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_count_strips_clauses() {
        assert_eq!(
            build_count("SELECT * FROM t ORDER BY x LIMIT 10 OFFSET 20"),
            "SELECT COUNT(*) FROM (SELECT * FROM t) AS count_subquery"
        );
    }

    #[test]
    fn test_build_count_case_and_whitespace() {
        assert_eq!(
            build_count("select a from t where b = $1\n order   by a desc, b\tlimit 5 offset 0"),
            "SELECT COUNT(*) FROM (select a from t where b = $1) AS count_subquery"
        );
    }

    #[test]
    fn test_build_count_without_pagination() {
        assert_eq!(
            build_count(r#"SELECT "t"."id" FROM "t""#),
            r#"SELECT COUNT(*) FROM (SELECT "t"."id" FROM "t") AS count_subquery"#
        );
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(0, 10).offset(), 0);
        assert_eq!(Page::new(1, 25).limit_offset(), " LIMIT 25 OFFSET 0");
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(Page::new(u64::MAX, 2).offset(), u64::MAX);
        assert_eq!(
            Page::new(u64::MAX, 2).limit_offset(),
            format!(" LIMIT 2 OFFSET {}", u64::MAX)
        );
        assert_eq!(Page::new(u64::MAX, 0).offset(), 0);
    }

    #[test]
    fn test_pagination_page_max() {
        for number in [1, 2, 9] {
            assert_eq!(Pagination::new(Page::new(number, 10), 50).page_max, 5);
        }
        assert_eq!(Pagination::new(Page::new(1, 10), 51).page_max, 6);
        assert_eq!(Pagination::new(Page::new(1, 10), 0).page_max, 0);
        assert_eq!(Pagination::new(Page::new(1, 0), 7).page_max, 0);
    }

    #[test]
    fn test_pagination_serializes_flat() {
        let json = serde_json::to_value(Pagination::new(Page::new(2, 10), 50)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"page_no": 2, "results_per_page": 10, "page_max": 5, "count": 50})
        );
    }
}
