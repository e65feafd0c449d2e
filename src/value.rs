//! Dynamic values bound to positional placeholders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value bound to a `$N` placeholder.
///
/// Deserializes untagged, so a JSON filter such as
/// `{"age[$gt]": 18, "tag[$in]": ["a", "b"]}` maps straight onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
}

impl Value {
    /// Lower-case textual values; everything else passes through.
    pub fn lowercased(self) -> Self {
        match self {
            Value::Text(s) => Value::Text(s.to_lowercase()),
            other => other,
        }
    }

    /// Coerce into a single array argument for `= ANY(..)` / `!= ALL(..)`.
    ///
    /// Scalars become a one-element array and `Null` becomes an empty array.
    pub fn into_array(self) -> Self {
        match self {
            Value::TextArray(items) => Value::TextArray(items),
            Value::Null => Value::TextArray(Vec::new()),
            Value::Text(s) => Value::TextArray(vec![s]),
            Value::Bool(b) => Value::TextArray(vec![b.to_string()]),
            Value::Int(n) => Value::TextArray(vec![n.to_string()]),
            Value::Float(n) => Value::TextArray(vec![n.to_string()]),
        }
    }

    /// Guess a value from command-line text.
    ///
    /// `null`, `true`/`false`, integers and floats are recognized; `[a,b]`
    /// becomes a text array; anything else is text.
    pub fn infer(raw: &str) -> Self {
        if raw == "null" {
            return Value::Null;
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        match raw {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let items = inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            return Value::TextArray(items);
        }
        Value::Text(raw.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::TextArray(items) => write!(f, "{{{}}}", items.join(",")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::TextArray(v.into_iter().map(String::from).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hi"), Value::Text("hi".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::TextArray(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_lowercase_only_touches_text() {
        assert_eq!(Value::from("MiXed").lowercased(), Value::from("mixed"));
        assert_eq!(Value::Int(7).lowercased(), Value::Int(7));
        let arr = Value::from(vec!["A"]);
        assert_eq!(arr.clone().lowercased(), arr);
    }

    #[test]
    fn test_into_array() {
        assert_eq!(Value::Int(3).into_array(), Value::from(vec!["3"]));
        assert_eq!(Value::Null.into_array(), Value::TextArray(vec![]));
    }

    #[test]
    fn test_deserialize_untagged() {
        let v: Vec<Value> = serde_json::from_str(r#"[null, true, 18, 1.5, "x", ["a"]]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(18),
                Value::Float(1.5),
                Value::Text("x".into()),
                Value::from(vec!["a"]),
            ]
        );
    }

    #[test]
    fn test_infer() {
        assert_eq!(Value::infer("18"), Value::Int(18));
        assert_eq!(Value::infer("2.5"), Value::Float(2.5));
        assert_eq!(Value::infer("false"), Value::Bool(false));
        assert_eq!(Value::infer("[x, y]"), Value::from(vec!["x", "y"]));
        assert_eq!(Value::infer("hello"), Value::from("hello"));
    }
}
