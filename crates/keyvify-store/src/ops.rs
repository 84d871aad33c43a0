//! Pure value operators: key addressing, dot-paths, array and math helpers.
//!
//! Nothing in this module touches the cache or a backend. The store core
//! composes these functions inside its read-modify-write cycle.
//!
//! | Operation          | Absent input       | Notes                                 |
//! |--------------------|--------------------|---------------------------------------|
//! | [`get_at_path`]    | `None`             | numeric segments index into arrays    |
//! | [`set_at_path`]    | creates `{}`       | intermediate mappings are created     |
//! | [`push_to_array`]  | starts from `[]`   | scalars are wrapped first             |
//! | [`pull_from_array`]| yields `[]`        | removes every structural match        |
//! | [`apply_math`]     | n/a                | see [`MathOperator`] for aliases      |

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Separator between the base key and the nested path.
pub const PATH_SEPARATOR: char = '.';

/// Largest integer an `f64` represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

// ── key addressing ───────────────────────────────────────────────────

/// `true` when `s` is non-empty and made only of ASCII letters, digits and
/// underscores.
pub fn is_valid_literal(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Addresses a key and, optionally, a location inside its value.
///
/// Built from a plain string (auto-split on the first `.`) or from an
/// explicit `(key, path)` tuple.
///
/// ```
/// use keyvify_store::KeyAddress;
///
/// let a = KeyAddress::from("user.profile.name");
/// assert_eq!(
///     a.resolve().unwrap(),
///     ("user".to_string(), Some("profile.name".to_string()))
/// );
///
/// let b = KeyAddress::from(("user", "profile"));
/// assert_eq!(b.resolve().unwrap().1.as_deref(), Some("profile"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAddress {
    /// A bare key, possibly containing path separators.
    Raw(String),
    /// An explicit key and dot-path.
    WithPath(String, String),
}

impl KeyAddress {
    /// Split into `(base_key, dot_path)`, validating both parts.
    pub fn resolve(&self) -> StoreResult<(String, Option<String>)> {
        match self {
            Self::Raw(raw) => parse_address(raw),
            Self::WithPath(key, path) => {
                if key.is_empty() {
                    return Err(StoreError::NoKey);
                }
                if !is_valid_literal(key) {
                    return Err(StoreError::InvalidKey { key: key.clone() });
                }
                if path.is_empty() {
                    return Ok((key.clone(), None));
                }
                validate_path(path)?;
                Ok((key.clone(), Some(path.clone())))
            }
        }
    }
}

impl From<&str> for KeyAddress {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_owned())
    }
}

impl From<String> for KeyAddress {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<&String> for KeyAddress {
    fn from(raw: &String) -> Self {
        Self::Raw(raw.clone())
    }
}

impl From<(&str, &str)> for KeyAddress {
    fn from((key, path): (&str, &str)) -> Self {
        Self::WithPath(key.to_owned(), path.to_owned())
    }
}

impl From<(String, String)> for KeyAddress {
    fn from((key, path): (String, String)) -> Self {
        Self::WithPath(key, path)
    }
}

impl fmt::Display for KeyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.write_str(raw),
            Self::WithPath(key, path) if path.is_empty() => f.write_str(key),
            Self::WithPath(key, path) => write!(f, "{key}{PATH_SEPARATOR}{path}"),
        }
    }
}

/// Split `raw` on its first separator into a base key and a dot-path.
pub fn parse_address(raw: &str) -> StoreResult<(String, Option<String>)> {
    if raw.is_empty() {
        return Err(StoreError::NoKey);
    }
    let (base, path) = match raw.split_once(PATH_SEPARATOR) {
        Some((base, path)) => (base, Some(path)),
        None => (raw, None),
    };
    if !is_valid_literal(base) {
        return Err(StoreError::InvalidKey {
            key: raw.to_owned(),
        });
    }
    if let Some(path) = path {
        validate_path(path)?;
    }
    Ok((base.to_owned(), path.map(str::to_owned)))
}

fn validate_path(path: &str) -> StoreResult<()> {
    if path.split(PATH_SEPARATOR).any(str::is_empty) {
        return Err(StoreError::InvalidParameters(format!(
            "dot-path {path:?} contains an empty segment"
        )));
    }
    Ok(())
}

// ── dot-paths ────────────────────────────────────────────────────────

/// Resolve `path` inside `root`. Missing segments yield `None`.
pub fn get_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Write `value` at `path` inside `root` and return the new root.
///
/// Missing intermediates become mappings; scalars standing in the way are
/// replaced by mappings. Numeric segments write into existing arrays,
/// padding with `null`.
pub fn set_at_path(mut root: Value, path: &str, value: Value) -> Value {
    let mut target = &mut root;
    for segment in path.split(PATH_SEPARATOR) {
        target = slot(target, segment);
    }
    *target = value;
    root
}

fn slot<'a>(container: &'a mut Value, segment: &str) -> &'a mut Value {
    let array_len = container.as_array().map(Vec::len);
    if let (Some(len), Ok(index)) = (array_len, segment.parse::<usize>()) {
        if let Value::Array(items) = container {
            if len <= index {
                items.resize(index + 1, Value::Null);
            }
        }
        return &mut container[index];
    }
    if !container.is_object() {
        *container = Value::Object(Map::new());
    }
    // Indexing an object by `&str` inserts `null` for a missing key.
    &mut container[segment]
}

// ── arrays ───────────────────────────────────────────────────────────

/// Append `item` to `target`, treating an absent or `null` target as `[]`.
pub fn push_to_array(target: Option<Value>, item: Value) -> Value {
    let mut items = into_items(target);
    items.push(item);
    Value::Array(items)
}

/// Remove every element structurally equal to `item`.
pub fn pull_from_array(target: Option<Value>, item: &Value) -> Value {
    let mut items = into_items(target);
    items.retain(|existing| existing != item);
    Value::Array(items)
}

fn into_items(target: Option<Value>) -> Vec<Value> {
    match target {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(scalar) => vec![scalar],
    }
}

// ── math ─────────────────────────────────────────────────────────────

/// Arithmetic operator accepted by [`apply_math`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
}

impl MathOperator {
    /// Canonical symbol for this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Exponent => "**",
        }
    }

    /// Apply with IEEE-754 semantics; dividing by zero yields infinity or NaN.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Modulo => a % b,
            Self::Exponent => a.powf(b),
        }
    }
}

impl FromStr for MathOperator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "add" | "addition" => Ok(Self::Add),
            "-" | "sub" | "subtract" | "subtraction" => Ok(Self::Subtract),
            "*" | "multi" | "multiply" | "multiplication" => Ok(Self::Multiply),
            "/" | "div" | "divide" | "division" => Ok(Self::Divide),
            "%" | "mod" | "modulo" | "remainder" | "reminder" => Ok(Self::Modulo),
            "**" | "exponent" | "exponential" | "raise" | "power" => Ok(Self::Exponent),
            other => Err(StoreError::InvalidOperator(other.to_owned())),
        }
    }
}

impl fmt::Display for MathOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Combine two numeric values with `operator`.
///
/// Integral results are stored as integers so that `100 + 0` reads back as
/// `100`, not `100.0`. A non-finite result cannot be represented as a
/// structured value and is rejected with [`StoreError::InvalidNumber`].
pub fn apply_math(a: &Value, b: &Value, operator: &str) -> StoreResult<Value> {
    let operator: MathOperator = operator.parse()?;
    let lhs = a
        .as_f64()
        .ok_or_else(|| StoreError::InvalidNumber(format!("{a} is not a number")))?;
    let rhs = b
        .as_f64()
        .ok_or_else(|| StoreError::InvalidNumber(format!("{b} is not a number")))?;
    let result = operator.apply(lhs, rhs);
    number_value(result).ok_or_else(|| {
        StoreError::InvalidNumber(format!("{lhs} {operator} {rhs} is not finite ({result})"))
    })
}

/// Convert an `f64` into a JSON number, preferring the integer form.
pub fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(Value::Number)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plain_key() {
        assert_eq!(parse_address("hello").unwrap(), ("hello".into(), None));
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let (base, path) = parse_address("user.a.b").unwrap();
        assert_eq!(base, "user");
        assert_eq!(path.as_deref(), Some("a.b"));
    }

    #[test]
    fn parse_rejects_empty_and_non_literal() {
        assert!(matches!(parse_address(""), Err(StoreError::NoKey)));
        assert!(matches!(
            parse_address("bad-key"),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            parse_address(".path"),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            parse_address("k..x"),
            Err(StoreError::InvalidParameters(_))
        ));
    }

    #[test]
    fn explicit_pair_with_empty_path_is_plain() {
        let addr = KeyAddress::from(("k", ""));
        assert_eq!(addr.resolve().unwrap(), ("k".into(), None));
        assert_eq!(addr.to_string(), "k");
    }

    #[test]
    fn explicit_pair_validates_key() {
        assert!(matches!(
            KeyAddress::from(("a.b", "c")).resolve(),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(matches!(
            KeyAddress::from(("", "c")).resolve(),
            Err(StoreError::NoKey)
        ));
    }

    #[test]
    fn get_at_path_walks_objects_and_arrays() {
        let v = json!({"a": {"b": [10, {"c": "deep"}]}});
        assert_eq!(get_at_path(&v, "a.b.0"), Some(&json!(10)));
        assert_eq!(get_at_path(&v, "a.b.1.c"), Some(&json!("deep")));
        assert_eq!(get_at_path(&v, "a.missing.c"), None);
        assert_eq!(get_at_path(&v, "a.b.x"), None);
    }

    #[test]
    fn set_at_path_creates_intermediates() {
        let v = set_at_path(json!({}), "a.b.c", json!(1));
        assert_eq!(v, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_at_path_keeps_siblings() {
        let v = set_at_path(json!({"a": {"b": 1, "x": true}}), "a.b", json!(2));
        assert_eq!(v, json!({"a": {"b": 2, "x": true}}));
    }

    #[test]
    fn set_at_path_replaces_scalar_intermediate() {
        let v = set_at_path(json!({"a": 5}), "a.b", json!("x"));
        assert_eq!(v, json!({"a": {"b": "x"}}));
    }

    #[test]
    fn set_at_path_indexes_arrays() {
        let v = set_at_path(json!({"list": [1, 2]}), "list.3", json!(9));
        assert_eq!(v, json!({"list": [1, 2, null, 9]}));
    }

    #[test]
    fn push_starts_from_empty() {
        let v = push_to_array(None, json!("x"));
        assert_eq!(v, json!(["x"]));
        let v = push_to_array(Some(v), json!("y"));
        assert_eq!(v, json!(["x", "y"]));
    }

    #[test]
    fn push_wraps_scalar() {
        assert_eq!(push_to_array(Some(json!(1)), json!(2)), json!([1, 2]));
    }

    #[test]
    fn pull_removes_every_match() {
        let v = pull_from_array(Some(json!(["x", "y", "x", {"k": 1}])), &json!("x"));
        assert_eq!(v, json!(["y", {"k": 1}]));
        let v = pull_from_array(Some(v), &json!({"k": 1}));
        assert_eq!(v, json!(["y"]));
    }

    #[test]
    fn pull_from_absent_is_empty() {
        assert_eq!(pull_from_array(None, &json!(1)), json!([]));
    }

    #[test]
    fn operator_aliases() {
        for alias in ["+", "add", "addition"] {
            assert_eq!(alias.parse::<MathOperator>().unwrap(), MathOperator::Add);
        }
        for alias in ["%", "mod", "modulo", "remainder"] {
            assert_eq!(
                alias.parse::<MathOperator>().unwrap(),
                MathOperator::Modulo
            );
        }
        for alias in ["**", "exponent", "power"] {
            assert_eq!(
                alias.parse::<MathOperator>().unwrap(),
                MathOperator::Exponent
            );
        }
        assert!(matches!(
            "plus".parse::<MathOperator>(),
            Err(StoreError::InvalidOperator(_))
        ));
    }

    #[test]
    fn math_chain_keeps_integers() {
        let mut v = json!(0);
        for (op, n, expected) in [
            ("+", 100, 100),
            ("-", 20, 80),
            ("*", 2, 160),
            ("/", 4, 40),
            ("**", 2, 1600),
            ("%", 4, 0),
        ] {
            v = apply_math(&v, &json!(n), op).unwrap();
            assert_eq!(v, json!(expected), "after {op} {n}");
        }
    }

    #[test]
    fn math_fractions() {
        assert_eq!(apply_math(&json!(1), &json!(4), "div").unwrap(), json!(0.25));
        assert_eq!(apply_math(&json!(-7), &json!(3), "mod").unwrap(), json!(-1));
    }

    #[test]
    fn math_rejects_non_numbers() {
        assert!(matches!(
            apply_math(&json!("ten"), &json!(1), "+"),
            Err(StoreError::InvalidNumber(_))
        ));
    }

    #[test]
    fn division_by_zero_is_ieee() {
        assert!(MathOperator::Divide.apply(1.0, 0.0).is_infinite());
        assert!(MathOperator::Modulo.apply(1.0, 0.0).is_nan());
        assert!(matches!(
            apply_math(&json!(1), &json!(0), "/"),
            Err(StoreError::InvalidNumber(_))
        ));
    }
}
