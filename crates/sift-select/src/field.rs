//! Field and index access over loose values.

use std::fmt;

use serde_json::Value;
use sift_types::{Result, SelectionCause, SelectionContext, SiftError, Warning};

use crate::selector::{value_kind, Evaluated, Selector, SelectorKind};

/// A string key into a map or an integer index into a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Name(name) => write!(f, "{name}"),
            FieldKey::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        FieldKey::Name(name.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        FieldKey::Name(name)
    }
}

impl From<usize> for FieldKey {
    fn from(index: usize) -> Self {
        FieldKey::Index(index)
    }
}

/// Terminal selector: extract one field or element from the input value.
///
/// Strict mode fails the invocation when the field cannot be reached. With
/// null propagation the miss is recorded as a warning and the result is
/// null; the getter itself never fails.
#[derive(Debug, Clone)]
pub struct FieldGetter {
    key: FieldKey,
    null_propagation: bool,
}

impl FieldGetter {
    pub fn new(key: impl Into<FieldKey>, null_propagation: bool) -> Self {
        Self {
            key: key.into(),
            null_propagation,
        }
    }

    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn null_propagation(&self) -> bool {
        self.null_propagation
    }

    pub fn display_name(&self) -> String {
        if self.null_propagation {
            format!("[?{}]", self.key)
        } else {
            format!("[{}]", self.key)
        }
    }

    fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match (&self.key, value) {
            (FieldKey::Name(key), Value::Object(map)) => map.get(key),
            (FieldKey::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        }
    }

    pub(crate) fn eval(&self, value: &Value, context: &SelectionContext) -> Result<Evaluated> {
        if let Some(found) = self.lookup(value) {
            return Ok(Evaluated::of(found.clone()));
        }
        if self.null_propagation {
            context.push_warning(Warning::MissingField {
                field: self.key.to_string(),
                code_path: context.code_path(),
                data_path: context.data_path(),
            });
            // One warning per broken chain: the halt stops the enclosing
            // pipeline from descending further into the null.
            return Ok(Evaluated::halted(Value::Null));
        }
        let cause = match (&self.key, value) {
            (FieldKey::Name(_), Value::Object(_)) | (FieldKey::Index(_), Value::Array(_)) => {
                SelectionCause::MissingField {
                    field: self.key.to_string(),
                }
            }
            (FieldKey::Name(_), other) => SelectionCause::UnexpectedType {
                expected: "object",
                got: value_kind(other).into(),
            },
            (FieldKey::Index(_), other) => SelectionCause::UnexpectedType {
                expected: "array",
                got: value_kind(other).into(),
            },
        };
        Err(SiftError::selection(context, cause))
    }
}

impl From<FieldGetter> for Selector {
    fn from(getter: FieldGetter) -> Self {
        Selector::new(SelectorKind::Field(getter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: &Value) -> SelectionContext {
        SelectionContext::root(value, None)
    }

    #[test]
    fn strict_map_access_returns_element() {
        let value = json!({"a": {"b": 2}});
        let out = FieldGetter::new("a", false).eval(&value, &ctx(&value)).unwrap();
        assert_eq!(out.value, json!({"b": 2}));
        assert!(!out.halted);
    }

    #[test]
    fn strict_index_access_returns_element() {
        let value = json!(["x", "y", "z"]);
        let out = FieldGetter::new(1usize, false).eval(&value, &ctx(&value)).unwrap();
        assert_eq!(out.value, json!("y"));
    }

    #[test]
    fn strict_missing_key_fails_with_missing_field() {
        let value = json!({"a": 1});
        let err = FieldGetter::new("b", false)
            .eval(&value, &ctx(&value))
            .unwrap_err();
        match err.cause() {
            Some(SelectionCause::MissingField { field }) => assert_eq!(field, "b"),
            other => panic!("expected MissingField, got: {other:?}"),
        }
    }

    #[test]
    fn strict_index_out_of_bounds_fails() {
        let value = json!([1, 2]);
        let err = FieldGetter::new(5usize, false)
            .eval(&value, &ctx(&value))
            .unwrap_err();
        assert!(matches!(
            err.cause(),
            Some(SelectionCause::MissingField { .. })
        ));
    }

    #[test]
    fn strict_key_on_non_object_reports_type() {
        let value = json!(42);
        let err = FieldGetter::new("a", false)
            .eval(&value, &ctx(&value))
            .unwrap_err();
        match err.cause() {
            Some(SelectionCause::UnexpectedType { expected, got }) => {
                assert_eq!(*expected, "object");
                assert_eq!(got, "number");
            }
            other => panic!("expected UnexpectedType, got: {other:?}"),
        }
    }

    #[test]
    fn strict_index_on_non_array_reports_type() {
        let value = json!({"a": 1});
        let err = FieldGetter::new(0usize, false)
            .eval(&value, &ctx(&value))
            .unwrap_err();
        match err.cause() {
            Some(SelectionCause::UnexpectedType { expected, .. }) => {
                assert_eq!(*expected, "array")
            }
            other => panic!("expected UnexpectedType, got: {other:?}"),
        }
    }

    #[test]
    fn elvis_missing_key_warns_once_and_yields_null() {
        let value = json!({"a": 1});
        let context = ctx(&value);
        let out = FieldGetter::new("b", true).eval(&value, &context).unwrap();
        assert_eq!(out.value, Value::Null);
        assert!(out.halted);

        let warnings = context.warnings();
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            Warning::MissingField { field, .. } => assert_eq!(field, "b"),
            other => panic!("expected MissingField warning, got: {other:?}"),
        }
    }

    #[test]
    fn elvis_on_null_input_warns_and_yields_null() {
        let value = Value::Null;
        let context = ctx(&value);
        let out = FieldGetter::new("x", true).eval(&value, &context).unwrap();
        assert_eq!(out.value, Value::Null);
        assert_eq!(context.warnings().len(), 1);
    }

    #[test]
    fn elvis_hit_does_not_warn() {
        let value = json!({"d": null});
        let context = ctx(&value);
        let out = FieldGetter::new("d", true).eval(&value, &context).unwrap();
        // The key is present; its null value is a legitimate result.
        assert_eq!(out.value, Value::Null);
        assert!(!out.halted);
        assert!(context.warnings().is_empty());
    }

    #[test]
    fn display_names() {
        assert_eq!(FieldGetter::new("a", false).display_name(), "[a]");
        assert_eq!(FieldGetter::new("a", true).display_name(), "[?a]");
        assert_eq!(FieldGetter::new(3usize, false).display_name(), "[3]");
    }
}
