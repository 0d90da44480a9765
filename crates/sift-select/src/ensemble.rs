//! Parallel fan-out composition: ensembles, element/entry broadcasts, and
//! the list-featurizer pivot.

use serde_json::{Map, Value};
use sift_types::{BoxError, Result, SelectionCause, SelectionContext, SiftError, Stage};

use crate::feed::FunctionFeed;
use crate::field::{FieldGetter, FieldKey};
use crate::pipeline::Pipeline;
use crate::selector::{guarded_call, value_kind, Evaluated, Selector, SelectorKind};

// ---------------------------------------------------------------------------
// Ensemble
// ---------------------------------------------------------------------------

/// Fan one input value out to every branch and merge the branch outputs into
/// one map.
///
/// Positional branches must each return a map; their entries are copied into
/// the result. Named branches are inserted under their own key. Branches are
/// evaluated in declaration order (positional before named) and the second
/// producer of any key aborts the invocation with a merge conflict — the
/// first value is never silently kept or overwritten.
#[derive(Debug, Clone, Default)]
pub struct Ensemble {
    positional: Vec<Selector>,
    named: Vec<(String, Selector)>,
}

impl Ensemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a positional branch. Its output must be a map.
    pub fn branch(mut self, selector: impl Into<Selector>) -> Self {
        self.positional.push(selector.into());
        self
    }

    /// Add a named branch. Its output is inserted under `key`.
    pub fn named(mut self, key: impl Into<String>, selector: impl Into<Selector>) -> Self {
        self.named.push((key.into(), selector.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub(crate) fn positional(&self) -> &[Selector] {
        &self.positional
    }

    pub(crate) fn named_branches(&self) -> &[(String, Selector)] {
        &self.named
    }

    pub(crate) fn eval(
        &self,
        owner: &Selector,
        value: &Value,
        context: &SelectionContext,
    ) -> Result<Evaluated> {
        let mut merged = Map::new();
        for (index, branch) in self.positional.iter().enumerate() {
            let child_context = context.append_call(
                owner.type_name(),
                owner.display_name(),
                Stage::Index(index),
                branch.display_name(),
                &[],
            );
            let out = guarded_call(branch, value, &child_context)?;
            match out.value {
                Value::Object(entries) => {
                    for (key, entry) in entries {
                        merge_entry(&mut merged, key, entry, &child_context)?;
                    }
                }
                other => {
                    return Err(SiftError::selection(
                        &child_context,
                        SelectionCause::UnexpectedType {
                            expected: "object",
                            got: value_kind(&other).into(),
                        },
                    ))
                }
            }
        }
        for (key, branch) in &self.named {
            let child_context = context.append_call(
                owner.type_name(),
                owner.display_name(),
                Stage::Key(key.clone()),
                branch.display_name(),
                &[],
            );
            let out = guarded_call(branch, value, &child_context)?;
            merge_entry(&mut merged, key.clone(), out.value, &child_context)?;
        }
        // An ensemble's value is structurally a map, not a single traced
        // chain; its path contribution is its own code path.
        Ok(Evaluated {
            value: Value::Object(merged),
            path: Some(vec![context.code_path()]),
            halted: false,
        })
    }
}

/// Insert one entry, failing eagerly on the second producer of a key.
fn merge_entry(
    merged: &mut Map<String, Value>,
    key: String,
    value: Value,
    context: &SelectionContext,
) -> Result<()> {
    if merged.contains_key(&key) {
        return Err(SiftError::selection(
            context,
            SelectionCause::MergeConflict { key },
        ));
    }
    merged.insert(key, value);
    Ok(())
}

impl From<Ensemble> for Selector {
    fn from(ensemble: Ensemble) -> Self {
        Selector::new(SelectorKind::Ensemble(ensemble))
    }
}

// ---------------------------------------------------------------------------
// Listwise / Dictwise broadcasts
// ---------------------------------------------------------------------------

/// Broadcast one selector over every element of an input sequence,
/// preserving order.
#[derive(Debug, Clone)]
pub struct Listwise {
    inner: Box<Selector>,
}

impl Listwise {
    pub fn new(inner: impl Into<Selector>) -> Self {
        Self {
            inner: Box::new(inner.into()),
        }
    }

    pub fn inner(&self) -> &Selector {
        &self.inner
    }

    pub(crate) fn eval(
        &self,
        owner: &Selector,
        value: &Value,
        context: &SelectionContext,
    ) -> Result<Evaluated> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(SiftError::selection(
                    context,
                    SelectionCause::UnexpectedType {
                        expected: "array",
                        got: value_kind(other).into(),
                    },
                ))
            }
        };
        let mut results = Vec::with_capacity(items.len());
        for index in 0..items.len() {
            let element = element_selector(FieldKey::Index(index), (*self.inner).clone());
            let child_context = context.append_call(
                owner.type_name(),
                owner.display_name(),
                Stage::Index(index),
                element.display_name(),
                &[],
            );
            let out = guarded_call(&element, value, &child_context)?;
            results.push(out.value);
        }
        Ok(Evaluated {
            value: Value::Array(results),
            path: Some(vec![context.code_path()]),
            halted: false,
        })
    }
}

impl From<Listwise> for Selector {
    fn from(broadcast: Listwise) -> Self {
        Selector::new(SelectorKind::Listwise(broadcast))
    }
}

/// Broadcast one selector over every entry of an input map, returning a map
/// with the same keys.
#[derive(Debug, Clone)]
pub struct Dictwise {
    inner: Box<Selector>,
}

impl Dictwise {
    pub fn new(inner: impl Into<Selector>) -> Self {
        Self {
            inner: Box::new(inner.into()),
        }
    }

    pub fn inner(&self) -> &Selector {
        &self.inner
    }

    pub(crate) fn eval(
        &self,
        owner: &Selector,
        value: &Value,
        context: &SelectionContext,
    ) -> Result<Evaluated> {
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(SiftError::selection(
                    context,
                    SelectionCause::UnexpectedType {
                        expected: "object",
                        got: value_kind(other).into(),
                    },
                ))
            }
        };
        let mut results = Map::new();
        for key in entries.keys() {
            let element = element_selector(FieldKey::Name(key.clone()), (*self.inner).clone());
            let child_context = context.append_call(
                owner.type_name(),
                owner.display_name(),
                Stage::Key(key.clone()),
                element.display_name(),
                &[],
            );
            let out = guarded_call(&element, value, &child_context)?;
            results.insert(key.clone(), out.value);
        }
        Ok(Evaluated {
            value: Value::Object(results),
            path: Some(vec![context.code_path()]),
            halted: false,
        })
    }
}

impl From<Dictwise> for Selector {
    fn from(broadcast: Dictwise) -> Self {
        Selector::new(SelectorKind::Dictwise(broadcast))
    }
}

/// The per-element pipeline a broadcast drives: access one element, then run
/// the inner selector on it. Failures inside it name the element's stage.
fn element_selector(key: FieldKey, inner: Selector) -> Selector {
    Selector::from(Pipeline::of(vec![FieldGetter::new(key, false).into(), inner]))
}

// ---------------------------------------------------------------------------
// List featurizer
// ---------------------------------------------------------------------------

/// Map every element of a list to a feature map, pivot the list of maps into
/// a map of lists (null-filling gaps), then reduce every list-valued entry.
pub fn list_featurizer(
    element_to_dict: impl Into<Selector>,
    dict_fields_to_value: impl Into<Selector>,
) -> Selector {
    Selector::from(Pipeline::of(vec![
        Listwise::new(element_to_dict).into(),
        FunctionFeed::new("transpose", transpose_records).into(),
        Dictwise::new(dict_fields_to_value).into(),
    ]))
}

/// Pivot a list of maps into a map of equal-length lists. Keys keep their
/// first-seen order; a key absent from some element contributes null at that
/// element's position, so every column has one slot per element.
fn transpose_records(value: &Value) -> std::result::Result<Value, BoxError> {
    let rows = value.as_array().ok_or("transpose expects a sequence of maps")?;
    let mut maps = Vec::with_capacity(rows.len());
    for row in rows {
        maps.push(
            row.as_object()
                .ok_or("transpose expects every element to be a map")?,
        );
    }
    let mut keys: Vec<String> = Vec::new();
    for map in &maps {
        for key in map.keys() {
            if !keys.iter().any(|seen| seen == key) {
                keys.push(key.clone());
            }
        }
    }
    let mut columns = Map::new();
    for key in keys {
        let column: Vec<Value> = maps
            .iter()
            .map(|map| map.get(&key).cloned().unwrap_or(Value::Null))
            .collect();
        columns.insert(key, Value::Array(column));
    }
    Ok(Value::Object(columns))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
