//! The selector node: a closed variant over every combinator, the shared
//! error boundary, and the public invocation surface.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use sift_types::{BoxError, Result, SelectionCause, SelectionContext, SiftError, ValueFn};

use crate::ensemble::{Dictwise, Ensemble, Listwise};
use crate::feed::FunctionFeed;
use crate::field::{FieldGetter, FieldKey};
use crate::pipeline::Pipeline;

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A composable unit mapping one input value to one output value (or failing
/// with full provenance).
///
/// Selector trees are immutable once built and may be shared and reused
/// across any number of sequential invocations — the expected pattern is
/// build once, then [`apply`](Self::apply) once per input record.
#[derive(Clone)]
pub struct Selector {
    name: Option<String>,
    id_fn: Option<ValueFn>,
    kind: SelectorKind,
}

/// The closed set of selector variants the evaluator dispatches over.
#[derive(Debug, Clone)]
pub enum SelectorKind {
    Field(FieldGetter),
    Feed(FunctionFeed),
    Pipeline(Pipeline),
    Ensemble(Ensemble),
    Listwise(Listwise),
    Dictwise(Dictwise),
}

/// Outcome of evaluating one node: the produced value, the node's reported
/// data-path contribution (`None` means "use my display name"), and whether
/// a null-propagating step broke the enclosing chain.
#[derive(Debug)]
pub(crate) struct Evaluated {
    pub value: Value,
    pub path: Option<Vec<String>>,
    pub halted: bool,
}

impl Evaluated {
    pub fn of(value: Value) -> Self {
        Self {
            value,
            path: None,
            halted: false,
        }
    }

    pub fn halted(value: Value) -> Self {
        Self {
            value,
            path: None,
            halted: true,
        }
    }
}

impl Selector {
    pub(crate) fn new(kind: SelectorKind) -> Self {
        Self {
            name: None,
            id_fn: None,
            kind,
        }
    }

    /// Strict field/index access.
    pub fn field(key: impl Into<FieldKey>) -> Self {
        FieldGetter::new(key, false).into()
    }

    /// Null-propagating field/index access.
    pub fn field_elvis(key: impl Into<FieldKey>) -> Self {
        FieldGetter::new(key, true).into()
    }

    /// Apply an arbitrary function as a selector step.
    pub fn func(
        label: impl Into<String>,
        f: impl Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        FunctionFeed::new(label, f).into()
    }

    /// A selector producing a fixed value regardless of its input.
    pub fn constant(value: Value) -> Self {
        FunctionFeed::new("const", move |_| Ok(value.clone())).into()
    }

    /// Assign a display name used in code paths and data paths.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an id selector: a function extracting a stable identifier from
    /// the top-level input, used to attribute diagnostics to a record.
    pub fn with_id_selector(
        mut self,
        f: impl Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.id_fn = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &SelectorKind {
        &self.kind
    }

    /// The variant name, used in call-stack items.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            SelectorKind::Field(_) => "FieldGetter",
            SelectorKind::Feed(_) => "FunctionFeed",
            SelectorKind::Pipeline(_) => "Pipeline",
            SelectorKind::Ensemble(_) => "Ensemble",
            SelectorKind::Listwise(_) => "Listwise",
            SelectorKind::Dictwise(_) => "Dictwise",
        }
    }

    /// The assigned name, or a per-variant rendering. Always produces
    /// something printable — diagnostics must never fail to build.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.kind {
            SelectorKind::Field(getter) => getter.display_name(),
            SelectorKind::Feed(feed) => feed.label().to_string(),
            SelectorKind::Pipeline(pipeline) => {
                let steps: Vec<String> =
                    pipeline.steps().iter().map(Selector::display_name).collect();
                format!("({})", steps.join("|"))
            }
            SelectorKind::Ensemble(ensemble) => format!("ensemble[{}]", ensemble.len()),
            SelectorKind::Listwise(broadcast) => {
                format!("listwise({})", broadcast.inner().display_name())
            }
            SelectorKind::Dictwise(broadcast) => {
                format!("dictwise({})", broadcast.inner().display_name())
            }
        }
    }

    /// Evaluate against one input record.
    pub fn apply(&self, value: &Value) -> Result<Value> {
        self.apply_with_context(value).map(|(value, _)| value)
    }

    /// Evaluate against one input record and also return the root context,
    /// exposing the warnings accumulated during the invocation.
    pub fn apply_with_context(&self, value: &Value) -> Result<(Value, SelectionContext)> {
        let context = SelectionContext::root(value, self.id_fn.as_ref());
        tracing::debug!(selector = %self, "evaluating selector tree");
        let out = guarded_call(self, value, &context)?;
        Ok((out.value, context))
    }

    /// A nested JSON tree mirroring this selector's composition. For
    /// documentation and debugging, not evaluation.
    pub fn describe_structure(&self) -> Value {
        let mut node = match &self.kind {
            SelectorKind::Field(getter) => json!({
                "type": "FieldGetter",
                "key": getter.key().to_string(),
                "null_propagation": getter.null_propagation(),
            }),
            SelectorKind::Feed(feed) => json!({
                "type": "FunctionFeed",
                "fn": feed.label(),
                "null_propagation": feed.null_propagation(),
            }),
            SelectorKind::Pipeline(pipeline) => json!({
                "type": "Pipeline",
                "steps": pipeline
                    .steps()
                    .iter()
                    .map(Selector::describe_structure)
                    .collect::<Vec<_>>(),
            }),
            SelectorKind::Ensemble(ensemble) => {
                let positional: Vec<Value> = ensemble
                    .positional()
                    .iter()
                    .map(Selector::describe_structure)
                    .collect();
                let named: serde_json::Map<String, Value> = ensemble
                    .named_branches()
                    .iter()
                    .map(|(key, branch)| (key.clone(), branch.describe_structure()))
                    .collect();
                json!({"type": "Ensemble", "positional": positional, "named": named})
            }
            SelectorKind::Listwise(broadcast) => json!({
                "type": "Listwise",
                "inner": broadcast.inner().describe_structure(),
            }),
            SelectorKind::Dictwise(broadcast) => json!({
                "type": "Dictwise",
                "inner": broadcast.inner().describe_structure(),
            }),
        };
        if let Some(name) = &self.name {
            node["name"] = json!(name);
        }
        node
    }

    pub(crate) fn eval(&self, value: &Value, context: &SelectionContext) -> Result<Evaluated> {
        match &self.kind {
            SelectorKind::Field(getter) => getter.eval(value, context),
            SelectorKind::Feed(feed) => feed.eval(value, context),
            SelectorKind::Pipeline(pipeline) => pipeline.eval(self, value, context),
            SelectorKind::Ensemble(ensemble) => ensemble.eval(self, value, context),
            SelectorKind::Listwise(broadcast) => broadcast.eval(self, value, context),
            SelectorKind::Dictwise(broadcast) => broadcast.eval(self, value, context),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error boundary
// ---------------------------------------------------------------------------

/// The one boundary through which every combinator calls into a child.
///
/// A `Selection` error coming out of a child already carries full provenance
/// from the deepest failure point and passes through unchanged. Anything
/// else is wrapped here, once, with the current context snapshot.
pub(crate) fn guarded_call(
    child: &Selector,
    value: &Value,
    context: &SelectionContext,
) -> Result<Evaluated> {
    match child.eval(value, context) {
        Ok(out) => Ok(out),
        Err(err @ SiftError::Selection { .. }) => Err(err),
        Err(SiftError::Build(message)) => Err(SiftError::selection(
            context,
            SelectionCause::User(message.into()),
        )),
    }
}

/// Human name of a JSON value's shape, for type-mismatch diagnostics.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_assigned_name() {
        let sel = Selector::field("a").with_name("first");
        assert_eq!(sel.display_name(), "first");
        assert_eq!(sel.to_string(), "first");
    }

    #[test]
    fn display_name_falls_back_per_variant() {
        assert_eq!(Selector::field("a").display_name(), "[a]");
        assert_eq!(Selector::field_elvis("a").display_name(), "[?a]");
        assert_eq!(
            Selector::func("double", |v| Ok(v.clone())).display_name(),
            "double"
        );
    }

    #[test]
    fn pipeline_display_name_joins_steps() {
        let pipeline = Pipeline::new(vec![Selector::field("a"), Selector::field("b")]).unwrap();
        assert_eq!(Selector::from(pipeline).display_name(), "([a]|[b])");
    }

    #[test]
    fn constant_ignores_input() {
        let sel = Selector::constant(json!(42));
        assert_eq!(sel.apply(&json!({"anything": true})).unwrap(), json!(42));
        assert_eq!(sel.apply(&json!(null)).unwrap(), json!(42));
    }

    #[test]
    fn apply_with_context_exposes_warnings() {
        let sel = Selector::field_elvis("missing");
        let (value, context) = sel.apply_with_context(&json!({"a": 1})).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(context.warnings().len(), 1);
    }

    #[test]
    fn id_selector_attributes_errors_to_record() {
        let sel = Selector::field("absent")
            .with_id_selector(|v| v.get("id").cloned().ok_or_else(|| "no id".into()));
        let err = sel.apply(&json!({"id": "rec-3"})).unwrap_err();
        assert_eq!(err.record_id(), Some("rec-3"));
    }

    #[test]
    fn describe_structure_mirrors_composition() {
        let pipeline =
            Pipeline::new(vec![Selector::field("a"), Selector::field_elvis(0usize)]).unwrap();
        let described = Selector::from(pipeline).with_name("probe").describe_structure();
        assert_eq!(described["type"], "Pipeline");
        assert_eq!(described["name"], "probe");
        assert_eq!(described["steps"][0]["type"], "FieldGetter");
        assert_eq!(described["steps"][0]["key"], "a");
        assert_eq!(described["steps"][1]["null_propagation"], true);
    }

    #[test]
    fn value_kind_names() {
        assert_eq!(value_kind(&json!(null)), "null");
        assert_eq!(value_kind(&json!(true)), "boolean");
        assert_eq!(value_kind(&json!(1.5)), "number");
        assert_eq!(value_kind(&json!("s")), "string");
        assert_eq!(value_kind(&json!([])), "array");
        assert_eq!(value_kind(&json!({})), "object");
    }
}
