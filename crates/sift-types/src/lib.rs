//! Shared types for the sift selector engine.
//!
//! This crate provides the foundational types used by the engine crate:
//! - `SiftError` — the engine's error taxonomy (one fatal runtime error plus
//!   build-time validation failures)
//! - `SelectionContext` — provenance threaded through every evaluation
//! - `Warning` — recoverable diagnostics collected during one invocation

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boxed error returned by user-supplied functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fallible function over loose values. Used for function-feed steps and
/// for id selectors attached to a root selector.
pub type ValueFn = Arc<dyn Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the sift engine.
///
/// `Selection` is the single fatal runtime error: it is constructed exactly
/// once, at the deepest point of failure, and carries the provenance snapshot
/// rendered at that point. Ancestor combinators propagate it unchanged.
/// `Build` covers configuration mistakes caught while assembling a selector
/// tree, before any record is evaluated.
#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error("{code_path}\n{data_path}")]
    Selection {
        code_path: String,
        data_path: String,
        record_id: Option<String>,
        original_value: Value,
        #[source]
        cause: SelectionCause,
    },

    #[error("selector build error: {0}")]
    Build(String),
}

/// What actually went wrong underneath a `Selection` error.
#[derive(Debug, thiserror::Error)]
pub enum SelectionCause {
    #[error("duplicate output key '{key}'")]
    MergeConflict { key: String },

    #[error("missing field '{field}'")]
    MissingField { field: String },

    #[error("expected {expected}, got {got}")]
    UnexpectedType { expected: &'static str, got: String },

    #[error(transparent)]
    User(Box<dyn std::error::Error + Send + Sync>),
}

impl SiftError {
    /// Snapshot the given context into a `Selection` error.
    pub fn selection(context: &SelectionContext, cause: SelectionCause) -> Self {
        SiftError::Selection {
            code_path: context.code_path(),
            data_path: context.data_path(),
            record_id: context.original_value_id().map(render_record_id),
            original_value: context.original_value().clone(),
            cause,
        }
    }

    /// The underlying cause, when this is a `Selection` error.
    pub fn cause(&self) -> Option<&SelectionCause> {
        match self {
            SiftError::Selection { cause, .. } => Some(cause),
            SiftError::Build(_) => None,
        }
    }

    /// Returns `true` if this error is a merge conflict between ensemble
    /// branches.
    pub fn is_merge_conflict(&self) -> bool {
        matches!(
            self.cause(),
            Some(SelectionCause::MergeConflict { .. })
        )
    }

    /// The rendered combinator chain, for `Selection` errors.
    pub fn code_path(&self) -> Option<&str> {
        match self {
            SiftError::Selection { code_path, .. } => Some(code_path),
            SiftError::Build(_) => None,
        }
    }

    /// The rendered input path, for `Selection` errors.
    pub fn data_path(&self) -> Option<&str> {
        match self {
            SiftError::Selection { data_path, .. } => Some(data_path),
            SiftError::Build(_) => None,
        }
    }

    /// The stable record id computed at the root, if an id selector was set.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            SiftError::Selection { record_id, .. } => record_id.as_deref(),
            SiftError::Build(_) => None,
        }
    }

    /// The top-level input value the failed invocation started from.
    pub fn original_value(&self) -> Option<&Value> {
        match self {
            SiftError::Selection { original_value, .. } => Some(original_value),
            SiftError::Build(_) => None,
        }
    }
}

/// A convenience alias for `Result<T, SiftError>`.
pub type Result<T> = std::result::Result<T, SiftError>;

fn render_record_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Warnings — recoverable diagnostics
// ---------------------------------------------------------------------------

/// A recoverable diagnostic recorded during one invocation.
///
/// Warnings never abort evaluation; they accumulate in the context's shared
/// sink and are handed back to the caller alongside the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A null-propagating field getter could not reach its field.
    MissingField {
        field: String,
        code_path: String,
        data_path: String,
    },
    /// A null-propagating function feed received a null argument and skipped
    /// the call.
    NoneArgument {
        fn_name: String,
        code_path: String,
        data_path: String,
    },
}

impl Warning {
    pub fn code_path(&self) -> &str {
        match self {
            Warning::MissingField { code_path, .. } => code_path,
            Warning::NoneArgument { code_path, .. } => code_path,
        }
    }

    pub fn data_path(&self) -> &str {
        match self {
            Warning::MissingField { data_path, .. } => data_path,
            Warning::NoneArgument { data_path, .. } => data_path,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingField {
                field,
                code_path,
                data_path,
            } => write!(f, "missing field '{field}' at {code_path} ({data_path})"),
            Warning::NoneArgument {
                fn_name,
                code_path,
                data_path,
            } => write!(f, "null argument for '{fn_name}' at {code_path} ({data_path})"),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionContext — provenance threaded through evaluation
// ---------------------------------------------------------------------------

/// Where a child selector sits within its parent's own algorithm: a step
/// index for pipelines and broadcasts, a branch key for named ensembles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Index(usize),
    Key(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Index(i) => write!(f, "{i}"),
            Stage::Key(k) => write!(f, "{k}"),
        }
    }
}

/// One level of the call stack: which selector, under which name, invoked a
/// child at which stage.
#[derive(Debug, Clone, Serialize)]
pub struct CallStackItem {
    pub selector_type: &'static str,
    pub selector_name: String,
    pub stage: Stage,
    pub called: String,
}

/// Provenance for one top-level invocation.
///
/// A root context is created once per external call and then *extended* (never
/// mutated in place) on every recursive descent: the call stack and data path
/// are copied on append, while the warning sink and the original value are
/// shared by reference across the whole tree. Contexts are per-invocation and
/// never cross threads; the selector trees they evaluate may.
#[derive(Clone)]
pub struct SelectionContext {
    call_stack: Vec<CallStackItem>,
    data_path: Vec<String>,
    warnings: Rc<RefCell<Vec<Warning>>>,
    original_value: Rc<Value>,
    original_value_id: Option<Value>,
}

impl SelectionContext {
    /// Create the root context for one invocation.
    ///
    /// The record id is computed here, once, by applying `id_selector` to the
    /// original value. A failing id selector degrades to no id — it is a
    /// diagnostic aid, not a correctness requirement.
    pub fn root(original_value: &Value, id_selector: Option<&ValueFn>) -> Self {
        let original_value = Rc::new(original_value.clone());
        let original_value_id = id_selector.and_then(|f| f(&original_value).ok());
        Self {
            call_stack: Vec::new(),
            data_path: Vec::new(),
            warnings: Rc::new(RefCell::new(Vec::new())),
            original_value,
            original_value_id,
        }
    }

    /// Return a new context extended by one call-stack level and zero or more
    /// data-path segments. The receiver is left untouched; the warning sink
    /// and original value are shared with the new context.
    pub fn append_call(
        &self,
        selector_type: &'static str,
        selector_name: impl Into<String>,
        stage: Stage,
        called: impl Into<String>,
        extra_path: &[String],
    ) -> Self {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(CallStackItem {
            selector_type,
            selector_name: selector_name.into(),
            stage,
            called: called.into(),
        });
        let mut data_path = self.data_path.clone();
        data_path.extend(extra_path.iter().cloned());
        Self {
            call_stack,
            data_path,
            warnings: Rc::clone(&self.warnings),
            original_value: Rc::clone(&self.original_value),
            original_value_id: self.original_value_id.clone(),
        }
    }

    /// Render the call stack as `/stage1/stage2/...:calledName`.
    ///
    /// This is the "which combinators, at which step" half of a diagnostic.
    /// An empty stack (a failure at the root itself) renders as `/`.
    pub fn code_path(&self) -> String {
        if self.call_stack.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for item in &self.call_stack {
            out.push('/');
            out.push_str(&item.stage.to_string());
        }
        if let Some(last) = self.call_stack.last() {
            out.push(':');
            out.push_str(&last.called);
        }
        out
    }

    /// Render the accumulated input-path segments joined by `.` — the "which
    /// part of the input value" half of a diagnostic.
    pub fn data_path(&self) -> String {
        self.data_path.join(".")
    }

    /// Append a recoverable warning to the invocation-wide sink.
    pub fn push_warning(&self, warning: Warning) {
        tracing::warn!(%warning, "recoverable selection warning");
        self.warnings.borrow_mut().push(warning);
    }

    /// Snapshot of the warnings collected so far in this invocation.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    pub fn call_stack(&self) -> &[CallStackItem] {
        &self.call_stack
    }

    pub fn data_path_segments(&self) -> &[String] {
        &self.data_path
    }

    /// The top-level input value this invocation started from.
    pub fn original_value(&self) -> &Value {
        &self.original_value
    }

    /// The stable record id, if an id selector was set and succeeded.
    pub fn original_value_id(&self) -> Option<&Value> {
        self.original_value_id.as_ref()
    }
}

impl fmt::Debug for SelectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionContext")
            .field("code_path", &self.code_path())
            .field("data_path", &self.data_path())
            .field("warnings", &self.warnings.borrow().len())
            .field("original_value_id", &self.original_value_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
