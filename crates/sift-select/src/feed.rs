//! Arbitrary function application as a selector step.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sift_types::{BoxError, Result, SelectionCause, SelectionContext, SiftError, ValueFn, Warning};

use crate::selector::{Evaluated, Selector, SelectorKind};

/// Terminal selector: feed the input value to a user-supplied function and
/// return its result.
///
/// With null propagation a null input is not fed to the function at all: a
/// warning is recorded and null is returned. Without it the function always
/// runs and its failure aborts the invocation, wrapped with the context
/// snapshot at the call site.
#[derive(Clone)]
pub struct FunctionFeed {
    label: String,
    f: ValueFn,
    null_propagation: bool,
}

impl FunctionFeed {
    /// Strict feed: the function is always called.
    pub fn new(
        label: impl Into<String>,
        f: impl Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::from_value_fn(label, Arc::new(f), false)
    }

    /// Null-propagating feed: a null input short-circuits with a warning.
    pub fn elvis(
        label: impl Into<String>,
        f: impl Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::from_value_fn(label, Arc::new(f), true)
    }

    pub(crate) fn from_value_fn(
        label: impl Into<String>,
        f: ValueFn,
        null_propagation: bool,
    ) -> Self {
        Self {
            label: label.into(),
            f,
            null_propagation,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn null_propagation(&self) -> bool {
        self.null_propagation
    }

    pub(crate) fn eval(&self, value: &Value, context: &SelectionContext) -> Result<Evaluated> {
        if self.null_propagation && value.is_null() {
            context.push_warning(Warning::NoneArgument {
                fn_name: self.label.clone(),
                code_path: context.code_path(),
                data_path: context.data_path(),
            });
            return Ok(Evaluated::halted(Value::Null));
        }
        match (self.f)(value) {
            Ok(out) => Ok(Evaluated::of(out)),
            Err(cause) => Err(SiftError::selection(context, SelectionCause::User(cause))),
        }
    }
}

impl fmt::Debug for FunctionFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionFeed")
            .field("label", &self.label)
            .field("null_propagation", &self.null_propagation)
            .finish()
    }
}

impl From<FunctionFeed> for Selector {
    fn from(feed: FunctionFeed) -> Self {
        Selector::new(SelectorKind::Feed(feed))
    }
}
