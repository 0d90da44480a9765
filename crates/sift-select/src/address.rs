//! Compact-notation addresses: compile mixed path/index/selector/function
//! elements into one pipeline.
//!
//! The only surface syntax is the dot-splitting of strings; everything else
//! arrives as a typed element.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sift_types::{BoxError, Result, SiftError, ValueFn};

use crate::feed::FunctionFeed;
use crate::field::FieldGetter;
use crate::pipeline::Pipeline;
use crate::selector::{Selector, SelectorKind};

/// One element of an address: a dot-separated field path, a list index, a
/// pre-built selector (used verbatim), or a bare function.
#[derive(Clone)]
pub enum AddressPart {
    Path(String),
    Index(usize),
    Selector(Selector),
    Func(String, ValueFn),
}

impl AddressPart {
    /// A bare function element, wrapped as a function-feed step when the
    /// address compiles.
    pub fn func(
        label: impl Into<String>,
        f: impl Fn(&Value) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        AddressPart::Func(label.into(), Arc::new(f))
    }
}

impl fmt::Debug for AddressPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressPart::Path(path) => f.debug_tuple("Path").field(path).finish(),
            AddressPart::Index(index) => f.debug_tuple("Index").field(index).finish(),
            AddressPart::Selector(selector) => f.debug_tuple("Selector").field(selector).finish(),
            AddressPart::Func(label, _) => f.debug_tuple("Func").field(label).finish(),
        }
    }
}

impl From<&str> for AddressPart {
    fn from(path: &str) -> Self {
        AddressPart::Path(path.to_string())
    }
}

impl From<String> for AddressPart {
    fn from(path: String) -> Self {
        AddressPart::Path(path)
    }
}

impl From<usize> for AddressPart {
    fn from(index: usize) -> Self {
        AddressPart::Index(index)
    }
}

impl From<Selector> for AddressPart {
    fn from(selector: Selector) -> Self {
        AddressPart::Selector(selector)
    }
}

/// An ordered list of address elements plus the null-propagation mode
/// applied to the field getters and functions it compiles.
#[derive(Debug, Clone)]
pub struct Address {
    parts: Vec<AddressPart>,
    null_propagation: bool,
}

impl Address {
    /// Strict address: a miss anywhere in the chain fails the invocation.
    pub fn new<P: Into<AddressPart>>(parts: impl IntoIterator<Item = P>) -> Self {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
            null_propagation: false,
        }
    }

    /// Null-propagating address: misses warn and yield null.
    pub fn elvis<P: Into<AddressPart>>(parts: impl IntoIterator<Item = P>) -> Self {
        Self::new(parts).null_propagation(true)
    }

    /// A single dot-separated path.
    pub fn path(path: impl Into<String>) -> Self {
        Self::new([AddressPart::Path(path.into())])
    }

    /// Append one more element.
    pub fn then(mut self, part: impl Into<AddressPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn null_propagation(mut self, null_propagation: bool) -> Self {
        self.null_propagation = null_propagation;
        self
    }

    pub fn is_null_propagating(&self) -> bool {
        self.null_propagation
    }

    /// Compile into a single pipeline selector. Each dot-segment of a path
    /// element becomes one field getter; pre-built selectors are used as-is.
    pub fn compile(&self) -> Result<Selector> {
        let mut steps: Vec<Selector> = Vec::new();
        for part in &self.parts {
            match part {
                AddressPart::Path(path) => {
                    for segment in path.split('.') {
                        if segment.is_empty() {
                            return Err(SiftError::Build(format!(
                                "empty segment in path '{path}'"
                            )));
                        }
                        steps.push(FieldGetter::new(segment, self.null_propagation).into());
                    }
                }
                AddressPart::Index(index) => {
                    steps.push(FieldGetter::new(*index, self.null_propagation).into());
                }
                AddressPart::Selector(selector) => steps.push(selector.clone()),
                AddressPart::Func(label, f) => {
                    steps.push(
                        FunctionFeed::from_value_fn(
                            label.clone(),
                            Arc::clone(f),
                            self.null_propagation,
                        )
                        .into(),
                    );
                }
            }
        }
        Pipeline::new(steps).map(Selector::from)
    }
}

impl From<&str> for Address {
    fn from(path: &str) -> Self {
        Address::path(path)
    }
}

impl From<String> for Address {
    fn from(path: String) -> Self {
        Address::path(path)
    }
}

impl From<Selector> for Address {
    fn from(selector: Selector) -> Self {
        Address::new([AddressPart::Selector(selector)])
    }
}

/// Output key auto-derivation: the bare key of the last field-access step in
/// a compiled address chain, if any.
pub(crate) fn derived_key(compiled: &Selector) -> Option<String> {
    let steps = match compiled.kind() {
        SelectorKind::Pipeline(pipeline) => pipeline.steps(),
        _ => std::slice::from_ref(compiled),
    };
    steps.iter().rev().find_map(|step| match step.kind() {
        SelectorKind::Field(getter) => Some(getter.key().to_string()),
        _ => None,
    })
}
