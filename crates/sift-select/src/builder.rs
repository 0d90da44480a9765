//! Fluent builder over the address layer: stage a prefix, select fields,
//! collect everything into one merge-checked ensemble.

use sift_types::{Result, SiftError};

use crate::address::{derived_key, Address};
use crate::ensemble::Ensemble;
use crate::pipeline::Pipeline;
use crate::selector::Selector;

/// Builds a selector that extracts a flat, named feature map from a nested
/// record.
///
/// Each [`select`](Self::select) / [`select_as`](Self::select_as) call
/// appends one merge-checked entry to the builder's overall ensemble;
/// [`with_prefix`](Self::with_prefix) stages an address prepended to the
/// next call only. Configuration mistakes — a malformed path, an address
/// with no derivable output key — are recorded as they are seen and
/// surfaced by [`build`](Self::build), never deferred to evaluation.
///
/// The builder compiles null-propagating by default: a missing field warns
/// and yields null instead of failing the record. Use
/// [`strict`](Self::strict) for hard failures.
pub struct SelectorBuilder {
    prefix: Option<Address>,
    ensemble: Ensemble,
    null_propagation: bool,
    build_errors: Vec<String>,
}

impl SelectorBuilder {
    /// Null-propagating builder.
    pub fn new() -> Self {
        Self {
            prefix: None,
            ensemble: Ensemble::new(),
            null_propagation: true,
            build_errors: Vec::new(),
        }
    }

    /// Strict builder: missing fields fail the whole invocation.
    pub fn strict() -> Self {
        Self {
            null_propagation: false,
            ..Self::new()
        }
    }

    /// Stage a prefix applied to the next `select`/`select_as` call only.
    pub fn with_prefix(mut self, prefix: impl Into<Address>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Select a batch of addresses. Each output key is derived from the last
    /// field access in its compiled chain; an address without one (a pure
    /// function chain) is a build error — name it via `select_as` instead.
    pub fn select<A: Into<Address>>(mut self, addresses: impl IntoIterator<Item = A>) -> Self {
        let mut batch = Ensemble::new();
        for address in addresses {
            let address = address.into().null_propagation(self.null_propagation);
            let compiled = match address.compile() {
                Ok(compiled) => compiled,
                Err(err) => {
                    self.build_errors.push(err.to_string());
                    continue;
                }
            };
            match derived_key(&compiled) {
                Some(key) => batch = batch.named(key, compiled),
                None => self.build_errors.push(format!(
                    "cannot derive an output key for '{}'; name it via select_as",
                    compiled.display_name()
                )),
            }
        }
        self.push_entry(batch);
        self
    }

    /// Select one address under an explicit output key.
    pub fn select_as(mut self, key: impl Into<String>, address: impl Into<Address>) -> Self {
        let mut batch = Ensemble::new();
        let address = address.into().null_propagation(self.null_propagation);
        match address.compile() {
            Ok(compiled) => batch = batch.named(key, compiled),
            Err(err) => self.build_errors.push(err.to_string()),
        }
        self.push_entry(batch);
        self
    }

    fn push_entry(&mut self, batch: Ensemble) {
        let entry: Selector = match self.prefix.take() {
            None => batch.into(),
            Some(prefix) => {
                let prefix = prefix.null_propagation(self.null_propagation);
                match prefix.compile() {
                    Ok(compiled) => Pipeline::of(vec![compiled, batch.into()]).into(),
                    Err(err) => {
                        self.build_errors.push(err.to_string());
                        return;
                    }
                }
            }
        };
        self.ensemble = std::mem::take(&mut self.ensemble).branch(entry);
    }

    /// Finish: the overall ensemble as one selector, or the first recorded
    /// build error.
    pub fn build(mut self) -> Result<Selector> {
        if !self.build_errors.is_empty() {
            return Err(SiftError::Build(self.build_errors.remove(0)));
        }
        if self.ensemble.is_empty() {
            return Err(SiftError::Build(
                "nothing selected; call select() or select_as()".into(),
            ));
        }
        Ok(Selector::from(self.ensemble))
    }
}

impl Default for SelectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
