//! Selector/combinator engine: declaratively extract and reshape values out
//! of loosely-structured nested records into flat, named feature maps.
//!
//! A selector tree is built once — via [`SelectorBuilder`], [`Address`], or
//! the combinator constructors — and applied once per input record. A
//! failure anywhere in a composition carries the exact combinator chain and
//! input path that led to it; recoverable misses accumulate as warnings on
//! the invocation's context.

pub mod address;
pub mod builder;
pub mod ensemble;
pub mod feed;
pub mod field;
pub mod pipeline;
pub mod selector;

pub use address::{Address, AddressPart};
pub use builder::SelectorBuilder;
pub use ensemble::{list_featurizer, Dictwise, Ensemble, Listwise};
pub use feed::FunctionFeed;
pub use field::{FieldGetter, FieldKey};
pub use pipeline::Pipeline;
pub use selector::{Selector, SelectorKind};
