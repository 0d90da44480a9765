//! Sequential composition: thread one value through an ordered list of steps.

use serde_json::Value;
use sift_types::{Result, SelectionContext, SiftError, Stage};

use crate::selector::{guarded_call, Evaluated, Selector, SelectorKind};

/// Feeds each step's output to the next step, returning the final output.
///
/// Each step is invoked with the context extended by its own stage index and
/// the data-path contributions of the steps before it, so a failure at step
/// `k` carries exactly the path of steps `0..k`.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Selector>,
}

impl Pipeline {
    /// An empty step list is a configuration error, rejected here rather
    /// than at evaluation time.
    pub fn new(steps: Vec<Selector>) -> Result<Self> {
        if steps.is_empty() {
            return Err(SiftError::Build("pipeline requires at least one step".into()));
        }
        Ok(Self { steps })
    }

    /// Internal constructor for pipelines the engine assembles itself, where
    /// non-emptiness holds by construction.
    pub(crate) fn of(steps: Vec<Selector>) -> Self {
        debug_assert!(!steps.is_empty());
        Self { steps }
    }

    pub fn steps(&self) -> &[Selector] {
        &self.steps
    }

    pub(crate) fn eval(
        &self,
        owner: &Selector,
        value: &Value,
        context: &SelectionContext,
    ) -> Result<Evaluated> {
        let mut current = value.clone();
        let mut segments: Vec<String> = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            let child_context = context.append_call(
                owner.type_name(),
                owner.display_name(),
                Stage::Index(index),
                step.display_name(),
                &segments,
            );
            let out = guarded_call(step, &current, &child_context)?;
            match out.path {
                Some(path) => segments.extend(path),
                None => segments.push(step.display_name()),
            }
            current = out.value;
            if out.halted {
                break;
            }
        }
        // The accumulated segments become this pipeline's own contribution,
        // so a parent sees one coherent path fragment.
        Ok(Evaluated {
            value: current,
            path: Some(segments),
            halted: false,
        })
    }
}

impl From<Pipeline> for Selector {
    fn from(pipeline: Pipeline) -> Self {
        Selector::new(SelectorKind::Pipeline(pipeline))
    }
}
