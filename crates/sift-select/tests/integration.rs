//! End-to-end integration tests for the sift selector engine.
//!
//! Each test builds a selector tree through the public surface and exercises
//! the full path: build -> apply -> inspect result, warnings, or error
//! provenance.

use serde_json::{json, Value};

use sift_select::{
    list_featurizer, Address, AddressPart, Ensemble, Listwise, Pipeline, Selector,
    SelectorBuilder,
};
use sift_types::{SelectionCause, SiftError, Warning};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record() -> Value {
    json!({"a": {"x": {"u": 1}, "y": {"v": 2, "w": 3}}, "b": 5, "d": null})
}

// ---------------------------------------------------------------------------
// Builder scenarios
// ---------------------------------------------------------------------------

#[test]
fn select_one_top_level_field() {
    let selector = SelectorBuilder::new().select(["b"]).build().unwrap();
    assert_eq!(selector.apply(&record()).unwrap(), json!({"b": 5}));
}

#[test]
fn select_mixed_depths_into_one_flat_map() {
    let selector = SelectorBuilder::new()
        .select(["a.x.u", "a.y.w", "b"])
        .build()
        .unwrap();
    assert_eq!(
        selector.apply(&record()).unwrap(),
        json!({"b": 5, "u": 1, "w": 3})
    );
}

#[test]
fn prefix_scopes_a_batch_of_selections() {
    let selector = SelectorBuilder::new()
        .with_prefix("a.y")
        .select(["v", "w"])
        .build()
        .unwrap();
    assert_eq!(selector.apply(&record()).unwrap(), json!({"v": 2, "w": 3}));
}

#[test]
fn null_propagation_reports_the_break_and_keeps_going() {
    let selector = SelectorBuilder::new().select(["d.x.xx"]).build().unwrap();
    let (result, context) = selector.apply_with_context(&record()).unwrap();
    assert_eq!(result, json!({"xx": null}));

    let warnings = context.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(&warnings[0], Warning::MissingField { .. }));
}

#[test]
fn reusing_one_tree_across_records_keeps_invocations_isolated() {
    let selector = SelectorBuilder::new().select(["a.x.u"]).build().unwrap();

    let (hit, clean_context) = selector.apply_with_context(&record()).unwrap();
    assert_eq!(hit, json!({"u": 1}));
    assert!(clean_context.warnings().is_empty());

    let (miss, dirty_context) = selector.apply_with_context(&json!({"b": 1})).unwrap();
    assert_eq!(miss, json!({"u": null}));
    assert_eq!(dirty_context.warnings().len(), 1);

    // The earlier invocation's context is untouched by the later one.
    assert!(clean_context.warnings().is_empty());
}

// ---------------------------------------------------------------------------
// Merge conflicts
// ---------------------------------------------------------------------------

#[test]
fn duplicate_output_key_aborts_with_the_exact_key() {
    let ensemble = Ensemble::new()
        .branch(Selector::constant(json!({"a": 1})))
        .named("a", Selector::constant(json!(1)));
    let err = Selector::from(ensemble).apply(&json!({})).unwrap_err();

    assert!(err.is_merge_conflict());
    match err.cause() {
        Some(SelectionCause::MergeConflict { key }) => assert_eq!(key, "a"),
        other => panic!("expected MergeConflict, got: {other:?}"),
    }
}

#[test]
fn no_partial_result_escapes_a_conflicted_ensemble() {
    let selector = SelectorBuilder::new()
        .select(["b"])
        .select_as("b", "a.x.u")
        .build()
        .unwrap();
    match selector.apply(&record()) {
        Err(err) => assert!(err.is_merge_conflict()),
        Ok(partial) => panic!("conflicted ensemble returned a result: {partial}"),
    }
}

// ---------------------------------------------------------------------------
// Error provenance
// ---------------------------------------------------------------------------

#[test]
fn deep_failure_renders_code_path_and_data_path() {
    let selector = SelectorBuilder::strict()
        .select(["a.x.nope"])
        .build()
        .unwrap();
    let err = selector.apply(&record()).unwrap_err();

    let code_path = err.code_path().unwrap();
    let data_path = err.data_path().unwrap();
    // The failing getter sits at the end of the rendered chain.
    assert!(code_path.ends_with(":[nope]"), "code path: {code_path}");
    // Only the successful accesses made it into the data path.
    assert_eq!(data_path, "[a].[x]");
    // The rendered message is the code path and the data path, in that order.
    assert_eq!(err.to_string(), format!("{code_path}\n{data_path}"));
}

#[test]
fn id_selector_attributes_failures_to_a_record() {
    let selector = SelectorBuilder::strict()
        .select(["a.x.nope"])
        .build()
        .unwrap()
        .with_id_selector(|v| v.get("b").cloned().ok_or_else(|| "no id".into()));
    let err = selector.apply(&record()).unwrap_err();
    assert_eq!(err.record_id(), Some("5"));
}

#[test]
fn user_function_failure_keeps_its_cause() {
    let address = Address::path("b").then(AddressPart::func("fail", |_| {
        Err("deliberate failure".into())
    }));
    let selector = SelectorBuilder::strict()
        .select_as("out", address)
        .build()
        .unwrap();
    let err = selector.apply(&record()).unwrap_err();
    match err.cause() {
        Some(SelectionCause::User(inner)) => {
            assert_eq!(inner.to_string(), "deliberate failure")
        }
        other => panic!("expected User cause, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Pipelines and broadcasts
// ---------------------------------------------------------------------------

#[test]
fn pipeline_composes_like_nested_function_application() {
    let double = Selector::func("double", |v| {
        Ok(json!(v.as_i64().ok_or("not an integer")? * 2))
    });
    let pipeline = Pipeline::new(vec![
        Selector::field("a"),
        Selector::field("y"),
        Selector::field("w"),
        double,
    ])
    .unwrap();
    let result = Selector::from(pipeline).apply(&record()).unwrap();
    assert_eq!(result, json!(6));
}

#[test]
fn listwise_broadcast_preserves_element_order() {
    let per_element = SelectorBuilder::strict()
        .select(["name"])
        .build()
        .unwrap();
    let broadcast = Selector::from(Listwise::new(per_element));
    let input = json!([{"name": "u"}, {"name": "v"}, {"name": "w"}]);
    assert_eq!(
        broadcast.apply(&input).unwrap(),
        json!([{"name": "u"}, {"name": "v"}, {"name": "w"}])
    );
}

#[test]
fn listwise_failure_names_the_offending_element() {
    let broadcast = Selector::from(Listwise::new(Selector::field("v")));
    let err = broadcast
        .apply(&json!([{"v": 1}, {"v": 2}, {"w": 3}]))
        .unwrap_err();
    let code_path = err.code_path().unwrap();
    assert!(code_path.starts_with("/2/"), "code path: {code_path}");
}

#[test]
fn list_featurizer_pivots_and_null_fills() {
    // Per element: grab u and v (null-propagating). Per column: the list as-is.
    let per_element = SelectorBuilder::new().select(["u", "v"]).build().unwrap();
    let keep = Selector::func("keep", |v| Ok(v.clone()));
    let featurizer = list_featurizer(per_element, keep);

    let input = json!([{"u": 1, "v": 10}, {"u": 2}, {"v": 30}]);
    let (result, context) = featurizer.apply_with_context(&input).unwrap();
    assert_eq!(
        result,
        json!({"u": [1, 2, null], "v": [10, null, 30]})
    );
    // The two per-element misses surfaced as warnings, not failures.
    assert_eq!(context.warnings().len(), 2);
}

// ---------------------------------------------------------------------------
// Structure description
// ---------------------------------------------------------------------------

#[test]
fn describe_structure_mirrors_the_built_tree() {
    let selector = SelectorBuilder::new()
        .select(["a.x.u", "b"])
        .build()
        .unwrap()
        .with_name("features");
    let described = selector.describe_structure();

    assert_eq!(described["type"], "Ensemble");
    assert_eq!(described["name"], "features");
    // One positional entry: the batch ensemble holding the named selections.
    let batch = &described["positional"][0];
    assert_eq!(batch["type"], "Ensemble");
    assert_eq!(batch["named"]["u"]["type"], "Pipeline");
    assert_eq!(batch["named"]["b"]["type"], "Pipeline");
}

// ---------------------------------------------------------------------------
// Build-time validation
// ---------------------------------------------------------------------------

#[test]
fn keyless_positional_address_fails_at_build_not_evaluation() {
    let address = Address::new([AddressPart::func("noop", |v| Ok(v.clone()))]);
    let err = SelectorBuilder::new().select([address]).build().unwrap_err();
    assert!(matches!(err, SiftError::Build(_)));
}

#[test]
fn empty_pipeline_fails_at_build() {
    assert!(matches!(
        Pipeline::new(Vec::new()),
        Err(SiftError::Build(_))
    ));
}
