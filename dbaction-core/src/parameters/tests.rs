//! Tests for slot maps, materialisation and expansion.

use std::collections::HashMap;

use serde_json::json;

use super::*;
use crate::context::ActionRequest;
use crate::error::SlotResolutionError;
use crate::names::Control;
use crate::query::{Binding, Query};

fn namespace(controls: &[(&str, &str)]) -> HashMap<String, Control> {
    controls
        .iter()
        .map(|(id, name)| (id.to_string(), Control::new(*id, *name)))
        .collect()
}

fn inputs(n: usize) -> Vec<Binding> {
    (1..=n).map(|i| Binding::new(format!("P1_C{}", i))).collect()
}

fn map_of(sql: &str, inputs: &[Binding]) -> Vec<usize> {
    build_parameter_map(sql, inputs, &namespace(&[]))
        .unwrap()
        .as_slice()
        .to_vec()
}

// ============================================================================
// Parameter map
// ============================================================================

#[test]
fn test_anonymous_slots_in_order() {
    for n in 0..6 {
        let slots = vec!["?"; n].join(", ");
        let sql = format!("select * from t where x in ({}) /* ? */ and y <> '?'", slots);
        assert_eq!(map_of(&sql, &inputs(n)), (0..n).collect::<Vec<_>>());
    }
}

#[test]
fn test_anonymous_slots_around_noise() {
    let sql = "/* ? */ select ? , '?' , ? /* '?' */ , '/* ?' , ?";
    assert_eq!(map_of(sql, &inputs(3)), vec![0, 1, 2]);
}

#[test]
fn test_slots_in_noise_never_appear() {
    let sql = "select a from t /* where b = ? */ where c = '?x' and d = 'a?b'";
    assert!(map_of(sql, &inputs(2)).is_empty());
}

#[test]
fn test_numbered_slots() {
    assert_eq!(
        map_of("select ?2, ?1, ?2 from t", &inputs(2)),
        vec![1, 0, 1]
    );
}

#[test]
fn test_out_of_range_slots_are_dropped() {
    assert_eq!(map_of("select ?1, ?5, ?0, ? from t", &inputs(2)), vec![0, 0]);
    assert_eq!(map_of("select ?, ?, ? from t", &inputs(2)), vec![0, 1]);
}

#[test]
fn test_anonymous_counter_ignores_numbered() {
    assert_eq!(map_of("select ?2, ?, ? from t", &inputs(2)), vec![1, 0, 1]);
}

#[test]
fn test_named_slot_repeated() {
    let ns = namespace(&[("C1", "id")]);
    let map = build_parameter_map(
        "select * from t where x = ?id and y = ?id",
        &[Binding::with_field("C1", "id")],
        &ns,
    )
    .unwrap();
    assert_eq!(map.as_slice(), &[0, 0]);
}

#[test]
fn test_named_slot_dotted_and_quoted() {
    let ns = namespace(&[("P1_C1", "Customer"), ("P1_C2", "Order Date")]);
    let inputs = vec![
        Binding::with_field("P1_C1", "Last Name"),
        Binding::new("P1_C2"),
        Binding::new("System.user name"),
    ];
    let sql = concat!(
        "select * from t where a = ?Customer.LastName",
        r#" and b = ?"Order Date" and c = ?"System.user name""#
    );
    let map = build_parameter_map(sql, &inputs, &ns).unwrap();
    assert_eq!(map.as_slice(), &[0, 1, 2]);
}

#[test]
fn test_unknown_name_is_dropped() {
    let ns = namespace(&[("P1_C1", "Customer")]);
    let map = build_parameter_map(
        "select * from t where a = ?Nobody and b = ?Customer",
        &[Binding::new("P1_C1")],
        &ns,
    )
    .unwrap();
    assert_eq!(map.as_slice(), &[0]);
}

#[test]
fn test_stored_procedure_requires_every_input() {
    let ns = namespace(&[("A", "A"), ("B", "B")]);
    let err = build_parameter_map(
        "{call proc(?A)}",
        &[Binding::new("A"), Binding::new("B")],
        &ns,
    )
    .unwrap_err();
    assert_eq!(err, SlotResolutionError::UnusedInput { index: 2 });
}

#[test]
fn test_stored_procedure_prefix_is_normalised() {
    let err = build_parameter_map("  { CALL proc(?2) }", &inputs(3), &namespace(&[])).unwrap_err();
    assert_eq!(err, SlotResolutionError::UnusedInput { index: 1 });
}

#[test]
fn test_unused_inputs_tolerated_elsewhere() {
    assert_eq!(map_of("select * from t where a = ?2", &inputs(3)), vec![1]);
    assert_eq!(map_of("call proc(?1)", &inputs(2)), vec![0]);
}

// ============================================================================
// Expansion
// ============================================================================

#[test]
fn test_expand_positions_values() {
    let map = ParameterMap::new(vec![1, 0, 1]);
    let params: Parameters = vec!["a".into(), 2i64.into()];
    let expanded = expand(&map, &params);
    assert_eq!(expanded.len(), map.len());
    for (j, ordinal) in map.iter().enumerate() {
        assert_eq!(expanded[j], params[*ordinal]);
    }
}

#[test]
fn test_expand_with_stale_map_returns_params() {
    let map = ParameterMap::new(vec![0]);
    let params: Parameters = vec![1i64.into(), 2i64.into()];
    assert_eq!(expand(&map, &params), params);
}

#[test]
fn test_expand_empty() {
    assert!(expand(&ParameterMap::default(), &[]).is_empty());
}

// ============================================================================
// Materialisation
// ============================================================================

fn request() -> ActionRequest {
    ActionRequest::new()
        .with_user("alice")
        .with_device("desktop")
        .with_session_attribute("tenant", 42i64)
        .with_page_variables(["orderId"])
        .with_input(InputTable::new(
            vec![
                "P1_C1.value".to_string(),
                "orderId".to_string(),
                "System.user name".to_string(),
            ],
            vec![
                vec![json!("first"), json!(7), json!("mallory")],
                vec![json!(2.5), json!(null), json!("mallory")],
            ],
        ))
}

#[test]
fn test_materialise_sources() {
    let inputs = vec![
        Binding::with_field("P1_C1", "Value"),
        Binding::new("orderId"),
        Binding::new("tenant"),
        Binding::new("System.device"),
        Binding::new("System.user name"),
        Binding::new("missing"),
    ];
    let ctx = request();

    let row0 = materialise_row(&inputs, 0, &ctx, DEFAULT_CONTROL_MARKER);
    assert_eq!(
        row0,
        vec![
            ParamValue::from("first"),
            ParamValue::Integer(7),
            ParamValue::Integer(42),
            ParamValue::from("desktop"),
            ParamValue::from("alice"),
            ParamValue::Null,
        ]
    );

    let row1 = materialise_row(&inputs, 1, &ctx, DEFAULT_CONTROL_MARKER);
    assert_eq!(row1[0], ParamValue::Float(2.5));
    assert_eq!(row1[1], ParamValue::Null);
}

#[test]
fn test_materialise_missing_row_is_null() {
    let inputs = vec![Binding::with_field("P1_C1", "value")];
    let row = materialise_row(&inputs, 9, &request(), DEFAULT_CONTROL_MARKER);
    assert_eq!(row, vec![ParamValue::Null]);

    let row = materialise_row(&inputs, 0, &ActionRequest::new(), DEFAULT_CONTROL_MARKER);
    assert_eq!(row, vec![ParamValue::Null]);
}

#[test]
fn test_materialise_other_system_value_reads_input() {
    let ctx = ActionRequest::new().with_input(InputTable::new(
        vec!["System.field".to_string()],
        vec![vec![json!({"k": 1})]],
    ));
    let row = materialise_row(&[Binding::new("System.field")], 0, &ctx, DEFAULT_CONTROL_MARKER);
    assert_eq!(row, vec![ParamValue::from("{\"k\":1}")]);
}

#[test]
fn test_row_count() {
    let ctx = request();
    assert_eq!(row_count(&Query::new("select 1"), &ctx), 1);
    assert_eq!(row_count(&Query::new("select 1").multi_row(true), &ctx), 2);
    assert_eq!(
        row_count(&Query::new("select 1").multi_row(true), &ActionRequest::new()),
        1
    );
}

#[test]
fn test_fingerprint_is_stable() {
    let params = vec![vec![ParamValue::from("a"), ParamValue::Null, ParamValue::Integer(3)]];
    assert_eq!(fingerprint(&params), r#"[["a",null,3]]"#);
    assert_eq!(fingerprint(&params), fingerprint(&params.clone()));

    let nested = vec![params.clone(), vec![vec![ParamValue::from("b")]]];
    assert_eq!(fingerprint(&nested), r#"[[["a",null,3]],[["b"]]]"#);
}
