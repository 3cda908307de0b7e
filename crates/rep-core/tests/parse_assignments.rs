use proptest::prelude::*;
use rep_core::{
    format_assignments, param_map, parse_assignments, ParamMap, ParamSchema, ParamSpec, ParamValue,
};

#[test]
fn parses_scalars_of_every_kind() {
    let map = parse_assignments("lambda=0.5, iterations=200,verbose=true,name='a,b',mode=fast")
        .expect("parse");
    assert_eq!(map["lambda"], ParamValue::Float(0.5));
    assert_eq!(map["iterations"], ParamValue::Int(200));
    assert_eq!(map["verbose"], ParamValue::Bool(true));
    assert_eq!(map["name"], ParamValue::Str("a,b".into()));
    assert_eq!(map["mode"], ParamValue::Str("fast".into()));
}

#[test]
fn empty_input_is_an_empty_map() {
    assert!(parse_assignments("").unwrap().is_empty());
    assert!(parse_assignments(" , ").unwrap().is_empty());
}

#[test]
fn exponent_floats_and_negative_ints() {
    let map = parse_assignments("tol=1e-6,shift=-3").unwrap();
    assert_eq!(map["tol"], ParamValue::Float(1e-6));
    assert_eq!(map["shift"], ParamValue::Int(-3));
}

#[test]
fn rejects_malformed_input() {
    for input in [
        "lambda",
        "=3",
        "1x=3",
        "a=1,a=2",
        "name='open",
        "a=1.2.3",
        "a=__import__('os')",
        "a=",
    ] {
        let err = parse_assignments(input).expect_err(input);
        assert!(err.is_config(), "{input}: {err}");
    }
}

#[test]
fn schema_rejects_unknown_keys_and_wrong_types() {
    let schema = ParamSchema::new("ridge")
        .with(ParamSpec::float("lambda", 0.1, "regularization weight"))
        .with(ParamSpec::int("iterations", 10, "iteration cap"));

    let err = schema.coerce(&param_map! { "zzz" => 1_i64 }).unwrap_err();
    assert_eq!(err.info().code, "unknown-parameter");
    assert!(err.info().hint.as_deref().unwrap().contains("lambda"));

    let err = schema.coerce(&param_map! { "iterations" => 1.5_f64 }).unwrap_err();
    assert_eq!(err.info().code, "param-type");

    let resolved = schema.resolve(&param_map! { "lambda" => 2_i64 }).unwrap();
    assert_eq!(resolved["lambda"], ParamValue::Float(2.0));
    assert_eq!(resolved["iterations"], ParamValue::Int(10));
}

fn scalar() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        any::<bool>().prop_map(ParamValue::Bool),
        any::<i64>().prop_map(ParamValue::Int),
        (-1e6f64..1e6).prop_map(ParamValue::Float),
        "[a-z][a-z0-9_]{0,8}".prop_map(ParamValue::Str),
    ]
}

proptest! {
    #[test]
    fn formatted_maps_parse_back(
        entries in proptest::collection::btree_map("[a-z][a-z0-9_]{0,6}", scalar(), 0..6)
    ) {
        let map: ParamMap = entries;
        let rendered = format_assignments(&map);
        let parsed = parse_assignments(&rendered).unwrap();
        prop_assert_eq!(parsed.len(), map.len());
        for (key, value) in &map {
            match (value, &parsed[key]) {
                (ParamValue::Float(a), ParamValue::Float(b)) => {
                    prop_assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0))
                }
                (a, b) => prop_assert_eq!(a, b),
            }
        }
    }
}
