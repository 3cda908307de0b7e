use rep_core::{apply_defaults, param_map, DefaultTable, Overrides, ParamValue, ParameterTree};

fn table(with_specific: bool) -> DefaultTable {
    let mut table = DefaultTable::new().model("*", param_map! { "a" => 1_i64 });
    if with_specific {
        table = table.model("M", param_map! { "a" => 2_i64 });
    }
    table
}

fn resolve(table: &DefaultTable, user: Option<i64>) -> ParameterTree {
    let mut tree = ParameterTree::new("d", "M", "pdhg");
    apply_defaults(&mut tree, table);
    if let Some(value) = user {
        let overrides = Overrides {
            model: param_map! { "a" => value },
            ..Overrides::default()
        };
        tree.apply_overrides(&overrides);
    }
    tree
}

#[test]
fn user_override_beats_specific_and_wildcard_defaults() {
    let tree = resolve(&table(true), Some(3));
    assert_eq!(tree.model["a"], ParamValue::Int(3));
}

#[test]
fn model_specific_default_beats_wildcard() {
    let tree = resolve(&table(true), None);
    assert_eq!(tree.model["a"], ParamValue::Int(2));
}

#[test]
fn wildcard_default_applies_without_specific_layer() {
    let tree = resolve(&table(false), None);
    assert_eq!(tree.model["a"], ParamValue::Int(1));
}

#[test]
fn solver_layers_follow_wildcard_then_model() {
    let table = DefaultTable::new()
        .solver("pdhg", "*", param_map! { "iterations" => 100_i64, "tol" => 1e-3_f64 })
        .solver("pdhg", "M", param_map! { "iterations" => 900_i64 })
        .solver("direct", "*", param_map! { "pivot_tol" => 1e-9_f64 })
        .plot(param_map! { "cmap" => "gray" });
    let mut tree = ParameterTree::new("d", "M", "pdhg");
    apply_defaults(&mut tree, &table);

    assert_eq!(tree.solver["iterations"], ParamValue::Int(900));
    assert_eq!(tree.solver["tol"], ParamValue::Float(1e-3));
    assert!(!tree.solver.contains_key("pivot_tol"));
    assert_eq!(tree.plot["cmap"], ParamValue::Str("gray".into()));
}

#[test]
fn unknown_names_yield_empty_layers() {
    let table = DefaultTable::new()
        .model("other", param_map! { "a" => 7_i64 })
        .solver("direct", "*", param_map! { "pivot_tol" => 1e-9_f64 });
    let mut tree = ParameterTree::new("d", "unknown-model", "unknown-solver");
    apply_defaults(&mut tree, &table);
    assert!(tree.model.is_empty());
    assert!(tree.solver.is_empty());
    assert!(tree.plot.is_empty());
}

#[test]
fn stored_tree_values_win_over_fresh_defaults() {
    let mut fresh = ParameterTree::new("d", "M", "pdhg");
    fresh.model = param_map! { "a" => 1_i64, "b" => 2_i64 };
    let mut stored = ParameterTree::new("d", "M", "pdhg");
    stored.model = param_map! { "a" => 5_i64 };

    fresh.merge_from(&stored);
    assert_eq!(fresh.model, param_map! { "a" => 5_i64, "b" => 2_i64 });
}
