use rep_core::{param_map, ParamMap, ParamValue, ParameterTree, RngHandle};
use rep_models::{DataGenerator, Formulation, InputData, LinearData, Registry, SignalData};
use rep_solve::{
    BackendKind, DualBlock, InterruptFlag, Matrix, PrimalDual, PrimalTerm, QuadraticProgram,
    SaddlePoint, SolveStatus, SolverDiagnostics, SolverParams,
};

fn linear(seed: i64) -> InputData {
    LinearData
        .generate(&param_map! { "rows" => 12_i64, "cols" => 6_i64, "seed" => seed })
        .expect("generate")
}

#[test]
fn seeded_generation_is_deterministic() {
    assert_eq!(linear(7), linear(7));
    assert_ne!(linear(7).observations, linear(8).observations);
    let data = linear(7);
    assert_eq!(data.seed, 7);
    assert_eq!(data.operator.rows(), 12);
    assert_eq!(data.unknowns(), 6);
    data.validate().expect("consistent shapes");
}

#[test]
fn unseeded_generation_records_the_drawn_seed() {
    let data = SignalData
        .generate(&param_map! { "length" => 16_i64, "seed" => -1_i64 })
        .expect("generate");
    let again = SignalData
        .generate(&param_map! { "length" => 16_i64, "seed" => data.seed as i64 })
        .expect("generate");
    assert_eq!(data.observations, again.observations);
}

#[test]
fn generators_reject_undeclared_options() {
    let err = LinearData
        .generate(&param_map! { "depth" => 3_i64 })
        .unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "unknown-parameter");
}

#[test]
fn data_defaults_follow_layer_order() {
    let mut tree = ParameterTree::new("linear", "tv", "pdhg");
    LinearData.apply_default_params(&mut tree);
    assert_eq!(tree.model["lambda"], ParamValue::Float(0.05));
    assert_eq!(tree.solver["iterations"], ParamValue::Int(5000));
    assert_eq!(tree.solver["granularity"], ParamValue::Int(100));
    assert_eq!(tree.plot["kind"], ParamValue::from("stem"));

    let mut tree = ParameterTree::new("linear", "ridge", "direct");
    LinearData.apply_default_params(&mut tree);
    assert_eq!(tree.model["lambda"], ParamValue::Float(0.1));
    assert!(tree.solver.is_empty());
}

#[test]
fn solve_before_setup_is_rejected() {
    let registry = Registry::builtin();
    let mut model = registry
        .model("ridge")
        .unwrap()
        .build(&linear(1), &ParamMap::new())
        .unwrap();
    let err = model
        .solve(&SolverParams::default(), None, &InterruptFlag::new())
        .unwrap_err();
    assert_eq!(err.info().code, "solver-not-setup");
}

#[test]
fn tv_has_no_batch_encoding() {
    let registry = Registry::builtin();
    let mut model = registry
        .model("tv")
        .unwrap()
        .build(&linear(1), &ParamMap::new())
        .unwrap();
    let err = model.setup_solver(BackendKind::Direct).unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "unsupported-solver");
}

#[test]
fn ridge_backends_agree() {
    let registry = Registry::builtin();
    let entry = registry.model("ridge").unwrap();
    let data = linear(3);
    let params = param_map! { "lambda" => 0.5_f64 };
    let interrupt = InterruptFlag::new();

    let mut direct = entry.build(&data, &params).unwrap();
    direct.setup_solver(BackendKind::Direct).unwrap();
    let exact = direct
        .solve(&SolverParams::default(), None, &interrupt)
        .unwrap();
    assert_eq!(exact.status, SolveStatus::Converged);

    let mut pdhg = entry.build(&data, &params).unwrap();
    pdhg.setup_solver(BackendKind::Pdhg).unwrap();
    let options = param_map! { "iterations" => 20_000_i64, "tol" => 1e-10_f64 };
    let approx = pdhg
        .solve(&SolverParams::new(options), None, &interrupt)
        .unwrap();
    assert_eq!(approx.status, SolveStatus::Converged);
    for (a, b) in direct.state().primal.iter().zip(&pdhg.state().primal) {
        assert!((a - b).abs() < 1e-4, "{a} vs {b}");
    }
}

#[test]
fn observer_receives_post_processed_iterates() {
    let registry = Registry::builtin();
    let data = linear(5);
    let mut model = registry
        .model("ridge")
        .unwrap()
        .build(&data, &ParamMap::new())
        .unwrap();
    model.setup_solver(BackendKind::Pdhg).unwrap();

    let mut seen: Vec<(usize, PrimalDual)> = Vec::new();
    let mut record = |iteration: usize, state: &PrimalDual, _: &SolverDiagnostics| {
        seen.push((iteration, state.clone()));
    };
    let options = param_map! { "iterations" => 30_i64, "granularity" => 10_i64, "tol" => 0.0_f64 };
    model
        .solve(
            &SolverParams::new(options),
            Some(&mut record),
            &InterruptFlag::new(),
        )
        .unwrap();

    let indices: Vec<usize> = seen.iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, vec![10, 20, 30]);
    let (_, last) = seen.last().unwrap();
    assert_eq!(last.primal, model.state().primal);
    let expected = model.post(model.state());
    assert_eq!(last.dual, expected.dual);
    let fitted = data.operator.apply(&last.primal);
    for ((residual, fit), obs) in last.dual.iter().zip(&fitted).zip(&data.observations) {
        assert!((residual - (fit - obs)).abs() < 1e-12);
    }
}

#[test]
fn self_test_passes_for_builtin_models() {
    let registry = Registry::builtin();
    let data = SignalData
        .generate(&param_map! { "length" => 10_i64, "seed" => 2_i64 })
        .unwrap();
    let mut rng = RngHandle::from_seed(99);
    for name in ["ridge", "tv"] {
        let model = registry
            .model(name)
            .unwrap()
            .build(&data, &ParamMap::new())
            .unwrap();
        let worst = model.self_test(&mut rng).unwrap();
        assert!(worst < 1e-9, "{name}: {worst}");
    }
}

/// `min ½·0·x² − x`: singular KKT, reported as unbounded.
#[derive(Debug)]
struct Flat;

impl Formulation for Flat {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn saddle_point(&self) -> Result<SaddlePoint, rep_core::RepError> {
        Ok(SaddlePoint {
            op: Matrix::identity(1),
            g: PrimalTerm::Zero,
            f: vec![DualBlock::SquaredDistance { target: vec![0.0] }],
        })
    }

    fn quadratic_program(&self) -> Option<QuadraticProgram> {
        Some(QuadraticProgram {
            q: Matrix::zeros(1, 1),
            c: vec![1.0],
            equality: None,
            offset: 0.0,
        })
    }
}

#[test]
fn unbounded_solve_keeps_the_previous_state() {
    let mut model = rep_models::Model::new(Box::new(Flat));
    model.setup_solver(BackendKind::Direct).unwrap();
    let prior = PrimalDual {
        primal: vec![4.0],
        dual: vec![],
    };
    let diag = model
        .solve(
            &SolverParams::default().continue_at(prior),
            None,
            &InterruptFlag::new(),
        )
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Unbounded);
    assert!(diag.status.is_failure());
    assert_eq!(model.state(), &PrimalDual::zeros(1, 0));
}
