use std::cell::RefCell;

use rep_core::{param_map, RngHandle};
use rep_solve::{
    BackendKind, DualBlock, InterruptFlag, Matrix, PrimalDual, PrimalTerm, QuadraticProgram,
    SaddlePoint, SolveStatus, SolverAdapter, SolverDiagnostics, SolverParams,
};

fn operator() -> Matrix {
    Matrix::from_vec(3, 2, vec![2.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap()
}

fn observations() -> Vec<f64> {
    vec![1.0, 2.0, 3.0]
}

fn ridge_saddle(lambda: f64) -> SaddlePoint {
    SaddlePoint {
        op: operator(),
        g: PrimalTerm::SquaredNorm { weight: lambda },
        f: vec![DualBlock::SquaredDistance {
            target: observations(),
        }],
    }
}

fn ridge_program(lambda: f64) -> QuadraticProgram {
    let a = operator();
    let mut q = a.gram();
    q.add_diagonal(lambda);
    QuadraticProgram {
        q,
        c: a.apply_transpose(&observations()),
        equality: None,
        offset: 0.5 * rep_solve::dot(&observations(), &observations()),
    }
}

#[test]
fn pdhg_agrees_with_direct_on_ridge() {
    let interrupt = InterruptFlag::new();
    let mut direct = SolverAdapter::direct(ridge_program(0.5)).unwrap();
    let exact = direct
        .solve(&SolverParams::default(), None, &interrupt)
        .unwrap();
    assert_eq!(exact.status, SolveStatus::Converged);
    let expected = [7.5 / 12.75, 22.5 / 12.75];
    for (got, want) in direct.state().primal.iter().zip(expected) {
        assert!((got - want).abs() < 1e-10, "{got} vs {want}");
    }

    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let options = param_map! {
        "iterations" => 20_000_i64,
        "tol" => 1e-12_f64,
        "granularity" => 10_i64,
    };
    let diag = pdhg
        .solve(&SolverParams::new(options), None, &interrupt)
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Converged);
    assert_eq!(diag.backend, "pdhg");
    for (got, want) in pdhg.state().primal.iter().zip(expected) {
        assert!((got - want).abs() < 1e-5, "{got} vs {want}");
    }
    let objective = diag.objective.unwrap();
    assert!((objective - exact.objective.unwrap()).abs() < 1e-6);
}

#[test]
fn warm_start_copies_the_overlap_across_shapes() {
    let mut state = PrimalDual::zeros(3, 2);
    state.warm_from(&PrimalDual {
        primal: vec![1.0, 2.0],
        dual: vec![4.0, 5.0, 6.0],
    });
    assert_eq!(state.primal, vec![1.0, 2.0, 0.0]);
    assert_eq!(state.dual, vec![4.0, 5.0]);

    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let prior = PrimalDual {
        primal: vec![9.0, 8.0, 7.0, 6.0],
        dual: vec![1.0],
    };
    let params = SolverParams::new(param_map! { "iterations" => 0_i64 }).continue_at(prior);
    let diag = pdhg.solve(&params, None, &InterruptFlag::new()).unwrap();
    assert_eq!(diag.iterations, 0);
    assert_eq!(pdhg.state().primal, vec![9.0, 8.0]);
    assert_eq!(pdhg.state().dual, vec![1.0, 0.0, 0.0]);
}

#[test]
fn pdhg_reports_snapshots_every_granularity() {
    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let seen = RefCell::new(Vec::new());
    let mut observer = |iteration: usize, state: &PrimalDual, diag: &SolverDiagnostics| {
        assert_eq!(state.shape(), (2, 3));
        assert_eq!(diag.iterations, iteration);
        seen.borrow_mut().push(iteration);
    };
    let options = param_map! {
        "iterations" => 100_i64,
        "tol" => 0.0_f64,
        "granularity" => 25_i64,
    };
    let diag = pdhg
        .solve(
            &SolverParams::new(options),
            Some(&mut observer),
            &InterruptFlag::new(),
        )
        .unwrap();
    assert_eq!(diag.status, SolveStatus::MaxIterations);
    assert_eq!(diag.iterations, 100);
    assert_eq!(seen.into_inner(), vec![25, 50, 75, 100]);
}

#[test]
fn pdhg_interrupt_keeps_partial_iterate() {
    let interrupt = InterruptFlag::new();
    let trigger = interrupt.clone();
    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let mut observer = move |iteration: usize, _: &PrimalDual, _: &SolverDiagnostics| {
        if iteration == 10 {
            trigger.raise();
        }
    };
    let options = param_map! {
        "iterations" => 1_000_i64,
        "tol" => 0.0_f64,
        "granularity" => 10_i64,
    };
    let diag = pdhg
        .solve(&SolverParams::new(options), Some(&mut observer), &interrupt)
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Interrupted);
    assert!(diag.status.is_failure());
    assert_eq!(diag.iterations, 10);
    assert!(pdhg.state().primal.iter().any(|v| *v != 0.0));
}

#[test]
fn direct_interrupt_keeps_preloaded_state_only() {
    let interrupt = InterruptFlag::new();
    interrupt.raise();
    let mut direct = SolverAdapter::direct(ridge_program(0.5)).unwrap();
    let prior = PrimalDual {
        primal: vec![3.0, 4.0],
        dual: vec![],
    };
    let diag = direct
        .solve(&SolverParams::default().continue_at(prior.clone()), None, &interrupt)
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Interrupted);
    assert_eq!(diag.iterations, 0);
    assert_eq!(direct.state(), &prior);
}

#[test]
fn singular_programs_report_status_and_keep_state() {
    let preload = PrimalDual {
        primal: vec![1.0, -1.0],
        dual: vec![],
    };
    let unbounded = QuadraticProgram {
        q: Matrix::zeros(2, 2),
        c: vec![1.0, 1.0],
        equality: None,
        offset: 0.0,
    };
    let mut direct = SolverAdapter::direct(unbounded).unwrap();
    let diag = direct
        .solve(
            &SolverParams::default().continue_at(preload.clone()),
            None,
            &InterruptFlag::new(),
        )
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Unbounded);
    assert_eq!(direct.state(), &preload);

    let infeasible = QuadraticProgram {
        q: Matrix::identity(2),
        c: vec![0.0, 0.0],
        equality: Some((
            Matrix::from_vec(2, 2, vec![1.0, 1.0, 2.0, 2.0]).unwrap(),
            vec![1.0, 3.0],
        )),
        offset: 0.0,
    };
    let mut direct = SolverAdapter::direct(infeasible).unwrap();
    let diag = direct
        .solve(&SolverParams::default(), None, &InterruptFlag::new())
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Infeasible);
    assert_eq!(direct.state(), &PrimalDual::zeros(2, 2));
}

#[test]
fn equality_constrained_program_solves() {
    let program = QuadraticProgram {
        q: Matrix::identity(2),
        c: vec![0.0, 0.0],
        equality: Some((Matrix::from_vec(1, 2, vec![1.0, 1.0]).unwrap(), vec![1.0])),
        offset: 0.0,
    };
    let mut direct = SolverAdapter::direct(program).unwrap();
    let diag = direct
        .solve(&SolverParams::default(), None, &InterruptFlag::new())
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Converged);
    let state = direct.state();
    assert!((state.primal[0] - 0.5).abs() < 1e-12);
    assert!((state.primal[1] - 0.5).abs() < 1e-12);
    assert_eq!(state.dual.len(), 1);
}

#[test]
fn backend_names_and_options_are_validated() {
    assert_eq!("pdhg".parse::<BackendKind>().unwrap(), BackendKind::Pdhg);
    assert_eq!("direct".parse::<BackendKind>().unwrap(), BackendKind::Direct);
    let err = "cvx".parse::<BackendKind>().unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "unknown-solver");

    assert!(BackendKind::Pdhg.is_iterative());
    assert!(!BackendKind::Direct.is_iterative());
    assert!(BackendKind::Pdhg.schema().get("granularity").is_some());

    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let err = pdhg
        .solve(
            &SolverParams::new(param_map! { "zzz" => 1_i64 }),
            None,
            &InterruptFlag::new(),
        )
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn self_test_checks_adjoint_and_block_shapes() {
    let mut rng = RngHandle::from_seed(7);
    let mismatch = ridge_saddle(0.5).self_test(&mut rng, 4).unwrap();
    assert!(mismatch < 1e-12);

    let tv = SaddlePoint {
        op: operator().vstack(&Matrix::forward_differences(2)).unwrap(),
        g: PrimalTerm::Zero,
        f: vec![
            DualBlock::SquaredDistance {
                target: observations(),
            },
            DualBlock::L1 {
                weight: 0.1,
                len: 1,
            },
        ],
    };
    tv.self_test(&mut rng, 4).unwrap();

    let broken = SaddlePoint {
        f: vec![DualBlock::L1 { weight: 1.0, len: 2 }],
        ..ridge_saddle(0.5)
    };
    assert_eq!(
        broken.self_test(&mut rng, 1).unwrap_err().info().code,
        "saddle-shape"
    );
    assert!(SolverAdapter::pdhg(broken).is_err());
}

/// The uniform start vector of the norm estimate is orthogonal to the
/// dominant singular direction `(1, -1)`, so the step sizes are far too large.
fn underestimated_saddle() -> SaddlePoint {
    SaddlePoint {
        op: Matrix::from_vec(2, 2, vec![10.0, -10.0, 1.0, 1.0]).unwrap(),
        g: PrimalTerm::Zero,
        f: vec![DualBlock::SquaredDistance {
            target: vec![1.0, 1.0],
        }],
    }
}

#[test]
fn pdhg_stops_when_iterates_blow_up() {
    let mut pdhg = SolverAdapter::pdhg(underestimated_saddle()).unwrap();
    let options = param_map! { "iterations" => 3000_i64, "tol" => 0.0_f64 };
    let diag = pdhg
        .solve(&SolverParams::new(options), None, &InterruptFlag::new())
        .unwrap();
    assert_eq!(diag.status, SolveStatus::Diverged);
    assert!(diag.status.is_failure());
    assert!(diag.iterations < 3000);
    assert!(diag.objective.map_or(true, f64::is_finite));
    let state = pdhg.state();
    assert!(state.primal.iter().chain(&state.dual).all(|v| v.is_finite()));
}

#[test]
fn step_scale_must_stay_within_unit_interval() {
    assert!(BackendKind::Pdhg
        .check_options(&param_map! { "step_scale" => 1.0_f64 })
        .is_ok());
    for bad in [0.0_f64, -0.5, 50.0, f64::NAN] {
        let err = BackendKind::Pdhg
            .check_options(&param_map! { "step_scale" => bad })
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(err.info().code, "param-range");
    }
    assert!(BackendKind::Direct
        .check_options(&param_map! { "pivot_tol" => 1e-9_f64 })
        .is_ok());

    let mut pdhg = SolverAdapter::pdhg(ridge_saddle(0.5)).unwrap();
    let err = pdhg
        .solve(
            &SolverParams::new(param_map! { "step_scale" => 50.0_f64 }),
            None,
            &InterruptFlag::new(),
        )
        .unwrap_err();
    assert_eq!(err.info().code, "param-range");
}

#[test]
fn decoding_rejects_matrices_with_inconsistent_shape() {
    assert!(Matrix::from_vec(4, 3, vec![1.0, 2.0]).is_err());
    let ok: Matrix = serde_json::from_str(r#"{"rows":1,"cols":2,"data":[1.0,2.0]}"#).unwrap();
    assert_eq!(ok.cols(), 2);
    let err = serde_json::from_str::<Matrix>(r#"{"rows":4,"cols":3,"data":[1.0,2.0]}"#)
        .unwrap_err();
    assert!(err.to_string().contains("matrix-shape"), "{err}");
}
