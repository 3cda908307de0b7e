#![deny(missing_docs)]
//! Solver backends with a shared state, warm start and snapshot surface.
//!
//! Two backends sit behind [`SolverAdapter`]: an iterative PDHG solver that
//! reports intermediate iterates and keeps partial progress on interrupt, and
//! a batch KKT solver that does neither.

/// Backend selection and the shared solve surface.
pub mod adapter;
pub mod direct;
/// Cooperative interrupt flag.
pub mod interrupt;
pub mod linalg;
pub mod pdhg;
pub mod problem;
/// Solver state and diagnostics.
pub mod state;

pub use adapter::{BackendKind, SnapshotObserver, SolverAdapter, SolverParams};
pub use direct::DirectSolver;
pub use interrupt::InterruptFlag;
pub use linalg::{distance, dot, norm2, solve_dense, Matrix};
pub use pdhg::PdhgSolver;
pub use problem::{DualBlock, PrimalTerm, QuadraticProgram, SaddlePoint};
pub use state::{PrimalDual, SolveStatus, SolverDiagnostics};
