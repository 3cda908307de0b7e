//! Backend-specific problem encodings produced by models.

use rep_core::{ErrorInfo, RepError, RngHandle};
use serde::{Deserialize, Serialize};

use crate::linalg::{dot, Matrix};

/// Simple primal term `G` of a saddle-point problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimalTerm {
    /// `G = 0`.
    Zero,
    /// `G(x) = ½ w ‖x‖²`.
    SquaredNorm {
        /// Weight `w`.
        weight: f64,
    },
}

impl PrimalTerm {
    /// `prox_{τG}` applied in place.
    pub fn prox(&self, v: &mut [f64], tau: f64) {
        if let PrimalTerm::SquaredNorm { weight } = self {
            let scale = 1.0 / (1.0 + tau * weight);
            v.iter_mut().for_each(|value| *value *= scale);
        }
    }

    /// `G(x)`.
    pub fn value(&self, x: &[f64]) -> f64 {
        match self {
            PrimalTerm::Zero => 0.0,
            PrimalTerm::SquaredNorm { weight } => 0.5 * weight * dot(x, x),
        }
    }
}

/// One separable block of the dual term `F`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DualBlock {
    /// `f(z) = ½‖z − b‖²`.
    SquaredDistance {
        /// Target `b`.
        target: Vec<f64>,
    },
    /// `f(z) = λ‖z‖₁` on a block of length `len`.
    L1 {
        /// Weight `λ`.
        weight: f64,
        /// Block length.
        len: usize,
    },
}

impl DualBlock {
    /// Length of the block.
    pub fn len(&self) -> usize {
        match self {
            DualBlock::SquaredDistance { target } => target.len(),
            DualBlock::L1 { len, .. } => *len,
        }
    }

    /// Whether the block is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `prox_{σf*}` applied in place.
    pub fn conj_prox(&self, w: &mut [f64], sigma: f64) {
        match self {
            DualBlock::SquaredDistance { target } => {
                for (value, b) in w.iter_mut().zip(target) {
                    *value = (*value - sigma * b) / (1.0 + sigma);
                }
            }
            DualBlock::L1 { weight, .. } => {
                w.iter_mut()
                    .for_each(|value| *value = value.clamp(-weight, *weight));
            }
        }
    }

    /// `f(z)`.
    pub fn value(&self, z: &[f64]) -> f64 {
        match self {
            DualBlock::SquaredDistance { target } => {
                0.5 * z
                    .iter()
                    .zip(target)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
            }
            DualBlock::L1 { weight, .. } => weight * z.iter().map(|v| v.abs()).sum::<f64>(),
        }
    }

    fn feasible(&self, y: &[f64]) -> bool {
        match self {
            DualBlock::SquaredDistance { .. } => y.iter().all(|v| v.is_finite()),
            DualBlock::L1 { weight, .. } => y.iter().all(|v| v.abs() <= weight + 1e-12),
        }
    }
}

/// `min_x G(x) + F(Kx)` with separable `F`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaddlePoint {
    /// Linear operator `K`.
    pub op: Matrix,
    /// Primal term.
    pub g: PrimalTerm,
    /// Dual blocks; their lengths sum to `K.rows()`.
    pub f: Vec<DualBlock>,
}

impl SaddlePoint {
    /// Checks that the dual blocks tile the operator range.
    pub fn validate(&self) -> Result<(), RepError> {
        let total: usize = self.f.iter().map(DualBlock::len).sum();
        if total != self.op.rows() {
            return Err(RepError::Solver(
                ErrorInfo::new("saddle-shape", "dual blocks do not match operator rows")
                    .with_context("rows", self.op.rows().to_string())
                    .with_context("blocks", total.to_string()),
            ));
        }
        Ok(())
    }

    /// Applies the conjugate prox block by block.
    pub fn conj_prox(&self, w: &mut [f64], sigma: f64) {
        let mut offset = 0;
        for block in &self.f {
            let end = offset + block.len();
            block.conj_prox(&mut w[offset..end], sigma);
            offset = end;
        }
    }

    /// Primal objective `G(x) + F(Kx)`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        let kx = self.op.apply(x);
        let mut offset = 0;
        let mut total = self.g.value(x);
        for block in &self.f {
            let end = offset + block.len();
            total += block.value(&kx[offset..end]);
            offset = end;
        }
        total
    }

    /// Adjoint and prox consistency checks on random vectors.
    ///
    /// Returns the largest relative adjoint mismatch `|⟨Kx, y⟩ − ⟨x, Kᵀy⟩|`.
    pub fn self_test(&self, rng: &mut RngHandle, trials: usize) -> Result<f64, RepError> {
        self.validate()?;
        let mut worst: f64 = 0.0;
        for _ in 0..trials.max(1) {
            let x: Vec<f64> = (0..self.op.cols()).map(|_| rng.standard_normal()).collect();
            let y: Vec<f64> = (0..self.op.rows()).map(|_| rng.standard_normal()).collect();
            let lhs = dot(&self.op.apply(&x), &y);
            let rhs = dot(&x, &self.op.apply_transpose(&y));
            let mismatch = (lhs - rhs).abs() / lhs.abs().max(rhs.abs()).max(1.0);
            worst = worst.max(mismatch);

            let mut w: Vec<f64> = y.iter().map(|v| 10.0 * v).collect();
            self.conj_prox(&mut w, 0.5 + rng.uniform(0.0, 1.0));
            let mut offset = 0;
            for block in &self.f {
                let end = offset + block.len();
                if !block.feasible(&w[offset..end]) {
                    return Err(RepError::Solver(ErrorInfo::new(
                        "self-test-prox",
                        "dual prox produced an infeasible point",
                    )));
                }
                offset = end;
            }
        }
        if worst > 1e-9 {
            return Err(RepError::Solver(
                ErrorInfo::new("self-test-adjoint", "operator adjoint mismatch")
                    .with_context("mismatch", format!("{worst:e}")),
            ));
        }
        Ok(worst)
    }
}

/// `min ½xᵀQx − cᵀx + offset` subject to optional `Ex = d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticProgram {
    /// Symmetric `Q`.
    pub q: Matrix,
    /// Linear term `c`.
    pub c: Vec<f64>,
    /// Equality constraints `(E, d)`.
    pub equality: Option<(Matrix, Vec<f64>)>,
    /// Constant added to the objective.
    pub offset: f64,
}

impl QuadraticProgram {
    /// Number of primal variables.
    pub fn num_variables(&self) -> usize {
        self.c.len()
    }

    /// Number of equality multipliers.
    pub fn num_constraints(&self) -> usize {
        self.equality.as_ref().map_or(0, |(e, _)| e.rows())
    }

    /// Objective value at `x`.
    pub fn objective(&self, x: &[f64]) -> f64 {
        0.5 * dot(x, &self.q.apply(x)) - dot(&self.c, x) + self.offset
    }
}
