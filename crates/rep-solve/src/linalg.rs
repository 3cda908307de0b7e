//! Dense row-major linear algebra used by the backends.

use rep_core::{ErrorInfo, RepError};
use serde::{Deserialize, Serialize};

/// Dense row-major matrix.
///
/// Decoding checks that the data length matches the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = RepError;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        Matrix::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl Matrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Identity matrix of size `n`.
    pub fn identity(n: usize) -> Self {
        let mut matrix = Self::zeros(n, n);
        for i in 0..n {
            matrix.set(i, i, 1.0);
        }
        matrix
    }

    /// Builds a matrix from row-major data.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, RepError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(RepError::Solver(
                ErrorInfo::new("matrix-shape", "data length does not match shape")
                    .with_context("rows", rows.to_string())
                    .with_context("cols", cols.to_string())
                    .with_context("len", data.len().to_string()),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Forward differences `(Dx)_i = x_{i+1} - x_i`, shape `(n-1) x n`.
    pub fn forward_differences(n: usize) -> Self {
        let rows = n.saturating_sub(1);
        let mut matrix = Self::zeros(rows, n);
        for i in 0..rows {
            matrix.set(i, i, -1.0);
            matrix.set(i, i + 1, 1.0);
        }
        matrix
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Entry at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Sets the entry at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// `A x`.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        (0..self.rows).map(|i| dot(self.row(i), x)).collect()
    }

    /// `Aᵀ y`.
    pub fn apply_transpose(&self, y: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.cols];
        for (i, &yi) in y.iter().enumerate().take(self.rows) {
            if yi == 0.0 {
                continue;
            }
            for (o, a) in out.iter_mut().zip(self.row(i)) {
                *o += a * yi;
            }
        }
        out
    }

    /// `AᵀA`.
    pub fn gram(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.cols);
        for i in 0..self.rows {
            let row = self.row(i);
            for (j, &a) in row.iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                for (k, &b) in row.iter().enumerate() {
                    out.data[j * self.cols + k] += a * b;
                }
            }
        }
        out
    }

    /// Stacks `self` on top of `other`.
    pub fn vstack(&self, other: &Matrix) -> Result<Matrix, RepError> {
        if self.cols != other.cols {
            return Err(RepError::Solver(
                ErrorInfo::new("matrix-vstack", "column counts differ")
                    .with_context("top", self.cols.to_string())
                    .with_context("bottom", other.cols.to_string()),
            ));
        }
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Ok(Matrix {
            rows: self.rows + other.rows,
            cols: self.cols,
            data,
        })
    }

    /// Adds `shift` to the diagonal of a square matrix.
    pub fn add_diagonal(&mut self, shift: f64) {
        for i in 0..self.rows.min(self.cols) {
            self.data[i * self.cols + i] += shift;
        }
    }

    /// Estimates the spectral norm by power iteration on `AᵀA`.
    pub fn norm_estimate(&self, iterations: usize) -> f64 {
        if self.cols == 0 || self.rows == 0 {
            return 0.0;
        }
        let mut v = vec![1.0 / (self.cols as f64).sqrt(); self.cols];
        let mut sigma = 0.0;
        for _ in 0..iterations.max(1) {
            let w = self.apply_transpose(&self.apply(&v));
            let norm = norm2(&w);
            if norm == 0.0 {
                return 0.0;
            }
            sigma = norm.sqrt();
            v = w.into_iter().map(|value| value / norm).collect();
        }
        sigma
    }
}

/// Inner product.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn norm2(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Euclidean distance.
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Solves the square system `A x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when a pivot falls below `pivot_tol` (numerically singular).
pub fn solve_dense(a: &Matrix, b: &[f64], pivot_tol: f64) -> Option<Vec<f64>> {
    let n = a.rows;
    if a.cols != n || b.len() != n {
        return None;
    }
    let mut m = a.data.clone();
    let mut rhs = b.to_vec();
    for col in 0..n {
        let pivot = (col..n).max_by(|&r, &s| {
            m[r * n + col]
                .abs()
                .partial_cmp(&m[s * n + col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[pivot * n + col].abs() < pivot_tol {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                m.swap(pivot * n + k, col * n + k);
            }
            rhs.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = m[row * n + col] / m[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row * n + k] -= factor * m[col * n + k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row * n + k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[row * n + row];
    }
    Some(x)
}
