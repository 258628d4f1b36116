//! Linear system solvers.
//!
//! Provides iterative and direct solvers for the assembled system K·u = f.
//!
//! # Solver Backends
//!
//! - [`ConjugateGradient`]: unpreconditioned CG for symmetric positive
//!   definite systems. Accepts an initial guess, which time-stepping drivers
//!   use to warm-start each step from the previous state.
//! - [`CholeskySolver`]: sparse LLᵀ factorization using the faer library.
//!   Ignores the initial guess. The factorization can be computed once with
//!   [`LinearSolver::prepare`] and reused for repeated right-hand sides.

use crate::error::{Error, Result};
use crate::sparse::{spmv, CsrMatrix};
use faer::linalg::cholesky::llt::factor::LltError;
use faer::linalg::solvers::Solve;
use faer::prelude::*;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::linalg::LltError as SparseLltError;
use faer::sparse::{SparseColMat, SymbolicSparseColMat};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Linear solver interface.
pub trait LinearSolver: Send + Sync {
    /// Solve the linear system A·x = b.
    ///
    /// # Arguments
    ///
    /// * `matrix` - System matrix (K)
    /// * `rhs` - Right-hand side vector (f)
    /// * `guess` - Optional starting point; solvers may ignore it
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        guess: Option<&DVector<f64>>,
    ) -> Result<(DVector<f64>, SolveStats)>;

    /// Prepare for repeated solves with `matrix`.
    ///
    /// After a successful call, [`LinearSolver::solve`] must only be given
    /// the same matrix.
    fn prepare(&mut self, _matrix: &CsrMatrix) -> Result<()> {
        Ok(())
    }

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Solver backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Conjugate gradient with warm start.
    #[default]
    ConjugateGradient,
    /// Sparse direct Cholesky (faer).
    Cholesky,
}

/// Solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverConfig {
    /// Backend to use.
    pub kind: LinearSolverKind,
    /// Relative residual tolerance for iterative solvers.
    pub tolerance: f64,
    /// Maximum iterations for iterative solvers.
    pub max_iterations: usize,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::ConjugateGradient,
            tolerance: 1e-10,
            max_iterations: 10_000,
        }
    }
}

impl LinearSolverConfig {
    /// Build the configured solver.
    pub fn build(&self) -> Box<dyn LinearSolver> {
        match self.kind {
            LinearSolverKind::ConjugateGradient => Box::new(ConjugateGradient {
                tolerance: self.tolerance,
                max_iterations: self.max_iterations,
            }),
            LinearSolverKind::Cholesky => Box::new(CholeskySolver::new()),
        }
    }
}

/// Solution statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStats {
    /// Iterations performed (0 for direct solvers).
    pub iterations: usize,
    /// Final relative residual ‖b − A·x‖ / ‖b‖.
    pub residual: f64,
    /// Whether the tolerance was reached.
    pub converged: bool,
}

fn check_system(matrix: &CsrMatrix, rhs: &DVector<f64>) -> Result<()> {
    if matrix.nrows() != matrix.ncols() {
        return Err(Error::Solver("Matrix must be square".into()));
    }
    if matrix.nrows() != rhs.len() {
        return Err(Error::Solver(format!(
            "RHS size mismatch: matrix has {} rows, RHS has {} entries",
            matrix.nrows(),
            rhs.len()
        )));
    }
    Ok(())
}

fn relative_residual(matrix: &CsrMatrix, x: &DVector<f64>, rhs: &DVector<f64>) -> f64 {
    let b_norm = rhs.norm();
    let r_norm = (rhs - spmv(matrix, x)).norm();
    if b_norm > 0.0 {
        r_norm / b_norm
    } else {
        r_norm
    }
}

/// Breakdown threshold on pᵀAp relative to ‖p‖².
const BREAKDOWN: f64 = 1e-30;

/// Conjugate gradient solver for symmetric positive definite systems.
///
/// Convergence is declared when the relative residual ‖r‖/‖b‖ drops below
/// `tolerance`. Running out of iterations is not an error: the last iterate
/// is returned with `converged == false` and a warning is logged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConjugateGradient {
    /// Relative residual tolerance.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        let config = LinearSolverConfig::default();
        Self {
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
        }
    }
}

impl ConjugateGradient {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

impl LinearSolver for ConjugateGradient {
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        guess: Option<&DVector<f64>>,
    ) -> Result<(DVector<f64>, SolveStats)> {
        check_system(matrix, rhs)?;
        let n = rhs.len();

        let b_norm = rhs.norm();
        if b_norm == 0.0 {
            let stats = SolveStats {
                iterations: 0,
                residual: 0.0,
                converged: true,
            };
            return Ok((DVector::zeros(n), stats));
        }

        let mut x = match guess {
            Some(g) if g.len() == n => g.clone(),
            Some(g) => {
                return Err(Error::Solver(format!(
                    "initial guess has {} entries, expected {}",
                    g.len(),
                    n
                )))
            }
            None => DVector::zeros(n),
        };

        let mut r = rhs - spmv(matrix, &x);
        let mut rel_residual = r.norm() / b_norm;
        if rel_residual < self.tolerance {
            let stats = SolveStats {
                iterations: 0,
                residual: rel_residual,
                converged: true,
            };
            return Ok((x, stats));
        }

        let mut p = r.clone();
        let mut rho = r.dot(&r);

        for iter in 0..self.max_iterations {
            let q = spmv(matrix, &p);

            let pq = p.dot(&q);
            if pq.abs() < BREAKDOWN * p.norm_squared() {
                log::warn!("CG breakdown at iteration {} (pᵀAp = {:e})", iter, pq);
                let stats = SolveStats {
                    iterations: iter,
                    residual: rel_residual,
                    converged: false,
                };
                return Ok((x, stats));
            }

            let alpha = rho / pq;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &q, 1.0);

            rel_residual = r.norm() / b_norm;
            if rel_residual < self.tolerance {
                let stats = SolveStats {
                    iterations: iter + 1,
                    residual: rel_residual,
                    converged: true,
                };
                return Ok((x, stats));
            }

            let rho_new = r.dot(&r);
            let beta = rho_new / rho;
            rho = rho_new;
            p.axpy(1.0, &r, beta);
        }

        log::warn!(
            "CG did not converge in {} iterations (relative residual {:e})",
            self.max_iterations,
            rel_residual
        );
        let stats = SolveStats {
            iterations: self.max_iterations,
            residual: rel_residual,
            converged: false,
        };
        Ok((x, stats))
    }

    fn name(&self) -> &str {
        "Conjugate Gradient"
    }
}

/// Convert nalgebra-sparse CSR matrix to faer SparseColMat (CSC format).
///
/// Entries are transposed into column-major order, so the result is exact
/// for any matrix, symmetric or not.
fn csr_to_faer_csc(csr: &CsrMatrix) -> SparseColMat<usize, f64> {
    let nrows = csr.nrows();
    let ncols = csr.ncols();

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    let mut col_counts = vec![0usize; ncols];
    for &col in col_indices {
        col_counts[col] += 1;
    }

    let mut col_offsets = vec![0usize; ncols + 1];
    for i in 0..ncols {
        col_offsets[i + 1] = col_offsets[i] + col_counts[i];
    }

    let nnz = values.len();
    let mut csc_row_indices = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    let mut col_positions = col_offsets[..ncols].to_vec();

    for row in 0..nrows {
        for idx in row_offsets[row]..row_offsets[row + 1] {
            let col = col_indices[idx];
            let pos = col_positions[col];
            csc_row_indices[pos] = row;
            csc_values[pos] = values[idx];
            col_positions[col] += 1;
        }
    }

    // SAFETY: offsets are monotone and row indices are sorted and in range
    // within each column, because CSR rows are visited in ascending order.
    unsafe {
        SparseColMat::new(
            SymbolicSparseColMat::new_unchecked(nrows, ncols, col_offsets, None, csc_row_indices),
            csc_values,
        )
    }
}

fn factorize(matrix: &CsrMatrix) -> Result<Llt<usize, f64>> {
    let csc = csr_to_faer_csc(matrix);
    let csc_ref = csc.as_ref();

    let symbolic = SymbolicLlt::try_new(csc_ref.symbolic(), faer::Side::Lower)
        .map_err(|_| Error::Solver("Symbolic Cholesky analysis failed".into()))?;

    Llt::try_new_with_symbolic(symbolic, csc_ref, faer::Side::Lower).map_err(|e| match e {
        SparseLltError::Generic(err) => Error::Solver(format!("Sparse Cholesky error: {:?}", err)),
        SparseLltError::Numeric(LltError::NonPositivePivot { index }) => Error::SingularMatrix(
            format!("Matrix is not positive definite at pivot {}", index),
        ),
    })
}

/// Sparse Cholesky solver using the faer library.
///
/// Without [`LinearSolver::prepare`], every solve factorizes the matrix.
#[derive(Default)]
pub struct CholeskySolver {
    factor: Option<Llt<usize, f64>>,
}

impl CholeskySolver {
    /// Create a new sparse Cholesky solver.
    pub fn new() -> Self {
        Self { factor: None }
    }

    /// Whether a factorization is cached.
    pub fn is_prepared(&self) -> bool {
        self.factor.is_some()
    }
}

impl LinearSolver for CholeskySolver {
    fn solve(
        &self,
        matrix: &CsrMatrix,
        rhs: &DVector<f64>,
        _guess: Option<&DVector<f64>>,
    ) -> Result<(DVector<f64>, SolveStats)> {
        check_system(matrix, rhs)?;
        let n = rhs.len();
        if n == 0 {
            let stats = SolveStats {
                iterations: 0,
                residual: 0.0,
                converged: true,
            };
            return Ok((DVector::zeros(0), stats));
        }

        let fresh;
        let llt = match &self.factor {
            Some(llt) => llt,
            None => {
                fresh = factorize(matrix)?;
                &fresh
            }
        };

        let mut x = faer::Mat::from_fn(n, 1, |i, _| rhs[i]);
        llt.solve_in_place(x.as_mut());

        let solution = DVector::from_fn(n, |i, _| x[(i, 0)]);
        let stats = SolveStats {
            iterations: 0,
            residual: relative_residual(matrix, &solution, rhs),
            converged: true,
        };
        Ok((solution, stats))
    }

    fn prepare(&mut self, matrix: &CsrMatrix) -> Result<()> {
        if matrix.nrows() == 0 {
            return Ok(());
        }
        self.factor = Some(factorize(matrix)?);
        Ok(())
    }

    fn name(&self) -> &str {
        "faer Sparse Cholesky (LLᵀ)"
    }
}
