//! Sparse storage of global operators.
//!
//! Assembled operators are CSR. Element contributions are collected as
//! (row, col, value) triplets and compressed once at the end of assembly.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix as NalgebraCsr;

/// Global operator storage.
pub type CsrMatrix = NalgebraCsr<f64>;

/// Coefficient map of a global operator under assembly.
///
/// Entries hitting the same (row, col) are summed on compression. Exact
/// zeros are dropped on insertion.
#[derive(Debug, Clone)]
pub struct TripletMatrix {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl TripletMatrix {
    /// Empty `n_rows × n_cols` operator.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::with_capacity(n_rows, n_cols, 0)
    }

    /// Empty operator with room for `nnz_estimate` entries.
    pub fn with_capacity(n_rows: usize, n_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: Vec::with_capacity(nnz_estimate),
            cols: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Accumulate `value` at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        }
    }

    /// Scatter an element matrix onto its global DOFs.
    pub fn add_element_matrix(&mut self, dofs: &[usize], local: &DMatrix<f64>) {
        for (i, &row) in dofs.iter().enumerate() {
            for (j, &col) in dofs.iter().enumerate() {
                self.add(row, col, local[(i, j)]);
            }
        }
    }

    /// Entries collected so far, duplicates included.
    pub fn n_entries(&self) -> usize {
        self.values.len()
    }

    /// Compress into CSR.
    pub fn into_csr(self) -> Result<CsrMatrix> {
        let coo = CooMatrix::try_from_triplets(
            self.n_rows,
            self.n_cols,
            self.rows,
            self.cols,
            self.values,
        )
        .map_err(|e| Error::Assembly(format!("coefficient out of range: {}", e)))?;

        Ok(CsrMatrix::from(&coo))
    }
}

/// y = A·x.
pub fn spmv(matrix: &CsrMatrix, x: &DVector<f64>) -> DVector<f64> {
    matrix * x
}

/// α·A + β·B for matrices of equal shape.
pub fn linear_combination(alpha: f64, a: &CsrMatrix, beta: f64, b: &CsrMatrix) -> Result<CsrMatrix> {
    if a.nrows() != b.nrows() || a.ncols() != b.ncols() {
        return Err(Error::Assembly(format!(
            "cannot combine {}x{} and {}x{} matrices",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        )));
    }
    Ok(a * alpha + b * beta)
}

/// Fraction of stored entries, for diagnostics.
pub fn density(matrix: &CsrMatrix) -> f64 {
    let size = matrix.nrows() * matrix.ncols();
    if size == 0 {
        return 0.0;
    }
    matrix.nnz() as f64 / size as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_entries_are_dropped() {
        let mut k = TripletMatrix::new(3, 3);
        k.add(0, 0, 1.0);
        k.add(1, 1, 2.0);
        k.add(2, 2, 3.0);
        k.add(0, 1, 0.5);
        k.add(1, 0, 0.5);
        k.add(2, 0, 0.0);

        let csr = k.into_csr().unwrap();
        assert_eq!(csr.nrows(), 3);
        assert_eq!(csr.ncols(), 3);
        assert_eq!(csr.nnz(), 5);
        assert_relative_eq!(density(&csr), 5.0 / 9.0);
    }

    #[test]
    fn test_coincident_entries_are_summed() {
        let mut k = TripletMatrix::new(2, 2);
        k.add(0, 0, 1.0);
        k.add(0, 0, 2.0);
        k.add(0, 0, 3.0);

        let csr = k.into_csr().unwrap();
        let dense = DMatrix::from(&csr);
        assert_relative_eq!(dense[(0, 0)], 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_out_of_bounds_triplet_is_error() {
        let mut k = TripletMatrix::new(2, 2);
        k.add(5, 0, 1.0);
        assert!(matches!(k.into_csr(), Err(Error::Assembly(_))));
    }

    #[test]
    fn test_element_matrix_scatter() {
        let mut k = TripletMatrix::new(6, 6);

        let dofs = [0, 1, 3, 4];
        #[rustfmt::skip]
        let ke = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.5, 0.1, 0.0,
            0.5, 2.0, 0.0, 0.2,
            0.1, 0.0, 1.5, 0.3,
            0.0, 0.2, 0.3, 2.5,
        ]);

        k.add_element_matrix(&dofs, &ke);
        assert_eq!(k.n_entries(), 12);

        let csr = k.into_csr().unwrap();
        let dense = DMatrix::from(&csr);
        assert_relative_eq!(dense[(0, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(dense[(0, 3)], 0.1, epsilon = 1e-10);
        assert_relative_eq!(dense[(3, 4)], 0.3, epsilon = 1e-10);
    }

    #[test]
    fn test_linear_combination() {
        let mut a = TripletMatrix::new(2, 2);
        a.add(0, 0, 1.0);
        a.add(1, 1, 2.0);
        let mut b = TripletMatrix::new(2, 2);
        b.add(0, 1, 3.0);
        b.add(1, 1, 1.0);

        let c = linear_combination(1.0, &a.into_csr().unwrap(), 0.5, &b.into_csr().unwrap()).unwrap();
        let dense = DMatrix::from(&c);
        assert_relative_eq!(dense[(0, 0)], 1.0);
        assert_relative_eq!(dense[(0, 1)], 1.5);
        assert_relative_eq!(dense[(1, 1)], 2.5);

        let wrong = TripletMatrix::new(3, 3).into_csr().unwrap();
        assert!(linear_combination(1.0, &c, 1.0, &wrong).is_err());
    }

    #[test]
    fn test_spmv_matches_dense() {
        let mut k = TripletMatrix::new(3, 3);
        k.add(0, 0, 4.0);
        k.add(0, 2, -1.0);
        k.add(1, 1, 2.0);
        k.add(2, 0, -1.0);
        k.add(2, 2, 3.0);
        let csr = k.into_csr().unwrap();

        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y = spmv(&csr, &x);
        let expected = DMatrix::from(&csr) * &x;
        assert_relative_eq!(y, expected, epsilon = 1e-14);
    }
}
