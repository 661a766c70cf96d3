//! Sparse LU backend (faer).
//!
//! Default for square systems. faer orders columns to limit fill-in and
//! pivots by rows, so memory stays proportional to the factor's nonzeros
//! rather than n².
//!
//! faer only rejects structurally singular matrices. A numerically zero pivot
//! surfaces as non-finite values, so `factor` runs one trial solve against a
//! vector of ones and reports those as singular up front.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::Lu;
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

use crate::error::SolverError;
use crate::factor::{Factorizer, check_rhs_len, check_square, ensure_finite};

pub struct SparseLu {
    lu: Option<Lu<usize, f64>>,
    dimension: usize,
}

impl SparseLu {
    pub fn new() -> Self {
        Self {
            lu: None,
            dimension: 0,
        }
    }

    fn to_faer(matrix: &CscMatrix<f64>) -> Result<SparseColMat<usize, f64>, SolverError> {
        let mut triplets = Vec::with_capacity(matrix.nnz());
        for (row, col, &value) in matrix.triplet_iter() {
            if !value.is_finite() {
                return Err(SolverError::singular("matrix contains NaN/Inf"));
            }
            triplets.push(Triplet::new(row, col, value));
        }
        SparseColMat::try_new_from_triplets(matrix.nrows(), matrix.ncols(), &triplets)
            .map_err(|e| SolverError::singular(format!("sparse matrix build failed: {e:?}")))
    }

    fn solve_raw(lu: &Lu<usize, f64>, n: usize, rhs: &[f64]) -> DVector<f64> {
        let b = Mat::<f64>::from_fn(n, 1, |i, _| rhs[i]);
        let x = lu.solve(&b);
        DVector::from_fn(n, |i, _| x[(i, 0)])
    }
}

impl Default for SparseLu {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for SparseLu {
    fn name(&self) -> &'static str {
        "sparse-lu"
    }

    fn factor(&mut self, matrix: &CscMatrix<f64>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.lu = None;

        let lu = Self::to_faer(matrix)?
            .sp_lu()
            .map_err(|e| SolverError::singular(format!("sparse LU factorization failed: {e:?}")))?;

        if n > 0 {
            let trial = Self::solve_raw(&lu, n, &vec![1.0; n]);
            if trial.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::singular("sparse LU has a zero pivot"));
            }
        }

        self.dimension = n;
        self.lu = Some(lu);
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let lu = self.lu.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs_len(self.dimension, rhs)?;
        ensure_finite(Self::solve_raw(lu, self.dimension, rhs.as_slice()))
    }

    fn is_factored(&self) -> bool {
        self.lu.is_some()
    }
}
