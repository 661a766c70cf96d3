//! Sparse Cholesky backend (`nalgebra_sparse::factorization::CscCholesky`).
//!
//! Only valid for symmetric positive definite matrices. The normal equations
//! `MᵀM` of a full-column-rank least-squares system are exactly that, so this
//! is the default backend in least-squares mode.
//!
//! `CscCholesky` only fails on a non-positive pivot. A rank-deficient `MᵀM`
//! usually factors with a tiny positive one instead, so pivots (`L[i,i]²`) are
//! also checked against the largest.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use nalgebra_sparse::factorization::CscCholesky;

use crate::error::SolverError;
use crate::factor::{Factorizer, check_rhs_len, check_square, ensure_finite};

/// Pivots smaller than this fraction of the largest pivot count as zero.
const PIVOT_RTOL: f64 = 1e-13;

pub struct SparseCholesky {
    chol: Option<CscCholesky<f64>>,
    dimension: usize,
    pivot_ratio: f64,
}

impl SparseCholesky {
    pub fn new() -> Self {
        Self {
            chol: None,
            dimension: 0,
            pivot_ratio: 0.0,
        }
    }
}

impl Default for SparseCholesky {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for SparseCholesky {
    fn name(&self) -> &'static str {
        "sparse-cholesky"
    }

    fn factor(&mut self, matrix: &CscMatrix<f64>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.chol = None;

        let chol = CscCholesky::factor(matrix)
            .map_err(|e| SolverError::singular(format!("Cholesky factorization failed: {e:?}")))?;

        let (mut min_pivot, mut max_pivot) = (f64::INFINITY, 0.0_f64);
        for (row, col, &value) in chol.l().triplet_iter() {
            if row == col {
                let p = value * value;
                min_pivot = min_pivot.min(p);
                max_pivot = max_pivot.max(p);
            }
        }
        if n > 0 && (!max_pivot.is_finite() || min_pivot <= PIVOT_RTOL * max_pivot) {
            return Err(SolverError::singular(format!(
                "Cholesky pivot {min_pivot:.3e} vs largest {max_pivot:.3e}"
            )));
        }

        self.pivot_ratio = if n > 0 { min_pivot / max_pivot } else { 1.0 };
        self.dimension = n;
        self.chol = Some(chol);
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let chol = self.chol.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs_len(self.dimension, rhs)?;

        let b = DMatrix::from_column_slice(self.dimension, 1, rhs.as_slice());
        let x = chol.solve(&b);
        ensure_finite(DVector::from_column_slice(x.as_slice()))
    }

    fn is_factored(&self) -> bool {
        self.chol.is_some()
    }

    fn inverse_condition(&self) -> Option<f64> {
        self.chol.as_ref().map(|_| self.pivot_ratio)
    }
}
