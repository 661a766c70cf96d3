//! Dense LU backend.
//!
//! Densifies the sparse matrix and uses nalgebra's partial-pivoting LU. Memory
//! is O(n²) and factorization O(n³); selected explicitly, never by `Auto`.

use nalgebra::{DVector, Dyn, LU};
use nalgebra_sparse::CscMatrix;

use crate::error::SolverError;
use crate::factor::{Factorizer, check_rhs_len, check_square, csc_to_dense, ensure_finite};

/// Pivots smaller than this fraction of the largest pivot count as zero.
const PIVOT_RTOL: f64 = 1e-13;

pub struct DenseLu {
    lu: Option<LU<f64, Dyn, Dyn>>,
    dimension: usize,
    pivot_ratio: f64,
}

impl DenseLu {
    pub fn new() -> Self {
        Self {
            lu: None,
            dimension: 0,
            pivot_ratio: 0.0,
        }
    }
}

impl Default for DenseLu {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for DenseLu {
    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn factor(&mut self, matrix: &CscMatrix<f64>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.lu = None;

        let lu = csc_to_dense(matrix).lu();

        let u = lu.u();
        let (mut min_pivot, mut max_pivot) = (f64::INFINITY, 0.0_f64);
        for i in 0..n {
            let p = u[(i, i)].abs();
            min_pivot = min_pivot.min(p);
            max_pivot = max_pivot.max(p);
        }
        if n > 0 && (!max_pivot.is_finite() || min_pivot <= PIVOT_RTOL * max_pivot) {
            return Err(SolverError::singular(format!(
                "LU pivot {min_pivot:.3e} vs largest {max_pivot:.3e}"
            )));
        }

        self.pivot_ratio = if n > 0 { min_pivot / max_pivot } else { 1.0 };
        self.dimension = n;
        self.lu = Some(lu);
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let lu = self.lu.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs_len(self.dimension, rhs)?;
        let x = lu
            .solve(rhs)
            .ok_or_else(|| SolverError::singular("LU back-substitution failed"))?;
        ensure_finite(x)
    }

    fn is_factored(&self) -> bool {
        self.lu.is_some()
    }

    /// Smallest over largest pivot; a rough lower bound on conditioning.
    fn inverse_condition(&self) -> Option<f64> {
        self.lu.as_ref().map(|_| self.pivot_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::test_support::csc;
    use approx::assert_relative_eq;

    #[test]
    fn solves_nonsymmetric_system_needing_pivoting() {
        // [0 1; 2 1] x = [3; 5] -> x = [1, 3]
        let a = csc(2, &[(0, 1, 1.0), (1, 0, 2.0), (1, 1, 1.0)]);
        let mut lu = DenseLu::new();
        lu.factor(&a).unwrap();
        let x = lu.solve(&DVector::from_vec(vec![3.0, 5.0])).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-12);
        // Pivots 2 and 1 after row exchange.
        assert_relative_eq!(lu.inverse_condition().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let a = csc(2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)]);
        let mut lu = DenseLu::new();
        assert!(matches!(lu.factor(&a), Err(SolverError::Singular(_))));
        assert!(!lu.is_factored());
    }

    #[test]
    fn structurally_empty_column_is_singular() {
        let a = csc(2, &[(0, 0, 1.0), (1, 0, 1.0)]);
        assert!(DenseLu::new().factor(&a).is_err());
    }
}
