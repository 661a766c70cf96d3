//! SVD backend.
//!
//! Implementation choices:
//! - The factorization keeps both singular-vector sets so each solve is two
//!   dense products; there is no sparse SVD here.
//! - Rank is checked once at factor time against a relative tolerance, so a
//!   singular system is reported as a failure instead of silently returning
//!   a minimum-norm solution.
//! - Solves truncate singular values below the same tolerance, which keeps
//!   badly scaled (but full rank) systems stable.

use nalgebra::{DVector, Dyn, SVD};
use nalgebra_sparse::CscMatrix;

use crate::error::SolverError;
use crate::factor::{Factorizer, check_rhs_len, check_square, csc_to_dense, ensure_finite};

/// Singular values below this fraction of the largest one count as zero.
const RANK_RTOL: f64 = 1e-12;

pub struct DenseSvd {
    svd: Option<SVD<f64, Dyn, Dyn>>,
    dimension: usize,
    cutoff: f64,
}

impl DenseSvd {
    pub fn new() -> Self {
        Self {
            svd: None,
            dimension: 0,
            cutoff: 0.0,
        }
    }
}

impl Default for DenseSvd {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for DenseSvd {
    fn name(&self) -> &'static str {
        "dense-svd"
    }

    fn factor(&mut self, matrix: &CscMatrix<f64>) -> Result<(), SolverError> {
        let n = check_square(matrix)?;
        self.svd = None;

        let svd = csc_to_dense(matrix).svd(true, true);
        if n > 0 {
            let max = svd.singular_values.max();
            let min = svd.singular_values.min();
            if !max.is_finite() || min <= RANK_RTOL * max {
                return Err(SolverError::singular(format!(
                    "rank deficient: smallest singular value {min:.3e}, largest {max:.3e}"
                )));
            }
            self.cutoff = RANK_RTOL * max;
        }

        self.dimension = n;
        self.svd = Some(svd);
        Ok(())
    }

    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let svd = self.svd.as_ref().ok_or(SolverError::NotFactored)?;
        check_rhs_len(self.dimension, rhs)?;
        let x = svd
            .solve(rhs, self.cutoff)
            .map_err(|e| SolverError::singular(format!("SVD solve failed: {e}")))?;
        ensure_finite(x)
    }

    fn is_factored(&self) -> bool {
        self.svd.is_some()
    }

    /// Ratio of the smallest to the largest singular value.
    fn inverse_condition(&self) -> Option<f64> {
        let svd = self.svd.as_ref()?;
        let max = svd.singular_values.max();
        if max > 0.0 {
            Some(svd.singular_values.min() / max)
        } else {
            Some(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::test_support::csc;
    use approx::assert_relative_eq;

    #[test]
    fn solves_badly_scaled_system() {
        // diag(1e-4, 1e4) x = [1e-4, 2e4] -> x = [1, 2]
        let a = csc(2, &[(0, 0, 1e-4), (1, 1, 1e4)]);
        let mut svd = DenseSvd::new();
        svd.factor(&a).unwrap();
        let x = svd.solve(&DVector::from_vec(vec![1e-4, 2e4])).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-9);

        let rcond = svd.inverse_condition().unwrap();
        assert_relative_eq!(rcond, 1e-8, max_relative = 1e-6);
    }

    #[test]
    fn rank_deficient_matrix_is_rejected() {
        let a = csc(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let mut svd = DenseSvd::new();
        assert!(matches!(svd.factor(&a), Err(SolverError::Singular(_))));
        assert!(svd.inverse_condition().is_none());
    }
}
