//! Factorization backends.
//!
//! The solver only needs two operations from a backend: factor a square
//! sparse matrix once, then solve against as many right-hand sides as the
//! caller supplies. Everything behind [`Factorizer`] is swappable.
//!
//! Backends:
//! - [`SparseLu`]: sparse LU (general square systems)
//! - [`DenseLu`]: partial-pivoting LU on a densified copy
//! - [`SparseCholesky`]: sparse LLᵀ (symmetric positive definite, e.g. normal equations)
//! - [`DenseSvd`]: rank-checked SVD (slow, tolerant of poor scaling)

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use crate::config::{FactorizerKind, SolveMode};
use crate::error::SolverError;

pub mod cholesky;
pub mod dense_lu;
pub mod sparse_lu;
pub mod svd;

pub use cholesky::SparseCholesky;
pub use dense_lu::DenseLu;
pub use sparse_lu::SparseLu;
pub use svd::DenseSvd;

/// A one-shot factorization reused across many solves.
///
/// Backends must be `Send + Sync`: solves against different right-hand sides
/// run in parallel and share the factorization immutably.
pub trait Factorizer: Send + Sync {
    /// Backend name for logs and debug dumps.
    fn name(&self) -> &'static str;

    /// Factor a square matrix, replacing any previous factorization.
    fn factor(&mut self, matrix: &CscMatrix<f64>) -> Result<(), SolverError>;

    /// Solve `A x = rhs` against the stored factorization.
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, SolverError>;

    fn is_factored(&self) -> bool;

    /// Estimate of `1 / cond(A)` for the stored factorization, when the
    /// backend can produce one cheaply.
    fn inverse_condition(&self) -> Option<f64> {
        None
    }
}

/// Create the backend for `kind`, resolving `Auto` against `mode`.
pub fn factorizer_for(kind: FactorizerKind, mode: SolveMode) -> Box<dyn Factorizer> {
    match kind.resolve(mode) {
        FactorizerKind::SparseCholesky => Box::new(SparseCholesky::new()),
        FactorizerKind::DenseSvd => Box::new(DenseSvd::new()),
        FactorizerKind::DenseLu => Box::new(DenseLu::new()),
        FactorizerKind::SparseLu | FactorizerKind::Auto => Box::new(SparseLu::new()),
    }
}

pub(crate) fn check_square(matrix: &CscMatrix<f64>) -> Result<usize, SolverError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(SolverError::DimensionMismatch {
            expected: matrix.nrows(),
            got: matrix.ncols(),
        });
    }
    Ok(matrix.nrows())
}

pub(crate) fn check_rhs_len(dimension: usize, rhs: &DVector<f64>) -> Result<(), SolverError> {
    if rhs.len() != dimension {
        return Err(SolverError::DimensionMismatch {
            expected: dimension,
            got: rhs.len(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_finite(x: DVector<f64>) -> Result<DVector<f64>, SolverError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err(SolverError::singular("solution contains non-finite values"))
    }
}

pub(crate) fn csc_to_dense(csc: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(csc.nrows(), csc.ncols());
    for (row, col, &value) in csc.triplet_iter() {
        dense[(row, col)] += value;
    }
    dense
}


#[cfg(test)]
mod tests {
    use super::test_support::csc;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn every_backend_solves_an_spd_system() {
        // [4 1 0; 1 3 1; 0 1 2] x = [1 2 3]
        let a = csc(
            3,
            &[
                (0, 0, 4.0),
                (0, 1, 1.0),
                (1, 0, 1.0),
                (1, 1, 3.0),
                (1, 2, 1.0),
                (2, 1, 1.0),
                (2, 2, 2.0),
            ],
        );
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let dense = csc_to_dense(&a);

        for kind in [
            FactorizerKind::SparseLu,
            FactorizerKind::DenseLu,
            FactorizerKind::SparseCholesky,
            FactorizerKind::DenseSvd,
        ] {
            let mut f = factorizer_for(kind, SolveMode::Square);
            assert!(!f.is_factored());
            f.factor(&a).unwrap();
            assert!(f.is_factored(), "{} should be factored", f.name());

            let x = f.solve(&b).unwrap();
            let ax = &dense * &x;
            for i in 0..3 {
                assert_relative_eq!(ax[i], b[i], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn backends_reject_non_square_and_short_rhs() {
        let mut coo = nalgebra_sparse::CooMatrix::new(2, 3);
        coo.push(0, 0, 1.0);
        let rect = CscMatrix::from(&coo);
        let square = csc(2, &[(0, 0, 1.0), (1, 1, 1.0)]);

        for kind in [
            FactorizerKind::SparseLu,
            FactorizerKind::DenseLu,
            FactorizerKind::SparseCholesky,
            FactorizerKind::DenseSvd,
        ] {
            let mut f = factorizer_for(kind, SolveMode::Square);
            assert!(matches!(f.factor(&rect), Err(SolverError::DimensionMismatch { .. })));
            assert!(matches!(
                f.solve(&DVector::zeros(2)),
                Err(SolverError::NotFactored)
            ));
            f.factor(&square).unwrap();
            assert!(f.solve(&DVector::zeros(3)).is_err());
        }
    }

    #[test]
    fn auto_picks_sparse_backends() {
        assert_eq!(
            factorizer_for(FactorizerKind::Auto, SolveMode::LeastSquares).name(),
            "sparse-cholesky"
        );
        assert_eq!(factorizer_for(FactorizerKind::Auto, SolveMode::Square).name(), "sparse-lu");
        assert_eq!(factorizer_for(FactorizerKind::DenseLu, SolveMode::Square).name(), "dense-lu");
    }
}
