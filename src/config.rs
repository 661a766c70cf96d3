//! Solver construction parameters.
//!
//! The config is plain data so host applications can persist solver settings
//! next to the rest of their tool options (JSON, TOML, ...), then hand it to
//! [`crate::Solver::from_config`].

use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// Maximum number of right-hand sides solved against one factorization.
pub const MAX_RHS: usize = 4;

/// Which system the solver factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMode {
    /// `M x = b`, one row per free variable.
    #[default]
    Square,
    /// `MᵀM x = Mᵀb`; rows are independent of the variable count.
    LeastSquares,
}

/// Which factorization backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorizerKind {
    /// `SparseCholesky` for least squares (normal equations are symmetric),
    /// `SparseLu` for square systems.
    #[default]
    Auto,
    /// Sparse LU with partial pivoting; general square systems.
    SparseLu,
    /// Partial-pivoting LU on a densified copy. O(n²) memory.
    DenseLu,
    /// Sparse LLᵀ; requires a symmetric positive definite matrix.
    SparseCholesky,
    /// SVD with a rank check; slow but tolerant of poor scaling.
    DenseSvd,
}

impl FactorizerKind {
    /// Resolve `Auto` against the solve mode.
    pub fn resolve(self, mode: SolveMode) -> FactorizerKind {
        match (self, mode) {
            (FactorizerKind::Auto, SolveMode::LeastSquares) => FactorizerKind::SparseCholesky,
            (FactorizerKind::Auto, SolveMode::Square) => FactorizerKind::SparseLu,
            (kind, _) => kind,
        }
    }
}

/// A full solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Number of equations. `0` means "one per free variable".
    #[serde(default)]
    pub rows: usize,
    pub variables: usize,
    #[serde(default = "default_rhs_count")]
    pub rhs_count: usize,
    #[serde(default)]
    pub mode: SolveMode,
    #[serde(default)]
    pub factorizer: FactorizerKind,
}

fn default_rhs_count() -> usize {
    1
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rows: 0,
            variables: 1,
            rhs_count: default_rhs_count(),
            mode: SolveMode::Square,
            factorizer: FactorizerKind::Auto,
        }
    }
}

impl SolverConfig {
    pub fn square(rows: usize, variables: usize, rhs_count: usize) -> Self {
        Self {
            rows,
            variables,
            rhs_count,
            ..Self::default()
        }
    }

    pub fn least_squares(rows: usize, variables: usize, rhs_count: usize) -> Self {
        Self {
            rows,
            variables,
            rhs_count,
            mode: SolveMode::LeastSquares,
            ..Self::default()
        }
    }

    pub fn with_factorizer(mut self, factorizer: FactorizerKind) -> Self {
        self.factorizer = factorizer;
        self
    }

    /// Check the construction preconditions.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.variables == 0 {
            return Err(SolverError::invalid_config("variable count must be positive"));
        }
        if self.rhs_count == 0 || self.rhs_count > MAX_RHS {
            return Err(SolverError::invalid_config(format!(
                "rhs count must be in 1..={MAX_RHS}, got {}",
                self.rhs_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_counts() {
        assert!(SolverConfig::square(0, 3, 1).validate().is_ok());
        assert!(SolverConfig::square(0, 0, 1).validate().is_err());
        assert!(SolverConfig::square(0, 3, 0).validate().is_err());
        assert!(SolverConfig::square(0, 3, MAX_RHS + 1).validate().is_err());
        assert!(SolverConfig::square(0, 3, MAX_RHS).validate().is_ok());
        assert!(SolverConfig::least_squares(0, 3, 1).validate().is_ok());
        assert!(SolverConfig::least_squares(5, 3, 1).validate().is_ok());
    }

    #[test]
    fn auto_factorizer_follows_mode() {
        assert_eq!(
            FactorizerKind::Auto.resolve(SolveMode::LeastSquares),
            FactorizerKind::SparseCholesky
        );
        assert_eq!(FactorizerKind::Auto.resolve(SolveMode::Square), FactorizerKind::SparseLu);
        assert_eq!(FactorizerKind::DenseLu.resolve(SolveMode::Square), FactorizerKind::DenseLu);
        assert_eq!(
            FactorizerKind::DenseSvd.resolve(SolveMode::Square),
            FactorizerKind::DenseSvd
        );
    }

    #[test]
    fn config_reads_from_json_with_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{"rows": 6, "variables": 4, "mode": "leastsquares"}"#)
                .unwrap();
        assert_eq!(config.rows, 6);
        assert_eq!(config.rhs_count, 1);
        assert_eq!(config.mode, SolveMode::LeastSquares);
        assert_eq!(config.factorizer, FactorizerKind::Auto);

        let config: SolverConfig =
            serde_json::from_str(r#"{"variables": 2, "factorizer": "densesvd"}"#).unwrap();
        assert_eq!(config.mode, SolveMode::Square);
        assert_eq!(config.factorizer, FactorizerKind::DenseSvd);

        let config: SolverConfig =
            serde_json::from_str(r#"{"variables": 2, "factorizer": "sparselu"}"#).unwrap();
        assert_eq!(config.factorizer, FactorizerKind::SparseLu);
    }
}
