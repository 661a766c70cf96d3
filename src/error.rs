/// Which kind of index a [`SolverError::IndexOutOfRange`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Variable,
    Row,
    Rhs,
}

impl IndexKind {
    fn label(self) -> &'static str {
        match self {
            IndexKind::Variable => "variable",
            IndexKind::Row => "row",
            IndexKind::Rhs => "rhs slot",
        }
    }
}

/// Errors surfaced by the solver.
///
/// Numerical failures (`Singular`) are normally folded into the boolean
/// returned by [`crate::Solver::solve`]; everything else is API misuse.
#[derive(Clone, PartialEq)]
pub enum SolverError {
    /// Construction parameters are out of range.
    InvalidConfig(String),
    /// A variable, row or rhs index is beyond the declared bounds.
    IndexOutOfRange {
        kind: IndexKind,
        index: usize,
        len: usize,
    },
    /// Square mode needs one equation per free variable.
    RowCountMismatch { rows: usize, free: usize },
    /// A factorizer was handed a matrix or vector of the wrong shape.
    DimensionMismatch { expected: usize, got: usize },
    /// Factorization or back-substitution failed numerically.
    Singular(String),
    /// `solve` was called on a factorizer that holds no factorization.
    NotFactored,
}

impl SolverError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SolverError::InvalidConfig(message.into())
    }

    pub fn singular(message: impl Into<String>) -> Self {
        SolverError::Singular(message.into())
    }

    /// True for failures that come from the numbers rather than from misuse.
    pub fn is_numerical(&self) -> bool {
        matches!(self, SolverError::Singular(_))
    }
}

/// Check `index < len`.
pub(crate) fn check_index(kind: IndexKind, index: usize, len: usize) -> Result<(), SolverError> {
    if index < len {
        Ok(())
    } else {
        Err(SolverError::IndexOutOfRange { kind, index, len })
    }
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::InvalidConfig(msg) => write!(f, "Invalid solver configuration: {msg}"),
            SolverError::IndexOutOfRange { kind, index, len } => {
                write!(f, "{} index {index} out of range (len {len})", kind.label())
            }
            SolverError::RowCountMismatch { rows, free } => write!(
                f,
                "Square system needs one row per free variable: {rows} rows, {free} free variables"
            ),
            SolverError::DimensionMismatch { expected, got } => {
                write!(f, "Dimension mismatch: expected {expected}, got {got}")
            }
            SolverError::Singular(msg) => write!(f, "Singular system: {msg}"),
            SolverError::NotFactored => write!(f, "Factorizer used before factor()"),
        }
    }
}

impl std::fmt::Debug for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SolverError({self})")
    }
}

impl std::error::Error for SolverError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_check_reports_kind_and_bounds() {
        assert!(check_index(IndexKind::Row, 2, 3).is_ok());
        let err = check_index(IndexKind::Variable, 5, 3).unwrap_err();
        assert_eq!(
            err,
            SolverError::IndexOutOfRange {
                kind: IndexKind::Variable,
                index: 5,
                len: 3
            }
        );
        assert_eq!(err.to_string(), "variable index 5 out of range (len 3)");
        assert!(!err.is_numerical());
        assert!(SolverError::singular("zero pivot").is_numerical());
    }
}
