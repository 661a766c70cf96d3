//! Incremental sparse assembly.
//!
//! Matrix contributions arrive as `(row, column, value)` triplets addressed by
//! variable ids. The builder translates ids into dense matrix indices and
//! decides where each contribution goes:
//!
//! - square mode, locked row variable: dropped entirely
//! - locked column variable: recorded on the variable, moved to the RHS later
//! - both free: pushed as a triplet (duplicates are summed on assembly)
//!
//! `assemble` consumes the builder, so a frozen matrix can never receive more
//! triplets.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::ops::serial::spmm_csc_dense;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::config::SolveMode;
use crate::error::{IndexKind, SolverError, check_index};
use crate::system::variables::VariableTable;

/// Accumulates matrix triplets for a system of `rows × cols`.
#[derive(Debug, Clone)]
pub struct SparseSystemBuilder {
    mode: SolveMode,
    triplets: CooMatrix<f64>,
    dropped: usize,
}

impl SparseSystemBuilder {
    /// `rows` is the effective row count, `cols` the number of free variables.
    pub fn new(mode: SolveMode, rows: usize, cols: usize) -> Self {
        Self {
            mode,
            triplets: CooMatrix::new(rows, cols),
            dropped: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.triplets.nrows()
    }

    pub fn cols(&self) -> usize {
        self.triplets.ncols()
    }

    /// Number of triplets pushed so far (before duplicate summation).
    pub fn triplet_count(&self) -> usize {
        self.triplets.nnz()
    }

    /// Number of entries discarded because their row variable was locked.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn triplet_iter(&self) -> impl Iterator<Item = (usize, usize, &f64)> {
        self.triplets.triplet_iter()
    }

    /// Route one matrix contribution.
    ///
    /// In square mode `row` is a variable id; in least-squares mode it is a raw
    /// equation index.
    pub fn add_matrix_entry(
        &mut self,
        vars: &mut VariableTable,
        row: usize,
        col_var: usize,
        value: f64,
    ) -> Result<(), SolverError> {
        check_index(IndexKind::Variable, col_var, vars.len())?;

        let row = match self.mode {
            SolveMode::LeastSquares => {
                check_index(IndexKind::Row, row, self.rows())?;
                row
            }
            SolveMode::Square => match vars.column(row)? {
                Some(col) => col,
                None => {
                    // Locked row variable: no equation exists for it.
                    self.dropped += 1;
                    return Ok(());
                }
            },
        };

        match vars.column(col_var)? {
            Some(col) => self.triplets.push(row, col, value),
            None => vars.push_pending(col_var, row, value),
        }
        Ok(())
    }

    /// Freeze the triplets into a compressed matrix.
    pub fn assemble(self) -> AssembledSystem {
        let matrix = CscMatrix::from(&self.triplets);
        let normal = match self.mode {
            SolveMode::Square => None,
            SolveMode::LeastSquares => {
                let transposed = matrix.transpose();
                Some(&transposed * &matrix)
            }
        };
        log::debug!(
            "assembled {}x{} matrix: {} triplets -> {} nonzeros ({} dropped)",
            matrix.nrows(),
            matrix.ncols(),
            self.triplets.nnz(),
            matrix.nnz(),
            self.dropped
        );
        AssembledSystem {
            matrix,
            normal,
            dropped: self.dropped,
        }
    }
}

/// The frozen system matrix `M` and, in least-squares mode, `MᵀM`.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    matrix: CscMatrix<f64>,
    normal: Option<CscMatrix<f64>>,
    dropped: usize,
}

impl AssembledSystem {
    /// The assembled `rows × F` matrix.
    pub fn matrix(&self) -> &CscMatrix<f64> {
        &self.matrix
    }

    /// The square matrix handed to the factorizer.
    pub fn system_matrix(&self) -> &CscMatrix<f64> {
        self.normal.as_ref().unwrap_or(&self.matrix)
    }

    pub fn is_least_squares(&self) -> bool {
        self.normal.is_some()
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    /// Compute `Mᵀ b`.
    pub fn transpose_mul(&self, b: &DVector<f64>) -> DVector<f64> {
        spmv(Op::Transpose(&self.matrix), self.matrix.ncols(), b)
    }

    /// Compute `M x`.
    pub fn mul(&self, x: &DVector<f64>) -> DVector<f64> {
        spmv(Op::NoOp(&self.matrix), self.matrix.nrows(), x)
    }
}

/// Sparse-times-vector through the dense kernel: `out = op(a) v`.
fn spmv(a: Op<&CscMatrix<f64>>, out_len: usize, v: &DVector<f64>) -> DVector<f64> {
    let v = DMatrix::from_column_slice(v.len(), 1, v.as_slice());
    let mut out = DMatrix::<f64>::zeros(out_len, 1);
    spmm_csc_dense(0.0, &mut out, 1.0, a, Op::NoOp(&v));
    DVector::from_column_slice(out.as_slice())
}
