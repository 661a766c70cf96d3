//! Dense right-hand sides, one per RHS slot.

use nalgebra::DVector;

use crate::config::SolveMode;
use crate::error::{IndexKind, SolverError, check_index};
use crate::system::variables::VariableTable;

#[derive(Debug, Clone)]
pub struct RhsBlock {
    mode: SolveMode,
    vectors: Vec<DVector<f64>>,
}

impl RhsBlock {
    pub fn new(mode: SolveMode, rhs_count: usize, rows: usize) -> Self {
        Self {
            mode,
            vectors: vec![DVector::zeros(rows); rhs_count],
        }
    }

    pub fn rows(&self) -> usize {
        self.vectors.first().map_or(0, |v| v.len())
    }

    pub fn rhs_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector(&self, rhs: usize) -> Result<&DVector<f64>, SolverError> {
        check_index(IndexKind::Rhs, rhs, self.vectors.len())?;
        Ok(&self.vectors[rhs])
    }

    /// Accumulate `value` into slot `rhs`.
    ///
    /// Square mode addresses rows by variable id and maps them through the
    /// column numbering; a locked variable has no row and the value is dropped.
    pub fn add(
        &mut self,
        vars: &VariableTable,
        rhs: usize,
        row: usize,
        value: f64,
    ) -> Result<(), SolverError> {
        check_index(IndexKind::Rhs, rhs, self.vectors.len())?;
        let row = match self.mode {
            SolveMode::LeastSquares => {
                check_index(IndexKind::Row, row, self.rows())?;
                row
            }
            SolveMode::Square => match vars.column(row)? {
                Some(col) => col,
                None => return Ok(()),
            },
        };
        self.vectors[rhs][row] += value;
        Ok(())
    }

    /// Slot `rhs` with every locked variable's contribution moved across:
    /// `b[row] -= coefficient × value[rhs]`.
    pub fn eliminated(&self, vars: &VariableTable, rhs: usize) -> DVector<f64> {
        let mut b = self.vectors[rhs].clone();
        for var in vars.iter().filter(|v| v.locked) {
            let known = var.values[rhs];
            for coeff in &var.pending {
                b[coeff.row] -= coeff.value * known;
            }
        }
        b
    }

    /// Reset every slot for the next round of accumulation.
    pub fn clear(&mut self) {
        for v in &mut self.vectors {
            v.fill(0.0);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.vectors.iter().all(|v| v.iter().all(|x| *x == 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_rows_follow_column_numbering() {
        let mut vars = VariableTable::new(3, 1);
        vars.lock(1).unwrap();
        let free = vars.finalize_columns();
        let mut block = RhsBlock::new(SolveMode::Square, 1, free);

        block.add(&vars, 0, 2, 4.0).unwrap();
        block.add(&vars, 0, 2, 1.0).unwrap();
        block.add(&vars, 0, 1, 100.0).unwrap(); // locked: dropped
        block.add(&vars, 0, 0, -2.0).unwrap();

        assert_eq!(block.vector(0).unwrap().as_slice(), &[-2.0, 5.0]);
        assert!(block.add(&vars, 1, 0, 1.0).is_err());
        assert!(block.add(&vars, 0, 3, 1.0).is_err());
    }

    #[test]
    fn least_squares_rows_are_raw() {
        let mut vars = VariableTable::new(1, 2);
        vars.finalize_columns();
        let mut block = RhsBlock::new(SolveMode::LeastSquares, 2, 3);
        block.add(&vars, 1, 2, 3.0).unwrap();
        assert_eq!(block.vector(1).unwrap().as_slice(), &[0.0, 0.0, 3.0]);
        assert!(block.add(&vars, 0, 3, 1.0).is_err());
    }

    #[test]
    fn elimination_uses_per_rhs_locked_values() {
        let mut vars = VariableTable::new(2, 2);
        vars.lock(1).unwrap();
        vars.set_value(0, 1, 3.0).unwrap();
        vars.set_value(1, 1, -1.0).unwrap();
        let free = vars.finalize_columns();
        vars.push_pending(1, 0, 2.0);

        let mut block = RhsBlock::new(SolveMode::Square, 2, free);
        block.add(&vars, 0, 0, 10.0).unwrap();
        block.add(&vars, 1, 0, 10.0).unwrap();

        assert_eq!(block.eliminated(&vars, 0)[0], 4.0);
        assert_eq!(block.eliminated(&vars, 1)[0], 12.0);
        // Elimination works on a copy.
        assert_eq!(block.vector(0).unwrap()[0], 10.0);

        block.clear();
        assert!(block.is_zero());
    }
}
