//! Per-variable state.
//!
//! Each variable carries one value per right-hand side, a lock flag and, once
//! the table is finalized, the dense matrix column it was assigned. Locked
//! variables never get a column; instead they collect the coefficients that
//! were added against them so the solver can move `coefficient × value` to
//! the right-hand side at solve time.

use nalgebra::DVector;

use crate::error::{IndexKind, SolverError, check_index};

/// A coefficient recorded against a locked column: `(matrix row, value)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCoeff {
    pub row: usize,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub locked: bool,
    pub values: Vec<f64>,
    pub column: Option<usize>,
    pub pending: Vec<PendingCoeff>,
}

impl Variable {
    fn new(rhs_count: usize) -> Self {
        Self {
            locked: false,
            values: vec![0.0; rhs_count],
            column: None,
            pending: Vec::new(),
        }
    }
}

/// All variables of one solver, indexed by caller-assigned ids.
#[derive(Debug, Clone)]
pub struct VariableTable {
    vars: Vec<Variable>,
    rhs_count: usize,
    free: Option<usize>,
}

impl VariableTable {
    pub fn new(count: usize, rhs_count: usize) -> Self {
        Self {
            vars: (0..count).map(|_| Variable::new(rhs_count)).collect(),
            rhs_count,
            free: None,
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn rhs_count(&self) -> usize {
        self.rhs_count
    }

    pub fn is_finalized(&self) -> bool {
        self.free.is_some()
    }

    pub fn get(&self, var: usize) -> Result<&Variable, SolverError> {
        check_index(IndexKind::Variable, var, self.vars.len())?;
        Ok(&self.vars[var])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn set_value(&mut self, rhs: usize, var: usize, value: f64) -> Result<(), SolverError> {
        check_index(IndexKind::Rhs, rhs, self.rhs_count)?;
        check_index(IndexKind::Variable, var, self.vars.len())?;
        self.vars[var].values[rhs] = value;
        Ok(())
    }

    pub fn value(&self, rhs: usize, var: usize) -> Result<f64, SolverError> {
        check_index(IndexKind::Rhs, rhs, self.rhs_count)?;
        Ok(self.get(var)?.values[rhs])
    }

    /// Lock a variable. Ignored once columns are assigned.
    ///
    /// Returns whether the call took effect.
    pub fn lock(&mut self, var: usize) -> Result<bool, SolverError> {
        self.set_locked(var, true)
    }

    /// Unlock a variable. Ignored once columns are assigned.
    pub fn unlock(&mut self, var: usize) -> Result<bool, SolverError> {
        self.set_locked(var, false)
    }

    fn set_locked(&mut self, var: usize, locked: bool) -> Result<bool, SolverError> {
        check_index(IndexKind::Variable, var, self.vars.len())?;
        if self.is_finalized() {
            log::debug!("ignoring lock change on variable {var}: columns already assigned");
            return Ok(false);
        }
        self.vars[var].locked = locked;
        Ok(true)
    }

    pub fn is_locked(&self, var: usize) -> Result<bool, SolverError> {
        Ok(self.get(var)?.locked)
    }

    pub fn column(&self, var: usize) -> Result<Option<usize>, SolverError> {
        Ok(self.get(var)?.column)
    }

    /// Assign dense columns `0..F` to free variables in index order.
    ///
    /// Only the first call assigns; later calls return the cached count.
    pub fn finalize_columns(&mut self) -> usize {
        if let Some(free) = self.free {
            return free;
        }
        let mut next = 0;
        for var in &mut self.vars {
            if var.locked {
                var.column = None;
            } else {
                var.column = Some(next);
                next += 1;
            }
        }
        self.free = Some(next);
        next
    }

    /// Number of free variables; `None` before finalization.
    pub fn free_count(&self) -> Option<usize> {
        self.free
    }

    pub fn locked_count(&self) -> usize {
        self.vars.iter().filter(|v| v.locked).count()
    }

    /// Record a coefficient against a locked column.
    pub(crate) fn push_pending(&mut self, var: usize, row: usize, value: f64) {
        self.vars[var].pending.push(PendingCoeff { row, value });
    }

    /// Copy solved values back into free variables.
    ///
    /// `solution[rhs][column]` is the solved value of the variable owning `column`.
    pub(crate) fn write_back(&mut self, solution: &[DVector<f64>]) {
        for var in self.vars.iter_mut() {
            let Some(col) = var.column else {
                continue;
            };
            for (rhs, x) in solution.iter().enumerate() {
                var.values[rhs] = x[col];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_skip_locked_variables_in_order() {
        let mut table = VariableTable::new(5, 1);
        table.lock(1).unwrap();
        table.lock(3).unwrap();
        assert_eq!(table.finalize_columns(), 3);

        let columns: Vec<Option<usize>> = (0..5).map(|v| table.column(v).unwrap()).collect();
        assert_eq!(columns, vec![Some(0), None, Some(1), None, Some(2)]);
        assert_eq!(table.locked_count(), 2);
    }

    #[test]
    fn lock_after_finalize_is_ignored() {
        let mut table = VariableTable::new(3, 1);
        table.lock(0).unwrap();
        table.unlock(0).unwrap();
        table.lock(2).unwrap();
        assert_eq!(table.finalize_columns(), 2);

        assert!(!table.lock(1).unwrap());
        assert!(!table.unlock(2).unwrap());
        assert!(!table.is_locked(1).unwrap());
        assert!(table.is_locked(2).unwrap());
        // Second finalize keeps the first numbering.
        assert_eq!(table.finalize_columns(), 2);
    }

    #[test]
    fn values_are_bounds_checked() {
        let mut table = VariableTable::new(2, 2);
        table.set_value(1, 0, 3.5).unwrap();
        assert_eq!(table.value(1, 0).unwrap(), 3.5);
        assert_eq!(table.value(0, 0).unwrap(), 0.0);
        assert!(table.set_value(2, 0, 1.0).is_err());
        assert!(table.value(0, 2).is_err());
        assert!(table.lock(7).is_err());
    }

    #[test]
    fn write_back_skips_locked() {
        let mut table = VariableTable::new(3, 2);
        table.lock(1).unwrap();
        table.set_value(0, 1, 9.0).unwrap();
        table.finalize_columns();

        let solution = vec![
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![10.0, 20.0]),
        ];
        table.write_back(&solution);

        assert_eq!(table.value(0, 0).unwrap(), 1.0);
        assert_eq!(table.value(1, 0).unwrap(), 10.0);
        assert_eq!(table.value(0, 1).unwrap(), 9.0);
        assert_eq!(table.value(0, 2).unwrap(), 2.0);
        assert_eq!(table.value(1, 2).unwrap(), 20.0);
    }
}
