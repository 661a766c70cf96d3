//! The constrained solver state machine.
//!
//! Lifecycle:
//!
//! ```text
//! Variables --(first matrix_add / rhs_add / solve)--> Matrix --(solve)--> Solved
//! ```
//!
//! - **Variables**: variables may be locked/unlocked and given values.
//! - **Matrix**: columns are assigned, triplets and RHS values accumulate.
//! - **Solved**: the matrix is assembled and factored exactly once. Further
//!   matrix additions are ignored; RHS additions and solves keep working
//!   against the stored factorization.
//!
//! A failed factorization is not retried: the solver stays in `Solved` and
//! every later `solve()` reports `false`.

use std::time::{Duration, Instant};

use nalgebra::DVector;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{FactorizerKind, SolveMode, SolverConfig};
use crate::error::{IndexKind, SolverError, check_index};
use crate::factor::{Factorizer, factorizer_for};
use crate::system::{AssembledSystem, RhsBlock, SparseSystemBuilder, VariableTable};

pub mod debug;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverState {
    Variables,
    Matrix,
    Solved,
}

/// Counters and timings collected over the solver's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverStats {
    /// Factorizations performed (0 or 1).
    pub factorizations: usize,
    /// Non-trivial `solve()` calls.
    pub solves: usize,
    /// Solves that had at least one right-hand side fail back-substitution.
    pub failed_rhs: usize,
    /// Nonzeros of the assembled `rows × F` matrix.
    pub matrix_nnz: usize,
    /// Nonzeros of the factored matrix (`MᵀM` in least-squares mode).
    pub system_nnz: usize,
    /// Matrix entries dropped because their row variable was locked.
    pub dropped_entries: usize,
    pub factor_time: Option<Duration>,
    pub last_solve_time: Option<Duration>,
}

enum Phase {
    Variables,
    Matrix(SparseSystemBuilder),
    Solved(AssembledSystem),
}

/// Sparse linear solver with locked-variable elimination.
///
/// Indices are caller-assigned and 0-based. In square mode rows are addressed
/// by variable id (one equation per free variable); in least-squares mode rows
/// are plain equation indices.
pub struct Solver {
    config: SolverConfig,
    vars: VariableTable,
    phase: Phase,
    rows: usize,
    rhs: RhsBlock,
    solutions: Vec<DVector<f64>>,
    factorizer: Option<Box<dyn Factorizer>>,
    factor_ok: Option<bool>,
    stats: SolverStats,
}

impl Solver {
    /// Square solver. `rows == 0` sizes the system to the free-variable count.
    pub fn new(rows: usize, variables: usize, rhs_count: usize) -> Result<Self, SolverError> {
        Self::from_config(&SolverConfig::square(rows, variables, rhs_count))
    }

    /// Least-squares solver for `rows` equations over `variables` unknowns.
    /// `rows == 0` means one equation per free variable, as in square mode.
    pub fn least_squares(
        rows: usize,
        variables: usize,
        rhs_count: usize,
    ) -> Result<Self, SolverError> {
        Self::from_config(&SolverConfig::least_squares(rows, variables, rhs_count))
    }

    pub fn from_config(config: &SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            vars: VariableTable::new(config.variables, config.rhs_count),
            phase: Phase::Variables,
            rows: config.rows,
            rhs: RhsBlock::new(config.mode, config.rhs_count, 0),
            solutions: Vec::new(),
            factorizer: None,
            factor_ok: None,
            stats: SolverStats::default(),
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn mode(&self) -> SolveMode {
        self.config.mode
    }

    pub fn state(&self) -> SolverState {
        match self.phase {
            Phase::Variables => SolverState::Variables,
            Phase::Matrix(_) => SolverState::Matrix,
            Phase::Solved(_) => SolverState::Solved,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.vars.len()
    }

    /// Row count: the configured value until columns are assigned, the
    /// effective one afterwards.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn rhs_count(&self) -> usize {
        self.config.rhs_count
    }

    /// Free-variable count, known once the solver leaves `Variables`.
    pub fn free_variables(&self) -> Option<usize> {
        self.vars.free_count()
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Outcome of the one-time factorization, if it happened.
    pub fn factorization_ok(&self) -> Option<bool> {
        self.factor_ok
    }

    pub fn factorizer_name(&self) -> Option<&'static str> {
        self.factorizer.as_ref().map(|f| f.name())
    }

    /// Select a built-in backend. Returns `false` once factorization happened.
    pub fn set_factorizer(&mut self, kind: FactorizerKind) -> bool {
        if self.factor_ok.is_some() {
            return false;
        }
        self.config.factorizer = kind;
        self.factorizer = None;
        true
    }

    /// Supply a custom backend. Returns `false` once factorization happened.
    pub fn set_custom_factorizer(&mut self, factorizer: Box<dyn Factorizer>) -> bool {
        if self.factor_ok.is_some() {
            return false;
        }
        self.factorizer = Some(factorizer);
        true
    }

    pub fn set_variable(&mut self, rhs: usize, var: usize, value: f64) -> Result<(), SolverError> {
        self.vars.set_value(rhs, var, value)
    }

    /// Current value: caller-set, or solved for free variables after a
    /// successful `solve()`.
    pub fn variable(&self, rhs: usize, var: usize) -> Result<f64, SolverError> {
        self.vars.value(rhs, var)
    }

    /// Lock a variable. Ignored (returns `Ok(false)`) after assembly started.
    pub fn lock_variable(&mut self, var: usize) -> Result<bool, SolverError> {
        self.vars.lock(var)
    }

    /// Unlock a variable. Ignored (returns `Ok(false)`) after assembly started.
    pub fn unlock_variable(&mut self, var: usize) -> Result<bool, SolverError> {
        self.vars.unlock(var)
    }

    pub fn is_locked(&self, var: usize) -> Result<bool, SolverError> {
        self.vars.is_locked(var)
    }

    /// Add `value` at `(row, col_var)`. A no-op once the system is solved.
    pub fn matrix_add(&mut self, row: usize, col_var: usize, value: f64) -> Result<(), SolverError> {
        self.ensure_matrix_phase()?;
        match &mut self.phase {
            Phase::Matrix(builder) => builder.add_matrix_entry(&mut self.vars, row, col_var, value),
            Phase::Solved(_) | Phase::Variables => Ok(()),
        }
    }

    /// Add `value` to right-hand side `rhs` at `row`. Allowed after solving.
    pub fn rhs_add(&mut self, rhs: usize, row: usize, value: f64) -> Result<(), SolverError> {
        self.ensure_matrix_phase()?;
        self.rhs.add(&self.vars, rhs, row, value)
    }

    /// Current accumulated right-hand-side entry at a matrix row.
    pub fn rhs_value(&self, rhs: usize, row: usize) -> Result<f64, SolverError> {
        let b = self.rhs.vector(rhs)?;
        check_index(IndexKind::Row, row, b.len())?;
        Ok(b[row])
    }

    /// Solution of the last successful solve for slot `rhs`, indexed by column.
    pub fn solution(&self, rhs: usize) -> Option<&DVector<f64>> {
        self.solutions.get(rhs)
    }

    /// Solve every right-hand side.
    ///
    /// `Ok(false)` means the system was numerically singular; values are left
    /// untouched in that case. `Err` is only returned for a square system whose
    /// row count does not match its free-variable count.
    pub fn solve(&mut self) -> Result<bool, SolverError> {
        self.ensure_matrix_phase()?;
        let free = self.vars.free_count().unwrap_or(0);
        if free == 0 || self.rows == 0 {
            log::debug!("nothing to solve: {free} free variables, {} rows", self.rows);
            return Ok(true);
        }

        if matches!(self.phase, Phase::Matrix(_)) {
            self.assemble_and_factor();
        }

        let start = Instant::now();
        let solved = match (self.factor_ok, &self.phase, self.factorizer.as_deref()) {
            (Some(true), Phase::Solved(system), Some(factorizer)) => {
                solve_all(&self.vars, &self.rhs, system, factorizer)
            }
            _ => None,
        };

        let ok = match solved {
            Some(solutions) => {
                self.vars.write_back(&solutions);
                self.solutions = solutions;
                true
            }
            None => false,
        };
        if !ok && self.factor_ok == Some(true) {
            self.stats.failed_rhs += 1;
        }

        self.rhs.clear();
        self.stats.solves += 1;
        self.stats.last_solve_time = Some(start.elapsed());
        Ok(ok)
    }

    fn ensure_matrix_phase(&mut self) -> Result<(), SolverError> {
        if !matches!(self.phase, Phase::Variables) {
            return Ok(());
        }
        let free = self.vars.finalize_columns();
        let rows = if self.config.rows == 0 { free } else { self.config.rows };
        if self.config.mode == SolveMode::Square && rows != free {
            return Err(SolverError::RowCountMismatch { rows, free });
        }

        log::debug!(
            "entering matrix phase: {} variables ({free} free), {rows} rows, {} rhs",
            self.vars.len(),
            self.config.rhs_count
        );
        self.rows = rows;
        self.rhs = RhsBlock::new(self.config.mode, self.config.rhs_count, rows);
        self.phase = Phase::Matrix(SparseSystemBuilder::new(self.config.mode, rows, free));
        Ok(())
    }

    fn assemble_and_factor(&mut self) {
        let builder = match std::mem::replace(&mut self.phase, Phase::Variables) {
            Phase::Matrix(builder) => builder,
            other => {
                self.phase = other;
                return;
            }
        };
        let system = builder.assemble();

        let mut factorizer = self
            .factorizer
            .take()
            .unwrap_or_else(|| factorizer_for(self.config.factorizer, self.config.mode));

        let start = Instant::now();
        let outcome = factorizer.factor(system.system_matrix());
        self.stats.factor_time = Some(start.elapsed());
        self.stats.factorizations += 1;
        self.stats.matrix_nnz = system.matrix().nnz();
        self.stats.system_nnz = system.system_matrix().nnz();
        self.stats.dropped_entries = system.dropped_count();

        match outcome {
            Ok(()) => {
                log::debug!(
                    "{} factored {}x{} system ({} nonzeros, rcond {})",
                    factorizer.name(),
                    system.system_matrix().nrows(),
                    system.system_matrix().ncols(),
                    self.stats.system_nnz,
                    factorizer
                        .inverse_condition()
                        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3e}"))
                );
                self.factor_ok = Some(true);
            }
            Err(e) if e.is_numerical() => {
                log::warn!("{} factorization failed: {e}", factorizer.name());
                self.factor_ok = Some(false);
            }
            Err(e) => {
                log::error!("{} rejected the system: {e}", factorizer.name());
                self.factor_ok = Some(false);
            }
        }

        self.factorizer = Some(factorizer);
        self.phase = Phase::Solved(system);
    }
}

/// Eliminate locked variables and solve each RHS slot against the shared
/// factorization. `None` if any slot fails.
fn solve_all(
    vars: &VariableTable,
    rhs: &RhsBlock,
    system: &AssembledSystem,
    factorizer: &dyn Factorizer,
) -> Option<Vec<DVector<f64>>> {
    let eliminated: Vec<DVector<f64>> =
        (0..rhs.rhs_count()).map(|slot| rhs.eliminated(vars, slot)).collect();

    let results: Vec<Result<DVector<f64>, SolverError>> = eliminated
        .par_iter()
        .map(|b| {
            if system.is_least_squares() {
                factorizer.solve(&system.transpose_mul(b))
            } else {
                factorizer.solve(b)
            }
        })
        .collect();

    let mut solutions = Vec::with_capacity(results.len());
    for (slot, result) in results.into_iter().enumerate() {
        match result {
            Ok(x) => solutions.push(x),
            Err(e) => {
                log::warn!("rhs {slot} failed: {e}");
                return None;
            }
        }
    }

    if log::log_enabled!(log::Level::Debug) {
        for (slot, (x, b)) in solutions.iter().zip(&eliminated).enumerate() {
            let residual = (system.mul(x) - b).norm();
            log::debug!("rhs {slot}: |Mx - b| = {residual:.3e}");
        }
    }
    Some(solutions)
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("mode", &self.config.mode)
            .field("state", &self.state())
            .field("variables", &self.vars.len())
            .field("free", &self.vars.free_count())
            .field("rows", &self.rows)
            .field("rhs_count", &self.config.rhs_count)
            .field("factorizer", &self.factorizer_name())
            .field("factorization_ok", &self.factor_ok)
            .finish()
    }
}
