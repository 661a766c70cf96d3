//! `pinsolve`: sparse linear solving with locked variables.
//!
//! Geometry tools (parametrization, deformation, smoothing) keep building the
//! same kind of system: a sparse matrix assembled incrementally, some
//! variables pinned to known values, and one or more right-hand sides solved
//! against a single factorization. This crate packages that workflow:
//!
//! - lock variables, then add matrix and RHS contributions in any order
//! - locked variables are eliminated and their values moved to the RHS
//! - square systems solve `M x = b`; least-squares systems solve `MᵀM x = Mᵀb`
//! - the matrix is factored once and reused for later right-hand sides
//!
//! ```
//! use pinsolve::Solver;
//!
//! let mut solver = Solver::new(0, 2, 1)?;
//! solver.lock_variable(1)?;
//! solver.set_variable(0, 1, 3.0)?;
//!
//! solver.matrix_add(0, 0, 1.0)?;
//! solver.matrix_add(0, 1, 2.0)?;
//! solver.rhs_add(0, 0, 10.0)?;
//!
//! assert!(solver.solve()?);
//! assert!((solver.variable(0, 0)? - 4.0).abs() < 1e-12);
//! # Ok::<(), pinsolve::SolverError>(())
//! ```

pub mod config;
pub mod error;
pub mod factor;
pub mod solver;
pub mod system;

pub use config::{FactorizerKind, MAX_RHS, SolveMode, SolverConfig};
pub use error::{IndexKind, SolverError};
pub use factor::{DenseLu, DenseSvd, Factorizer, SparseCholesky, SparseLu, factorizer_for};
pub use solver::{Solver, SolverState, SolverStats};
