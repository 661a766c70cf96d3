//! System storage: variables, sparse assembly and right-hand sides.

pub mod builder;
pub mod rhs;
pub mod variables;

pub use builder::*;
pub use rhs::*;
pub use variables::*;
