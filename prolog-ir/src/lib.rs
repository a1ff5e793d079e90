//! Term model, binding environment, and clause database shared by the
//! resolution engine and its built-ins.
//!
//! This crate corresponds to components C1 (term model), C2 (binding
//! environment & trail), and C4 (clause database) of the engine
//! specification, plus the error taxonomy every other crate in the
//! workspace propagates through `Result<_, PrologError>`.

#[macro_use]
extern crate tracing;

pub mod database;
pub mod env;
pub mod error;
pub mod order;
pub mod symbol;
pub mod term;

pub use database::{Clause, ClauseRef, Database};
pub use env::{Environment, Mark, VarCounter};
pub use error::PrologError;
pub use symbol::Symbol;
pub use term::Term;
