//! Resolution engine, arithmetic evaluator, built-in catalog, and
//! meta-predicates.
//!
//! Kept in one crate rather than split apart: `engine` dispatches into
//! `builtins` and `meta`, and `meta` recursively drives `engine::Solve`
//! again, so splitting them would mean either a dependency cycle or the
//! kind of trait indirection a multi-backend solver uses to stay generic —
//! disproportionate here, where there is exactly one concrete engine.

#[macro_use]
extern crate tracing;

pub mod arithmetic;
pub mod builtins;
pub mod choicepoint;
pub mod config;
pub mod engine;
pub mod goal;
pub mod meta;

pub use config::EngineConfig;
pub use engine::{Engine, NoTermSource, Solve, TermSource};
