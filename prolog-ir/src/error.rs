//! The fault taxonomy: silent unification failure drives backtracking and
//! is never represented here; only the faults that abort a top-level query
//! are. One `thiserror` enum covers the whole hierarchy rather than
//! layering nested error types.

use crate::term::Term;
use thiserror::Error;

/// An abort-the-query fault. Corresponds to a Prolog `error(Kind, Detail)` term.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrologError {
    #[error("syntax error{}", format_loc(.line, .column))]
    Syntax {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("arguments are not sufficiently instantiated{}", format_ctx(.context))]
    Instantiation { context: String },

    #[error("type error: expected {expected}, got {got}")]
    Type { expected: String, got: String },

    #[error("arithmetic error: {0}")]
    Evaluation(#[from] EvaluationFault),

    #[error("existence error: unknown procedure {name}/{arity}")]
    UnknownPredicate { name: String, arity: usize },

    #[error("existence error: file not found '{0}'")]
    FileNotFound(String),

    #[error("illegal use: {0}")]
    IllegalUse(String),

    #[error("unification error: cannot unify '{lhs}' with '{rhs}'{}", format_ctx(.reason))]
    Unification {
        lhs: String,
        rhs: String,
        reason: String,
    },

    #[error("occurs check: variable {variable} occurs in term '{term}'")]
    OccursCheck { variable: String, term: String },

    #[error("query cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationFault {
    #[error("division by zero")]
    DivisionByZero,
    #[error("'{0}' is not a number")]
    NotNumber(String),
    #[error("unknown arithmetic operator '{0}'")]
    UnknownOperator(String),
    #[error("malformed arithmetic expression '{0}'")]
    Malformed(String),
}

fn format_loc(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(l), Some(c)) => format!(" (line {l}, column {c})"),
        (Some(l), None) => format!(" (line {l})"),
        _ => String::new(),
    }
}

fn format_ctx(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" in {context}")
    }
}

impl PrologError {
    pub fn instantiation(context: impl Into<String>) -> Self {
        PrologError::Instantiation {
            context: context.into(),
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        PrologError::Type {
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn unknown_predicate(name: impl Into<String>, arity: usize) -> Self {
        PrologError::UnknownPredicate {
            name: name.into(),
            arity,
        }
    }

    pub fn unification(lhs: &Term, rhs: &Term, reason: impl Into<String>) -> Self {
        PrologError::Unification {
            lhs: format!("{lhs:?}"),
            rhs: format!("{rhs:?}"),
            reason: reason.into(),
        }
    }
}
