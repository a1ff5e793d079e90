//! The resolution engine's choicepoint stack.
//!
//! A choicepoint records remaining alternatives, the deferred goals to
//! resume with, the environment watermark, and the cut-barrier depth at
//! creation.

use crate::goal::QueuedGoal;
use prolog_ir::database::ClauseRef;
use prolog_ir::env::Mark;
use prolog_ir::term::Term;
use std::collections::VecDeque;

/// One unification equation an alternative wants to realize. Built-ins that
/// produce multiple solutions describe each alternative this way
/// instead of handing back a full environment, so the engine can replay it
/// through the ordinary unifier (and roll it back through the ordinary
/// trail) rather than carrying bespoke environment snapshots.
pub type Equations = Vec<(Term, Term)>;

#[derive(Clone, Debug)]
pub enum Alternative {
    /// Remaining clauses to try for a user-predicate call.
    Clauses {
        goal: Term,
        remaining: Vec<ClauseRef>,
    },
    /// The `Else` side of a plain `;/2`, or the `Else` branch of
    /// `(Cond -> Then ; Else)`.
    Disjunction { goal: Term },
    /// Remaining solutions of a multi-solution built-in.
    Equations { remaining: Vec<Equations> },
}

#[derive(Clone, Debug)]
pub struct Choicepoint {
    pub mark: Mark,
    pub depth: usize,
    pub rest_goals: VecDeque<QueuedGoal>,
    pub alt: Alternative,
}
