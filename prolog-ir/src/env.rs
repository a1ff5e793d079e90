//! The binding environment and trail.
//!
//! An explicit binding array indexed by variable id, with an append-only
//! trail giving O(1) undo on backtrack — rather than rebuilding a fresh
//! substitution map on every binding.

use crate::error::PrologError;
use crate::term::{Term, VarId};
use std::fmt;

/// Generates globally-unique variable identities for one top-level query.
/// Lives in engine state and is threaded into clause renaming and
/// fresh-variable creation during built-in dispatch.
#[derive(Debug, Default)]
pub struct VarCounter {
    next: u64,
}

impl VarCounter {
    pub fn new() -> Self {
        VarCounter::default()
    }

    pub fn fresh(&mut self) -> VarId {
        let id = VarId(self.next);
        self.next += 1;
        id
    }
}

/// A trail watermark: the environment can be rewound to exactly this point.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Mark(usize);

/// Default bound on `lookup`/`walk_deep` recursion before a suspected cyclic
/// binding is reported as [`PrologError::OccursCheck`] — no occurs-check is
/// performed by default, but traversal must still terminate.
pub const DEFAULT_MAX_WALK_DEPTH: usize = 1_000_000;

pub struct Environment {
    bindings: Vec<Option<Term>>,
    trail: Vec<VarId>,
    max_walk_depth: usize,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            bindings: Vec::new(),
            trail: Vec::new(),
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }

    pub fn with_max_walk_depth(max_walk_depth: usize) -> Self {
        Environment {
            max_walk_depth,
            ..Environment::new()
        }
    }

    /// Allocates storage for a freshly-minted variable. Every [`VarId`]
    /// handed out by a [`VarCounter`] must be registered here before it can
    /// be looked up or bound.
    pub fn register(&mut self, id: VarId) {
        let idx = id.0 as usize;
        if idx >= self.bindings.len() {
            self.bindings.resize(idx + 1, None);
        }
    }

    fn slot(&self, id: VarId) -> &Option<Term> {
        &self.bindings[id.0 as usize]
    }

    /// Follows `v -> v' -> ...` until a non-`Var` or unbound `Var` is
    /// reached, returning that terminal term.
    pub fn lookup(&self, term: &Term) -> Result<Term, PrologError> {
        let mut current = term.clone();
        let mut depth = 0;
        loop {
            match &current {
                Term::Var(id) => match self.slot(*id) {
                    Some(bound) => {
                        current = bound.clone();
                        depth += 1;
                        if depth > self.max_walk_depth {
                            return Err(PrologError::OccursCheck {
                                variable: id.to_string(),
                                term: format!("{term:?}"),
                            });
                        }
                    }
                    None => return Ok(current),
                },
                _ => return Ok(current),
            }
        }
    }

    /// Recursively substitutes every variable in `term` with its bound
    /// image, producing a term with no bound variables remaining.
    pub fn walk_deep(&self, term: &Term) -> Result<Term, PrologError> {
        self.walk_deep_depth(term, 0)
    }

    fn walk_deep_depth(&self, term: &Term, depth: usize) -> Result<Term, PrologError> {
        if depth > self.max_walk_depth {
            return Err(PrologError::OccursCheck {
                variable: "?".to_string(),
                term: format!("{term:?}"),
            });
        }
        let resolved = self.lookup(term)?;
        match resolved {
            Term::Compound(name, args) => {
                let mut new_args = Vec::with_capacity(args.len());
                for arg in args.iter() {
                    new_args.push(self.walk_deep_depth(arg, depth + 1)?);
                }
                Ok(Term::compound(name, new_args))
            }
            other => Ok(other),
        }
    }

    /// Binds `v` to `t`. Precondition: `v` is unbound, checked via
    /// `debug_assert!` and trusted in release builds.
    pub fn bind(&mut self, v: VarId, t: Term) {
        debug_assert!(
            self.slot(v).is_none(),
            "bind() called on an already-bound variable"
        );
        trace!(var = %v, term = ?t, "bind");
        self.bindings[v.0 as usize] = Some(t);
        self.trail.push(v);
    }

    pub fn is_bound(&self, id: VarId) -> bool {
        self.slot(id).is_some()
    }

    /// Current trail length, usable as a checkpoint for [`Environment::undo_to`].
    pub fn mark(&self) -> Mark {
        Mark(self.trail.len())
    }

    /// Unwinds every binding recorded since `mark`.
    pub fn undo_to(&mut self, mark: Mark) {
        while self.trail.len() > mark.0 {
            let v = self.trail.pop().expect("trail length checked above");
            self.bindings[v.0 as usize] = None;
        }
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Projects the environment over `query_vars`, skipping internally
    /// generated variables (conventionally prefixed `_G`/`TEMP`).
    /// `query_vars` here is given as `(surface_name, id)` pairs so the
    /// returned answer uses the names the query was written with rather
    /// than internal ids.
    pub fn project(&self, query_vars: &[(String, VarId)]) -> Result<Answer, PrologError> {
        let mut bindings = Vec::new();
        for (name, id) in query_vars {
            if name.starts_with("_G") || name.starts_with("TEMP") {
                continue;
            }
            let value = self.walk_deep(&Term::Var(*id))?;
            bindings.push((name.clone(), value));
        }
        Ok(Answer { bindings })
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

/// A finite mapping from the query's free variables to fully-substituted
/// terms.
#[derive(Clone, Debug, PartialEq)]
pub struct Answer {
    pub bindings: Vec<(String, Term)>,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return write!(f, "true");
        }
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_lookup_resolves_to_terminal_term() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let v = counter.fresh();
        env.register(v);
        env.bind(v, Term::atom("foo"));
        assert_eq!(env.lookup(&Term::Var(v)).unwrap(), Term::atom("foo"));
    }

    #[test]
    fn walk_deep_substitutes_nested_variables() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = counter.fresh();
        let y = counter.fresh();
        env.register(x);
        env.register(y);
        env.bind(x, Term::Var(y));
        env.bind(y, Term::atom("bound"));
        let t = Term::compound("f", vec![Term::Var(x), Term::atom("g")]);
        let resolved = env.walk_deep(&t).unwrap();
        assert_eq!(
            resolved,
            Term::compound("f", vec![Term::atom("bound"), Term::atom("g")])
        );
    }

    #[test]
    fn undo_to_restores_prior_state() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = counter.fresh();
        env.register(x);
        let mark = env.mark();
        env.bind(x, Term::atom("temp"));
        assert!(env.is_bound(x));
        env.undo_to(mark);
        assert!(!env.is_bound(x));
    }

    #[test]
    fn project_skips_internal_variables() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = counter.fresh();
        let internal = counter.fresh();
        env.register(x);
        env.register(internal);
        env.bind(x, Term::integer(10));
        env.bind(internal, Term::atom("hidden"));
        let answer = env
            .project(&[
                ("X".to_string(), x),
                ("_G7".to_string(), internal),
            ])
            .unwrap();
        assert_eq!(answer.bindings, vec![("X".to_string(), Term::integer(10))]);
    }
}
