//! Unification over the shared binding environment.
//!
//! A small worker borrows the environment for the duration of one `unify`
//! call and is discarded afterward. Rollback-on-failure is the *caller's*
//! responsibility — the unifier itself may leave partial bindings on
//! failure, and engine code always calls
//! [`prolog_ir::Environment::undo_to`] against a mark it took before
//! unifying. [`unify_rollback`] below is the auto-rollback convenience for
//! call sites (like `\=/2`) that only need a yes/no answer and never want
//! to keep partial bindings either way.

#[macro_use]
extern crate tracing;

use prolog_ir::env::Environment;
use prolog_ir::error::PrologError;
use prolog_ir::term::{Term, VarId};

/// Unifies `a` and `b` under `env`, extending it in place. On success,
/// `env` now equates `a` and `b`. On failure, `env` may hold partial
/// bindings from the attempt — the caller must `undo_to` its own mark.
pub fn unify(env: &mut Environment, a: &Term, b: &Term) -> Result<bool, PrologError> {
    let a = env.lookup(a)?;
    let b = env.lookup(b)?;
    trace!(?a, ?b, "unify");
    match (&a, &b) {
        (Term::Var(x), Term::Var(y)) if x == y => Ok(true),
        (Term::Var(x), Term::Var(y)) => {
            // Both unbound: bind the textually/numerically larger id to the
            // smaller one. Any deterministic rule works; a fixed direction
            // keeps renamed clause instances from forming binding cycles.
            if x.0 <= y.0 {
                env.bind(*y, Term::Var(*x));
            } else {
                env.bind(*x, Term::Var(*y));
            }
            Ok(true)
        }
        (Term::Var(x), _) => {
            env.bind(*x, b.clone());
            Ok(true)
        }
        (_, Term::Var(y)) => {
            env.bind(*y, a.clone());
            Ok(true)
        }
        (Term::Atom(x), Term::Atom(y)) => Ok(x == y),
        (Term::Compound(name_a, args_a), Term::Compound(name_b, args_b)) => {
            if name_a != name_b || args_a.len() != args_b.len() {
                return Ok(false);
            }
            unify_lists(env, args_a, args_b)
        }
        _ => Ok(false),
    }
}

/// Pointwise unification requiring equal length. Short-circuits
/// (without undoing) on the first failing pair — as with [`unify`], rollback
/// is the caller's job.
pub fn unify_lists(env: &mut Environment, xs: &[Term], ys: &[Term]) -> Result<bool, PrologError> {
    if xs.len() != ys.len() {
        return Ok(false);
    }
    for (x, y) in xs.iter().zip(ys.iter()) {
        if !unify(env, x, y)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Attempts to unify `a` and `b`, automatically undoing any partial
/// bindings on failure. Used by call sites that want a clean yes/no
/// (`\=/2`, clause-head pre-filtering) rather than threading marks
/// themselves.
pub fn unify_rollback(env: &mut Environment, a: &Term, b: &Term) -> Result<bool, PrologError> {
    let mark = env.mark();
    match unify(env, a, b) {
        Ok(true) => Ok(true),
        Ok(false) => {
            env.undo_to(mark);
            Ok(false)
        }
        Err(e) => {
            env.undo_to(mark);
            Err(e)
        }
    }
}

/// Checks whether `v` occurs free in `term` under the current bindings.
/// Not used by default unification — no occurs-check is performed by
/// default — but available to built-ins/tests that want it explicitly, and
/// to the occurs-check-on-request variant some hosts offer.
pub fn occurs(env: &Environment, v: VarId, term: &Term) -> Result<bool, PrologError> {
    let resolved = env.lookup(term)?;
    match &resolved {
        Term::Var(id) => Ok(*id == v),
        Term::Atom(_) => Ok(false),
        Term::Compound(_, args) => {
            for arg in args.iter() {
                if occurs(env, v, arg)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prolog_ir::env::VarCounter;

    fn fresh(env: &mut Environment, counter: &mut VarCounter) -> VarId {
        let id = counter.fresh();
        env.register(id);
        id
    }

    #[test]
    fn unify_atom_with_atom() {
        let mut env = Environment::new();
        assert!(unify(&mut env, &Term::atom("a"), &Term::atom("a")).unwrap());
        assert!(!unify(&mut env, &Term::atom("a"), &Term::atom("b")).unwrap());
    }

    #[test]
    fn unify_var_with_compound_binds_and_walk_deep_agrees() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let v = fresh(&mut env, &mut counter);
        let t = Term::compound("f", vec![Term::atom("a"), Term::atom("b")]);
        assert!(unify(&mut env, &Term::Var(v), &t).unwrap());
        assert_eq!(env.walk_deep(&Term::Var(v)).unwrap(), t);
    }

    #[test]
    fn unification_soundness_for_compounds() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = fresh(&mut env, &mut counter);
        let y = fresh(&mut env, &mut counter);
        let a = Term::compound("f", vec![Term::Var(x), Term::atom("b")]);
        let b = Term::compound("f", vec![Term::atom("a"), Term::Var(y)]);
        assert!(unify(&mut env, &a, &b).unwrap());
        assert_eq!(env.walk_deep(&a).unwrap(), env.walk_deep(&b).unwrap());
    }

    #[test]
    fn mismatched_functor_or_arity_fails() {
        let mut env = Environment::new();
        let a = Term::compound("f", vec![Term::atom("a")]);
        let b = Term::compound("g", vec![Term::atom("a")]);
        assert!(!unify(&mut env, &a, &b).unwrap());

        let c = Term::compound("f", vec![Term::atom("a"), Term::atom("b")]);
        assert!(!unify(&mut env, &a, &c).unwrap());
    }

    #[test]
    fn unify_rollback_undoes_partial_bindings_on_failure() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = fresh(&mut env, &mut counter);
        // f(X, a) vs f(b, b): X binds to b, then a/b mismatch fails.
        let a = Term::compound("f", vec![Term::Var(x), Term::atom("a")]);
        let b = Term::compound("f", vec![Term::atom("b"), Term::atom("b")]);
        assert!(!unify_rollback(&mut env, &a, &b).unwrap());
        assert!(!env.is_bound(x));
    }

    #[test]
    fn idempotence_of_the_resulting_substitution() {
        let mut env = Environment::new();
        let mut counter = VarCounter::new();
        let x = fresh(&mut env, &mut counter);
        unify(&mut env, &Term::Var(x), &Term::atom("a")).unwrap();
        let once = env.walk_deep(&Term::Var(x)).unwrap();
        let twice = env.walk_deep(&once).unwrap();
        assert_eq!(once, twice);
    }
}
