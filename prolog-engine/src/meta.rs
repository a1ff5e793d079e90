//! The meta-predicate catalog.
//!
//! `findall/3`, `setof/3`, `bagof/3`, `forall/2`, and `maplist/2..N` are the
//! only goals that run a *nested* resolution — everything else dispatches
//! within the one running [`crate::engine::Solve`]. Each one opens its own
//! cut barrier via [`crate::engine::Solve::nested`], spawning a fresh
//! sub-search for the nested subgoal rather than threading the parent's
//! control state into it.

use crate::engine::Solve;
use prolog_ir::error::PrologError;
use prolog_ir::order::sort_dedup;
use prolog_ir::symbol::Symbol;
use prolog_ir::term::Term;
use prolog_solve::unify_rollback;

/// Returns `None` if `name/arity` isn't one of this catalog's predicates.
pub fn dispatch(solve: &mut Solve<'_>, _depth: usize, name: Symbol, args: &[Term]) -> Result<Option<bool>, PrologError> {
    match (name.as_str(), args.len()) {
        ("findall", 3) => {
            let results = collect_all(solve, &args[0], &args[1])?;
            Ok(Some(unify_result(solve, &args[2], results)?))
        }
        ("bagof", 3) => {
            let results = collect_all(solve, &args[0], &args[1])?;
            if results.is_empty() {
                return Ok(Some(false));
            }
            Ok(Some(unify_result(solve, &args[2], results)?))
        }
        ("setof", 3) => {
            let results = collect_all(solve, &args[0], &args[1])?;
            if results.is_empty() {
                return Ok(Some(false));
            }
            Ok(Some(unify_result(solve, &args[2], sort_dedup(results))?))
        }
        ("forall", 2) => Ok(Some(forall(solve, &args[0], &args[1])?)),
        ("maplist", n) if n >= 2 => Ok(Some(maplist(solve, args)?)),
        _ => Ok(None),
    }
}

/// Runs `goal` to exhaustion under a fresh cut barrier, collecting
/// `walk_deep(template)` at each solution ().
fn collect_all(solve: &mut Solve<'_>, template: &Term, goal: &Term) -> Result<Vec<Term>, PrologError> {
    let barrier = solve.barrier_depth();
    let defer = solve.defer_budget();
    let cap = solve.ctx().config.max_meta_solutions;
    let mut results = Vec::new();
    let mut sub = Solve::nested(solve.ctx(), goal.clone(), barrier, defer);
    loop {
        match sub.next() {
            None => break,
            Some(Err(e)) => return Err(e),
            Some(Ok(_)) => {
                results.push(sub.ctx().env.walk_deep(template)?);
                if results.len() > cap {
                    return Err(PrologError::IllegalUse(format!(
                        "findall/bagof/setof exceeded max_meta_solutions ({cap})"
                    )));
                }
            }
        }
    }
    Ok(results)
}

fn unify_result(solve: &mut Solve<'_>, list_out: &Term, results: Vec<Term>) -> Result<bool, PrologError> {
    let list_term = Term::list(results, Term::nil());
    let mut ctx = solve.ctx();
    unify_rollback(ctx.env, list_out, &list_term)
}

/// `forall(Cond, Action)`: every solution of `Cond` must also satisfy
/// `Action`. Equivalent to `\+ (Cond, \+ Action)`, implemented directly as a
/// nested enumeration rather than through that double-negation encoding so
/// failure doesn't require re-deriving `Cond` a second time.
fn forall(solve: &mut Solve<'_>, cond: &Term, action: &Term) -> Result<bool, PrologError> {
    let barrier = solve.barrier_depth();
    let defer = solve.defer_budget();
    let mut sub = Solve::nested(solve.ctx(), cond.clone(), barrier, defer);
    loop {
        match sub.next() {
            None => return Ok(true),
            Some(Err(e)) => return Err(e),
            Some(Ok(_)) => {
                let inner_barrier = sub.barrier_depth();
                let mark = sub.ctx().env.mark();
                let outcome = {
                    let mut inner = Solve::nested(sub.ctx(), action.clone(), inner_barrier, defer);
                    inner.next()
                };
                sub.ctx().env.undo_to(mark);
                match outcome {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e),
                    None => return Ok(false),
                }
            }
        }
    }
}

/// `maplist(Goal, List1, ..., ListN)`: calls `Goal` with each tuple of
/// corresponding elements appended as extra arguments. All list arguments
/// must be proper lists of equal length.
fn maplist(solve: &mut Solve<'_>, args: &[Term]) -> Result<bool, PrologError> {
    let goal_template = args[0].clone();
    let mut lists = Vec::with_capacity(args.len() - 1);
    for l in &args[1..] {
        let resolved = solve.ctx().env.walk_deep(l)?;
        let items = resolved
            .to_vec()
            .ok_or_else(|| PrologError::type_error("list", format!("{resolved:?}")))?;
        lists.push(items);
    }
    let len = match lists.first() {
        Some(l) => l.len(),
        None => return Ok(true),
    };
    if lists.iter().any(|l| l.len() != len) {
        return Ok(false);
    }
    let barrier = solve.barrier_depth();
    let defer = solve.defer_budget();
    for i in 0..len {
        let extra: Vec<Term> = lists.iter().map(|l| l[i].clone()).collect();
        let call = extend_goal(&goal_template, extra);
        let outcome = {
            let mut sub = Solve::nested(solve.ctx(), call, barrier, defer);
            sub.next()
        };
        match outcome {
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e),
            None => return Ok(false),
        }
    }
    Ok(true)
}

fn extend_goal(template: &Term, extra: Vec<Term>) -> Term {
    let mut args = template.args().to_vec();
    args.extend(extra);
    Term::compound(template.name(), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use prolog_ir::database::Clause;
    use prolog_ir::env::VarCounter;

    fn engine_with_member() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        let mut counter = VarCounter::new();
        let h = counter.fresh();
        let t = counter.fresh();
        let x = counter.fresh();
        engine.env.register(h);
        engine.env.register(t);
        engine.env.register(x);
        engine.database.assertz(Clause::fact(Term::compound(
            "member",
            vec![Term::Var(h), Term::cons(Term::Var(h), Term::Var(t))],
        )));
        let x2 = counter.fresh();
        let h2 = counter.fresh();
        let t2 = counter.fresh();
        engine.env.register(x2);
        engine.env.register(h2);
        engine.env.register(t2);
        engine.database.assertz(Clause::rule(
            Term::compound("member", vec![Term::Var(x2), Term::cons(Term::Var(h2), Term::Var(t2))]),
            vec![Term::compound("member", vec![Term::Var(x2), Term::Var(t2)])],
        ));
        engine.counter = counter;
        engine
    }

    #[test]
    fn findall_collects_every_solution() {
        let mut engine = engine_with_member();
        let x = engine.counter.fresh();
        engine.env.register(x);
        let list = Term::list(
            vec![Term::integer(1), Term::integer(2), Term::integer(3)],
            Term::nil(),
        );
        let out = engine.counter.fresh();
        engine.env.register(out);
        let goal = Term::compound(
            "findall",
            vec![Term::Var(x), Term::compound("member", vec![Term::Var(x), list]), Term::Var(out)],
        );
        let mut solve = engine.solve(goal, vec![("Out".to_string(), out)]);
        let answer = solve.next().unwrap().unwrap();
        assert_eq!(
            answer.bindings[0].1,
            Term::list(vec![Term::integer(1), Term::integer(2), Term::integer(3)], Term::nil())
        );
    }

    #[test]
    fn findall_with_no_solutions_yields_empty_list() {
        let mut engine = engine_with_member();
        let x = engine.counter.fresh();
        engine.env.register(x);
        let out = engine.counter.fresh();
        engine.env.register(out);
        let goal = Term::compound(
            "findall",
            vec![Term::Var(x), Term::compound("member", vec![Term::Var(x), Term::nil()]), Term::Var(out)],
        );
        let mut solve = engine.solve(goal, vec![("Out".to_string(), out)]);
        let answer = solve.next().unwrap().unwrap();
        assert_eq!(answer.bindings[0].1, Term::nil());
    }

    #[test]
    fn forall_succeeds_when_every_solution_satisfies_action() {
        let mut engine = engine_with_member();
        let x = engine.counter.fresh();
        engine.env.register(x);
        let list = Term::list(vec![Term::integer(2), Term::integer(4)], Term::nil());
        let goal = Term::compound(
            "forall",
            vec![
                Term::compound("member", vec![Term::Var(x), list]),
                Term::compound("is", vec![Term::integer(0), Term::compound("mod", vec![Term::Var(x), Term::integer(2)])]),
            ],
        );
        let mut solve = engine.solve(goal, vec![]);
        assert!(solve.next().unwrap().is_ok());
    }
}
