//! Integration-level checks for backtracking, cut, and search-order
//! invariants. Unification's own soundness/mgu-idempotence properties are
//! exercised exhaustively at the unit level in `prolog-solve`; these
//! confirm the same invariants hold once unification is driven through the
//! full resolution engine.

use prolog_ir::term::Term;
use prolog_tests::{answers, answers_fallible, engine_with, first_answer};

#[test]
fn backtrack_restoration_trail_returns_to_pre_query_length() {
    let mut engine = engine_with("p(1). p(2). p(3).");
    let mark = engine.env.mark();
    let trail_before = engine.env.trail_len();
    {
        let (goal, vars) = prolog_syntax::read_term("p(X).", engine.counter_mut())
            .unwrap()
            .unwrap();
        let results: Vec<_> = engine.solve(goal, vars).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(results.len(), 3);
    }
    assert_eq!(engine.env.trail_len(), trail_before);
    engine.env.undo_to(mark);
    assert_eq!(engine.env.trail_len(), trail_before);
}

#[test]
fn clause_order_prefers_the_leftmost_matching_clause() {
    let program = "
        color(red).
        color(green).
        color(blue).
    ";
    let results = answers(program, "color(X).");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].bindings[0].1, Term::atom("red"));
}

#[test]
fn cut_inside_negation_does_not_escape_into_the_caller() {
    // The `!` only ever runs inside the `\+`'s nested solve; `p/1`'s own
    // choicepoint, created before the `\+` call, must still yield both of
    // its clauses on backtracking.
    let program = "p(1). p(2).";
    let results = answers(program, "p(X), \\+ (X > 5, !).");
    assert_eq!(results.len(), 2, "the outer choicepoint for p/1 must survive the \\+ above");
}

#[test]
fn cut_inside_if_then_condition_does_not_escape() {
    // `r/1`'s own choicepoint is created before the `->` and must survive a
    // `!` that fires inside Cond (which here prunes only Cond's own
    // alternative from `r/1`, not anything outside the if-then-else).
    let program = "
        p(1).
        p(2).
        r(1).
        r(2).
    ";
    let results = answers(program, "p(X), (r(Y), ! -> true ; true).");
    assert_eq!(results.len(), 2, "the outer choicepoint for p/1 must survive the cut inside Cond");
}

#[test]
fn findall_is_total_empty_list_iff_goal_has_no_solutions() {
    let results = answers("p(1). p(2).", "findall(X, p(X), L).");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].bindings[0].1, Term::list(vec![Term::integer(1), Term::integer(2)], Term::nil()));

    let results = answers("p(1). p(2).", "findall(X, p(3), L).");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].bindings[0].1, Term::nil());
}

#[test]
fn setof_sorts_and_dedups_and_fails_like_an_empty_findall() {
    let program = "p(3). p(1). p(2). p(1).";
    let results = answers(program, "setof(X, p(X), L).");
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].bindings[0].1,
        Term::list(vec![Term::integer(1), Term::integer(2), Term::integer(3)], Term::nil())
    );

    assert!(first_answer(program, "setof(X, p(99), L).").is_none());
}

#[test]
fn arithmetic_preserves_integrality_and_promotes_to_float() {
    let results = answers("", "X is 2 + 3 * 4.");
    assert_eq!(results[0].bindings[0].1, Term::integer(14));

    let results = answers("", "X is 7 // 2.");
    assert_eq!(results[0].bindings[0].1, Term::integer(3));

    let results = answers("", "X is 1 + 2.5.");
    assert_eq!(results[0].bindings[0].1, Term::float(3.5));
}

#[test]
fn deferred_arithmetic_comparison_raises_instantiation_fault_once_exhausted() {
    // `X > 1` with `X` never bound has nothing to retry toward; the engine
    // must surface an instantiation fault rather than loop forever.
    let err = answers_fallible("", "X > 1.").unwrap_err();
    assert!(matches!(err, prolog_ir::error::PrologError::Instantiation { .. }));
}

#[test]
fn deferred_arithmetic_comparison_succeeds_once_its_variable_is_bound_later() {
    // `X > 1` is reappended to the goal queue's tail rather than
    // failing outright; by the time it's retried, `X = 5` (to its right in
    // the conjunction) has already bound `X`.
    let results = answers("", "X = 5, X > 1.");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].bindings[0].1, Term::integer(5));
}
