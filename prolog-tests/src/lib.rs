//! Shared harness for the end-to-end scenarios in `tests/`: parse a whole
//! program plus one query as ordinary Prolog source text, run it against a
//! fresh [`Engine`], hand back every answer.
//!
//! Keeping this in a library crate rather than a `tests/support` module
//! lets every test file `use prolog_tests::*;` without re-declaring the
//! harness per file.

use prolog_engine::{Engine, EngineConfig};
use prolog_ir::database::Clause;
use prolog_ir::env::Answer;
use prolog_ir::error::PrologError;
use prolog_syntax::{read_program, read_term, Item};

pub fn consult(engine: &mut Engine, program: &str) {
    let items = read_program(program, engine.counter_mut()).expect("test program parses");
    for item in items {
        match item {
            Item::Fact(head) => engine.database_mut().assertz(Clause::fact(head)),
            Item::Rule(head, body) => engine.database_mut().assertz(Clause::rule(head, vec![body])),
            Item::Directive(_) => panic!("test programs run queries through `answers`, not `:-` directives"),
        }
    }
}

/// Builds a fresh engine, consults `program`, and returns it without running
/// any query yet — for tests that need to inspect engine state (trail
/// length, choicepoints) around a query rather than just its answers.
pub fn engine_with(program: &str) -> Engine {
    let mut engine = Engine::new(EngineConfig::default());
    consult(&mut engine, program);
    engine
}

/// Every answer `query` produces against `program`, panicking if either
/// fails to parse or the query raises a fault.
pub fn answers(program: &str, query: &str) -> Vec<Answer> {
    answers_fallible(program, query).expect("query doesn't raise")
}

pub fn answers_fallible(program: &str, query: &str) -> Result<Vec<Answer>, PrologError> {
    let mut engine = engine_with(program);
    let (goal, vars) = read_term(query, engine.counter_mut())
        .expect("query parses")
        .expect("query is non-empty");
    engine.solve(goal, vars).collect()
}

/// Just the first answer, or `None` if the query fails outright.
pub fn first_answer(program: &str, query: &str) -> Option<Answer> {
    answers(program, query).into_iter().next()
}
