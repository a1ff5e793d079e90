//! A thin, optional term reader sitting outside the resolution core proper.
//!
//! Parsing is a host concern: the engine consumes [`prolog_ir::term::Term`]s
//! and never looks at source text. This crate exists so `prolog-repl` and the
//! integration tests have a standard way to get from `"parent(tom, bob)."` to
//! a `Term`, without the engine crate taking on a lexer/parser dependency.

pub mod lexer;
pub mod parser;

use prolog_ir::env::VarCounter;
use prolog_ir::term::{Term, VarId};
pub use parser::{ParseError, Parser};

/// One clause-like unit read from a program's source text: fact, rule, or
/// directive, kept here as a real enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Fact(Term),
    Rule(Term, Term),
    /// A `:- Goal.` directive, including `:- initialization(Goal).`;
    /// execution policy (immediate vs. deferred) is left to the host.
    Directive(Term),
}

fn classify(term: Term) -> Item {
    if term.principal_functor() == Some((prolog_ir::symbol::Symbol::intern(":-"), 2)) {
        let mut args = term.args().to_vec();
        let body = args.pop().expect("arity checked above");
        let head = args.pop().expect("arity checked above");
        Item::Rule(head, body)
    } else if term.principal_functor() == Some((prolog_ir::symbol::Symbol::intern(":-"), 1)) {
        Item::Directive(term.args()[0].clone())
    } else {
        Item::Fact(term)
    }
}

/// Reads a single term from `src`, minting variables from `counter`. Returns
/// the term alongside the surface name each variable it introduced was
/// spelled with, for labeling a query's answers via `Environment::project`.
pub fn read_term(
    src: &str,
    counter: &mut VarCounter,
) -> Result<Option<(Term, Vec<(String, VarId)>)>, ParseError> {
    let mut parser = Parser::new(src, counter)?;
    match parser.parse_one()? {
        Some(term) => Ok(Some((term, parser.named_vars()))),
        None => Ok(None),
    }
}

/// Reads every clause/directive in `src`. Each item gets its own fresh
/// variable scope, matching ordinary Prolog consult semantics where `X` in
/// one clause shares nothing with `X` in the next.
pub fn read_program(src: &str, counter: &mut VarCounter) -> Result<Vec<Item>, ParseError> {
    let mut parser = Parser::new(src, counter)?;
    let mut items = Vec::new();
    while let Some((term, _)) = parser.parse_item()? {
        items.push(classify(term));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_a_fact_and_reports_no_variables() {
        let mut counter = VarCounter::new();
        let (term, vars) = read_term("parent(tom, bob).", &mut counter).unwrap().unwrap();
        assert_eq!(term, Term::compound("parent", vec![Term::atom("tom"), Term::atom("bob")]));
        assert!(vars.is_empty());
    }

    #[test]
    fn reads_a_query_and_reports_its_variable_names() {
        let mut counter = VarCounter::new();
        let (_, vars) = read_term("parent(X, bob).", &mut counter).unwrap().unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].0, "X");
    }

    #[test]
    fn classifies_facts_rules_and_directives() {
        let mut counter = VarCounter::new();
        let items = read_program(
            "parent(tom, bob).\nancestor(X, Y) :- parent(X, Y).\n:- initialization(main).\n",
            &mut counter,
        )
        .unwrap();
        assert!(matches!(items[0], Item::Fact(_)));
        assert!(matches!(items[1], Item::Rule(_, _)));
        assert!(matches!(items[2], Item::Directive(_)));
    }

    #[test]
    fn empty_source_reads_no_items() {
        let mut counter = VarCounter::new();
        assert_eq!(read_program("   % just a comment\n", &mut counter).unwrap(), vec![]);
    }
}
