//! The term model.
//!
//! A `Term` is a tagged variant: a logic variable, an atom (numeric
//! literals included — numericity is recognized on demand by the
//! arithmetic evaluator rather than carried as a distinct variant, so that
//! the source text round-trips), or a named compound. The empty list and
//! list-cons are ordinary compounds with functor `[]/0` and `./2`; there is
//! no separate list variant.
//!
//! Terms are immutable once built; mutation lives entirely in the
//! [`crate::env::Environment`], never here.

use crate::symbol::{well_known, Symbol};
use std::fmt;
use std::rc::Rc;

/// A logic variable's identity. Unique over the lifetime of one top-level
/// query; every clause-use is given a fresh batch by renaming.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct VarId(pub u64);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_G{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(VarId),
    Atom(Symbol),
    /// `args` is reference-counted so renaming/substitution can share
    /// untouched subterms instead of deep-cloning them — terms are
    /// immutable, so sharing is always safe.
    Compound(Symbol, Rc<[Term]>),
}

impl Term {
    pub fn var(id: VarId) -> Term {
        Term::Var(id)
    }

    pub fn atom(name: impl Into<Symbol>) -> Term {
        Term::Atom(name.into())
    }

    pub fn compound(name: impl Into<Symbol>, args: Vec<Term>) -> Term {
        if args.is_empty() {
            Term::Atom(name.into())
        } else {
            Term::Compound(name.into(), Rc::from(args))
        }
    }

    pub fn integer(value: i64) -> Term {
        Term::Atom(Symbol::intern(&value.to_string()))
    }

    pub fn float(value: f64) -> Term {
        Term::Atom(Symbol::intern(&format!("{value}")))
    }

    pub fn nil() -> Term {
        Term::Atom(well_known::nil())
    }

    pub fn cons(head: Term, tail: Term) -> Term {
        Term::Compound(well_known::cons(), Rc::from(vec![head, tail]))
    }

    /// Builds a proper (or partial, with `tail`) list from `items`.
    pub fn list<I>(items: I, tail: Term) -> Term
    where
        I: IntoIterator<Item = Term>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Term::cons(item, acc))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Atom(s) if *s == well_known::nil())
    }

    pub fn is_cons(&self) -> bool {
        matches!(self, Term::Compound(s, args) if *s == well_known::cons() && args.len() == 2)
    }

    pub fn as_cons(&self) -> Option<(&Term, &Term)> {
        match self {
            Term::Compound(s, args) if *s == well_known::cons() && args.len() == 2 => {
                Some((&args[0], &args[1]))
            }
            _ => None,
        }
    }

    pub fn name(&self) -> Symbol {
        match self {
            Term::Atom(name) => *name,
            Term::Compound(name, _) => *name,
            Term::Var(_) => panic!("Term::name() called on a variable"),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Term::Compound(_, args) => args.len(),
            _ => 0,
        }
    }

    pub fn args(&self) -> &[Term] {
        match self {
            Term::Compound(_, args) => args,
            _ => &[],
        }
    }

    /// The `(name, arity)` key used to index the clause database and to
    /// classify a goal for dispatch.
    pub fn principal_functor(&self) -> Option<(Symbol, usize)> {
        match self {
            Term::Var(_) => None,
            Term::Atom(name) => Some((*name, 0)),
            Term::Compound(name, args) => Some((*name, args.len())),
        }
    }

    /// Parses this term's textual name as a number, the way the arithmetic
    /// evaluator recognizes numeric atoms on demand. Returns `None` for
    /// non-atoms and atoms that aren't valid numeric literals.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Term::Atom(name) => parse_number(name.as_str()),
            _ => None,
        }
    }

    /// Collects a proper list into a `Vec<Term>`. Returns `None` if `self`
    /// is not `[]`-terminated (e.g. a partial list or an improper tail).
    pub fn to_vec(&self) -> Option<Vec<Term>> {
        let mut items = Vec::new();
        let mut cursor = self;
        loop {
            if cursor.is_nil() {
                return Some(items);
            }
            match cursor.as_cons() {
                Some((head, tail)) => {
                    items.push(head.clone());
                    cursor = tail;
                }
                None => return None,
            }
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn to_term(self) -> Term {
        match self {
            Number::Int(i) => Term::integer(i),
            Number::Float(f) => Term::float(f),
        }
    }
}

pub fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>().ok().map(Number::Float)
}

/// Operator fixity, mirroring `prolog_syntax::parser`'s reader-side table —
/// duplicated here rather than shared because `prolog-ir` sits below
/// `prolog-syntax` in the dependency graph, and this is the write-side of
/// the same grammar.
#[derive(Copy, Clone)]
enum OpKind {
    Xfx,
    Xfy,
    Yfx,
    Fy,
    Fx,
}

fn infix_op(name: &str) -> Option<(u32, OpKind)> {
    use OpKind::*;
    Some(match name {
        ":-" | "-->" => (1200, Xfx),
        ";" => (1100, Xfy),
        "->" => (1050, Xfy),
        "," => (1000, Xfy),
        "=" | "\\=" | "==" | "\\==" | "@<" | "@>" | "@=<" | "@>=" | "is" | ":=" | "=.." | "=:="
        | "=\\=" | "<" | ">" | "=<" | ">=" => (700, Xfx),
        "+" | "-" => (500, Yfx),
        "*" | "/" | "//" | "mod" | "rem" => (400, Yfx),
        "**" => (200, Xfx),
        "^" => (200, Xfy),
        _ => return None,
    })
}

fn prefix_op(name: &str) -> Option<(u32, OpKind)> {
    use OpKind::*;
    Some(match name {
        ":-" | "?-" => (1200, Fx),
        "\\+" => (900, Fy),
        "-" | "+" => (200, Fy),
        _ => return None,
    })
}

/// The same symbol-character set `prolog_syntax::lexer` lexes unquoted
/// symbolic atoms from (`:-`, `+`, `=<`, ...).
const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

fn atom_needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if matches!(s, "[]" | "{}" | "!" | ";" | ",") || parse_number(s).is_some() {
        return false;
    }
    let mut chars = s.chars();
    let first = chars.next().expect("checked non-empty above");
    if first.is_lowercase() && first.is_alphabetic() && s.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return false;
    }
    if s.chars().all(|c| SYMBOL_CHARS.contains(c)) {
        return false;
    }
    true
}

fn write_atom(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if !atom_needs_quoting(s) {
        return write!(f, "{s}");
    }
    write!(f, "'")?;
    for c in s.chars() {
        match c {
            '\'' => write!(f, "\\'")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    write!(f, "'")
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(f, self, 1200)
    }
}

/// Writes `term` in canonical surface syntax: list brackets for `./2`
/// chains, infix notation (parenthesized only where priority requires it)
/// for declared operators, and quoting for atoms that wouldn't read back as
/// themselves unquoted.
fn write_term(f: &mut fmt::Formatter<'_>, term: &Term, max_priority: u32) -> fmt::Result {
    match term {
        Term::Var(id) => write!(f, "{id}"),
        Term::Atom(name) => write_atom(f, name.as_str()),
        Term::Compound(name, args) if *name == well_known::cons() && args.len() == 2 => {
            write!(f, "[")?;
            write_list_tail(f, term)?;
            write!(f, "]")
        }
        Term::Compound(name, args) if args.len() == 2 => match infix_op(name.as_str()) {
            Some((priority, kind)) => {
                let (left_max, right_max) = match kind {
                    OpKind::Xfx => (priority - 1, priority - 1),
                    OpKind::Xfy => (priority - 1, priority),
                    OpKind::Yfx => (priority, priority - 1),
                    OpKind::Fy | OpKind::Fx => unreachable!("infix_op only returns binary kinds"),
                };
                let parens = priority > max_priority;
                if parens {
                    write!(f, "(")?;
                }
                write_term(f, &args[0], left_max)?;
                if name.as_str() == "," {
                    write!(f, ",")?;
                } else if name.as_str().chars().next().is_some_and(|c| c.is_alphabetic()) {
                    write!(f, " {} ", name.as_str())?;
                } else {
                    write_atom(f, name.as_str())?;
                }
                write_term(f, &args[1], right_max)?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
            None => write_canonical_compound(f, name.as_str(), args),
        },
        Term::Compound(name, args) if args.len() == 1 => match prefix_op(name.as_str()) {
            Some((priority, kind)) => {
                let arg_max = match kind {
                    OpKind::Fy => priority,
                    OpKind::Fx => priority - 1,
                    OpKind::Xfx | OpKind::Xfy | OpKind::Yfx => unreachable!("prefix_op only returns unary kinds"),
                };
                let parens = priority > max_priority;
                if parens {
                    write!(f, "(")?;
                }
                write_atom(f, name.as_str())?;
                if name.as_str().chars().next().is_some_and(|c| c.is_alphabetic()) {
                    write!(f, " ")?;
                }
                write_term(f, &args[0], arg_max)?;
                if parens {
                    write!(f, ")")?;
                }
                Ok(())
            }
            None => write_canonical_compound(f, name.as_str(), args),
        },
        Term::Compound(name, args) => write_canonical_compound(f, name.as_str(), args),
    }
}

fn write_canonical_compound(f: &mut fmt::Formatter<'_>, name: &str, args: &[Term]) -> fmt::Result {
    write_atom(f, name)?;
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_term(f, arg, 999)?;
    }
    write!(f, ")")
}

fn write_list_tail(f: &mut fmt::Formatter<'_>, term: &Term) -> fmt::Result {
    match term.as_cons() {
        Some((head, tail)) => {
            write_term(f, head, 999)?;
            if tail.is_nil() {
                Ok(())
            } else if tail.is_cons() {
                write!(f, ", ")?;
                write_list_tail(f, tail)
            } else {
                write!(f, "|")?;
                write_term(f, tail, 999)
            }
        }
        None => Ok(()),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_round_trips_through_to_vec() {
        let items = vec![Term::integer(1), Term::integer(2), Term::integer(3)];
        let list = Term::list(items.clone(), Term::nil());
        assert_eq!(list.to_vec(), Some(items));
    }

    #[test]
    fn partial_list_has_no_to_vec() {
        let tail = Term::Var(VarId(0));
        let list = Term::cons(Term::atom("a"), tail);
        assert_eq!(list.to_vec(), None);
    }

    #[test]
    fn principal_functor_of_atom_is_arity_zero() {
        let t = Term::atom("foo");
        assert_eq!(t.principal_functor(), Some((Symbol::intern("foo"), 0)));
    }

    #[test]
    fn principal_functor_of_compound() {
        let t = Term::compound("f", vec![Term::atom("a"), Term::atom("b")]);
        assert_eq!(t.principal_functor(), Some((Symbol::intern("f"), 2)));
    }

    #[test]
    fn numeric_atom_parses_as_number() {
        assert_eq!(Term::integer(42).as_number(), Some(Number::Int(42)));
        assert_eq!(Term::float(1.5).as_number(), Some(Number::Float(1.5)));
        assert_eq!(Term::atom("foo").as_number(), None);
    }

    #[test]
    fn debug_format_of_list_uses_bracket_syntax() {
        let list = Term::list(vec![Term::atom("a"), Term::atom("b")], Term::nil());
        assert_eq!(format!("{list:?}"), "[a, b]");
    }

    #[test]
    fn debug_format_of_compound() {
        let t = Term::compound("foo", vec![Term::atom("a")]);
        assert_eq!(format!("{t:?}"), "foo(a)");
    }

    #[test]
    fn arithmetic_expression_prints_infix() {
        let t = Term::compound(
            "is",
            vec![
                Term::Var(VarId(0)),
                Term::compound("+", vec![Term::integer(1), Term::integer(2)]),
            ],
        );
        assert_eq!(format!("{t}"), "_G0 is 1+2");
    }

    #[test]
    fn operator_precedence_adds_parens_only_where_needed() {
        // (1+2)*3, not 1+2*3 — * binds tighter than + so the left operand
        // needs parens to preserve grouping.
        let t = Term::compound(
            "*",
            vec![
                Term::compound("+", vec![Term::integer(1), Term::integer(2)]),
                Term::integer(3),
            ],
        );
        assert_eq!(format!("{t}"), "(1+2)*3");

        // 1+2*3 needs no parens: * already binds tighter than +.
        let t2 = Term::compound(
            "+",
            vec![
                Term::integer(1),
                Term::compound("*", vec![Term::integer(2), Term::integer(3)]),
            ],
        );
        assert_eq!(format!("{t2}"), "1+2*3");
    }

    #[test]
    fn atom_with_spaces_prints_quoted() {
        assert_eq!(format!("{}", Term::atom("hello world")), "'hello world'");
    }

    #[test]
    fn plain_lowercase_atom_prints_unquoted() {
        assert_eq!(format!("{}", Term::atom("parent")), "parent");
    }

    #[test]
    fn symbolic_atom_prints_unquoted() {
        assert_eq!(format!("{}", Term::atom(":-")), ":-");
    }

    #[test]
    fn quoted_atom_escapes_embedded_quote() {
        assert_eq!(format!("{}", Term::atom("it's")), "'it\\'s'");
    }

    #[test]
    fn negative_number_atom_prints_unquoted() {
        assert_eq!(format!("{}", Term::integer(-5)), "-5");
    }

    #[test]
    fn list_with_expression_element_prints_infix() {
        let list = Term::list(
            vec![Term::compound("+", vec![Term::integer(1), Term::integer(2)])],
            Term::nil(),
        );
        assert_eq!(format!("{list}"), "[1+2]");
    }
}
