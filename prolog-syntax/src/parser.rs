//! Operator-precedence parsing over the token stream from [`crate::lexer`].
//!
//! A priority-climbing parser over a table of `(name, priority, type)`
//! triples, the standard way to read Prolog terms. Precedences: 1200 for
//! `:-`, 700 for comparisons, 500 additive, 400 multiplicative.

use crate::lexer::{LexError, Lexer, Token};
use prolog_ir::env::VarCounter;
use prolog_ir::error::PrologError;
use prolog_ir::term::Term;
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq)]
enum OpKind {
    Xfx,
    Xfy,
    Yfx,
    Fy,
    Fx,
}

struct OpDef {
    priority: u32,
    kind: OpKind,
}

/// Enough of ISO Prolog's standard operator set to read ordinary clauses,
/// not the full reconfigurable `op/3` directive machinery.
fn infix_op(name: &str) -> Option<OpDef> {
    use OpKind::*;
    Some(match name {
        ":-" | "-->" => OpDef { priority: 1200, kind: Xfx },
        ";" => OpDef { priority: 1100, kind: Xfy },
        "->" => OpDef { priority: 1050, kind: Xfy },
        "," => OpDef { priority: 1000, kind: Xfy },
        "=" | "\\=" | "==" | "\\==" | "@<" | "@>" | "@=<" | "@>=" | "is" | ":=" | "=.." | "=:="
        | "=\\=" | "<" | ">" | "=<" | ">=" => OpDef { priority: 700, kind: Xfx },
        "+" | "-" => OpDef { priority: 500, kind: Yfx },
        "*" | "/" | "//" | "mod" | "rem" => OpDef { priority: 400, kind: Yfx },
        "**" => OpDef { priority: 200, kind: Xfx },
        "^" => OpDef { priority: 200, kind: Xfy },
        _ => return None,
    })
}

fn prefix_op(name: &str) -> Option<OpDef> {
    use OpKind::*;
    Some(match name {
        ":-" | "?-" => OpDef { priority: 1200, kind: Fx },
        "\\+" => OpDef { priority: 900, kind: Fy },
        "-" | "+" => OpDef { priority: 200, kind: Fy },
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            line: e.line,
            column: e.column,
        }
    }
}

impl From<ParseError> for PrologError {
    fn from(e: ParseError) -> Self {
        PrologError::Syntax {
            message: e.message,
            line: Some(e.line),
            column: Some(e.column),
        }
    }
}

/// Parses one term/clause at a time, minting fresh [`prolog_ir::term::VarId`]s
/// from a shared counter and remembering the surface name each one was
/// spelled with (so a query's answer can be reported back under `X`, not an
/// internal id). A fresh `Parser` should be used per clause: variable
/// scoping in Prolog is clause-local, a single `_` read twice is two
/// distinct anonymous variables, but `X` read twice in one clause is one.
pub struct Parser<'a, 'c> {
    tokens: Vec<(Token, bool)>,
    pos: usize,
    counter: &'c mut VarCounter,
    var_names: HashMap<String, prolog_ir::term::VarId>,
    line: usize,
    column: usize,
    _src: &'a str,
}

impl<'a, 'c> Parser<'a, 'c> {
    pub fn new(src: &'a str, counter: &'c mut VarCounter) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token()? {
            tokens.push(tok);
        }
        Ok(Parser {
            tokens,
            pos: 0,
            counter,
            var_names: HashMap::new(),
            line: 1,
            column: 1,
            _src: src,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_no_space(&self) -> bool {
        self.tokens.get(self.pos).map(|(_, sp)| !*sp).unwrap_or(false)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        match self.bump() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(self.err(format!("expected '{expected}', found '{t}'"))),
            None => Err(self.err(format!("expected '{expected}', found end of input"))),
        }
    }

    fn var(&mut self, name: &str) -> Term {
        if name == "_" {
            let id = self.counter.fresh();
            return Term::Var(id);
        }
        let id = *self
            .var_names
            .entry(name.to_string())
            .or_insert_with(|| self.counter.fresh());
        Term::Var(id)
    }

    /// One full clause/directive/query, terminated by `.`. Returns `None`
    /// at end of input.
    pub fn parse_one(&mut self) -> Result<Option<Term>, ParseError> {
        if self.peek().is_none() {
            return Ok(None);
        }
        let term = self.parse_expr(1200)?;
        self.expect(&Token::End)?;
        Ok(Some(term))
    }

    /// Every top-level term in the source, in order.
    pub fn parse_all(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut out = Vec::new();
        while let Some(t) = self.parse_one()? {
            out.push(t);
        }
        Ok(out)
    }

    /// Returns the `(surface name, VarId)` pairs minted while parsing the
    /// most recent term(s) — used to label a query's answers.
    pub fn named_vars(&self) -> Vec<(String, prolog_ir::term::VarId)> {
        self.var_names.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Parses the next clause/directive, then resets variable scoping: in
    /// ordinary Prolog consult semantics `X` in one clause shares nothing
    /// with `X` in the next, so the surface-name map must not accumulate
    /// across items the way it does within a single clause.
    pub fn parse_item(&mut self) -> Result<Option<(Term, Vec<(String, prolog_ir::term::VarId)>)>, ParseError> {
        match self.parse_one()? {
            Some(term) => {
                let vars = self.named_vars();
                self.var_names.clear();
                Ok(Some((term, vars)))
            }
            None => Ok(None),
        }
    }

    /// Standard operator-precedence parse: a primary/prefix term, then a
    /// loop absorbing infix operators whose priority fits within `max_prec`.
    fn parse_expr(&mut self, max_prec: u32) -> Result<Term, ParseError> {
        let (mut left, mut left_prec) = self.parse_primary(max_prec)?;
        loop {
            let name = match self.peek() {
                Some(Token::Atom(s)) => s.clone(),
                Some(Token::Comma) if max_prec >= 1000 => ",".to_string(),
                _ => break,
            };
            let Some(op) = infix_op(&name) else { break };
            if op.priority > max_prec {
                break;
            }
            let (left_max, right_max) = match op.kind {
                OpKind::Xfx => (op.priority - 1, op.priority - 1),
                OpKind::Xfy => (op.priority - 1, op.priority),
                OpKind::Yfx => (op.priority, op.priority - 1),
                _ => unreachable!("infix_op never returns a prefix kind"),
            };
            if left_prec > left_max {
                break;
            }
            self.bump();
            let right = self.parse_expr(right_max)?;
            left = Term::compound(name, vec![left, right]);
            left_prec = op.priority;
        }
        Ok(left)
    }

    /// A primary term: a literal, variable, list, parenthesized expression,
    /// or a prefix-operator application. Returns the term and the priority
    /// it was parsed at, so the infix loop can respect left-associativity.
    fn parse_primary(&mut self, max_prec: u32) -> Result<(Term, u32), ParseError> {
        match self.bump() {
            Some(Token::Int(n)) => Ok((Term::integer(n), 0)),
            Some(Token::Float(n)) => Ok((Term::float(n), 0)),
            Some(Token::Str(s)) => {
                let chars: Vec<Term> = s.chars().map(|c| Term::atom(c.to_string())).collect();
                Ok((Term::list(chars, Term::nil()), 0))
            }
            Some(Token::Var(name)) => Ok((self.var(&name), 0)),
            Some(Token::Open) => {
                let inner = self.parse_expr(1200)?;
                self.expect(&Token::Close)?;
                Ok((inner, 0))
            }
            Some(Token::OpenList) => Ok((self.parse_list()?, 0)),
            Some(Token::OpenCurly) => {
                if self.peek() == Some(&Token::CloseCurly) {
                    self.bump();
                    Ok((Term::atom("{}"), 0))
                } else {
                    let inner = self.parse_expr(1200)?;
                    self.expect(&Token::CloseCurly)?;
                    Ok((Term::compound("{}", vec![inner]), 0))
                }
            }
            Some(Token::Atom(name)) => self.parse_atom_or_compound(name, max_prec),
            Some(other) => Err(self.err(format!("unexpected token '{other}'"))),
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn parse_atom_or_compound(&mut self, name: String, max_prec: u32) -> Result<(Term, u32), ParseError> {
        if self.peek() == Some(&Token::OpenCompound) && self.peek_no_space() {
            self.bump();
            let args = self.parse_arglist()?;
            self.expect(&Token::Close)?;
            return Ok((Term::compound(name, args), 0));
        }
        // Negative numeric literal: a bare `-` directly touching a number.
        if name == "-" {
            if let Some(Token::Int(n)) = self.peek() {
                let n = *n;
                self.bump();
                return Ok((Term::integer(-n), 0));
            }
            if let Some(Token::Float(n)) = self.peek() {
                let n = *n;
                self.bump();
                return Ok((Term::float(-n), 0));
            }
        }
        if let Some(op) = prefix_op(&name) {
            if op.priority <= max_prec && self.starts_a_term() {
                let arg_max = match op.kind {
                    OpKind::Fy => op.priority,
                    OpKind::Fx => op.priority - 1,
                    _ => unreachable!("prefix_op never returns an infix kind"),
                };
                let arg = self.parse_expr(arg_max)?;
                return Ok((Term::compound(name, vec![arg]), op.priority));
            }
        }
        Ok((Term::atom(name), 0))
    }

    /// Whether the next token could begin a term — used to tell a prefix
    /// operator (`- X`) from the same atom standing alone (`X = -`).
    fn starts_a_term(&self) -> bool {
        !matches!(
            self.peek(),
            None | Some(Token::Close)
                | Some(Token::CloseList)
                | Some(Token::CloseCurly)
                | Some(Token::Comma)
                | Some(Token::Bar)
                | Some(Token::End)
        )
    }

    fn parse_arglist(&mut self) -> Result<Vec<Term>, ParseError> {
        let mut args = vec![self.parse_expr(999)?];
        while self.peek() == Some(&Token::Comma) {
            self.bump();
            args.push(self.parse_expr(999)?);
        }
        Ok(args)
    }

    fn parse_list(&mut self) -> Result<Term, ParseError> {
        if self.peek() == Some(&Token::CloseList) {
            self.bump();
            return Ok(Term::nil());
        }
        let mut items = vec![self.parse_expr(999)?];
        while self.peek() == Some(&Token::Comma) {
            self.bump();
            items.push(self.parse_expr(999)?);
        }
        let tail = if self.peek() == Some(&Token::Bar) {
            self.bump();
            self.parse_expr(999)?
        } else {
            Term::nil()
        };
        self.expect(&Token::CloseList)?;
        Ok(Term::list(items, tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Term {
        let mut counter = VarCounter::new();
        let mut p = Parser::new(src, &mut counter).unwrap();
        p.parse_one().unwrap().unwrap()
    }

    #[test]
    fn parses_a_fact() {
        assert_eq!(
            parse("parent(tom, bob)."),
            Term::compound("parent", vec![Term::atom("tom"), Term::atom("bob")])
        );
    }

    #[test]
    fn respects_arithmetic_precedence() {
        // 1 + 2 * 3 must parse as 1 + (2 * 3), not (1 + 2) * 3.
        let t = parse("X is 1 + 2 * 3.");
        let rhs = &t.args()[1];
        assert_eq!(rhs.name().as_str(), "+");
        assert_eq!(rhs.args()[1].name().as_str(), "*");
    }

    #[test]
    fn left_associativity_of_same_priority_additive_ops() {
        // 1 - 2 - 3 must parse as (1 - 2) - 3.
        let t = parse("X is 1 - 2 - 3.");
        let rhs = &t.args()[1];
        assert_eq!(rhs.name().as_str(), "-");
        assert_eq!(rhs.args()[0].name().as_str(), "-");
    }

    #[test]
    fn clause_with_conjunction_body_and_cut() {
        let t = parse("max(X,Y,X) :- X >= Y, !.");
        assert_eq!(t.name().as_str(), ":-");
        let body = &t.args()[1];
        assert_eq!(body.name().as_str(), ",");
        assert_eq!(body.args()[1], Term::atom("!"));
    }

    #[test]
    fn negative_number_literal_vs_minus_operator() {
        let t = parse("X is -1.");
        assert_eq!(t.args()[1], Term::integer(-1));
    }

    #[test]
    fn repeated_variable_shares_identity_within_one_clause() {
        let t = parse("p(X, X).");
        assert_eq!(t.args()[0], t.args()[1]);
    }

    #[test]
    fn list_with_tail_and_nested_lists() {
        let t = parse("p([1, 2 | T]).");
        let (head, tail) = t.args()[0].as_cons().unwrap();
        assert_eq!(*head, Term::integer(1));
        let (head2, tail2) = tail.as_cons().unwrap();
        assert_eq!(*head2, Term::integer(2));
        assert!(matches!(tail2, Term::Var(_)));
    }

    #[test]
    fn disjunction_and_if_then_else_precedence() {
        let t = parse("q :- (a -> b ; c).");
        let body = &t.args()[1];
        assert_eq!(body.name().as_str(), ";");
        assert_eq!(body.args()[0].name().as_str(), "->");
    }

    #[test]
    fn quoted_atom_with_spaces() {
        assert_eq!(parse("'hello world'."), Term::atom("hello world"));
    }
}
