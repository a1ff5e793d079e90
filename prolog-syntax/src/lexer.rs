//! A hand-rolled tokenizer. This crate is a thin external collaborator —
//! parsing is not part of the resolution core — that exists only so
//! `prolog-repl` and the integration tests have a way to turn source text
//! into the `Term`s the engine actually consumes.
//!
//! Clauses are terminated by `.`, comments start with `%`; the token
//! stream lets the parser above it do real operator-precedence climbing
//! instead of regex-splitting on top-level commas.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// An unquoted or quoted atom, including symbolic atoms like `:-`, `,`, `!`.
    Atom(String),
    Var(String),
    Int(i64),
    Float(f64),
    /// A double-quoted string, kept distinct from a quoted atom.
    Str(String),
    Open,
    /// `(` immediately following an atom with no intervening whitespace —
    /// distinguishes `foo(X)` (a compound) from `foo (X)` (atom then group).
    OpenCompound,
    Close,
    OpenList,
    CloseList,
    OpenCurly,
    CloseCurly,
    Comma,
    Bar,
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Atom(s) => write!(f, "{s}"),
            Token::Var(s) => write!(f, "{s}"),
            Token::Int(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Open | Token::OpenCompound => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::OpenList => write!(f, "["),
            Token::CloseList => write!(f, "]"),
            Token::OpenCurly => write!(f, "{{"),
            Token::CloseCurly => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Bar => write!(f, "|"),
            Token::End => write!(f, "."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

const SYMBOL_CHARS: &str = "+-*/\\^<>=~:.?@#&$";

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    prev_was_atom_no_space: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            chars: src.chars().peekable(),
            line: 1,
            column: 1,
            prev_was_atom_no_space: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn err(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Skips whitespace and comments, reporting whether any was skipped
    /// (used to distinguish `foo(` from `foo (`).
    fn skip_trivia(&mut self) -> bool {
        let mut skipped = false;
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                    skipped = true;
                }
                Some('%') => {
                    skipped = true;
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() == Some(&'*') {
                        skipped = true;
                        self.bump();
                        self.bump();
                        loop {
                            match self.bump() {
                                None => break,
                                Some('*') if self.peek() == Some('/') => {
                                    self.bump();
                                    break;
                                }
                                _ => {}
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        skipped
    }

    pub fn next_token(&mut self) -> Result<Option<(Token, bool)>, LexError> {
        let had_space = self.skip_trivia();
        let c = match self.peek() {
            None => return Ok(None),
            Some(c) => c,
        };

        let leading_space = had_space || !self.prev_was_atom_no_space;
        self.prev_was_atom_no_space = false;

        let tok = match c {
            '(' => {
                self.bump();
                if !had_space {
                    Token::OpenCompound
                } else {
                    Token::Open
                }
            }
            ')' => {
                self.bump();
                Token::Close
            }
            '[' => {
                self.bump();
                Token::OpenList
            }
            ']' => {
                self.bump();
                Token::CloseList
            }
            '{' => {
                self.bump();
                Token::OpenCurly
            }
            '}' => {
                self.bump();
                Token::CloseCurly
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '|' => {
                self.bump();
                Token::Bar
            }
            '!' => {
                self.bump();
                self.prev_was_atom_no_space = true;
                Token::Atom("!".to_string())
            }
            ';' => {
                self.bump();
                self.prev_was_atom_no_space = true;
                Token::Atom(";".to_string())
            }
            '\'' => {
                self.prev_was_atom_no_space = true;
                Token::Atom(self.read_quoted('\'')?)
            }
            '"' => Token::Str(self.read_quoted('"')?),
            '_' => {
                self.prev_was_atom_no_space = true;
                Token::Var(self.read_ident())
            }
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_lowercase() => {
                self.prev_was_atom_no_space = true;
                Token::Atom(self.read_ident())
            }
            c if c.is_uppercase() => {
                self.prev_was_atom_no_space = true;
                Token::Var(self.read_ident())
            }
            c if SYMBOL_CHARS.contains(c) => {
                self.prev_was_atom_no_space = true;
                self.read_symbol_or_end()?
            }
            other => return Err(self.err(format!("unexpected character '{other}'"))),
        };
        Ok(Some((tok, leading_space)))
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, LexError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated quoted literal")),
                Some(c) if c == quote => {
                    if self.peek() == Some(quote) {
                        self.bump();
                        s.push(quote);
                    } else {
                        break;
                    }
                }
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('\\') => s.push('\\'),
                    Some(q) if q == quote => s.push(quote),
                    Some(other) => s.push(other),
                    None => return Err(self.err("unterminated escape")),
                },
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.peek() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.peek().is_some_and(char::is_ascii_digit) {
                is_float = true;
                s.push('.');
                self.bump();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut ahead = self.chars.clone();
            ahead.next();
            let exp_ok = matches!(ahead.peek(), Some(c) if c.is_ascii_digit())
                || matches!(ahead.peek(), Some('+') | Some('-'));
            if exp_ok {
                is_float = true;
                s.push(self.bump().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    s.push(self.bump().unwrap());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        if is_float {
            s.parse::<f64>().map(Token::Float).map_err(|_| self.err("malformed float literal"))
        } else {
            s.parse::<i64>().map(Token::Int).map_err(|_| self.err("malformed integer literal"))
        }
    }

    /// A run of symbol characters is a single symbolic atom (`:-`, `=..`,
    /// `-->`), except a lone `.` immediately followed by whitespace/EOF,
    /// which is the clause terminator.
    fn read_symbol_or_end(&mut self) -> Result<Token, LexError> {
        if self.peek() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if ahead.peek().is_none_or(|c| c.is_whitespace()) {
                self.bump();
                self.prev_was_atom_no_space = false;
                return Ok(Token::End);
            }
        }
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if SYMBOL_CHARS.contains(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(Token::Atom(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        while let Some((t, _)) = lex.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    #[test]
    fn lexes_a_fact() {
        assert_eq!(
            tokens("parent(tom, bob)."),
            vec![
                Token::Atom("parent".into()),
                Token::OpenCompound,
                Token::Atom("tom".into()),
                Token::Comma,
                Token::Atom("bob".into()),
                Token::Close,
                Token::End,
            ]
        );
    }

    #[test]
    fn lexes_variables_and_numbers() {
        assert_eq!(
            tokens("X is 1 + 2.5."),
            vec![
                Token::Var("X".into()),
                Token::Atom("is".into()),
                Token::Int(1),
                Token::Atom("+".into()),
                Token::Float(2.5),
                Token::End,
            ]
        );
    }

    #[test]
    fn lexes_quoted_atom_and_list_with_tail() {
        assert_eq!(
            tokens("'hello world'([H|T])."),
            vec![
                Token::Atom("hello world".into()),
                Token::OpenCompound,
                Token::OpenList,
                Token::Var("H".into()),
                Token::Bar,
                Token::Var("T".into()),
                Token::CloseList,
                Token::Close,
                Token::End,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            tokens("% a comment\nfoo. /* block */ bar."),
            vec![
                Token::Atom("foo".into()),
                Token::End,
                Token::Atom("bar".into()),
                Token::End,
            ]
        );
    }

    #[test]
    fn distinguishes_negative_number_from_minus_operator() {
        assert_eq!(tokens("X is 3 - 1."), tokens("X is 3-1."));
    }
}
