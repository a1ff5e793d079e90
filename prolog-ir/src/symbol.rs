//! Atom/functor name interning.
//!
//! Every `Term::Atom`/`Term::Compound` name is a `Symbol`, a `Copy` key into
//! a process-wide `lasso` interner.

use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::OnceLock;

static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();

fn interner() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// An interned atom or functor name. Cheap to copy, compare, and hash.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Spur);

impl Symbol {
    pub fn intern(text: &str) -> Symbol {
        Symbol(interner().get_or_intern(text))
    }

    pub fn as_str(self) -> &'static str {
        interner().resolve(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(text: &str) -> Symbol {
        Symbol::intern(text)
    }
}

impl From<String> for Symbol {
    fn from(text: String) -> Symbol {
        Symbol::intern(&text)
    }
}

/// Well-known functor names used to build/recognize list and control terms
/// without re-interning the same string at every call site.
pub mod well_known {
    use super::Symbol;
    use std::sync::OnceLock;

    macro_rules! well_known_symbol {
        ($name:ident, $text:expr) => {
            pub fn $name() -> Symbol {
                static CELL: OnceLock<Symbol> = OnceLock::new();
                *CELL.get_or_init(|| Symbol::intern($text))
            }
        };
    }

    well_known_symbol!(nil, "[]");
    well_known_symbol!(cons, ".");
    well_known_symbol!(comma, ",");
    well_known_symbol!(semicolon, ";");
    well_known_symbol!(arrow, "->");
    well_known_symbol!(cut, "!");
    well_known_symbol!(fail, "fail");
    well_known_symbol!(r#true, "true");
    well_known_symbol!(not, "\\+");
    well_known_symbol!(not_alt, "not");
}
