//! The standard order of terms used by `sort/2`, `keysort/2`, and
//! `setof/3`: variables < numbers < atoms < compounds; within compounds,
//! arity then name then arguments, pointwise.
//!
//! This operates on already-`walk_deep`'d terms — ordering an unbound
//! variable only makes sense relative to other unbound variables by
//! identity, which is what callers get after substitution.

use crate::term::{parse_number, Term};
use std::cmp::Ordering;

#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
enum Rank {
    Var,
    Number,
    Atom,
    Compound,
}

fn rank(term: &Term) -> Rank {
    match term {
        Term::Var(_) => Rank::Var,
        Term::Atom(name) => {
            if parse_number(name.as_str()).is_some() {
                Rank::Number
            } else {
                Rank::Atom
            }
        }
        Term::Compound(..) => Rank::Compound,
    }
}

/// Total order over terms, per the standard order described above.
pub fn compare(a: &Term, b: &Term) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Term::Var(x), Term::Var(y)) => x.cmp(y),
        (Term::Atom(x), Term::Atom(y)) => match ra {
            Rank::Number => {
                let (nx, ny) = (
                    parse_number(x.as_str()).unwrap(),
                    parse_number(y.as_str()).unwrap(),
                );
                nx.as_f64()
                    .partial_cmp(&ny.as_f64())
                    .unwrap_or(Ordering::Equal)
            }
            _ => x.as_str().cmp(y.as_str()),
        },
        (Term::Compound(nx, ax), Term::Compound(ny, ay)) => ax
            .len()
            .cmp(&ay.len())
            .then_with(|| nx.as_str().cmp(ny.as_str()))
            .then_with(|| {
                for (x, y) in ax.iter().zip(ay.iter()) {
                    let ord = compare(x, y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }),
        _ => unreachable!("rank() partitions terms by variant"),
    }
}

/// Sorts `terms` by the standard order, removing duplicates, as `sort/2`
/// does (`msort/2`-style stable-no-dedup is a separate helper).
pub fn sort_dedup(mut terms: Vec<Term>) -> Vec<Term> {
    terms.sort_by(compare);
    terms.dedup_by(|a, b| compare(a, b) == Ordering::Equal);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn variables_precede_numbers_precede_atoms_precede_compounds() {
        assert_eq!(compare(&Term::Var(crate::term::VarId(0)), &Term::integer(1)), Ordering::Less);
        assert_eq!(compare(&Term::integer(1), &Term::atom("a")), Ordering::Less);
        assert_eq!(
            compare(&Term::atom("a"), &Term::compound("f", vec![Term::atom("a")])),
            Ordering::Less
        );
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare(&Term::integer(2), &Term::integer(10)), Ordering::Less);
    }

    #[test]
    fn compounds_compare_by_arity_then_name_then_args() {
        let f1 = Term::compound("f", vec![Term::atom("a")]);
        let g2 = Term::compound("g", vec![Term::atom("a"), Term::atom("b")]);
        assert_eq!(compare(&f1, &g2), Ordering::Less);

        let f_a = Term::compound("f", vec![Term::atom("a")]);
        let g_a = Term::compound("g", vec![Term::atom("a")]);
        assert_eq!(compare(&f_a, &g_a), Ordering::Less);
    }

    #[test]
    fn sort_dedup_removes_duplicates_and_orders() {
        let terms = vec![Term::integer(3), Term::integer(1), Term::integer(1), Term::integer(2)];
        assert_eq!(
            sort_dedup(terms),
            vec![Term::integer(1), Term::integer(2), Term::integer(3)]
        );
    }
}
