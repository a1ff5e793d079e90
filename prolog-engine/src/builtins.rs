//! The built-in predicate catalog.
//!
//! One big name/arity match feeding typed helpers; each helper returns a
//! [`BuiltinOutcome`] instead of mutating a shared substitution in place,
//! so the engine's trail/choicepoint machinery stays the single source of
//! truth for undo. `dispatch` returns `Ok(None)` for any `name/arity` it
//! doesn't recognize, letting the engine fall through to the
//! meta-predicate catalog and then the clause database.

use crate::arithmetic;
use crate::engine::{BuiltinOutcome, Ctx};
use prolog_ir::database::Clause;
use prolog_ir::error::PrologError;
use prolog_ir::order::{self, sort_dedup};
use prolog_ir::symbol::Symbol;
use prolog_ir::term::{Number, Term};
use prolog_solve::unify_rollback;
use std::cmp::Ordering;
use std::io::Write;

type Eq = (Term, Term);

pub fn dispatch(mut ctx: Ctx<'_>, name: Symbol, args: &[Term]) -> Result<Option<BuiltinOutcome>, PrologError> {
    let outcome = match (name.as_str(), args.len()) {
        ("=", 2) => det(unify_rollback(ctx.env, &args[0], &args[1])?),
        ("\\=", 2) => {
            let mark = ctx.env.mark();
            let unifies = unify_rollback(ctx.env, &args[0], &args[1])?;
            ctx.env.undo_to(mark);
            det(!unifies)
        }
        ("==", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? == Ordering::Equal),
        ("\\==", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? != Ordering::Equal),
        ("@<", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? == Ordering::Less),
        ("@>", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? == Ordering::Greater),
        ("@=<", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? != Ordering::Greater),
        ("@>=", 2) => det(structurally_equal(&mut ctx, &args[0], &args[1])? != Ordering::Less),
        ("compare", 3) => {
            let ord = structurally_equal(&mut ctx, &args[1], &args[2])?;
            let sym = match ord {
                Ordering::Less => "<",
                Ordering::Equal => "=",
                Ordering::Greater => ">",
            };
            det(unify_rollback(ctx.env, &args[0], &Term::atom(sym))?)
        }
        ("is", 2) | (":=", 2) => {
            let value = arithmetic::eval(ctx.env, &args[1])?;
            det(unify_rollback(ctx.env, &args[0], &value.to_term())?)
        }
        ("=:=", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord == Ordering::Equal),
            None => BuiltinOutcome::Defer,
        },
        ("=\\=", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord != Ordering::Equal),
            None => BuiltinOutcome::Defer,
        },
        ("<", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord == Ordering::Less),
            None => BuiltinOutcome::Defer,
        },
        (">", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord == Ordering::Greater),
            None => BuiltinOutcome::Defer,
        },
        ("=<", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord != Ordering::Greater),
            None => BuiltinOutcome::Defer,
        },
        (">=", 2) => match arith_cmp_or_defer(&mut ctx, &args[0], &args[1])? {
            Some(ord) => det(ord != Ordering::Less),
            None => BuiltinOutcome::Defer,
        },

        ("var", 1) => det(matches!(ctx.env.lookup(&args[0])?, Term::Var(_))),
        ("nonvar", 1) => det(!matches!(ctx.env.lookup(&args[0])?, Term::Var(_))),
        ("atom", 1) => {
            let t = ctx.env.lookup(&args[0])?;
            det(matches!(&t, Term::Atom(_)) && t.as_number().is_none())
        }
        ("number", 1) => det(ctx.env.lookup(&args[0])?.as_number().is_some()),
        ("integer", 1) => det(matches!(ctx.env.lookup(&args[0])?.as_number(), Some(Number::Int(_)))),
        ("float", 1) => det(matches!(ctx.env.lookup(&args[0])?.as_number(), Some(Number::Float(_)))),
        ("atomic", 1) => det(!matches!(ctx.env.lookup(&args[0])?, Term::Var(_) | Term::Compound(..))),
        ("compound", 1) => det(matches!(ctx.env.lookup(&args[0])?, Term::Compound(..))),
        ("callable", 1) => {
            let t = ctx.env.lookup(&args[0])?;
            det(matches!(&t, Term::Atom(_) | Term::Compound(..)) && t.as_number().is_none())
        }
        ("is_list", 1) => det(ctx.env.walk_deep(&args[0])?.to_vec().is_some()),

        ("functor", 3) => return functor(&mut ctx, args).map(Some),
        ("arg", 3) => return arg(&mut ctx, args).map(Some),
        ("=..", 2) => return univ(&mut ctx, args).map(Some),
        ("copy_term", 2) => return copy_term(&mut ctx, args).map(Some),

        ("length", 2) => return length(&mut ctx, args).map(Some),
        ("append", 3) => return append(&mut ctx, args).map(Some),
        ("reverse", 2) => {
            let items = require_list(&mut ctx, &args[0])?;
            let reversed = Term::list(items.into_iter().rev(), Term::nil());
            det(unify_rollback(ctx.env, &args[1], &reversed)?)
        }
        ("member", 2) => return member(&mut ctx, args).map(Some),
        ("memberchk", 2) => {
            let items = require_list(&mut ctx, &args[1])?;
            let mut found = false;
            for item in items {
                let mark = ctx.env.mark();
                if unify_rollback(ctx.env, &args[0], &item)? {
                    found = true;
                    break;
                }
                ctx.env.undo_to(mark);
            }
            det(found)
        }
        ("nth0", 3) => return nth(&mut ctx, args, 0).map(Some),
        ("nth1", 3) => return nth(&mut ctx, args, 1).map(Some),
        ("last", 2) => {
            let items = require_list(&mut ctx, &args[0])?;
            match items.last() {
                Some(last) => det(unify_rollback(ctx.env, &args[1], last)?),
                None => det(false),
            }
        }
        ("sum_list", 2) | ("sumlist", 2) => {
            let items = require_list(&mut ctx, &args[0])?;
            let mut total = Number::Int(0);
            for item in items {
                total = add(total, arithmetic::eval(ctx.env, &item)?);
            }
            det(unify_rollback(ctx.env, &args[1], &total.to_term())?)
        }
        ("max_list", 2) => return extremum(&mut ctx, args, Ordering::Greater).map(Some),
        ("min_list", 2) => return extremum(&mut ctx, args, Ordering::Less).map(Some),
        ("sort", 2) => {
            let items = require_list(&mut ctx, &args[0])?;
            let sorted = sort_dedup(items);
            det(unify_rollback(ctx.env, &args[1], &Term::list(sorted, Term::nil()))?)
        }
        ("msort", 2) => {
            let mut items = require_list(&mut ctx, &args[0])?;
            items.sort_by(|a, b| order::compare(a, b));
            det(unify_rollback(ctx.env, &args[1], &Term::list(items, Term::nil()))?)
        }
        ("keysort", 2) => {
            let mut items = require_list(&mut ctx, &args[0])?;
            items.sort_by(|a, b| order::compare(&pair_key(a), &pair_key(b)));
            det(unify_rollback(ctx.env, &args[1], &Term::list(items, Term::nil()))?)
        }
        ("list_to_set", 2) => {
            let items = require_list(&mut ctx, &args[0])?;
            let mut seen = Vec::new();
            for item in items {
                if !seen.iter().any(|s| order::compare(s, &item) == Ordering::Equal) {
                    seen.push(item);
                }
            }
            det(unify_rollback(ctx.env, &args[1], &Term::list(seen, Term::nil()))?)
        }
        ("subtract", 3) => {
            let a = require_list(&mut ctx, &args[0])?;
            let b = require_list(&mut ctx, &args[1])?;
            let kept: Vec<Term> = a
                .into_iter()
                .filter(|x| !b.iter().any(|y| order::compare(x, y) == Ordering::Equal))
                .collect();
            det(unify_rollback(ctx.env, &args[2], &Term::list(kept, Term::nil()))?)
        }
        ("flatten", 2) => {
            let mut out = Vec::new();
            flatten_into(&ctx.env.walk_deep(&args[0])?, &mut out);
            det(unify_rollback(ctx.env, &args[1], &Term::list(out, Term::nil()))?)
        }
        ("between", 3) => return between(&mut ctx, args).map(Some),
        ("select", 3) => return select(&mut ctx, args).map(Some),
        ("permutation", 2) => return permutation(&mut ctx, args).map(Some),
        ("ord_subset", 2) => {
            let sub = require_list(&mut ctx, &args[0])?;
            let set = require_list(&mut ctx, &args[1])?;
            det(sub.iter().all(|x| set.iter().any(|y| order::compare(x, y) == Ordering::Equal)))
        }

        ("atom_concat", 3) => return atom_concat(&mut ctx, args).map(Some),
        ("atom_length", 2) => {
            let text = atom_text(&mut ctx, &args[0])?;
            det(unify_rollback(ctx.env, &args[1], &Term::integer(text.chars().count() as i64))?)
        }
        ("atom_chars", 2) => return atom_chars(&mut ctx, args).map(Some),
        ("atom_codes", 2) => return atom_codes(&mut ctx, args).map(Some),
        ("char_code", 2) => return char_code(&mut ctx, args).map(Some),
        ("number_codes", 2) => return atom_codes(&mut ctx, args).map(Some),

        ("assertz", 1) | ("assert", 1) => {
            let clause = term_to_clause(&ctx.env.walk_deep(&args[0])?)?;
            ctx.db.assertz(clause);
            det(true)
        }
        ("asserta", 1) => {
            let clause = term_to_clause(&ctx.env.walk_deep(&args[0])?)?;
            ctx.db.asserta(clause);
            det(true)
        }

        ("recordz", 3) => {
            let key = record_key(&mut ctx, &args[0])?;
            let value = ctx.env.walk_deep(&args[1])?;
            let id = ctx.db.recordz(key, value);
            det(unify_rollback(ctx.env, &args[2], &Term::integer(id as i64))?)
        }
        ("recorda", 3) => {
            let key = record_key(&mut ctx, &args[0])?;
            let value = ctx.env.walk_deep(&args[1])?;
            let id = ctx.db.recorda(key, value);
            det(unify_rollback(ctx.env, &args[2], &Term::integer(id as i64))?)
        }
        ("recorded", 2) => return recorded(&mut ctx, &args[0], &args[1], None).map(Some),
        ("recorded", 3) => return recorded(&mut ctx, &args[0], &args[1], Some(&args[2])).map(Some),
        ("erase", 2) => {
            let key = record_key(&mut ctx, &args[0])?;
            let id = require_int(&mut ctx, &args[1])?;
            det(ctx.db.erase(key, id as u64))
        }

        ("write", 1) | ("print", 1) | ("display", 1) => {
            let t = ctx.env.walk_deep(&args[0])?;
            let _ = write!(ctx.sink, "{t}");
            det(true)
        }
        ("writeln", 1) => {
            let t = ctx.env.walk_deep(&args[0])?;
            let _ = writeln!(ctx.sink, "{t}");
            det(true)
        }
        ("nl", 0) => {
            let _ = writeln!(ctx.sink);
            det(true)
        }
        ("read", 1) => {
            // Whatever variable ids the term source minted are meaningless
            // in this environment; renumber through the same fresh-copy
            // path `copy_term/2` uses so they're guaranteed registered and
            // collision-free before anything touches them.
            let raw = ctx.source.next_term()?.unwrap_or_else(|| Term::atom("end_of_file"));
            let mut mapping = std::collections::HashMap::new();
            let term = copy_fresh(&raw, &mut ctx, &mut mapping);
            det(unify_rollback(ctx.env, &args[0], &term)?)
        }

        _ => return Ok(None),
    };
    Ok(Some(outcome))
}

fn det(b: bool) -> BuiltinOutcome {
    if b {
        BuiltinOutcome::Success
    } else {
        BuiltinOutcome::Failure
    }
}

fn structurally_equal(ctx: &mut Ctx<'_>, a: &Term, b: &Term) -> Result<Ordering, PrologError> {
    let a = ctx.env.walk_deep(a)?;
    let b = ctx.env.walk_deep(b)?;
    Ok(order::compare(&a, &b))
}

fn arith_cmp(ctx: &mut Ctx<'_>, a: &Term, b: &Term) -> Result<Ordering, PrologError> {
    let a = arithmetic::eval(ctx.env, a)?;
    let b = arithmetic::eval(ctx.env, b)?;
    Ok(a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal))
}

/// As [`arith_cmp`], but an [`PrologError::Instantiation`] fault (an
/// unbound variable somewhere in either expression) comes back as `Ok(None)`
/// instead of propagating, so the caller can reappend the goal to the queue
/// tail under the deferred-constraint mechanism rather than aborting
/// the query on the first attempt.
fn arith_cmp_or_defer(ctx: &mut Ctx<'_>, a: &Term, b: &Term) -> Result<Option<Ordering>, PrologError> {
    match arith_cmp(ctx, a, b) {
        Ok(ord) => Ok(Some(ord)),
        Err(PrologError::Instantiation { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn add(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Number::Int(x + y),
        _ => Number::Float(a.as_f64() + b.as_f64()),
    }
}

fn require_list(ctx: &mut Ctx<'_>, term: &Term) -> Result<Vec<Term>, PrologError> {
    let resolved = ctx.env.walk_deep(term)?;
    resolved
        .to_vec()
        .ok_or_else(|| PrologError::type_error("list", format!("{resolved:?}")))
}

fn atom_text(ctx: &mut Ctx<'_>, term: &Term) -> Result<String, PrologError> {
    match ctx.env.lookup(term)? {
        Term::Atom(s) => Ok(s.to_string()),
        other => Err(PrologError::type_error("atom", format!("{other:?}"))),
    }
}

fn pair_key(term: &Term) -> Term {
    match term {
        Term::Compound(name, args) if name.as_str() == "-" && args.len() == 2 => args[0].clone(),
        other => other.clone(),
    }
}

fn flatten_into(term: &Term, out: &mut Vec<Term>) {
    if term.is_nil() {
        return;
    }
    match term.as_cons() {
        Some((head, tail)) => {
            if head.is_nil() || head.is_cons() {
                flatten_into(head, out);
            } else {
                out.push(head.clone());
            }
            flatten_into(tail, out);
        }
        None => out.push(term.clone()),
    }
}

fn functor(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let t = ctx.env.lookup(&args[0])?;
    if let Term::Var(_) = t {
        let name = ctx.env.lookup(&args[1])?;
        let arity = match ctx.env.lookup(&args[2])? {
            Term::Atom(s) => s
                .as_str()
                .parse::<usize>()
                .map_err(|_| PrologError::type_error("integer", "non-integer arity"))?,
            other => return Err(PrologError::type_error("integer", format!("{other:?}"))),
        };
        let built = if arity == 0 {
            name
        } else {
            let fresh: Vec<Term> = (0..arity)
                .map(|_| {
                    let v = ctx.counter.fresh();
                    ctx.env.register(v);
                    Term::Var(v)
                })
                .collect();
            Term::compound(name.name(), fresh)
        };
        Ok(det(unify_rollback(ctx.env, &args[0], &built)?))
    } else {
        let (name, arity) = t.principal_functor().expect("non-var term has a principal functor");
        let name_term = Term::Atom(name);
        let arity_term = Term::integer(arity as i64);
        Ok(det(
            unify_rollback(ctx.env, &args[1], &name_term)? && unify_rollback(ctx.env, &args[2], &arity_term)?,
        ))
    }
}

fn arg(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let n = match ctx.env.lookup(&args[0])? {
        Term::Atom(s) => s
            .as_str()
            .parse::<usize>()
            .map_err(|_| PrologError::type_error("integer", "non-integer index"))?,
        other => return Err(PrologError::type_error("integer", format!("{other:?}"))),
    };
    let compound = ctx.env.lookup(&args[1])?;
    if n == 0 || n > compound.arity() {
        return Ok(BuiltinOutcome::Failure);
    }
    Ok(det(unify_rollback(ctx.env, &args[2], &compound.args()[n - 1])?))
}

/// `Term =.. List`: `List` is `[Name|Args]` when `Term` is bound, the way
/// `functor/3` and `arg/3` decompose a compound, but as one flat list
/// rather than two separate outputs. When `Term` is unbound, builds it from
/// `List` instead — the standard companion to `functor/3`.
fn univ(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let t = ctx.env.lookup(&args[0])?;
    if let Term::Var(_) = t {
        let items = require_list(ctx, &args[1])?;
        let (name, rest) = items
            .split_first()
            .ok_or_else(|| PrologError::instantiation("=.. with an empty list"))?;
        let built = if rest.is_empty() {
            name.clone()
        } else {
            Term::compound(name.name(), rest.to_vec())
        };
        Ok(det(unify_rollback(ctx.env, &args[0], &built)?))
    } else {
        let mut items = vec![Term::Atom(t.name())];
        items.extend(t.args().iter().cloned());
        Ok(det(unify_rollback(ctx.env, &args[1], &Term::list(items, Term::nil()))?))
    }
}

fn copy_term(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let source = ctx.env.walk_deep(&args[0])?;
    let mut mapping = std::collections::HashMap::new();
    let copy = copy_fresh(&source, ctx, &mut mapping);
    Ok(det(unify_rollback(ctx.env, &args[1], &copy)?))
}

fn copy_fresh(term: &Term, ctx: &mut Ctx<'_>, mapping: &mut std::collections::HashMap<prolog_ir::term::VarId, Term>) -> Term {
    match term {
        Term::Var(id) => mapping
            .entry(*id)
            .or_insert_with(|| {
                let fresh = ctx.counter.fresh();
                ctx.env.register(fresh);
                Term::Var(fresh)
            })
            .clone(),
        Term::Atom(_) => term.clone(),
        Term::Compound(name, items) => {
            let new_args = items.iter().map(|a| copy_fresh(a, ctx, mapping)).collect();
            Term::compound(*name, new_args)
        }
    }
}

fn length(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let list = ctx.env.walk_deep(&args[0])?;
    if let Some(items) = list.to_vec() {
        return Ok(det(unify_rollback(ctx.env, &args[1], &Term::integer(items.len() as i64))?));
    }
    // List unbound, length known: build a fresh list of that many variables.
    match ctx.env.lookup(&args[1])? {
        Term::Atom(s) => {
            let n: usize = s
                .as_str()
                .parse()
                .map_err(|_| PrologError::type_error("integer", "non-integer length"))?;
            let fresh: Vec<Term> = (0..n)
                .map(|_| {
                    let v = ctx.counter.fresh();
                    ctx.env.register(v);
                    Term::Var(v)
                })
                .collect();
            Ok(det(unify_rollback(ctx.env, &args[0], &Term::list(fresh, Term::nil()))?))
        }
        Term::Var(_) => Err(PrologError::instantiation("length/2 with both arguments unbound")),
        other => Err(PrologError::type_error("integer", format!("{other:?}"))),
    }
}

fn append(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let a = ctx.env.walk_deep(&args[0])?;
    if let Some(a_items) = a.to_vec() {
        let joined = Term::list(a_items, args[1].clone());
        return Ok(det(unify_rollback(ctx.env, &args[2], &joined)?));
    }
    // First argument unbound: enumerate every prefix/suffix split of List3.
    let c = ctx.env.walk_deep(&args[2])?;
    let c_items = c
        .to_vec()
        .ok_or_else(|| PrologError::instantiation("append/3 with an unbound first and third argument"))?;
    let mut alternatives: Vec<Vec<Eq>> = Vec::new();
    for split in 0..=c_items.len() {
        let prefix = Term::list(c_items[..split].to_vec(), Term::nil());
        let suffix = Term::list(c_items[split..].to_vec(), Term::nil());
        alternatives.push(vec![(args[0].clone(), prefix), (args[1].clone(), suffix)]);
    }
    Ok(BuiltinOutcome::Choice(alternatives))
}

fn member(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let items = require_list(ctx, &args[1])?;
    if items.is_empty() {
        return Ok(BuiltinOutcome::Failure);
    }
    let alternatives: Vec<Vec<Eq>> = items.into_iter().map(|item| vec![(args[0].clone(), item)]).collect();
    Ok(BuiltinOutcome::Choice(alternatives))
}

fn nth(ctx: &mut Ctx<'_>, args: &[Term], base: i64) -> Result<BuiltinOutcome, PrologError> {
    let items = require_list(ctx, &args[1])?;
    match ctx.env.lookup(&args[0])? {
        Term::Var(_) => {
            if items.is_empty() {
                return Ok(BuiltinOutcome::Failure);
            }
            let alternatives: Vec<Vec<Eq>> = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| vec![(args[0].clone(), Term::integer(i as i64 + base)), (args[2].clone(), item)])
                .collect();
            Ok(BuiltinOutcome::Choice(alternatives))
        }
        Term::Atom(s) => {
            let idx: i64 = s
                .as_str()
                .parse()
                .map_err(|_| PrologError::type_error("integer", "non-integer index"))?;
            let pos = idx - base;
            if pos < 0 || pos as usize >= items.len() {
                return Ok(BuiltinOutcome::Failure);
            }
            Ok(det(unify_rollback(ctx.env, &args[2], &items[pos as usize])?))
        }
        other => Err(PrologError::type_error("integer", format!("{other:?}"))),
    }
}

fn extremum(ctx: &mut Ctx<'_>, args: &[Term], want: Ordering) -> Result<BuiltinOutcome, PrologError> {
    let items = require_list(ctx, &args[0])?;
    let mut best: Option<Number> = None;
    for item in &items {
        let n = arithmetic::eval(ctx.env, item)?;
        best = Some(match best {
            None => n,
            Some(b) => {
                if n.as_f64().partial_cmp(&b.as_f64()) == Some(want) {
                    n
                } else {
                    b
                }
            }
        });
    }
    match best {
        Some(n) => Ok(det(unify_rollback(ctx.env, &args[1], &n.to_term())?)),
        None => Ok(BuiltinOutcome::Failure),
    }
}

fn between(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let low = require_int(ctx, &args[0])?;
    let high = require_int(ctx, &args[1])?;
    match ctx.env.lookup(&args[2])? {
        Term::Var(_) => {
            if low > high {
                return Ok(BuiltinOutcome::Failure);
            }
            let alternatives: Vec<Vec<Eq>> = (low..=high).map(|n| vec![(args[2].clone(), Term::integer(n))]).collect();
            Ok(BuiltinOutcome::Choice(alternatives))
        }
        _ => {
            let x = require_int(ctx, &args[2])?;
            Ok(det(x >= low && x <= high))
        }
    }
}

fn require_int(ctx: &mut Ctx<'_>, term: &Term) -> Result<i64, PrologError> {
    match arithmetic::eval(ctx.env, term)? {
        Number::Int(i) => Ok(i),
        Number::Float(f) => Err(PrologError::type_error("integer", f.to_string())),
    }
}

fn select(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let items = require_list(ctx, &args[1])?;
    if items.is_empty() {
        return Ok(BuiltinOutcome::Failure);
    }
    let alternatives: Vec<Vec<Eq>> = (0..items.len())
        .map(|i| {
            let mut rest = items.clone();
            let picked = rest.remove(i);
            vec![(args[0].clone(), picked), (args[2].clone(), Term::list(rest, Term::nil()))]
        })
        .collect();
    Ok(BuiltinOutcome::Choice(alternatives))
}

fn permutation(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let items = require_list(ctx, &args[0])?;
    let mut perms = Vec::new();
    permute(&items, &mut Vec::new(), &mut perms);
    if perms.is_empty() {
        return Ok(BuiltinOutcome::Failure);
    }
    let alternatives: Vec<Vec<Eq>> = perms
        .into_iter()
        .map(|p| vec![(args[1].clone(), Term::list(p, Term::nil()))])
        .collect();
    Ok(BuiltinOutcome::Choice(alternatives))
}

fn permute(remaining: &[Term], acc: &mut Vec<Term>, out: &mut Vec<Vec<Term>>) {
    if remaining.is_empty() {
        out.push(acc.clone());
        return;
    }
    for i in 0..remaining.len() {
        let mut rest = remaining.to_vec();
        let picked = rest.remove(i);
        acc.push(picked);
        permute(&rest, acc, out);
        acc.pop();
    }
}

fn atom_concat(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    let a = ctx.env.lookup(&args[0])?;
    let b = ctx.env.lookup(&args[1])?;
    if !matches!(a, Term::Var(_)) && !matches!(b, Term::Var(_)) {
        let joined = format!("{a}{b}");
        return Ok(det(unify_rollback(ctx.env, &args[2], &Term::atom(joined))?));
    }
    // Either side unbound: enumerate every split of the bound third argument.
    let whole = atom_text(ctx, &args[2])?;
    let chars: Vec<char> = whole.chars().collect();
    let alternatives: Vec<Vec<Eq>> = (0..=chars.len())
        .map(|split| {
            let left: String = chars[..split].iter().collect();
            let right: String = chars[split..].iter().collect();
            vec![(args[0].clone(), Term::atom(left)), (args[1].clone(), Term::atom(right))]
        })
        .collect();
    Ok(BuiltinOutcome::Choice(alternatives))
}

fn atom_chars(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    match ctx.env.lookup(&args[0])? {
        Term::Var(_) => {
            let items = require_list(ctx, &args[1])?;
            let mut text = String::new();
            for item in items {
                text.push_str(&atom_text_of(&item)?);
            }
            Ok(det(unify_rollback(ctx.env, &args[0], &Term::atom(text))?))
        }
        other => {
            let text = atom_text_of(&other)?;
            let chars: Vec<Term> = text.chars().map(|c| Term::atom(c.to_string())).collect();
            Ok(det(unify_rollback(ctx.env, &args[1], &Term::list(chars, Term::nil()))?))
        }
    }
}

fn atom_codes(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    match ctx.env.lookup(&args[0])? {
        Term::Var(_) => {
            let items = require_list(ctx, &args[1])?;
            let mut text = String::new();
            for item in items {
                let code = match item {
                    Term::Atom(s) => s
                        .as_str()
                        .parse::<u32>()
                        .map_err(|_| PrologError::type_error("character code", s.to_string()))?,
                    other => return Err(PrologError::type_error("character code", format!("{other:?}"))),
                };
                text.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            Ok(det(unify_rollback(ctx.env, &args[0], &Term::atom(text))?))
        }
        other => {
            let text = atom_text_of(&other)?;
            let codes: Vec<Term> = text.chars().map(|c| Term::integer(c as i64)).collect();
            Ok(det(unify_rollback(ctx.env, &args[1], &Term::list(codes, Term::nil()))?))
        }
    }
}

fn char_code(ctx: &mut Ctx<'_>, args: &[Term]) -> Result<BuiltinOutcome, PrologError> {
    match ctx.env.lookup(&args[0])? {
        Term::Var(_) => {
            let code = require_int(ctx, &args[1])?;
            let ch = char::from_u32(code as u32).ok_or_else(|| PrologError::type_error("character code", code.to_string()))?;
            Ok(det(unify_rollback(ctx.env, &args[0], &Term::atom(ch.to_string()))?))
        }
        Term::Atom(s) => {
            let ch = s
                .as_str()
                .chars()
                .next()
                .ok_or_else(|| PrologError::type_error("character", String::new()))?;
            Ok(det(unify_rollback(ctx.env, &args[1], &Term::integer(ch as i64))?))
        }
        other => Err(PrologError::type_error("character", format!("{other:?}"))),
    }
}

fn atom_text_of(term: &Term) -> Result<String, PrologError> {
    match term {
        Term::Atom(s) => Ok(s.to_string()),
        other => Err(PrologError::type_error("atom", format!("{other:?}"))),
    }
}

fn record_key(ctx: &mut Ctx<'_>, term: &Term) -> Result<Symbol, PrologError> {
    match ctx.env.lookup(term)? {
        Term::Atom(s) => Ok(s),
        other => Err(PrologError::type_error("atom", format!("{other:?}"))),
    }
}

/// `recorded(Key, Value)` / `recorded(Key, Value, Ref)`: enumerates every
/// entry stored under `Key` in source order, unifying `Value` (and `Ref`,
/// the record id, when given) with each in turn.
fn recorded(ctx: &mut Ctx<'_>, key_term: &Term, value: &Term, ref_term: Option<&Term>) -> Result<BuiltinOutcome, PrologError> {
    let key = record_key(ctx, key_term)?;
    let entries = ctx.db.recorded(key).to_vec();
    if entries.is_empty() {
        return Ok(BuiltinOutcome::Failure);
    }
    let alternatives: Vec<Vec<Eq>> = entries
        .into_iter()
        .map(|r| {
            let mut eqs = vec![(value.clone(), r.value)];
            if let Some(ref_term) = ref_term {
                eqs.push((ref_term.clone(), Term::integer(r.id as i64)));
            }
            eqs
        })
        .collect();
    Ok(BuiltinOutcome::Choice(alternatives))
}

/// Builds a [`Clause`] from a walked `(Head :- Body)` or bare-fact term, the
/// shape `assertz/1`/`asserta/1` accept.
fn term_to_clause(term: &Term) -> Result<Clause, PrologError> {
    match term {
        Term::Compound(name, args) if name.as_str() == ":-" && args.len() == 2 => {
            let body = flatten_conjunction(&args[1]);
            Ok(Clause::rule(args[0].clone(), body))
        }
        _ => Ok(Clause::fact(term.clone())),
    }
}

fn flatten_conjunction(term: &Term) -> Vec<Term> {
    match term {
        Term::Compound(name, args) if name.as_str() == "," && args.len() == 2 => {
            let mut out = flatten_conjunction(&args[0]);
            out.extend(flatten_conjunction(&args[1]));
            out
        }
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::NoTermSource;
    use prolog_ir::env::{Environment, VarCounter};

    fn fresh_ctx() -> (Environment, VarCounter, prolog_ir::database::Database, EngineConfig, Vec<u8>, NoTermSource) {
        (
            Environment::new(),
            VarCounter::new(),
            prolog_ir::database::Database::new(),
            EngineConfig::default(),
            Vec::new(),
            NoTermSource,
        )
    }

    #[test]
    fn is_binds_the_evaluated_result() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let x = counter.fresh();
        env.register(x);
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        let outcome = dispatch(ctx, Symbol::intern("is"), &[Term::Var(x), Term::compound("+", vec![Term::integer(2), Term::integer(2)])])
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, BuiltinOutcome::Success));
        assert_eq!(env.walk_deep(&Term::Var(x)).unwrap(), Term::integer(4));
    }

    #[test]
    fn assign_operator_is_an_alias_for_is() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let x = counter.fresh();
        env.register(x);
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        let outcome = dispatch(ctx, Symbol::intern(":="), &[Term::Var(x), Term::integer(7)])
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, BuiltinOutcome::Success));
        assert_eq!(env.walk_deep(&Term::Var(x)).unwrap(), Term::integer(7));
    }

    #[test]
    fn append_enumerates_splits_when_first_arg_unbound() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let a = counter.fresh();
        let b = counter.fresh();
        env.register(a);
        env.register(b);
        let list3 = Term::list(vec![Term::integer(1), Term::integer(2)], Term::nil());
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        let outcome = dispatch(ctx, Symbol::intern("append"), &[Term::Var(a), Term::Var(b), list3]).unwrap().unwrap();
        match outcome {
            BuiltinOutcome::Choice(alts) => assert_eq!(alts.len(), 3),
            _ => panic!("expected a choice outcome"),
        }
    }

    #[test]
    fn between_enumerates_when_target_unbound() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let x = counter.fresh();
        env.register(x);
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        let outcome = dispatch(ctx, Symbol::intern("between"), &[Term::integer(1), Term::integer(3), Term::Var(x)])
            .unwrap()
            .unwrap();
        match outcome {
            BuiltinOutcome::Choice(alts) => assert_eq!(alts.len(), 3),
            _ => panic!("expected a choice outcome"),
        }
    }

    #[test]
    fn ord_subset_checks_membership_of_every_element() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        let sub = Term::list(vec![Term::integer(1), Term::integer(3)], Term::nil());
        let set = Term::list(vec![Term::integer(1), Term::integer(2), Term::integer(3)], Term::nil());
        let outcome = dispatch(ctx, Symbol::intern("ord_subset"), &[sub, set]).unwrap().unwrap();
        assert!(matches!(outcome, BuiltinOutcome::Success));
    }

    #[test]
    fn unknown_predicate_returns_none() {
        let (mut env, mut counter, mut db, config, mut sink, mut source) = fresh_ctx();
        let ctx = Ctx { db: &mut db, env: &mut env, counter: &mut counter, config: &config, sink: &mut sink, source: &mut source };
        assert!(dispatch(ctx, Symbol::intern("frobnicate"), &[]).unwrap().is_none());
    }
}
