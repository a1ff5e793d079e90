//! The arithmetic evaluator.
//!
//! A recursive descent over a `walk_deep`'d term: same operator set, same
//! floor/sign semantics for `//` and `mod`, dispatched over the shared
//! `Number` type so `is/2` can tell an exact integer result from a float
//! one rather than always widening to float.

use prolog_ir::env::Environment;
use prolog_ir::error::{EvaluationFault, PrologError};
use prolog_ir::term::{Number, Term};

pub fn eval(env: &Environment, term: &Term) -> Result<Number, PrologError> {
    let resolved = env.lookup(term)?;
    match &resolved {
        Term::Var(_) => Err(PrologError::instantiation("arithmetic expression")),
        Term::Atom(name) => prolog_ir::term::parse_number(name.as_str())
            .ok_or_else(|| EvaluationFault::NotNumber(name.to_string()).into()),
        Term::Compound(name, args) if args.len() == 2 => {
            let lhs = eval(env, &args[0])?;
            let rhs = eval(env, &args[1])?;
            binary(name.as_str(), lhs, rhs)
        }
        Term::Compound(name, args) if args.len() == 1 => {
            let val = eval(env, &args[0])?;
            unary(name.as_str(), val)
        }
        Term::Compound(name, _) => {
            Err(EvaluationFault::Malformed(name.to_string()).into())
        }
    }
}

fn binary(op: &str, lhs: Number, rhs: Number) -> Result<Number, PrologError> {
    use Number::{Float, Int};
    Ok(match op {
        "+" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_add(b)),
            _ => Float(lhs.as_f64() + rhs.as_f64()),
        },
        "-" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_sub(b)),
            _ => Float(lhs.as_f64() - rhs.as_f64()),
        },
        "*" => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_mul(b)),
            _ => Float(lhs.as_f64() * rhs.as_f64()),
        },
        "/" => {
            if rhs.as_f64() == 0.0 {
                return Err(EvaluationFault::DivisionByZero.into());
            }
            match (lhs, rhs) {
                (Int(a), Int(b)) if a % b == 0 => Int(a / b),
                _ => Float(lhs.as_f64() / rhs.as_f64()),
            }
        }
        "//" => {
            let (a, b) = (require_int(lhs)?, require_int(rhs)?);
            if b == 0 {
                return Err(EvaluationFault::DivisionByZero.into());
            }
            Int(floor_div(a, b))
        }
        "mod" => {
            let (a, b) = (require_int(lhs)?, require_int(rhs)?);
            if b == 0 {
                return Err(EvaluationFault::DivisionByZero.into());
            }
            Int(floor_mod(a, b))
        }
        "rem" => {
            let (a, b) = (require_int(lhs)?, require_int(rhs)?);
            if b == 0 {
                return Err(EvaluationFault::DivisionByZero.into());
            }
            Int(a % b)
        }
        "min" => if lhs.as_f64() <= rhs.as_f64() { lhs } else { rhs },
        "max" => if lhs.as_f64() >= rhs.as_f64() { lhs } else { rhs },
        "**" | "^" => Float(lhs.as_f64().powf(rhs.as_f64())),
        other => return Err(EvaluationFault::UnknownOperator(other.to_string()).into()),
    })
}

fn unary(op: &str, val: Number) -> Result<Number, PrologError> {
    Ok(match op {
        "-" => match val {
            Number::Int(i) => Number::Int(-i),
            Number::Float(f) => Number::Float(-f),
        },
        "+" => val,
        "abs" => match val {
            Number::Int(i) => Number::Int(i.abs()),
            Number::Float(f) => Number::Float(f.abs()),
        },
        other => return Err(EvaluationFault::UnknownOperator(other.to_string()).into()),
    })
}

fn require_int(n: Number) -> Result<i64, PrologError> {
    match n {
        Number::Int(i) => Ok(i),
        Number::Float(f) => Err(EvaluationFault::NotNumber(f.to_string()).into()),
    }
}

/// Integer division that floors toward negative infinity
/// ("Integer division (`//`) floors").
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// `mod` matches the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ev(term: Term) -> Number {
        eval(&Environment::new(), &term).unwrap()
    }

    #[test]
    fn integer_arithmetic_preserves_integrality() {
        let expr = Term::compound("+", vec![Term::integer(2), Term::integer(3)]);
        assert_eq!(ev(expr), Number::Int(5));
    }

    #[test]
    fn division_with_remainder_produces_float() {
        let expr = Term::compound("/", vec![Term::integer(7), Term::integer(2)]);
        assert_eq!(ev(expr), Number::Float(3.5));
    }

    #[test]
    fn exact_division_stays_integer() {
        let expr = Term::compound("/", vec![Term::integer(6), Term::integer(2)]);
        assert_eq!(ev(expr), Number::Int(3));
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        let expr = Term::compound("//", vec![Term::integer(-7), Term::integer(2)]);
        assert_eq!(ev(expr), Number::Int(-4));
    }

    #[test]
    fn mod_matches_sign_of_divisor() {
        let expr = Term::compound("mod", vec![Term::integer(-7), Term::integer(2)]);
        assert_eq!(ev(expr), Number::Int(1));
        let expr2 = Term::compound("mod", vec![Term::integer(7), Term::integer(-2)]);
        assert_eq!(ev(expr2), Number::Int(-1));
    }

    #[test]
    fn division_by_zero_is_an_evaluation_fault() {
        let expr = Term::compound("/", vec![Term::integer(1), Term::integer(0)]);
        let err = eval(&Environment::new(), &expr).unwrap_err();
        assert!(matches!(
            err,
            PrologError::Evaluation(EvaluationFault::DivisionByZero)
        ));
    }

    #[test]
    fn unbound_variable_is_instantiation_fault() {
        let mut env = Environment::new();
        let mut counter = prolog_ir::env::VarCounter::new();
        let v = counter.fresh();
        env.register(v);
        let err = eval(&env, &Term::Var(v)).unwrap_err();
        assert!(matches!(err, PrologError::Instantiation { .. }));
    }

    #[test]
    fn unknown_operator_is_an_evaluation_fault() {
        let expr = Term::compound("frobnicate", vec![Term::integer(1), Term::integer(2)]);
        let err = eval(&Environment::new(), &expr).unwrap_err();
        assert!(matches!(
            err,
            PrologError::Evaluation(EvaluationFault::UnknownOperator(_))
        ));
    }

    #[test]
    fn unary_minus() {
        let expr = Term::compound("-", vec![Term::integer(5)]);
        assert_eq!(ev(expr), Number::Int(-5));
    }
}
