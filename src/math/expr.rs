//! Constraint expressions for derived parameters.
//!
//! A parameter may be tied to others through a small arithmetic language:
//!
//! ```text
//! 2.3548200*g0_sigma
//! 0.3989423*g0_amplitude/max(1e-15, g0_sigma)
//! (r0_center1 + r0_center2) / 2
//! ```
//!
//! Supported: numeric literals, parameter names, `+ - * /`, `**` or `^`
//! (right-associative, binding tighter than unary minus), parentheses, and the
//! functions `sqrt exp log abs sin cos tan max min`. The name `pi` resolves to
//! π unless a parameter of that name exists.

use std::collections::BTreeSet;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, not, opt, recognize},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("cannot parse expression '{expr}': {message}")]
    Parse { expr: String, message: String },

    #[error("expression refers to unknown name '{0}'")]
    UnknownName(String),

    #[error("circular constraint involving '{0}'")]
    Cycle(String),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    BadArity {
        name: String,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Parse a complete expression (trailing input is an error).
    pub fn parse(src: &str) -> Result<Expr, ExprError> {
        match all_consuming(ws(expr))(src) {
            Ok((_, e)) => Ok(e),
            Err(e) => Err(ExprError::Parse {
                expr: src.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Every variable name referenced by the expression.
    pub fn names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_names(out),
            Expr::Bin(_, lhs, rhs) => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Call(_, args) => {
                for a in args {
                    a.collect_names(out);
                }
            }
        }
    }

    /// Evaluate with `lookup` resolving parameter names.
    pub fn eval<F>(&self, lookup: &F) -> Result<f64, ExprError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Expr::Num(v) => Ok(*v),
            Expr::Var(name) => lookup(name)
                .or_else(|| builtin_constant(name))
                .ok_or_else(|| ExprError::UnknownName(name.clone())),
            Expr::Neg(inner) => Ok(-inner.eval(lookup)?),
            Expr::Bin(op, lhs, rhs) => {
                let a = lhs.eval(lookup)?;
                let b = rhs.eval(lookup)?;
                Ok(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                })
            }
            Expr::Call(name, args) => {
                let vals = args
                    .iter()
                    .map(|a| a.eval(lookup))
                    .collect::<Result<Vec<f64>, _>>()?;
                call_function(name, &vals)
            }
        }
    }
}

/// Whether `name` resolves without a parameter (constants).
pub fn is_builtin_name(name: &str) -> bool {
    builtin_constant(name).is_some()
}

fn builtin_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        _ => None,
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, ExprError> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, ExprError> {
        match args {
            [a] => Ok(f(*a)),
            _ => Err(ExprError::BadArity {
                name: name.to_string(),
                expected: 1,
                got: args.len(),
            }),
        }
    };
    match name {
        "sqrt" => unary(f64::sqrt),
        "exp" => unary(f64::exp),
        "log" => unary(f64::ln),
        "abs" => unary(f64::abs),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExprError::BadArity {
                    name: name.to_string(),
                    expected: 2,
                    got: args.len(),
                });
            }
            let fold: fn(f64, f64) -> f64 = if name == "max" { f64::max } else { f64::min };
            Ok(args[1..].iter().fold(args[0], |acc, &v| fold(acc, v)))
        }
        _ => Err(ExprError::UnknownName(name.to_string())),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(ws(alt((char('+'), char('-')))), term))(input)?;
    let out = rest.into_iter().fold(first, |acc, (op, rhs)| {
        let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
        Expr::Bin(op, Box::new(acc), Box::new(rhs))
    });
    Ok((input, out))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let mul = map(terminated(char('*'), not(char('*'))), |_| BinOp::Mul);
    let div = map(char('/'), |_| BinOp::Div);
    let (input, rest) = many0(pair(ws(alt((mul, div))), factor))(input)?;
    let out = rest
        .into_iter()
        .fold(first, |acc, (op, rhs)| Expr::Bin(op, Box::new(acc), Box::new(rhs)));
    Ok((input, out))
}

fn factor(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), factor), |e| Expr::Neg(Box::new(e))),
        power,
    ))(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exponent) = opt(preceded(ws(alt((tag("**"), tag("^")))), factor))(input)?;
    match exponent {
        Some(e) => Ok((input, Expr::Bin(BinOp::Pow, Box::new(base), Box::new(e)))),
        None => Ok((input, base)),
    }
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        call_or_var,
        map(double, Expr::Num),
        delimited(char('('), ws(expr), char(')')),
    )))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn call_or_var(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr),
        ws(char(')')),
    ))(input)?;
    let out = match args {
        Some(args) => Expr::Call(name.to_string(), args),
        None => Expr::Var(name.to_string()),
    };
    Ok((input, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(src: &str, vars: &[(&str, f64)]) -> Result<f64, ExprError> {
        let e = Expr::parse(src)?;
        e.eval(&|name: &str| vars.iter().find(|(n, _)| *n == name).map(|(_, v)| *v))
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_with("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert_eq!(eval_with("(1 + 2) * 3", &[]).unwrap(), 9.0);
        assert_eq!(eval_with("8 / 4 / 2", &[]).unwrap(), 1.0);
        assert_eq!(eval_with("2 ** 3 ** 2", &[]).unwrap(), 512.0);
        assert_eq!(eval_with("-2 ** 2", &[]).unwrap(), -4.0);
        assert_eq!(eval_with("2 ^ -1", &[]).unwrap(), 0.5);
        assert_eq!(eval_with("10 - 2 - 3", &[]).unwrap(), 5.0);
    }

    #[test]
    fn variables_and_functions() {
        let v = eval_with("2.3548200*g0_sigma", &[("g0_sigma", 2.0)]).unwrap();
        assert!((v - 4.70964).abs() < 1e-9);

        let v = eval_with("0.5*a/max(1e-15, s)", &[("a", 4.0), ("s", 0.0)]).unwrap();
        assert!(v > 1e14);

        let v = eval_with("sqrt(log(2)) * pi", &[]).unwrap();
        assert!((v - (2f64.ln().sqrt() * std::f64::consts::PI)).abs() < 1e-12);
    }

    #[test]
    fn names_are_collected() {
        let e = Expr::parse("(r0_center1 + r0_center2)/2.0").unwrap();
        let names: Vec<String> = e.names().into_iter().collect();
        assert_eq!(names, vec!["r0_center1".to_string(), "r0_center2".to_string()]);
    }

    #[test]
    fn unknown_name_and_parse_errors() {
        assert_eq!(
            eval_with("a + b", &[("a", 1.0)]),
            Err(ExprError::UnknownName("b".to_string()))
        );
        assert!(matches!(Expr::parse("1 +"), Err(ExprError::Parse { .. })));
        assert!(matches!(Expr::parse("(1"), Err(ExprError::Parse { .. })));
        assert!(matches!(
            eval_with("sqrt(1, 2)", &[]),
            Err(ExprError::BadArity { .. })
        ));
    }
}
