use crate::definitions::*;
use crate::RenderError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SIMPLE_ATOM: Regex = Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_.]*|[0-9]+(?:\.[0-9]+)?)$").unwrap();
}

/// Operator spelling of a target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub not: &'static str,
    pub and: &'static str,
    pub or: &'static str,
    /// `None` lowers `a ^ b` to `!(a <-> b)`.
    pub xor: Option<&'static str>,
    pub implies: &'static str,
    pub iff: &'static str,
    pub next: &'static str,
    pub finally: &'static str,
    pub globally: &'static str,
    pub until: &'static str,
    pub release: &'static str,
    /// `None` lowers `a W b` to `(a U b) | G(a)`.
    pub weak_until: Option<&'static str>,
    pub true_lit: &'static str,
    pub false_lit: &'static str,
    /// Whether `F=n`, `F<=n` and `G<=n` may be printed as such.
    pub bounded: bool,
}

/// Canonical notation, also used for structures and re-parsable text.
pub const LTL: Dialect = Dialect {
    not: NEG_SYM,
    and: AND_SYM,
    or: OR_SYM,
    xor: Some(XOR_SYM),
    implies: IMPL_SYM,
    iff: IFF_SYM,
    next: NEXT,
    finally: EVENTUALLY,
    globally: GLOBAL,
    until: UNTIL,
    release: RELEASE,
    weak_until: Some(WEAK_UNTIL),
    true_lit: TRUE_SYM,
    false_lit: FALSE_SYM,
    bounded: true,
};

pub const SMV: Dialect = Dialect {
    not: "!",
    and: "&",
    or: "|",
    xor: Some("xor"),
    implies: "->",
    iff: "<->",
    next: "X",
    finally: "F",
    globally: "G",
    until: "U",
    release: "V",
    weak_until: None,
    true_lit: "TRUE",
    false_lit: "FALSE",
    bounded: false,
};

pub const DIVINE: Dialect = Dialect {
    not: "!",
    and: "&&",
    or: "||",
    xor: None,
    implies: "->",
    iff: "<->",
    next: "X",
    finally: "F",
    globally: "G",
    until: "U",
    release: "R",
    weak_until: None,
    true_lit: "true",
    false_lit: "false",
    bounded: false,
};

/// A bare identifier or number needs no parentheses as an operand.
pub fn is_simple_atom(text: &str) -> bool {
    SIMPLE_ATOM.is_match(text)
}

// ***************** Terms *****************

/// How the leaves of a term are spelled in a target.
pub trait TermStyle {
    fn variable(&self, name: &str) -> String {
        name.to_string()
    }

    fn number(&self, literal: &str) -> String {
        literal.to_string()
    }

    fn boolean(&self, value: bool) -> String {
        value.to_string()
    }

    fn rel_op(&self, op: RelOp) -> &'static str {
        op.symbol()
    }
}

/// Terms as they were written.
pub struct SourceStyle;

impl TermStyle for SourceStyle {}

pub fn term_to_string(term: &Term, style: &dyn TermStyle) -> String {
    match term {
        Term::Var(name) => style.variable(name),
        Term::Number(n) => style.number(n),
        Term::Bool(b) => style.boolean(*b),
        Term::Neg(inner) => match inner.as_ref() {
            Term::Arith(..) => format!("-({})", term_to_string(inner, style)),
            _ => format!("-{}", term_to_string(inner, style)),
        },
        Term::Arith(op, lhs, rhs) => {
            let l = match lhs.as_ref() {
                Term::Arith(inner, ..) if inner.precedence() < op.precedence() => {
                    format!("({})", term_to_string(lhs, style))
                }
                _ => term_to_string(lhs, style),
            };
            let r = match rhs.as_ref() {
                Term::Arith(inner, ..) if inner.precedence() <= op.precedence() => {
                    format!("({})", term_to_string(rhs, style))
                }
                _ => term_to_string(rhs, style),
            };
            format!("{} {} {}", l, op.symbol(), r)
        }
        Term::Call(name, args) => {
            let args: Vec<String> = args.iter().map(|a| term_to_string(a, style)).collect();
            format!("{}({})", name, args.join(", "))
        }
    }
}

pub fn predicate_to_string(pred: &Predicate, style: &dyn TermStyle) -> String {
    match pred {
        Predicate::Holds(t) => term_to_string(t, style),
        Predicate::Compare(l, op, r) => format!(
            "{} {} {}",
            term_to_string(l, style),
            style.rel_op(*op),
            term_to_string(r, style)
        ),
    }
}

/// Variables of a term in order of appearance. Function names are not included.
pub fn term_variables<'a>(term: &'a Term, out: &mut Vec<&'a str>) {
    match term {
        Term::Var(name) => out.push(name),
        Term::Number(_) | Term::Bool(_) => {}
        Term::Neg(inner) => term_variables(inner, out),
        Term::Arith(_, l, r) => {
            term_variables(l, out);
            term_variables(r, out);
        }
        Term::Call(_, args) => args.iter().for_each(|a| term_variables(a, out)),
    }
}

pub fn predicate_variables(pred: &Predicate) -> Vec<&str> {
    let mut out = Vec::new();
    match pred {
        Predicate::Holds(t) => term_variables(t, &mut out),
        Predicate::Compare(l, _, r) => {
            term_variables(l, &mut out);
            term_variables(r, &mut out);
        }
    }
    out
}

// ***************** Formulas *****************

/// Prints `f` in `dialect`, spelling every atom with `atom`.
///
/// # Arguments
///
/// * `f` - the formula
/// * `dialect` - operator spelling of the target
/// * `atom` - renders one atomic proposition; the result is wrapped in
///   parentheses when used as an operand unless it is a bare identifier
pub fn render(
    f: &Formula,
    dialect: &Dialect,
    atom: &dyn Fn(&Proposition) -> String,
) -> Result<String, RenderError> {
    write_formula(f, dialect, atom, false)
}

/// Canonical text of `f`, atoms spelled as in the source.
pub fn formula_to_string(f: &Formula) -> String {
    // LTL prints bounded operators, so rendering cannot fail.
    render(f, &LTL, &|p| p.text.clone()).unwrap_or_default()
}

fn write_formula(
    f: &Formula,
    d: &Dialect,
    atom: &dyn Fn(&Proposition) -> String,
    operand: bool,
) -> Result<String, RenderError> {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
        let text = match f {
            Formula::Const(true) => d.true_lit.to_string(),
            Formula::Const(false) => d.false_lit.to_string(),
            Formula::Atom(p) => {
                let text = atom(p);
                if operand && !is_simple_atom(&text) {
                    return Ok(format!("({})", text));
                }
                text
            }
            Formula::Not(inner) => format!("{}{}", d.not, write_formula(inner, d, atom, true)?),
            Formula::Next(inner) => unary(d.next, inner, d, atom)?,
            Formula::Finally(inner) => unary(d.finally, inner, d, atom)?,
            Formula::Globally(inner) => unary(d.globally, inner, d, atom)?,
            Formula::FinallyAt(n, inner) => bounded(d, "F=", *n, inner, atom)?,
            Formula::FinallyWithin(n, inner) => bounded(d, "F<=", *n, inner, atom)?,
            Formula::GloballyWithin(n, inner) => bounded(d, "G<=", *n, inner, atom)?,
            Formula::And(l, r) => binary(d.and, l, r, d, atom, operand)?,
            Formula::Or(l, r) => binary(d.or, l, r, d, atom, operand)?,
            Formula::Implies(l, r) => binary(d.implies, l, r, d, atom, operand)?,
            Formula::Iff(l, r) => binary(d.iff, l, r, d, atom, operand)?,
            Formula::Until(l, r) => binary(d.until, l, r, d, atom, operand)?,
            Formula::Release(l, r) => binary(d.release, l, r, d, atom, operand)?,
            Formula::Xor(l, r) => match d.xor {
                Some(op) => binary(op, l, r, d, atom, operand)?,
                None => {
                    let lowered = Formula::not(Formula::Iff(l.clone(), r.clone()));
                    write_formula(&lowered, d, atom, operand)?
                }
            },
            Formula::WeakUntil(l, r) => match d.weak_until {
                Some(op) => binary(op, l, r, d, atom, operand)?,
                None => {
                    let lowered = Formula::or(
                        Formula::Until(l.clone(), r.clone()),
                        Formula::Globally(l.clone()),
                    );
                    write_formula(&lowered, d, atom, operand)?
                }
            },
        };
        Ok(text)
    })
}

fn unary(
    op: &str,
    inner: &Formula,
    d: &Dialect,
    atom: &dyn Fn(&Proposition) -> String,
) -> Result<String, RenderError> {
    Ok(format!("{}({})", op, write_formula(inner, d, atom, false)?))
}

fn bounded(
    d: &Dialect,
    op: &str,
    n: u32,
    inner: &Formula,
    atom: &dyn Fn(&Proposition) -> String,
) -> Result<String, RenderError> {
    if !d.bounded {
        return Err(RenderError::UnexpandedBound(format!("{}{}", op, n)));
    }
    Ok(format!("{}{}({})", op, n, write_formula(inner, d, atom, false)?))
}

fn binary(
    op: &str,
    l: &Formula,
    r: &Formula,
    d: &Dialect,
    atom: &dyn Fn(&Proposition) -> String,
    operand: bool,
) -> Result<String, RenderError> {
    let text = format!(
        "{} {} {}",
        write_formula(l, d, atom, true)?,
        op,
        write_formula(r, d, atom, true)?
    );
    if operand {
        Ok(format!("({})", text))
    } else {
        Ok(text)
    }
}
