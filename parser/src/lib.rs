use expressions::bounded::expand_bounded;
use expressions::parens::trim_outermost_balanced_parentheses;
use expressions::utils::formula_to_string;
use expressions::*;
use lazy_static::lazy_static;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use regex::Regex;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct FormulaParser;

/// Deepest parenthesis nesting a formula may use.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Stack reserved for the grammar per byte of input.
const STACK_PER_BYTE: usize = 16 * 1024;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty formula")]
    Empty,

    #[error("syntax error: {0}")]
    Syntax(Box<pest::error::Error<Rule>>),

    #[error("unsupported bound `{0}`: only upper bounds are allowed")]
    UnsupportedBound(String),

    #[error("bound `{0}` leaves no step to check")]
    EmptyBound(String),

    #[error("bound `{0}` is too large")]
    BoundOverflow(String),

    #[error("parentheses nested {depth} deep, at most {limit} allowed")]
    TooDeep { depth: usize, limit: usize },

    #[error("malformed parse tree near {0}")]
    Malformed(String),
}

/// One LTL property of a requirement: its optional scope keyword and formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub tag: Option<ScopeTag>,
    pub formula: Formula,
}

/// Parses a single formula. Scope keywords are not accepted here, see
/// [`parse_chunk`].
pub fn parse(source: &str) -> Result<Formula, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let depth = nesting_depth(source);
    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::TooDeep {
            depth,
            limit: MAX_NESTING_DEPTH,
        });
    }

    // The generated parser recurses once per prefix operator as well, so its
    // stack grows with the input.
    let stack = source.len().max(64).saturating_mul(STACK_PER_BYTE);
    let formula = stacker::maybe_grow(stack, stack, || FormulaParser::parse(Rule::formula, source))
        .map_err(|e| ParseError::Syntax(Box::new(e)))?
        .next()
        .ok_or_else(|| ParseError::Malformed("formula".to_string()))?;

    let mut inner = formula.into_inner();
    build_formula(child(&mut inner, "formula body")?)
}

/// Parses one chunk, splitting off a leading scope keyword first.
pub fn parse_chunk(source: &str) -> Result<Chunk, ParseError> {
    let (tag, rest) = ScopeTag::split(source);
    Ok(Chunk {
        tag,
        formula: parse(rest)?,
    })
}

/// Splits the formula text of a requirement into its non-empty chunks.
pub fn split_chunks(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split(LTL_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses every chunk of a requirement's formula text, stopping at the first
/// chunk that does not parse.
pub fn parse_chunks(text: &str) -> Result<Vec<Chunk>, ParseError> {
    split_chunks(text).iter().map(|chunk| parse_chunk(chunk)).collect()
}

/// Rewrites every bounded operator in `text` into plain LTL.
///
/// Chunks are handled one by one. A chunk that does not parse is left as it
/// is; a chunk whose bound cannot be unrolled is replaced by an
/// `Error: unresolvable bounded operator ...` marker.
pub fn substitute_bounded_operators(text: &str, max_steps: u32) -> String {
    let chunks: Vec<String> = split_chunks(text)
        .into_iter()
        .map(|chunk| match parse_chunk(&chunk) {
            Err(_) => chunk,
            Ok(Chunk { tag, formula }) => match expand_bounded(&formula, max_steps) {
                Ok(expanded) => {
                    let body = formula_to_string(&expanded);
                    match tag {
                        Some(tag) => format!("{} {}", tag.keyword(), body),
                        None => body,
                    }
                }
                Err(e) => format!("Error: {}", e),
            },
        })
        .collect();
    chunks.join(LTL_SEPARATOR)
}

/// Normalized source text of an atom: whitespace collapsed and redundant
/// outer parentheses removed.
pub fn normalize_atom_text(span: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(span.trim(), " ");
    trim_outermost_balanced_parentheses(&collapsed)
}

/// Deepest parenthesis nesting of `source`, unbalanced closers ignored.
fn nesting_depth(source: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    for c in source.chars() {
        match c {
            '(' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn child<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or_else(|| ParseError::Malformed(what.to_string()))
}

fn build_formula(pair: Pair<Rule>) -> Result<Formula, ParseError> {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || match pair.as_rule() {
        Rule::iff
        | Rule::implies
        | Rule::disj
        | Rule::xor
        | Rule::conj
        | Rule::binary_temporal => build_ast_from_binary(pair),
        Rule::factor => build_ast_from_factor(pair),
        Rule::primary => {
            let mut pairs = pair.into_inner();
            build_formula(child(&mut pairs, "primary")?)
        }
        Rule::relation => build_ast_from_relation(pair),
        rule => Err(ParseError::Malformed(format!("{:?}", rule))),
    })
}

fn build_ast_from_binary(pair: Pair<Rule>) -> Result<Formula, ParseError> {
    let mut pairs = pair.into_inner();
    let lhs = build_formula(child(&mut pairs, "left operand")?)?;

    // A level holds either its lower level alone or `lower op same-level`.
    let op = match pairs.next() {
        None => return Ok(lhs),
        Some(op) => op,
    };
    let rhs = build_formula(child(&mut pairs, "right operand")?)?;
    let (l, r) = (Box::new(lhs), Box::new(rhs));
    let formula = match op.as_rule() {
        Rule::iff_op => Formula::Iff(l, r),
        Rule::impl_op => Formula::Implies(l, r),
        Rule::or_op => Formula::Or(l, r),
        Rule::xor_op => Formula::Xor(l, r),
        Rule::and_op => Formula::And(l, r),
        Rule::temporal_op => match op.as_str() {
            "U" => Formula::Until(l, r),
            "V" | "R" => Formula::Release(l, r),
            _ => Formula::WeakUntil(l, r),
        },
        rule => return Err(ParseError::Malformed(format!("{:?}", rule))),
    };
    Ok(formula)
}

fn build_ast_from_factor(pair: Pair<Rule>) -> Result<Formula, ParseError> {
    let mut pairs = pair.into_inner();
    let first = child(&mut pairs, "factor")?;
    if first.as_rule() == Rule::primary {
        return build_formula(first);
    }

    // It's a unary operator
    let operand = Box::new(build_formula(child(&mut pairs, "operand")?)?);
    let formula = match first.as_rule() {
        Rule::not_op => Formula::Not(operand),
        Rule::next_op => Formula::Next(operand),
        Rule::finally_op => Formula::Finally(operand),
        Rule::globally_op => Formula::Globally(operand),
        Rule::bounded_op => build_bounded(first, operand)?,
        rule => return Err(ParseError::Malformed(format!("{:?}", rule))),
    };
    Ok(formula)
}

/// `F=n`/`G=n` hold exactly at step `n`, `F<=n`/`G<=n` over the steps `0..=n`
/// and `F<n`/`G<n` over `0..n`.
fn build_bounded(pair: Pair<Rule>, operand: Box<Formula>) -> Result<Formula, ParseError> {
    let text = WHITESPACE_RUN.replace_all(pair.as_str(), "").to_string();
    let mut pairs = pair.into_inner();
    let kind = child(&mut pairs, "bounded operator")?.as_str();
    let rel = child(&mut pairs, "bound relation")?.as_str();
    let bound: u32 = child(&mut pairs, "bound")?
        .as_str()
        .parse()
        .map_err(|_| ParseError::BoundOverflow(text.clone()))?;

    let formula = match (kind, rel) {
        (_, "=") => Formula::FinallyAt(bound, operand),
        ("F", "<=" | "≤") => Formula::FinallyWithin(bound, operand),
        ("G", "<=" | "≤") => Formula::GloballyWithin(bound, operand),
        (kind, "<") => {
            let steps = bound
                .checked_sub(1)
                .ok_or_else(|| ParseError::EmptyBound(text.clone()))?;
            if kind == "F" {
                Formula::FinallyWithin(steps, operand)
            } else {
                Formula::GloballyWithin(steps, operand)
            }
        }
        _ => return Err(ParseError::UnsupportedBound(text)),
    };
    Ok(formula)
}

fn build_ast_from_relation(pair: Pair<Rule>) -> Result<Formula, ParseError> {
    let text = normalize_atom_text(pair.as_str());
    let mut pairs = pair.into_inner();
    let lhs = build_term(child(&mut pairs, "term")?)?;

    let predicate = match pairs.next() {
        None => match lhs {
            // A lone constant is a formula constant, not a proposition.
            Term::Bool(b) => return Ok(Formula::Const(b)),
            term => Predicate::Holds(term),
        },
        Some(op) => {
            let rel = RelOp::parse(op.as_str())
                .ok_or_else(|| ParseError::Malformed(op.as_str().to_string()))?;
            let rhs = build_term(child(&mut pairs, "term")?)?;
            Predicate::Compare(lhs, rel, rhs)
        }
    };
    Ok(Formula::Atom(Proposition::new(text, predicate)))
}

fn build_term(pair: Pair<Rule>) -> Result<Term, ParseError> {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || match pair.as_rule() {
        Rule::sum | Rule::product => {
            // Left-associative chain: operand (op operand)*
            let mut pairs = pair.into_inner();
            let mut acc = build_term(child(&mut pairs, "term")?)?;
            while let Some(op) = pairs.next() {
                let op = match op.as_str() {
                    "+" => ArithOp::Add,
                    "-" => ArithOp::Sub,
                    "*" => ArithOp::Mul,
                    "/" => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                let rhs = build_term(child(&mut pairs, "term")?)?;
                acc = Term::Arith(op, Box::new(acc), Box::new(rhs));
            }
            Ok(acc)
        }
        Rule::unary_term => {
            let mut pairs = pair.into_inner();
            let first = child(&mut pairs, "term")?;
            if first.as_rule() == Rule::neg_sign {
                let inner = build_term(child(&mut pairs, "term")?)?;
                Ok(Term::Neg(Box::new(inner)))
            } else {
                build_term(first)
            }
        }
        Rule::operand => {
            let mut pairs = pair.into_inner();
            build_term(child(&mut pairs, "operand")?)
        }
        Rule::number => Ok(Term::Number(pair.as_str().to_string())),
        Rule::boolean => Ok(Term::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::ident => Ok(Term::Var(pair.as_str().to_string())),
        Rule::call => {
            let mut pairs = pair.into_inner();
            let name = child(&mut pairs, "function name")?.as_str().to_string();
            let args = pairs.map(build_term).collect::<Result<Vec<_>, _>>()?;
            Ok(Term::Call(name, args))
        }
        rule => Err(ParseError::Malformed(format!("{:?}", rule))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Formula {
        Formula::var(name)
    }

    fn cmp(text: &str, l: Term, op: RelOp, r: Term) -> Formula {
        Formula::Atom(Proposition::new(text, Predicate::Compare(l, op, r)))
    }

    fn v(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    fn n(lit: &str) -> Term {
        Term::Number(lit.to_string())
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("a && b || c").unwrap(),
            Formula::or(Formula::and(var("a"), var("b")), var("c"))
        );
        assert_eq!(
            parse("a -> b -> c").unwrap(),
            Formula::implies(var("a"), Formula::implies(var("b"), var("c")))
        );
        assert_eq!(
            parse("a <-> b -> c").unwrap(),
            Formula::iff(var("a"), Formula::implies(var("b"), var("c")))
        );
        assert_eq!(
            parse("!a & b").unwrap(),
            Formula::and(Formula::not(var("a")), var("b"))
        );
        assert_eq!(
            parse("a U b && c").unwrap(),
            Formula::and(Formula::Until(Box::new(var("a")), Box::new(var("b"))), var("c"))
        );
    }

    #[test]
    fn test_temporal_operators() {
        assert_eq!(
            parse("G(a -> X b)").unwrap(),
            Formula::globally(Formula::implies(var("a"), Formula::next(var("b"))))
        );
        assert_eq!(
            parse("a V b").unwrap(),
            Formula::Release(Box::new(var("a")), Box::new(var("b")))
        );
        assert_eq!(
            parse("a W b").unwrap(),
            Formula::WeakUntil(Box::new(var("a")), Box::new(var("b")))
        );
        // Keywords only stand alone.
        assert_eq!(parse("Go && Up").unwrap(), Formula::and(var("Go"), var("Up")));
    }

    #[test]
    fn test_bounded_operators() {
        let speed = cmp("speed > 5", v("speed"), RelOp::Gt, n("5"));
        assert_eq!(
            parse("F<=3 (speed > 5)").unwrap(),
            Formula::FinallyWithin(3, Box::new(speed.clone()))
        );
        assert_eq!(
            parse("F≤3(speed > 5)").unwrap(),
            Formula::FinallyWithin(3, Box::new(speed.clone()))
        );
        assert_eq!(parse("G<4(a)").unwrap(), Formula::GloballyWithin(3, Box::new(var("a"))));
        assert_eq!(parse("F=2 a").unwrap(), Formula::FinallyAt(2, Box::new(var("a"))));
        assert_eq!(parse("F<0 a"), Err(ParseError::EmptyBound("F<0".to_string())));
        assert_eq!(parse("F>3 a"), Err(ParseError::UnsupportedBound("F>3".to_string())));
        assert!(matches!(parse("F<=99999999999 a"), Err(ParseError::BoundOverflow(_))));
    }

    #[test]
    fn test_atoms() {
        let f = parse("(x + 1) * 2 >= y").unwrap();
        let lhs = Term::Arith(
            ArithOp::Mul,
            Box::new(Term::Arith(ArithOp::Add, Box::new(v("x")), Box::new(n("1")))),
            Box::new(n("2")),
        );
        assert_eq!(f, cmp("(x + 1) * 2 >= y", lhs, RelOp::Ge, v("y")));

        assert_eq!(parse("(a)").unwrap(), var("a"));
        assert_eq!(parse("true").unwrap(), Formula::Const(true));
        assert_eq!(
            parse("mode  ==   Idle").unwrap(),
            cmp("mode == Idle", v("mode"), RelOp::Eq, v("Idle"))
        );
        assert_eq!(
            parse("isValid(x, 2)").unwrap(),
            Formula::Atom(Proposition::new(
                "isValid(x, 2)",
                Predicate::Holds(Term::Call("isValid".to_string(), vec![v("x"), n("2")]))
            ))
        );
        assert_eq!(
            parse("x != -3").unwrap(),
            cmp("x != -3", v("x"), RelOp::Ne, Term::Neg(Box::new(n("3"))))
        );
        assert_eq!(
            parse("G(x < -3)").unwrap(),
            Formula::globally(cmp("x < -3", v("x"), RelOp::Lt, Term::Neg(Box::new(n("3")))))
        );
        assert_eq!(
            parse("G(x<-3 -> y)").unwrap(),
            Formula::globally(Formula::implies(
                cmp("x<-3", v("x"), RelOp::Lt, Term::Neg(Box::new(n("3")))),
                var("y")
            ))
        );
        assert_eq!(parse("a<->b").unwrap(), Formula::iff(var("a"), var("b")));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert!(matches!(parse("a &&"), Err(ParseError::Syntax(_))));
        assert!(matches!(parse("(a || b"), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}a && b{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(parse(&nested(MAX_NESTING_DEPTH)).unwrap(), Formula::and(var("a"), var("b")));
        assert_eq!(
            parse(&nested(500)),
            Err(ParseError::TooDeep {
                depth: 500,
                limit: MAX_NESTING_DEPTH
            })
        );
        assert!(matches!(parse(&nested(1000)), Err(ParseError::TooDeep { .. })));

        let negations = format!("{}a", "!".repeat(2000));
        assert!(parse(&negations).is_ok());
    }

    #[test]
    fn test_chunks_and_tags() {
        let text = "InitialConditionRequirement a\n\n\nG(b)\r\n\r\n  ";
        let chunks = split_chunks(text);
        assert_eq!(chunks, vec!["InitialConditionRequirement a", "G(b)"]);

        let first = parse_chunk(&chunks[0]).unwrap();
        assert_eq!(first.tag, Some(ScopeTag::InitialCondition));
        assert_eq!(first.formula, var("a"));

        let after = parse_chunk("AfterInitialConditionRequirement G(b)").unwrap();
        assert_eq!(after.tag, Some(ScopeTag::AfterInitialCondition));

        let all = parse_chunks(text).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].tag, None);
        assert!(parse_chunks("G(a)\n\nG(b &&)").is_err());
        assert_eq!(parse_chunks(" \n\n "), Ok(vec![]));
    }

    #[test]
    fn test_substitute_bounded_operators() {
        assert_eq!(
            substitute_bounded_operators("G(a -> F<=2 b)\n\nAfterInitialConditionRequirement F=1 c", 256),
            "G(a -> (b || X(b || X(b))))\n\nAfterInitialConditionRequirement X(c)"
        );
        let out = substitute_bounded_operators("F<=500 b", 256);
        assert!(out.starts_with("Error: unresolvable bounded operator F<=500"));
        assert_eq!(substitute_bounded_operators("a &&", 256), "a &&");
    }
}
