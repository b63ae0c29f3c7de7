use crate::definitions::*;
use crate::form_to_exp::size;
use crate::ExpandError;

// ***************** Bounded operator expansion *****************

/// Largest bound unrolled unless configured otherwise.
pub const DEFAULT_MAX_UNROLL: u32 = 256;

/// Upper limit on the node count of one expanded bounded operator. Nested
/// bounds multiply, so the per-bound ceiling alone does not keep output finite
/// in practice.
pub const MAX_EXPANDED_NODES: usize = 1 << 20;

/// Rewrites every bounded operator of `f` into nested `X` over plain LTL:
///
/// * `F=n φ` becomes `X^n φ`
/// * `F≤n φ` becomes `φ || X(φ || X(... φ))` with `n` nested `X`
/// * `G≤n φ` becomes `φ && X(φ && X(... φ))` with `n` nested `X`
///
/// Unbounded operators are left alone; the operand of a bounded operator is
/// expanded before it is unrolled.
pub fn expand_bounded(f: &Formula, max_steps: u32) -> Result<Formula, ExpandError> {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
        let expanded = match f {
            Formula::Const(_) | Formula::Atom(_) => f.clone(),
            Formula::Not(a) => Formula::Not(Box::new(expand_bounded(a, max_steps)?)),
            Formula::Next(a) => Formula::Next(Box::new(expand_bounded(a, max_steps)?)),
            Formula::Finally(a) => Formula::Finally(Box::new(expand_bounded(a, max_steps)?)),
            Formula::Globally(a) => Formula::Globally(Box::new(expand_bounded(a, max_steps)?)),
            Formula::FinallyAt(n, a) => {
                check_bound("F=", *n, max_steps)?;
                let mut acc = expand_bounded(a, max_steps)?;
                for _ in 0..*n {
                    acc = Formula::next(acc);
                }
                acc
            }
            Formula::FinallyWithin(n, a) => unroll("F<=", *n, a, max_steps, Formula::or)?,
            Formula::GloballyWithin(n, a) => unroll("G<=", *n, a, max_steps, Formula::and)?,
            Formula::And(l, r) => Formula::and(expand_bounded(l, max_steps)?, expand_bounded(r, max_steps)?),
            Formula::Or(l, r) => Formula::or(expand_bounded(l, max_steps)?, expand_bounded(r, max_steps)?),
            Formula::Xor(l, r) => Formula::Xor(
                Box::new(expand_bounded(l, max_steps)?),
                Box::new(expand_bounded(r, max_steps)?),
            ),
            Formula::Implies(l, r) => {
                Formula::implies(expand_bounded(l, max_steps)?, expand_bounded(r, max_steps)?)
            }
            Formula::Iff(l, r) => Formula::iff(expand_bounded(l, max_steps)?, expand_bounded(r, max_steps)?),
            Formula::Until(l, r) => Formula::Until(
                Box::new(expand_bounded(l, max_steps)?),
                Box::new(expand_bounded(r, max_steps)?),
            ),
            Formula::Release(l, r) => Formula::Release(
                Box::new(expand_bounded(l, max_steps)?),
                Box::new(expand_bounded(r, max_steps)?),
            ),
            Formula::WeakUntil(l, r) => Formula::WeakUntil(
                Box::new(expand_bounded(l, max_steps)?),
                Box::new(expand_bounded(r, max_steps)?),
            ),
        };
        Ok(expanded)
    })
}

fn check_bound(op: &str, n: u32, max_steps: u32) -> Result<(), ExpandError> {
    if n > max_steps {
        return Err(ExpandError::BoundTooLarge {
            operator: format!("{}{}", op, n),
            limit: max_steps,
        });
    }
    Ok(())
}

/// Unrolls from the innermost step outwards; each iteration consumes one step
/// of the bound.
fn unroll(
    op: &str,
    n: u32,
    operand: &Formula,
    max_steps: u32,
    join: fn(Formula, Formula) -> Formula,
) -> Result<Formula, ExpandError> {
    check_bound(op, n, max_steps)?;
    let step = expand_bounded(operand, max_steps)?;
    let nodes = size(&step)
        .saturating_mul(n as usize + 1)
        .saturating_add(2 * n as usize);
    if nodes > MAX_EXPANDED_NODES {
        return Err(ExpandError::TooLarge {
            operator: format!("{}{}", op, n),
            nodes,
            limit: MAX_EXPANDED_NODES,
        });
    }
    let mut acc = step.clone();
    for _ in 0..n {
        acc = join(step.clone(), Formula::next(acc));
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::formula_to_string;

    fn p() -> Formula {
        Formula::var("p")
    }

    #[test]
    fn test_finally_within() {
        let f = Formula::FinallyWithin(2, Box::new(p()));
        let e = expand_bounded(&f, DEFAULT_MAX_UNROLL).unwrap();
        assert_eq!(formula_to_string(&e), "p || X(p || X(p))");
    }

    #[test]
    fn test_globally_within_and_exact() {
        let g = Formula::GloballyWithin(1, Box::new(p()));
        assert_eq!(
            formula_to_string(&expand_bounded(&g, DEFAULT_MAX_UNROLL).unwrap()),
            "p && X(p)"
        );
        let at = Formula::FinallyAt(3, Box::new(p()));
        assert_eq!(
            formula_to_string(&expand_bounded(&at, DEFAULT_MAX_UNROLL).unwrap()),
            "X(X(X(p)))"
        );
    }

    #[test]
    fn test_zero_bounds_reduce_to_operand() {
        let operand = Formula::and(p(), Formula::var("q"));
        for zero in [
            Formula::FinallyAt(0, Box::new(operand.clone())),
            Formula::FinallyWithin(0, Box::new(operand.clone())),
            Formula::GloballyWithin(0, Box::new(operand.clone())),
        ] {
            assert_eq!(expand_bounded(&zero, DEFAULT_MAX_UNROLL).unwrap(), operand);
        }
        assert_eq!(expand_bounded(&Formula::FinallyAt(0, Box::new(p())), 0).unwrap(), p());
    }

    #[test]
    fn test_nested_and_unbounded_untouched() {
        let f = Formula::globally(Formula::implies(
            Formula::var("a"),
            Formula::FinallyWithin(1, Box::new(Formula::GloballyWithin(1, Box::new(p())))),
        ));
        let e = expand_bounded(&f, DEFAULT_MAX_UNROLL).unwrap();
        assert_eq!(formula_to_string(&e), "G(a -> ((p && X(p)) || X(p && X(p))))");
    }

    #[test]
    fn test_bound_limit() {
        let f = Formula::FinallyWithin(300, Box::new(p()));
        assert_eq!(
            expand_bounded(&f, DEFAULT_MAX_UNROLL),
            Err(ExpandError::BoundTooLarge { operator: "F<=300".to_string(), limit: 256 })
        );
        assert!(expand_bounded(&f, 300).is_ok());
    }

    #[test]
    fn test_nested_blowup_rejected() {
        let inner = Formula::GloballyWithin(200, Box::new(p()));
        let middle = Formula::FinallyWithin(200, Box::new(inner));
        let f = Formula::GloballyWithin(200, Box::new(middle));
        assert!(matches!(
            expand_bounded(&f, DEFAULT_MAX_UNROLL),
            Err(ExpandError::TooLarge { .. })
        ));
    }
}
