use crate::definitions::*;


// ***************** Formula structure queries *****************

/// Check if two formulas are the same up to the source text of their atoms.
pub fn identity(a: &Formula, b: &Formula) -> bool {
    match (a, b) {
        (Formula::Const(x), Formula::Const(y)) => x == y,
        (Formula::Atom(p), Formula::Atom(q)) => p.predicate == q.predicate,
        (Formula::Not(a), Formula::Not(b))
        | (Formula::Next(a), Formula::Next(b))
        | (Formula::Finally(a), Formula::Finally(b))
        | (Formula::Globally(a), Formula::Globally(b)) => identity(a, b),
        (Formula::FinallyAt(n, a), Formula::FinallyAt(m, b))
        | (Formula::FinallyWithin(n, a), Formula::FinallyWithin(m, b))
        | (Formula::GloballyWithin(n, a), Formula::GloballyWithin(m, b)) => n == m && identity(a, b),
        (Formula::And(a1, b1), Formula::And(a2, b2))
        | (Formula::Or(a1, b1), Formula::Or(a2, b2))
        | (Formula::Xor(a1, b1), Formula::Xor(a2, b2))
        | (Formula::Implies(a1, b1), Formula::Implies(a2, b2))
        | (Formula::Iff(a1, b1), Formula::Iff(a2, b2))
        | (Formula::Until(a1, b1), Formula::Until(a2, b2))
        | (Formula::Release(a1, b1), Formula::Release(a2, b2))
        | (Formula::WeakUntil(a1, b1), Formula::WeakUntil(a2, b2)) => {
            identity(a1, a2) && identity(b1, b2)
        }
        _ => false,
    }
}

/// Direct subformulas, left to right.
pub fn children(f: &Formula) -> Vec<&Formula> {
    match f {
        Formula::Const(_) | Formula::Atom(_) => vec![],
        Formula::Not(a)
        | Formula::Next(a)
        | Formula::Finally(a)
        | Formula::Globally(a)
        | Formula::FinallyAt(_, a)
        | Formula::FinallyWithin(_, a)
        | Formula::GloballyWithin(_, a) => vec![&**a],
        Formula::And(a, b)
        | Formula::Or(a, b)
        | Formula::Xor(a, b)
        | Formula::Implies(a, b)
        | Formula::Iff(a, b)
        | Formula::Until(a, b)
        | Formula::Release(a, b)
        | Formula::WeakUntil(a, b) => vec![&**a, &**b],
    }
}

/// Number of nodes in the formula tree.
pub fn size(f: &Formula) -> usize {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
        1 + children(f).into_iter().map(size).sum::<usize>()
    })
}

/// Atomic propositions in left-to-right order, duplicates included.
pub fn atoms(f: &Formula) -> Vec<&Proposition> {
    let mut out = Vec::new();
    collect_atoms(f, &mut out);
    out
}

fn collect_atoms<'a>(f: &'a Formula, out: &mut Vec<&'a Proposition>) {
    stacker::maybe_grow(32 * 1024, 1024 * 1024, || match f {
        Formula::Atom(p) => out.push(p),
        _ => {
            for child in children(f) {
                collect_atoms(child, out);
            }
        }
    })
}

/// True when any temporal operator (bounded or not) occurs in `f`.
pub fn is_temporal(f: &Formula) -> bool {
    match f {
        Formula::Next(_)
        | Formula::Finally(_)
        | Formula::Globally(_)
        | Formula::FinallyAt(..)
        | Formula::FinallyWithin(..)
        | Formula::GloballyWithin(..)
        | Formula::Until(..)
        | Formula::Release(..)
        | Formula::WeakUntil(..) => true,
        _ => children(f).into_iter().any(is_temporal),
    }
}

/// Deepest nesting of `X` in `f`. `F=n` counts as `n` nested `X`.
pub fn next_depth(f: &Formula) -> u32 {
    let below = children(f).into_iter().map(next_depth).max().unwrap_or(0);
    match f {
        Formula::Next(_) => below + 1,
        Formula::FinallyAt(n, _) => below + n,
        _ => below,
    }
}

/// Strips one leading `G`.
pub fn strip_globally(f: &Formula) -> Option<&Formula> {
    match f {
        Formula::Globally(inner) => Some(&**inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms_in_order() {
        let f = Formula::globally(Formula::implies(
            Formula::var("a"),
            Formula::and(Formula::var("b"), Formula::next(Formula::var("a"))),
        ));
        let names: Vec<&str> = atoms(&f).iter().map(|p| p.text.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(size(&f), 7);
    }

    #[test]
    fn test_temporal_queries() {
        let f = Formula::and(
            Formula::var("a"),
            Formula::FinallyAt(3, Box::new(Formula::next(Formula::var("b")))),
        );
        assert!(is_temporal(&f));
        assert_eq!(next_depth(&f), 4);
        assert!(!is_temporal(&Formula::not(Formula::var("a"))));
        assert_eq!(strip_globally(&Formula::globally(Formula::var("a"))), Some(&Formula::var("a")));
    }

    #[test]
    fn test_identity_ignores_atom_text() {
        let x_gt_1 = |text: &str| {
            let predicate = Predicate::Compare(Term::Var("x".to_string()), RelOp::Gt, Term::Number("1".to_string()));
            Formula::Atom(Proposition::new(text, predicate))
        };
        assert!(identity(&Formula::globally(x_gt_1("x  >  1")), &Formula::globally(x_gt_1("x>1"))));
        assert!(!identity(&Formula::next(x_gt_1("x > 1")), &Formula::globally(x_gt_1("x > 1"))));
    }
}
