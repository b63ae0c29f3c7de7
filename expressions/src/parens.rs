use crate::definitions::ScopeTag;
use crate::BalanceError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r" {2,4}").unwrap();
    static ref TRAILING_OPERAND: Regex =
        Regex::new(r"(<->|->|&&|\|\|)\s+([A-Za-z0-9_.]+)\s*$").unwrap();
}

fn count(text: &str, c: char) -> usize {
    text.chars().filter(|&x| x == c).count()
}

/// Repairs unmatched parentheses at the edges of a formula fragment.
///
/// A leading scope keyword is set aside and put back in front of the result.
/// Surplus openers are peeled from the left (whitespace, `G(`, `F(` or `(`),
/// surplus closers from the right (whitespace or `)`). A fragment whose
/// imbalance cannot be repaired that way is rejected.
pub fn balance_parenthesis(fragment: &str) -> Result<String, BalanceError> {
    let (tag, rest) = ScopeTag::split(fragment);
    let keyword = tag.map(|t| t.keyword()).unwrap_or("");
    let mut text = rest;

    let unbalanced = |partial: &str| BalanceError::Unbalanced {
        fragment: fragment.to_string(),
        partial: format!("{}{}", keyword, partial),
    };

    // Every step below strictly shortens `text`.
    while count(text, '(') > count(text, ')') {
        if text.starts_with(char::is_whitespace) {
            text = text.trim_start();
        } else if text.starts_with("G(") || text.starts_with("F(") {
            text = &text[2..];
        } else if text.starts_with('(') {
            text = &text[1..];
        } else {
            return Err(unbalanced(text));
        }
    }
    while count(text, ')') > count(text, '(') {
        if text.ends_with(char::is_whitespace) {
            text = text.trim_end();
        } else if text.ends_with(')') {
            text = &text[..text.len() - 1];
        } else {
            return Err(unbalanced(text));
        }
    }
    Ok(format!("{}{}", keyword, text))
}

/// Byte index of the `)` closing the `(` at `open`.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strips parentheses wrapping the whole text, as often as they do.
pub fn trim_outermost_balanced_parentheses(text: &str) -> String {
    let mut current = text.trim();
    while current.starts_with('(')
        && current.ends_with(')')
        && matching_close(current, 0) == Some(current.len() - 1)
    {
        current = current[1..current.len() - 1].trim();
    }
    current.to_string()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Removes groups that carry no operand of their own.
///
/// A group may go only when it opens the text or directly follows another `(`,
/// and no identifier or number sits directly inside it. Anything else, such as
/// a group after an operator or a function name, is kept. Runs of two to four
/// spaces are collapsed, and once a group was removed a trailing bare operand
/// is attached to its operator. The rewrite is a heuristic and only ever
/// removes matched pairs.
pub fn remove_redundant_parentheses(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    // (index of the opener, still removable)
    let mut open: Vec<(usize, bool)> = Vec::new();
    let mut removed_any = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '(' => {
                let leading = chars[..i]
                    .iter()
                    .rev()
                    .find(|c| !c.is_whitespace())
                    .map_or(true, |&c| c == '(');
                open.push((i, leading));
            }
            ')' => {
                if let Some((start, removable)) = open.pop() {
                    if removable && i > start + 1 {
                        chars.remove(i);
                        chars.remove(start);
                        removed_any = true;
                        i -= 2;
                    }
                }
            }
            c if is_ident_char(c) => {
                if let Some(top) = open.last_mut() {
                    top.1 = false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    let collapsed: String = chars.into_iter().collect();
    let mut result = SPACE_RUN.replace_all(&collapsed, " ").trim().to_string();
    if removed_any {
        result = TRAILING_OPERAND.replace(&result, "${1}${2}").to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_leading_surplus() {
        assert_eq!(balance_parenthesis("G((a && b)").unwrap(), "(a && b)");
        assert_eq!(balance_parenthesis("  ((a)").unwrap(), "(a)");
        assert_eq!(balance_parenthesis("F(x > 1").unwrap(), "x > 1");
    }

    #[test]
    fn test_balance_trailing_surplus() {
        assert_eq!(balance_parenthesis("(a || b)) ").unwrap(), "(a || b)");
        assert_eq!(balance_parenthesis("a)").unwrap(), "a");
    }

    #[test]
    fn test_balance_keeps_scope_keyword() {
        assert_eq!(
            balance_parenthesis("InitialConditionRequirement (a").unwrap(),
            "InitialConditionRequirementa"
        );
        assert_eq!(
            balance_parenthesis("AfterInitialConditionRequirement G(b)").unwrap(),
            "AfterInitialConditionRequirement G(b)"
        );
    }

    #[test]
    fn test_balance_is_idempotent() {
        for input in ["G((a && b)", "(a || b)) ", "x", "((p))"] {
            let once = balance_parenthesis(input).unwrap();
            assert_eq!(balance_parenthesis(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_balance_rejects_unrepairable() {
        let err = balance_parenthesis("a && (b").unwrap_err();
        assert_eq!(
            err,
            BalanceError::Unbalanced {
                fragment: "a && (b".to_string(),
                partial: "a && (b".to_string(),
            }
        );
        assert!(balance_parenthesis("(a) && b)x").is_err());
    }

    #[test]
    fn test_trim_outermost() {
        assert_eq!(trim_outermost_balanced_parentheses("((a && b))"), "a && b");
        assert_eq!(trim_outermost_balanced_parentheses("(a) && (b)"), "(a) && (b)");
        assert_eq!(trim_outermost_balanced_parentheses(" ( x ) "), "x");
    }

    #[test]
    fn test_remove_redundant() {
        assert_eq!(remove_redundant_parentheses("((a) -> (b)) -> c"), "(a) -> (b) ->c");
        assert_eq!(remove_redundant_parentheses("(a) && ((b) || (c))"), "(a) && ((b) || (c))");
        assert_eq!(remove_redundant_parentheses("G((a) -> (b))"), "G((a) -> (b))");
        assert_eq!(remove_redundant_parentheses("a  &&   b"), "a && b");
        assert_eq!(remove_redundant_parentheses("(((a)))"), "(a)");
    }
}
