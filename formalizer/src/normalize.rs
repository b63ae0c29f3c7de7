use expressions::parens::matching_close;
use indexmap::IndexSet;
use ir::SignalContext;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref IDENT: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").unwrap();
    static ref IDENT_OR_CALL: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_.]*)(\s*\()?").unwrap();
}

const BOOL_WORDS: [&str; 4] = ["true", "false", "TRUE", "FALSE"];

/// Normalized form of a proposition: identifiers replaced by their safe names,
/// then implications and equivalences linearized.
pub fn normalize_proposition(text: &str, ctx: &SignalContext) -> String {
    let renamed = IDENT_OR_CALL.replace_all(text, |caps: &Captures| {
        let name = &caps[1];
        // Function names and boolean words are kept.
        if caps.get(2).is_some() || BOOL_WORDS.contains(&name) {
            caps[0].to_string()
        } else {
            ctx.safe_name(name)
        }
    });
    linearize(&renamed)
}

/// Rewrites a top-level `a <-> b` into `!((a)^(b))` and `a -> b` into
/// `!(a)||(b)`, innermost groups first.
pub fn linearize(text: &str) -> String {
    let text = text.trim();
    // Groups are linearized on their own before the top level is split.
    let mut out = String::new();
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        match matching_close(rest, open) {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push('(');
                out.push_str(&linearize(&rest[open + 1..close]));
                out.push(')');
                rest = &rest[close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);

    if let Some(pos) = find_top_level(&out, "<->") {
        let (l, r) = (out[..pos].trim(), out[pos + 3..].trim());
        return format!("!(({})^({}))", l, linearize(r));
    }
    if let Some(pos) = find_top_level(&out, "->") {
        let (l, r) = (out[..pos].trim(), out[pos + 2..].trim());
        return format!("!({})||({})", l, linearize(r));
    }
    out
}

/// Byte offset of the first `op` outside any parentheses.
fn find_top_level(text: &str, op: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth == 0 && text[i..].starts_with(op) => {
                // `<->` also contains `->`.
                if op == "->" && text[..i].ends_with('<') {
                    continue;
                }
                return Some(i);
            }
            _ => {}
        }
    }
    None
}

/// Identifier tokens of a normalized proposition, split on operator and
/// relational characters. Numbers, boolean words and the names `is_literal`
/// accepts are left out.
pub fn dependency_tokens(normalized: &str, is_literal: impl Fn(&str) -> bool) -> IndexSet<String> {
    IDENT
        .find_iter(normalized)
        .map(|m| m.as_str())
        .filter(|t| !BOOL_WORDS.contains(t) && !is_literal(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::signals;

    #[test]
    fn test_safe_names() {
        let ctx = SignalContext::with_sanitizer(|n: &str| n.replace('.', "_"));
        assert_eq!(
            normalize_proposition("plant.speed > limit && isValid(x)", &ctx),
            "plant_speed > limit && isValid(x)"
        );
        assert_eq!(normalize_proposition("ready == true", &ctx), "ready == true");
    }

    #[test]
    fn test_linearize() {
        assert_eq!(linearize("a -> b"), "!(a)||(b)");
        assert_eq!(linearize("a <-> b"), "!((a)^(b))");
        assert_eq!(linearize("(a -> b) && c"), "(!(a)||(b)) && c");
        assert_eq!(linearize("x > 0"), "x > 0");
    }

    #[test]
    fn test_dependency_tokens() {
        let ctx = signals_with_enums_ctx();
        let tokens = dependency_tokens("(mode == Idle) && speed + 2 > limit", |t| ctx.is_enum_literal(t));
        let tokens: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
        assert_eq!(tokens, vec!["mode", "speed", "limit"]);
        assert!(dependency_tokens("0 < 1 || true", |_| false).is_empty());
    }

    fn signals_with_enums_ctx() -> SignalContext {
        let mut ctx = signals! { Output mode: "Mode", Input speed: "int16_T" };
        ctx.declare_enum("Mode", &["Idle", "Run"]);
        ctx
    }
}
