use crate::normalize::{dependency_tokens, normalize_proposition};
use crate::symbol_map::{assign_symbols, is_symbol};
use crate::FormalizeError;
use expressions::form_to_exp::atoms;
use expressions::parens::{balance_parenthesis, trim_outermost_balanced_parentheses};
use expressions::utils::{is_simple_atom, render, LTL};
use expressions::{BalanceError, Proposition, LTL_SEPARATOR};
use indexmap::{IndexMap, IndexSet};
use ir::SignalContext;
use lazy_static::lazy_static;
use logging::Diagnostics;
use parser::{parse_chunk, split_chunks, Chunk};
use regex::{Captures, Regex};

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// Result of decomposing the formula text of one requirement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposition {
    pub chunks: Vec<Chunk>,
    /// Chunks with every proposition replaced by its symbol, joined by the
    /// chunk separator.
    pub structure: String,
    /// Symbol to proposition text, longest text first.
    pub propositions: IndexMap<String, String>,
    /// Symbol to normalized proposition, same order.
    pub normalized: IndexMap<String, String>,
    /// Symbols referenced by each chunk, in order of first use.
    pub chunk_symbols: Vec<Vec<String>>,
    /// Dependency tokens of each chunk.
    pub chunk_tokens: Vec<IndexSet<String>>,
}

impl Decomposition {
    /// Symbol assigned to a proposition text.
    pub fn symbol_for(&self, text: &str) -> Option<&str> {
        self.propositions
            .iter()
            .find(|(_, t)| t.as_str() == text)
            .map(|(symbol, _)| symbol.as_str())
    }

    /// The parsed proposition behind each symbol, in symbol order.
    pub fn atoms_by_symbol(&self) -> IndexMap<&str, &Proposition> {
        let mut found: IndexMap<&str, &Proposition> = IndexMap::new();
        for chunk in &self.chunks {
            for atom in atoms(&chunk.formula) {
                if let Some(symbol) = self.symbol_for(&atom.text) {
                    found.entry(symbol).or_insert(atom);
                }
            }
        }
        self.propositions
            .keys()
            .filter_map(|symbol| found.get(symbol.as_str()).map(|atom| (symbol.as_str(), *atom)))
            .collect()
    }
}

/// Cleans an atom text the way every extracted proposition is cleaned:
/// balanced, then stripped of wrapping parentheses. A fragment that cannot
/// be balanced is reported and kept in its best-effort form.
fn clean_proposition(
    text: &str,
    requirement: &str,
    diagnostics: &mut Diagnostics,
) -> String {
    let balanced = match balance_parenthesis(text) {
        Ok(balanced) => balanced,
        Err(e) => {
            diagnostics.warn(Some(requirement), e.to_string());
            let BalanceError::Unbalanced { partial, .. } = e;
            partial
        }
    };
    trim_outermost_balanced_parentheses(&balanced)
}

fn lookup_symbol<'a>(
    cleaned: &IndexMap<String, String>,
    by_text: &'a IndexMap<String, String>,
    raw: &str,
) -> Option<&'a String> {
    cleaned.get(raw).and_then(|text| by_text.get(text))
}

/// Splits `formula` into chunks and replaces every proposition by a symbol.
///
/// Returns `Ok(None)` for a blank formula.
///
/// # Arguments
/// * `requirement` - identifier used in diagnostics
/// * `formula` - full formula text, chunks separated by a blank line
/// * `ctx` - naming context for safe names and enum literals
/// * `diagnostics` - collects recoverable problems
pub fn decompose(
    requirement: &str,
    formula: &str,
    ctx: &SignalContext,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Decomposition>, FormalizeError> {
    if formula.trim().is_empty() {
        return Ok(None);
    }

    let mut chunks = Vec::new();
    for (index, text) in split_chunks(formula).iter().enumerate() {
        let chunk = parse_chunk(text).map_err(|source| FormalizeError::Parse {
            requirement: requirement.to_string(),
            chunk: index,
            source,
        })?;
        chunks.push(chunk);
    }

    // raw atom text -> cleaned proposition text
    let mut cleaned: IndexMap<String, String> = IndexMap::new();
    let mut texts = Vec::new();
    for chunk in &chunks {
        for atom in atoms(&chunk.formula) {
            let text = match cleaned.get(&atom.text) {
                Some(text) => text.clone(),
                None => {
                    let text = clean_proposition(&atom.text, requirement, diagnostics);
                    if text.contains(LTL_SEPARATOR) {
                        return Err(FormalizeError::CrossFormula {
                            requirement: requirement.to_string(),
                            proposition: text,
                        });
                    }
                    cleaned.insert(atom.text.clone(), text.clone());
                    text
                }
            };
            if !text.is_empty() {
                texts.push(text);
            }
        }
    }

    let by_text = assign_symbols(&texts);
    let symbol_of = |raw: &str| lookup_symbol(&cleaned, &by_text, raw).cloned();

    let mut rendered = Vec::new();
    let mut chunk_symbols = Vec::new();
    for chunk in &chunks {
        let body = render(&chunk.formula, &LTL, &|p| {
            symbol_of(&p.text).unwrap_or_else(|| p.text.clone())
        })
        .map_err(|e| FormalizeError::Render(e.to_string()))?;
        rendered.push(match chunk.tag {
            Some(tag) => format!("{} {}", tag.keyword(), body),
            None => body,
        });

        let mut used: Vec<String> = Vec::new();
        for atom in atoms(&chunk.formula) {
            if let Some(symbol) = symbol_of(&atom.text) {
                if !used.contains(&symbol) {
                    used.push(symbol);
                }
            }
        }
        chunk_symbols.push(used);
    }

    let propositions: IndexMap<String, String> = by_text
        .iter()
        .map(|(text, symbol)| (symbol.clone(), text.clone()))
        .collect();
    let normalized: IndexMap<String, String> = propositions
        .iter()
        .map(|(symbol, text)| (symbol.clone(), normalize_proposition(text, ctx)))
        .collect();
    let chunk_tokens: Vec<IndexSet<String>> = chunk_symbols
        .iter()
        .map(|symbols| {
            symbols
                .iter()
                .filter_map(|s| normalized.get(s))
                .flat_map(|n| dependency_tokens(n, |t| ctx.is_enum_literal(t)))
                .collect::<IndexSet<String>>()
        })
        .collect();

    log::debug!("{}: {} chunk(s), {} proposition(s)", requirement, chunks.len(), propositions.len());

    Ok(Some(Decomposition {
        chunks,
        structure: rendered.join(LTL_SEPARATOR),
        propositions,
        normalized,
        chunk_symbols,
        chunk_tokens,
    }))
}

/// Puts the propositions back into a structure. Only whole symbol tokens are
/// replaced; a proposition that is not a bare identifier is parenthesized.
pub fn reconstruct(structure: &str, propositions: &IndexMap<String, String>) -> String {
    TOKEN
        .replace_all(structure, |caps: &Captures| {
            let token = &caps[0];
            match propositions.get(token) {
                Some(text) if is_symbol(token) => {
                    if is_simple_atom(text) {
                        text.clone()
                    } else {
                        format!("({})", text)
                    }
                }
                _ => token.to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use expressions::form_to_exp::identity;
    use ir::signals;
    use parser::parse;

    fn decompose_ok(formula: &str) -> Decomposition {
        let ctx = signals! { Input speed: "int16_T", Input a: "int32_T", Input b: "int32_T" };
        let mut diagnostics = Diagnostics::new();
        decompose("REQ-1", formula, &ctx, &mut diagnostics).unwrap().unwrap()
    }

    #[test]
    fn test_structure_and_symbols() {
        let d = decompose_ok("G((speed > 5) -> F<=3 (ack))");
        assert_eq!(d.structure, "G(Q -> F<=3(R))");
        assert_eq!(d.propositions.get("Q").map(String::as_str), Some("speed > 5"));
        assert_eq!(d.propositions.get("R").map(String::as_str), Some("ack"));
        assert_eq!(d.chunk_symbols, vec![vec!["Q".to_string(), "R".to_string()]]);
        assert_eq!(d.symbol_for("ack"), Some("R"));
        let by_symbol = d.atoms_by_symbol();
        assert_eq!(by_symbol.keys().copied().collect::<Vec<_>>(), vec!["Q", "R"]);
        assert_eq!(by_symbol["Q"].text, "speed > 5");
    }

    #[test]
    fn test_longest_match_first() {
        let d = decompose_ok("G(a + b > 0 -> a)\n\nInitialConditionRequirement a");
        let keys: Vec<(&str, &str)> = d
            .propositions
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();
        assert_eq!(keys, vec![("Q", "a + b > 0"), ("R", "a")]);
        assert_eq!(d.structure, "G(Q -> R)\n\nInitialConditionRequirement R");
        // `a` is replaced as a token only, never inside `a + b > 0`.
        assert_eq!(
            reconstruct(&d.structure, &d.propositions),
            "G((a + b > 0) -> a)\n\nInitialConditionRequirement a"
        );
    }

    #[test]
    fn test_round_trip() {
        let formulas = [
            "G((speed > 5) -> X(!(ack) U done))",
            "F=2 (x == 1) && G<=4 (y != z * 2)",
            "G(a <-> b) ^ Running",
        ];
        for formula in formulas {
            let d = decompose_ok(formula);
            let back = reconstruct(&d.structure, &d.propositions);
            assert!(identity(&parse(&back).unwrap(), &parse(formula).unwrap()), "{}", back);
        }
    }

    #[test]
    fn test_blank_and_invalid() {
        let ctx = SignalContext::new();
        let mut diagnostics = Diagnostics::new();
        assert_eq!(decompose("REQ-2", " \n ", &ctx, &mut diagnostics), Ok(None));
        let err = decompose("REQ-2", "G(a &&)", &ctx, &mut diagnostics).unwrap_err();
        assert!(matches!(err, FormalizeError::Parse { chunk: 0, .. }));
    }

    #[test]
    fn test_tokens_per_chunk() {
        let d = decompose_ok("G(speed > 5 -> ack)\n\nG(other)");
        let first: Vec<&str> = d.chunk_tokens[0].iter().map(|s| s.as_str()).collect();
        assert_eq!(first, vec!["speed", "ack"]);
        assert_eq!(d.chunk_tokens[1].len(), 1);
    }
}
