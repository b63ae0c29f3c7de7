use crate::{formal_properties, model_checker_formula, report_marker, requirement_name};
use expressions::form_to_exp::atoms;
use expressions::utils::{predicate_to_string, predicate_variables, render, TermStyle, SMV};
use expressions::{Predicate, RelOp};
use formalizer::{EngineConfig, FormulaStore};
use indexmap::IndexSet;
use ir::{DataType, SignalContext};
use logging::Diagnostics;

/// Word width assumed when the type string does not fix one.
pub const DEFAULT_WORD_WIDTH: u32 = 32;

struct SmvStyle<'a> {
    ctx: &'a SignalContext,
    /// `0sd16_`-like prefix for integer literals, if the proposition is word typed.
    literal_prefix: Option<String>,
}

impl TermStyle for SmvStyle<'_> {
    fn variable(&self, name: &str) -> String {
        match self.ctx.signal(name) {
            Some(signal) if signal.class.is_plant() => format!("{}.out", self.ctx.safe_name(name)),
            Some(_) => self.ctx.safe_name(name),
            None => name.to_string(),
        }
    }

    fn number(&self, literal: &str) -> String {
        match &self.literal_prefix {
            Some(prefix) if literal.chars().all(|c| c.is_ascii_digit()) => format!("{}{}", prefix, literal),
            _ => literal.to_string(),
        }
    }

    fn boolean(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn rel_op(&self, op: RelOp) -> &'static str {
        match op {
            RelOp::Eq => "=",
            op => op.symbol(),
        }
    }
}

/// Distinct declared types of the signals in a proposition, in order of use.
fn proposition_types(pred: &Predicate, ctx: &SignalContext) -> IndexSet<DataType> {
    predicate_variables(pred)
        .into_iter()
        .filter_map(|v| ctx.data_type(v))
        .collect()
}

/// Literal prefix taken from the first word-typed signal of a proposition.
fn literal_prefix(types: &IndexSet<DataType>) -> Option<String> {
    types.iter().find_map(|t| match t {
        DataType::Int { signed, width } => Some(format!(
            "0{}d{}_",
            if *signed { "s" } else { "u" },
            width.unwrap_or(DEFAULT_WORD_WIDTH)
        )),
        _ => None,
    })
}

/// One `LTLSPEC` line per chunk of every formal property.
///
/// A chunk whose bounded operators cannot be unrolled becomes a commented
/// line carrying the error marker. Propositions mixing several signal types
/// are reported in a single warning; the first type wins.
pub fn render_smv(
    store: &FormulaStore,
    ctx: &SignalContext,
    config: &EngineConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut mixed: IndexSet<String> = IndexSet::new();

    for (id, entry) in formal_properties(store) {
        let name = requirement_name(id, ctx);
        for (k, chunk) in entry.decomposition.chunks.iter().enumerate() {
            let formula = match model_checker_formula(chunk, config) {
                Ok(formula) => formula,
                Err(marker) => {
                    report_marker(diagnostics, id, k, &marker);
                    lines.push(format!("-- LTLSPEC NAME {}_{} := {}", name, k, marker));
                    continue;
                }
            };

            for atom in atoms(&formula) {
                if proposition_types(&atom.predicate, ctx).len() > 1 {
                    mixed.insert(atom.text.clone());
                }
            }

            let rendered = render(&formula, &SMV, &|p| {
                let style = SmvStyle {
                    ctx,
                    literal_prefix: literal_prefix(&proposition_types(&p.predicate, ctx)),
                };
                predicate_to_string(&p.predicate, &style)
            });
            match rendered {
                Ok(text) => lines.push(format!("LTLSPEC NAME {}_{} := {};", name, k, text)),
                Err(e) => {
                    report_marker(diagnostics, id, k, &e.to_string());
                    lines.push(format!("-- LTLSPEC NAME {}_{} := Error: {}", name, k, e));
                }
            }
        }
    }

    if !mixed.is_empty() {
        let list: Vec<&str> = mixed.iter().map(|s| s.as_str()).collect();
        diagnostics.warn(
            None,
            format!("propositions mix signal types, using the first type: {}", list.join("; ")),
        );
    }
    log::debug!("rendered {} LTLSPEC line(s)", lines.len());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use formalizer::{Formalizer, RequirementKind};
    use ir::signals;

    fn smv_of(ctx: SignalContext, requirements: &[(&str, &str)]) -> (Vec<String>, Diagnostics) {
        let mut engine = Formalizer::new(ctx, EngineConfig::default());
        for (id, formula) in requirements {
            engine.add_requirement(id, formula, RequirementKind::Property);
        }
        engine.formalize_all();
        let mut diagnostics = Diagnostics::new();
        let lines = render_smv(engine.store(), engine.context(), engine.config(), &mut diagnostics);
        (lines, diagnostics)
    }

    #[test]
    fn test_typed_literal_and_plant_suffix() {
        let ctx = signals! { Input speed: "int16_T" };
        let (lines, diagnostics) = smv_of(ctx, &[("REQ-1", "G (speed > 5)")]);
        assert_eq!(lines, vec!["LTLSPEC NAME REQ_1_0 := G(speed.out > 0sd16_5);"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_operators_and_parameters() {
        let ctx = signals! {
            Input mode: "uint8",
            Output ack: "boolean",
            Parameter limit: "int",
        };
        let (lines, _) = smv_of(
            ctx,
            &[("R2", "G(mode == 2 && limit > 1 -> F<=1 ack)\n\nAfterInitialConditionRequirement ack == true")],
        );
        assert_eq!(
            lines,
            vec![
                "LTLSPEC NAME R2_0 := G(((mode.out = 0ud8_2) & (limit > 0sd32_1)) -> (ack.out | X(ack.out)));",
                "LTLSPEC NAME R2_1 := X(G(ack.out = TRUE));",
            ]
        );
    }

    #[test]
    fn test_mixed_types_warn_once() {
        let ctx = signals! { Input a: "int16_T", Input b: "uint8", Input c: "double" };
        let (lines, diagnostics) = smv_of(ctx, &[("R3", "G(a > b)\n\nG(a < c)")]);
        assert_eq!(lines[0], "LTLSPEC NAME R3_0 := G(a.out > b.out);");
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_unresolvable_bound_marker() {
        let ctx = SignalContext::new();
        let mut engine = Formalizer::new(ctx, EngineConfig { max_unroll_steps: 4, ..EngineConfig::default() });
        engine.add_requirement("R4", "G(a -> F<=10 b)", RequirementKind::Property);
        engine.formalize_all();
        let mut diagnostics = Diagnostics::new();
        let lines = render_smv(engine.store(), engine.context(), engine.config(), &mut diagnostics);
        assert!(lines[0].starts_with("-- LTLSPEC NAME R4_0 := Error: unresolvable bounded operator F<=10"));
        assert!(diagnostics.has_errors());
    }
}
