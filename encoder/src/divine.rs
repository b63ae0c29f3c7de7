use crate::{formal_properties, model_checker_formula, report_marker, requirement_name, CStyle};
use expressions::utils::{predicate_to_string, render, DIVINE};
use formalizer::{EngineConfig, FormulaStore};
use ir::SignalContext;
use logging::Diagnostics;

/// DIVINE property file: one `#define` per proposition followed by one
/// `#property` per chunk, requirement by requirement.
pub fn render_divine(
    store: &FormulaStore,
    ctx: &SignalContext,
    config: &EngineConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let style = CStyle { ctx };
    let mut lines = Vec::new();

    for (id, entry) in formal_properties(store) {
        let name = requirement_name(id, ctx);
        let decomposition = &entry.decomposition;

        for (symbol, atom) in decomposition.atoms_by_symbol() {
            lines.push(format!(
                "#define {}_{} ({})",
                name,
                symbol,
                predicate_to_string(&atom.predicate, &style)
            ));
        }

        for (k, chunk) in decomposition.chunks.iter().enumerate() {
            let formula = match model_checker_formula(chunk, config) {
                Ok(formula) => formula,
                Err(marker) => {
                    report_marker(diagnostics, id, k, &marker);
                    lines.push(format!("// #property {}", marker));
                    continue;
                }
            };
            let rendered = render(&formula, &DIVINE, &|p| match decomposition.symbol_for(&p.text) {
                Some(symbol) => format!("{}_{}", name, symbol),
                None => predicate_to_string(&p.predicate, &style),
            });
            match rendered {
                Ok(text) => lines.push(format!("#property {}", text)),
                Err(e) => {
                    report_marker(diagnostics, id, k, &e.to_string());
                    lines.push(format!("// #property Error: {}", e));
                }
            }
        }
    }
    log::debug!("rendered {} DIVINE line(s)", lines.len());
    lines
}
