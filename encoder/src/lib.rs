pub mod asserts;
pub mod divine;
pub mod smt;
pub mod smv;
pub mod splice;

pub use asserts::{chunk_asserts, store_asserts, AssertBundle, AssertError, AssertSection};
pub use divine::render_divine;
pub use smt::{build_smt, enum_literal_names, SmtScript, SmtType, SmtTypeMap};
pub use smv::render_smv;
pub use splice::{splice_generated, standalone_source, SpliceError};

use expressions::bounded::expand_bounded;
use expressions::utils::TermStyle;
use expressions::{Formula, ScopeTag};
use formalizer::{EngineConfig, Entry};
use ir::SignalContext;
use logging::Diagnostics;
use parser::Chunk;

/// Spells propositions as C expressions: signals by safe name, enum literals
/// as written.
pub struct CStyle<'a> {
    pub ctx: &'a SignalContext,
}

impl TermStyle for CStyle<'_> {
    fn variable(&self, name: &str) -> String {
        if self.ctx.is_enum_literal(name) && !self.ctx.is_known(name) {
            name.to_string()
        } else {
            self.ctx.safe_name(name)
        }
    }
}

/// Safe name of a requirement, usable as an identifier prefix.
pub fn requirement_name(id: &str, ctx: &SignalContext) -> String {
    ctx.safe_name(id)
}

/// The formula a model checker sees for one chunk: scope applied and bounded
/// operators unrolled. An unrolling failure is returned as the marker text.
pub fn model_checker_formula(chunk: &Chunk, config: &EngineConfig) -> Result<Formula, String> {
    let scoped = match chunk.tag {
        // Every step after the first.
        Some(ScopeTag::AfterInitialCondition) => Formula::next(Formula::globally(chunk.formula.clone())),
        _ => chunk.formula.clone(),
    };
    expand_bounded(&scoped, config.max_unroll_steps).map_err(|e| format!("Error: {}", e))
}

/// Formal properties of the store with their entries, in store order.
pub(crate) fn formal_properties<'a>(
    store: &'a formalizer::FormulaStore,
) -> impl Iterator<Item = (&'a String, &'a Entry)> {
    store
        .iter()
        .filter(|(_, e)| e.is_formal() && e.kind == formalizer::RequirementKind::Property)
}

/// Reports a chunk whose bound could not be unrolled.
pub(crate) fn report_marker(diagnostics: &mut Diagnostics, id: &str, chunk: usize, marker: &str) {
    diagnostics.error(Some(id), format!("chunk {}: {}", chunk, marker));
}
