pub mod grouping;
pub mod normalize;
pub mod store;
pub mod structure;
pub mod symbol_map;

pub use grouping::{group_requirements, is_dependent_on_group, GroupingMode};
pub use store::{ChunkRef, Entry, FormulaStore, RequirementId, RequirementKind, Status};
pub use structure::{decompose, reconstruct, Decomposition};

use expressions::DEFAULT_MAX_UNROLL;
use ir::SignalContext;
use logging::Diagnostics;
use parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormalizeError {
    #[error("unknown requirement `{0}`")]
    UnknownRequirement(String),

    #[error("{requirement}: chunk {chunk}: {source}")]
    Parse {
        requirement: String,
        chunk: usize,
        source: ParseError,
    },

    #[error("{requirement}: proposition `{proposition}` spans two LTL properties")]
    CrossFormula {
        requirement: String,
        proposition: String,
    },

    #[error("cannot render structure: {0}")]
    Render(String),
}

/// Engine settings shared by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Largest bound a bounded operator may be unrolled to.
    pub max_unroll_steps: u32,
    /// Simulation step counter used by the C assertions.
    pub step_variable: String,
    pub grouping: GroupingMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_unroll_steps: DEFAULT_MAX_UNROLL,
            step_variable: "i".to_string(),
            grouping: GroupingMode::Independent,
        }
    }
}

/// Owns the store, the naming context and the collected diagnostics of one
/// formalization pass.
#[derive(Debug)]
pub struct Formalizer {
    store: FormulaStore,
    ctx: SignalContext,
    config: EngineConfig,
    diagnostics: Diagnostics,
}

impl Formalizer {
    pub fn new(ctx: SignalContext, config: EngineConfig) -> Formalizer {
        Formalizer {
            store: FormulaStore::new(),
            ctx,
            config,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn store(&self) -> &FormulaStore {
        &self.store
    }

    pub fn context(&self) -> &SignalContext {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn add_requirement(&mut self, id: &str, formula: &str, kind: RequirementKind) {
        self.store.insert(id, formula, kind);
    }

    /// Formalizes one requirement. A failure marks only this requirement as
    /// erroneous and is recorded as a diagnostic.
    pub fn formalize(&mut self, id: &str) -> bool {
        let formula = match self.store.get(id) {
            Some(entry) => entry.formula.clone(),
            None => {
                self.diagnostics
                    .error(Some(id), FormalizeError::UnknownRequirement(id.to_string()).to_string());
                return false;
            }
        };
        match self
            .store
            .update_structure(id, &formula, &self.ctx, &mut self.diagnostics)
        {
            Ok(()) => true,
            Err(e) => {
                log::info!("{} is not formal: {}", id, e);
                self.store.set_status(id, Status::Error(e.to_string()));
                self.diagnostics.error(Some(id), e.to_string());
                false
            }
        }
    }

    /// Formalizes every requirement in store order and returns how many
    /// succeeded.
    pub fn formalize_all(&mut self) -> usize {
        let ids: Vec<RequirementId> = self.store.ids().cloned().collect();
        ids.iter().filter(|id| self.formalize(id)).count()
    }

    pub fn groups(&self) -> Vec<Vec<ChunkRef>> {
        group_requirements(&self.store, self.config.grouping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::signals;

    #[test]
    fn test_failure_isolation() {
        let ctx = signals! { Input speed: "int16_T" };
        let mut engine = Formalizer::new(ctx, EngineConfig::default());
        engine.add_requirement("OK-1", "G(speed > 5 -> F<=2 ack)", RequirementKind::Property);
        engine.add_requirement("BAD", "G(speed > )", RequirementKind::Property);
        engine.add_requirement("OK-2", "G(ack)", RequirementKind::Property);

        assert_eq!(engine.formalize_all(), 2);
        assert!(engine.store().get("OK-1").unwrap().is_formal());
        assert!(engine.store().get("OK-2").unwrap().is_formal());
        let rendered = engine.store().rendered_formula("BAD").unwrap();
        assert!(rendered.starts_with("Error: BAD: chunk 0: syntax error"), "{}", rendered);
        assert!(engine.diagnostics().has_errors());

        let groups = engine.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_unroll_steps, 256);
        assert_eq!(config.step_variable, "i");
        assert_eq!(config.grouping, GroupingMode::Independent);
    }
}
