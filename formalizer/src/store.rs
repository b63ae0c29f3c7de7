use crate::structure::{decompose, Decomposition};
use crate::FormalizeError;
use indexmap::{IndexMap, IndexSet};
use ir::SignalContext;
use logging::Diagnostics;

/// Stable identifier of a requirement, independent of its position.
pub type RequirementId = String;

/// One LTL chunk of one requirement.
pub type ChunkRef = (RequirementId, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Property,
    /// Deadlock checks are formalized but never grouped.
    Deadlock,
}

impl RequirementKind {
    pub fn parse(kind: &str) -> Option<RequirementKind> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "" | "property" | "requirement" => Some(RequirementKind::Property),
            "deadlock" => Some(RequirementKind::Deadlock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pending,
    Formal,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub formula: String,
    pub kind: RequirementKind,
    pub status: Status,
    pub decomposition: Decomposition,
}

impl Entry {
    pub fn is_formal(&self) -> bool {
        self.status == Status::Formal
    }
}

/// Per-requirement formalization results, keyed by requirement identifier.
#[derive(Debug, Default)]
pub struct FormulaStore {
    entries: IndexMap<RequirementId, Entry>,
}

impl FormulaStore {
    pub fn new() -> FormulaStore {
        FormulaStore {
            entries: IndexMap::new(),
        }
    }

    /// Adds a requirement, or replaces the formula of a known one. Either way
    /// the requirement is pending again.
    pub fn insert(&mut self, id: &str, formula: &str, kind: RequirementKind) {
        let entry = self.entries.entry(id.to_string()).or_insert_with(|| Entry {
            formula: String::new(),
            kind,
            status: Status::Pending,
            decomposition: Decomposition::default(),
        });
        entry.formula = formula.to_string();
        entry.kind = kind;
        entry.status = Status::Pending;
    }

    /// Removing a requirement leaves every other entry where it was.
    pub fn remove(&mut self, id: &str) -> Option<Entry> {
        self.entries.shift_remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &RequirementId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RequirementId, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decomposes `formula` into the structure of requirement `id` and marks
    /// it formal. A blank formula leaves the stored structure untouched.
    pub fn update_structure(
        &mut self,
        id: &str,
        formula: &str,
        ctx: &SignalContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), FormalizeError> {
        if !self.entries.contains_key(id) {
            return Err(FormalizeError::UnknownRequirement(id.to_string()));
        }
        let decomposition = match decompose(id, formula, ctx, diagnostics)? {
            Some(d) => d,
            None => return Ok(()),
        };
        if let Some(entry) = self.entries.get_mut(id) {
            entry.decomposition = decomposition;
            entry.status = Status::Formal;
        }
        Ok(())
    }

    pub fn set_status(&mut self, id: &str, status: Status) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.status = status;
        }
    }

    /// Formula text as shown to the user; failed requirements read
    /// `Error: <reason>`.
    pub fn rendered_formula(&self, id: &str) -> Option<String> {
        self.entries.get(id).map(|entry| match &entry.status {
            Status::Error(reason) => format!("Error: {}", reason),
            _ => entry.formula.clone(),
        })
    }

    /// Every chunk of every formal property, in store order.
    pub fn formal_chunks(&self) -> Vec<ChunkRef> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_formal() && e.kind == RequirementKind::Property)
            .flat_map(|(id, e)| (0..e.decomposition.chunks.len()).map(move |k| (id.clone(), k)))
            .collect()
    }

    /// Dependency tokens of one chunk.
    pub fn chunk_tokens(&self, chunk: &ChunkRef) -> Option<&IndexSet<String>> {
        self.entries
            .get(&chunk.0)
            .and_then(|e| e.decomposition.chunk_tokens.get(chunk.1))
    }
}
