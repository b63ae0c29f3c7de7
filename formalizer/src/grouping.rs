use crate::store::{ChunkRef, FormulaStore};

/// How formal properties are batched for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingMode {
    /// Split into groups that share no proposition tokens.
    #[default]
    Independent,
    /// A system model is present: everything is checked together.
    CorrectnessCheck,
}

/// True when `candidate` shares a dependency token with any member of `group`.
pub fn is_dependent_on_group(store: &FormulaStore, candidate: &ChunkRef, group: &[ChunkRef]) -> bool {
    let tokens = match store.chunk_tokens(candidate) {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => return false,
    };
    group.iter().any(|member| {
        store
            .chunk_tokens(member)
            .map_or(false, |other| !tokens.is_disjoint(other))
    })
}

/// Partitions the chunks of every formal property into verification groups.
///
/// A group is seeded with the first ungrouped chunk and grows by repeated
/// passes over the remaining chunks until a full pass adds nothing. Every
/// chunk lands in exactly one group and no group is empty.
pub fn group_requirements(store: &FormulaStore, mode: GroupingMode) -> Vec<Vec<ChunkRef>> {
    let mut ungrouped = store.formal_chunks();
    if ungrouped.is_empty() {
        return Vec::new();
    }
    if mode == GroupingMode::CorrectnessCheck {
        return vec![ungrouped];
    }

    let mut groups = Vec::new();
    while !ungrouped.is_empty() {
        let mut group = vec![ungrouped.remove(0)];
        // Each pass either shrinks `ungrouped` or ends the group.
        loop {
            let mut added = false;
            let mut i = 0;
            while i < ungrouped.len() {
                if is_dependent_on_group(store, &ungrouped[i], &group) {
                    group.push(ungrouped.remove(i));
                    added = true;
                } else {
                    i += 1;
                }
            }
            if !added {
                break;
            }
        }
        log::debug!("verification group {} with {} chunk(s)", groups.len(), group.len());
        groups.push(group);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RequirementKind;
    use ir::SignalContext;
    use logging::Diagnostics;

    fn store_of(requirements: &[(&str, &str, RequirementKind)]) -> FormulaStore {
        let ctx = SignalContext::new();
        let mut diagnostics = Diagnostics::new();
        let mut store = FormulaStore::new();
        for (id, formula, kind) in requirements {
            store.insert(id, formula, *kind);
            store.update_structure(id, formula, &ctx, &mut diagnostics).unwrap();
        }
        store
    }

    fn ids(group: &[ChunkRef]) -> Vec<&str> {
        group.iter().map(|(id, _)| id.as_str()).collect()
    }

    #[test]
    fn test_shared_token_groups() {
        let store = store_of(&[
            ("A", "G(x > 0 -> y)", RequirementKind::Property),
            ("C", "G(z)", RequirementKind::Property),
            ("B", "G(x > 0 -> w)", RequirementKind::Property),
        ]);
        let groups = group_requirements(&store, GroupingMode::Independent);
        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["A", "B"]);
        assert_eq!(ids(&groups[1]), vec!["C"]);
    }

    #[test]
    fn test_transitive_dependency() {
        // C links A and B only through its own tokens.
        let store = store_of(&[
            ("A", "G(a)", RequirementKind::Property),
            ("B", "G(b)", RequirementKind::Property),
            ("C", "G(a -> b)", RequirementKind::Property),
            ("D", "G(d)", RequirementKind::Deadlock),
        ]);
        let groups = group_requirements(&store, GroupingMode::Independent);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_partition_covers_every_chunk() {
        let store = store_of(&[
            ("A", "G(p)\n\nG(q)", RequirementKind::Property),
            ("B", "G(q -> r)\n\nG(true)", RequirementKind::Property),
        ]);
        let groups = group_requirements(&store, GroupingMode::Independent);
        let mut all: Vec<ChunkRef> = groups.iter().flatten().cloned().collect();
        all.sort();
        let mut expected = store.formal_chunks();
        expected.sort();
        assert_eq!(all, expected);
        assert!(groups.iter().all(|g| !g.is_empty()));
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_correctness_check_single_group() {
        let store = store_of(&[
            ("A", "G(a)", RequirementKind::Property),
            ("B", "G(b)", RequirementKind::Property),
        ]);
        let groups = group_requirements(&store, GroupingMode::CorrectnessCheck);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(group_requirements(&FormulaStore::new(), GroupingMode::CorrectnessCheck).is_empty());
    }
}
