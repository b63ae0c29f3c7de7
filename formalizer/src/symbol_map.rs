use indexmap::IndexMap;

/// Symbols handed out first, in this order.
pub const BASE_SYMBOLS: [&str; 6] = ["Q", "R", "P", "S", "T", "Z"];

/// Prefix of the numbered symbols used once the base list is exhausted.
pub const OVERFLOW_PREFIX: &str = "Y";

/// Hands out placeholder symbols for the propositions of one requirement.
///
/// Allocation restarts for every requirement, so `Q` names the longest
/// proposition of each requirement.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    issued: usize,
}

impl SymbolAllocator {
    pub fn new() -> SymbolAllocator {
        SymbolAllocator { issued: 0 }
    }

    pub fn next_symbol(&mut self) -> String {
        let symbol = match BASE_SYMBOLS.get(self.issued) {
            Some(base) => base.to_string(),
            None => format!("{}{:04}", OVERFLOW_PREFIX, self.issued - BASE_SYMBOLS.len()),
        };
        self.issued += 1;
        symbol
    }
}

/// True when `token` is a name [`SymbolAllocator`] can produce.
pub fn is_symbol(token: &str) -> bool {
    BASE_SYMBOLS.contains(&token)
        || token
            .strip_prefix(OVERFLOW_PREFIX)
            .map_or(false, |n| n.len() >= 4 && n.chars().all(|c| c.is_ascii_digit()))
}

/// Assigns a symbol to every distinct proposition, longest text first.
///
/// Ties keep the order of first occurrence. The returned map iterates in
/// allocation order.
///
/// # Arguments
/// * `texts` - proposition texts in order of occurrence, duplicates allowed
pub fn assign_symbols(texts: &[String]) -> IndexMap<String, String> {
    let mut distinct: Vec<&String> = Vec::new();
    for text in texts {
        if !distinct.contains(&text) {
            distinct.push(text);
        }
    }
    // Stable sort, so equally long texts stay in occurrence order.
    distinct.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut allocator = SymbolAllocator::new();
    distinct
        .into_iter()
        .map(|text| (text.clone(), allocator.next_symbol()))
        .collect()
}
