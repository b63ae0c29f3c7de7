pub mod bounded;
pub mod definitions;
pub mod form_to_exp;
pub mod parens;
pub mod utils;

pub use bounded::{expand_bounded, DEFAULT_MAX_UNROLL};
pub use definitions::*;
pub use parens::{balance_parenthesis, remove_redundant_parentheses, trim_outermost_balanced_parentheses};
pub use utils::{formula_to_string, render, Dialect};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("unbalanced parentheses in `{fragment}` (left with `{partial}`)")]
    Unbalanced { fragment: String, partial: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("unresolvable bounded operator {operator}: bound exceeds {limit} steps")]
    BoundTooLarge { operator: String, limit: u32 },

    #[error("unresolvable bounded operator {operator}: expansion needs {nodes} nodes (limit {limit})")]
    TooLarge {
        operator: String,
        nodes: usize,
        limit: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("bounded operator {0} must be expanded before rendering")]
    UnexpandedBound(String),
}
