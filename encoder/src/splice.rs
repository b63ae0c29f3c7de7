use crate::asserts::{AssertBundle, AssertSection};
use thiserror::Error;

pub const INCLUDES_MARKER: &str = "// Generated includes:";
pub const ASSERTS_MARKER: &str = "// Generated asserts:";
pub const END_MARKER: &str = "// End generated";

const INCLUDES: [&str; 2] = ["#include <assert.h>", "#include <stdbool.h>"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("marker `{0}` not found")]
    MissingMarker(String),
}

/// Replaces the generated blocks of a C source by the statements of `bundle`.
///
/// Everything between a begin marker line and the next `// End generated`
/// is rewritten, so splicing the same bundle twice gives the same text.
pub fn splice_generated(source: &str, bundle: &AssertBundle) -> Result<String, SpliceError> {
    let includes: Vec<&str> = INCLUDES
        .iter()
        .copied()
        .chain(bundle.lines(AssertSection::Declarations))
        .collect();
    let asserts: Vec<&str> = bundle
        .lines(AssertSection::Counters)
        .chain(bundle.lines(AssertSection::Asserts))
        .collect();

    let source = replace_block(source, INCLUDES_MARKER, &includes)?;
    replace_block(&source, ASSERTS_MARKER, &asserts)
}

/// A C file holding nothing but the generated checks, run once per step.
pub fn standalone_source(step: &str, bundle: &AssertBundle) -> Result<String, SpliceError> {
    let template = format!(
        "{inc}\n{end}\n\nvoid check_requirements(int {step})\n{{\n    {asserts}\n    {end}\n}}\n",
        inc = INCLUDES_MARKER,
        asserts = ASSERTS_MARKER,
        end = END_MARKER,
        step = step
    );
    splice_generated(&template, bundle)
}

fn replace_block(source: &str, begin: &str, body: &[&str]) -> Result<String, SpliceError> {
    let start = source
        .find(begin)
        .ok_or_else(|| SpliceError::MissingMarker(begin.to_string()))?;
    let missing_end = || SpliceError::MissingMarker(END_MARKER.to_string());

    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let indent = &source[line_start..start];
    let indent = if indent.trim().is_empty() { indent } else { "" };

    let body_start = source[start..]
        .find('\n')
        .map(|i| start + i + 1)
        .ok_or_else(missing_end)?;
    let end = source[body_start..]
        .find(END_MARKER)
        .map(|i| body_start + i)
        .ok_or_else(missing_end)?;
    let end_line_start = source[..end].rfind('\n').map_or(body_start, |i| i + 1).max(body_start);

    let mut spliced = String::with_capacity(source.len());
    spliced.push_str(&source[..body_start]);
    for line in body {
        spliced.push_str(indent);
        spliced.push_str(line);
        spliced.push('\n');
    }
    spliced.push_str(&source[end_line_start..]);
    Ok(spliced)
}
