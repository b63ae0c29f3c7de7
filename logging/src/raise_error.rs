use crate::logging::{apply_level, Level};
use std::process::exit;

/// Raises an error and exits the program
/// level Completion: completion
/// level Info: info
/// level Warning: warning
/// level Error: error
/// level Fatal: fatal error
///
/// Only the binary calls this; library code reports through `Diagnostics`.
///
/// # Arguments
///
/// * `error` - A string slice that holds the error message
/// * `level` - The error level, anything above `Warning` exits
pub fn raise_error(error: &str, level: Level) {
    eprintln!("{}", apply_level(error, level));
    if level > Level::Warning {
        exit(1);
    }
}
