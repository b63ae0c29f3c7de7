use colored::*;
use std::fmt;

/// Severity of a message. Higher means more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Completion = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    /// Maps the numeric debug level used on the command line to a `Level`.
    pub fn from_i32(level: i32) -> Option<Level> {
        match level {
            1 => Some(Level::Completion),
            2 => Some(Level::Info),
            3 => Some(Level::Warning),
            4 => Some(Level::Error),
            5 => Some(Level::Fatal),
            _ => None,
        }
    }
}

/// Applies the formatting to the string based on the level
pub(crate) fn apply_level(string: &str, level: Level) -> ColoredString {
    match level {
        Level::Completion => ("completed: ".to_owned() + string).bright_green(),
        Level::Info => ("info: ".to_owned() + string).bright_cyan(),
        Level::Warning => ("warning: ".to_owned() + string).bright_yellow(),
        Level::Error => ("error: ".to_owned() + string).bright_red(),
        Level::Fatal => ("fatal error: ".to_owned() + string).red().bold(),
    }
}

/// A message produced while formalizing or rendering a requirement.
///
/// The engine never prints on its own; it pushes diagnostics into a
/// [`Diagnostics`] collector and the caller decides how to report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    /// Requirement the message refers to, if any.
    pub requirement: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.requirement {
            Some(id) => write!(f, "[{}] {}", id, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Collects diagnostics across pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { entries: Vec::new() }
    }

    pub fn push(&mut self, level: Level, requirement: Option<&str>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            level,
            requirement: requirement.map(str::to_owned),
            message: message.into(),
        };
        match level {
            Level::Completion | Level::Info => log::debug!("{}", diagnostic),
            Level::Warning => log::warn!("{}", diagnostic),
            Level::Error | Level::Fatal => log::error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn warn(&mut self, requirement: Option<&str>, message: impl Into<String>) {
        self.push(Level::Warning, requirement, message);
    }

    pub fn error(&mut self, requirement: Option<&str>, message: impl Into<String>) {
        self.push(Level::Error, requirement, message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// All diagnostics at `level` or above.
    pub fn at_least(&self, level: Level) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.level >= level)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.level == Level::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.level >= Level::Error)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy)]
pub struct Logger {
    level: Level,
    debug: bool,
}

impl Logger {
    pub fn new(debug: bool, level: Level) -> Logger {
        Logger { level, debug }
    }

    /// Prints a message when debugging is enabled and the level is high enough.
    /// Errors and fatal errors are always printed, to stderr.
    pub fn log(&self, message: &str, level: Level) {
        if level > Level::Warning {
            eprintln!("{}", apply_level(message, level));
            return;
        }
        if (level >= self.level) & self.debug {
            println!("{}", apply_level(message, level));
        }
    }

    /// Reports every collected diagnostic through this logger.
    /// Warnings are shown even without debug mode.
    pub fn report(&self, diagnostics: &Diagnostics) {
        for diagnostic in diagnostics.iter() {
            if diagnostic.level == Level::Warning {
                eprintln!("{}", apply_level(&diagnostic.to_string(), diagnostic.level));
            } else {
                self.log(&diagnostic.to_string(), diagnostic.level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Fatal > Level::Error);
        assert!(Level::Warning > Level::Info);
        assert_eq!(Level::from_i32(3), Some(Level::Warning));
        assert_eq!(Level::from_i32(9), None);
    }

    #[test]
    fn test_diagnostics_filtering() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Level::Info, None, "parsed");
        diagnostics.warn(Some("REQ-1"), "conflicting types");
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.warnings().count(), 1);
        assert!(!diagnostics.has_errors());

        diagnostics.error(Some("REQ-2"), "bad formula");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.at_least(Level::Warning).count(), 2);
        let first = diagnostics.warnings().next().unwrap();
        assert_eq!(first.to_string(), "[REQ-1] conflicting types");
    }
}
