mod logging;
mod raise_error;

pub use logging::{Diagnostic, Diagnostics, Level, Logger};
pub use raise_error::raise_error;
