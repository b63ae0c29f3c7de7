use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

#[macro_use]
mod macros;

lazy_static! {
    static ref INT_TYPE: Regex = Regex::new(r"^(u)?int(8|16|32|64)?(?:_t)?$").unwrap();
    static ref INVALID_IDENT_CHAR: Regex = Regex::new(r"[^A-Za-z0-9_]").unwrap();
}

/// Words that cannot be used verbatim as identifiers in the generated C or SMV.
const RESERVED: [&str; 24] = [
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "float", "for", "if", "int", "long", "return", "switch", "while", "init", "next", "MODULE",
    "VAR", "TRUE", "FALSE",
];

/// Interface class a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceClass {
    Input,
    Output,
    Internal,
    Parameter,
}

impl InterfaceClass {
    pub fn parse(class: &str) -> Option<InterfaceClass> {
        match class.trim().to_ascii_lowercase().as_str() {
            "input" | "inputs" => Some(InterfaceClass::Input),
            "output" | "outputs" => Some(InterfaceClass::Output),
            "internal" | "internals" | "local" => Some(InterfaceClass::Internal),
            "parameter" | "parameters" | "param" => Some(InterfaceClass::Parameter),
            _ => None,
        }
    }

    /// Plant variables are every class but parameters; they live in the model
    /// under test and get the `.out` suffix in SMV.
    pub fn is_plant(&self) -> bool {
        !matches!(self, InterfaceClass::Parameter)
    }
}

/// Declared data type of a signal, interpreted from its type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    /// `width` is `None` when the type string does not fix it (`int`, `integer`).
    Int { signed: bool, width: Option<u32> },
    Real,
    Enum(String),
    Unknown(String),
}

impl DataType {
    /// Interprets a type string such as `int16_T`, `uint8`, `boolean_T`, `double`
    /// or the name of a registered enumeration.
    pub fn parse(raw: &str, is_enum: impl Fn(&str) -> bool) -> DataType {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix("Enum:").map(str::trim).unwrap_or(trimmed);
        if is_enum(name) {
            return DataType::Enum(name.to_string());
        }
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "bool" | "boolean" | "boolean_t" => return DataType::Bool,
            "double" | "single" | "float" | "real" => return DataType::Real,
            "integer" => return DataType::Int { signed: true, width: None },
            _ => {}
        }
        if let Some(caps) = INT_TYPE.captures(&lower) {
            let signed = caps.get(1).is_none();
            let width = caps.get(2).and_then(|w| w.as_str().parse::<u32>().ok());
            return DataType::Int { signed, width };
        }
        DataType::Unknown(trimmed.to_string())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "boolean"),
            DataType::Int { signed, width } => {
                let prefix = if *signed { "int" } else { "uint" };
                match width {
                    Some(w) => write!(f, "{}{}", prefix, w),
                    None => write!(f, "{}", prefix),
                }
            }
            DataType::Real => write!(f, "real"),
            DataType::Enum(name) => write!(f, "{}", name),
            DataType::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub class: InterfaceClass,
    /// Type string as declared on the interface.
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub literals: Vec<String>,
}

/// Collision-free rewriting of identifiers into target-legal names.
pub trait NameSanitizer {
    fn safe_name(&self, name: &str) -> String;
}

impl<F> NameSanitizer for F
where
    F: Fn(&str) -> String,
{
    fn safe_name(&self, name: &str) -> String {
        self(name)
    }
}

/// Default sanitizer: replaces characters that are not legal in C identifiers
/// and escapes reserved words with a trailing underscore.
#[derive(Debug, Clone, Copy, Default)]
pub struct CIdentifiers;

impl NameSanitizer for CIdentifiers {
    fn safe_name(&self, name: &str) -> String {
        let mut safe = INVALID_IDENT_CHAR.replace_all(name, "_").to_string();
        if safe.is_empty() || safe.starts_with(|c: char| c.is_ascii_digit()) {
            safe.insert(0, '_');
        }
        if RESERVED.contains(&safe.as_str()) {
            safe.push('_');
        }
        safe
    }
}

/// Naming and typing context of a requirement set: the known signals per
/// interface class, their declared types, the enumerations and the safe-name
/// transformer.
pub struct SignalContext {
    signals: IndexMap<String, Signal>,
    enums: IndexMap<String, EnumType>,
    sanitizer: Box<dyn NameSanitizer>,
}

impl fmt::Debug for SignalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalContext")
            .field("signals", &self.signals)
            .field("enums", &self.enums)
            .finish()
    }
}

impl Default for SignalContext {
    fn default() -> Self {
        SignalContext::new()
    }
}

impl SignalContext {
    pub fn new() -> SignalContext {
        SignalContext::with_sanitizer(CIdentifiers)
    }

    pub fn with_sanitizer(sanitizer: impl NameSanitizer + 'static) -> SignalContext {
        SignalContext {
            signals: IndexMap::new(),
            enums: IndexMap::new(),
            sanitizer: Box::new(sanitizer),
        }
    }

    /// Registers a signal. A second declaration of the same name replaces the first.
    pub fn declare(&mut self, name: &str, class: InterfaceClass, data_type: &str) {
        self.signals.insert(
            name.to_string(),
            Signal {
                name: name.to_string(),
                class,
                data_type: data_type.to_string(),
            },
        );
    }

    pub fn declare_enum<S: AsRef<str>>(&mut self, name: &str, literals: &[S]) {
        self.enums.insert(
            name.to_string(),
            EnumType {
                name: name.to_string(),
                literals: literals.iter().map(|l| l.as_ref().to_string()).collect(),
            },
        );
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    /// Ordered list of the signals declared in one interface class.
    pub fn signals_of(&self, class: InterfaceClass) -> impl Iterator<Item = &Signal> {
        self.signals.values().filter(move |s| s.class == class)
    }

    /// Parsed data type of a known signal.
    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.signals
            .get(name)
            .map(|s| DataType::parse(&s.data_type, |n| self.enums.contains_key(n)))
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Every enumeration declaring `literal`, in registration order.
    pub fn enums_with_literal(&self, literal: &str) -> Vec<&EnumType> {
        self.enums
            .values()
            .filter(|e| e.literals.iter().any(|l| l == literal))
            .collect()
    }

    pub fn is_enum_literal(&self, name: &str) -> bool {
        self.enums.values().any(|e| e.literals.iter().any(|l| l == name))
    }

    pub fn safe_name(&self, name: &str) -> String {
        self.sanitizer.safe_name(name)
    }
}
