use anyhow::Context;
use csv::{ReaderBuilder, Trim};
use formalizer::RequirementKind;
use ir::{InterfaceClass, SignalContext};
use log::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

/// Separates the literals of an enumeration inside one CSV field.
const LITERAL_SEPARATOR: char = '|';

#[derive(Debug, Deserialize)]
struct SignalRecord {
    name: String,
    class: String,
    #[serde(rename = "type")]
    data_type: String,
}

#[derive(Debug, Deserialize)]
struct EnumRecord {
    name: String,
    literals: String,
}

#[derive(Debug, Deserialize)]
struct RequirementRecord {
    id: String,
    formula: String,
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub id: String,
    pub formula: String,
    pub kind: RequirementKind,
}

fn read_records<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    rdr.deserialize()
        .enumerate()
        .map(|(i, record)| {
            record.with_context(|| format!("{}: malformed record {}", path.display(), i + 1))
        })
        .collect()
}

/// Builds the naming context from the enumeration and signal tables.
/// Enumerations are registered first so signal types can name them.
pub fn load_context(signals: Option<&Path>, enums: Option<&Path>) -> anyhow::Result<SignalContext> {
    let mut ctx = SignalContext::new();

    if let Some(path) = enums {
        for record in read_records::<EnumRecord>(path)? {
            let literals: Vec<&str> = record
                .literals
                .split(LITERAL_SEPARATOR)
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect();
            debug!("enum {} with {} literal(s)", record.name, literals.len());
            ctx.declare_enum(&record.name, &literals);
        }
    }

    if let Some(path) = signals {
        for record in read_records::<SignalRecord>(path)? {
            let class = InterfaceClass::parse(&record.class).with_context(|| {
                format!("{}: unknown interface class `{}` of {}", path.display(), record.class, record.name)
            })?;
            ctx.declare(&record.name, class, &record.data_type);
        }
    }
    Ok(ctx)
}

pub fn load_requirements(path: &Path) -> anyhow::Result<Vec<Requirement>> {
    read_records::<RequirementRecord>(path)?
        .into_iter()
        .map(|record| {
            let kind = RequirementKind::parse(&record.kind).with_context(|| {
                format!("{}: unknown kind `{}` of {}", path.display(), record.kind, record.id)
            })?;
            Ok(Requirement {
                id: record.id,
                formula: record.formula,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::DataType;
    use std::fs;
    use std::path::PathBuf;

    /// A temporary table, removed again when dropped.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(name: &str, contents: &str) -> Scratch {
            let path = std::env::temp_dir().join(format!("ltl-formalizer-{}-{}", std::process::id(), name));
            fs::write(&path, contents).unwrap();
            Scratch(path)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn test_load_context() {
        let enums = Scratch::new("enums.csv", "name,literals\nMode, Idle | Run |Fault\n");
        let signals = Scratch::new(
            "signals.csv",
            "name,class,type\nspeed,Input,int16_T\nmode, Output ,Mode\nlimit,Parameter,double\n",
        );
        let ctx = load_context(Some(&signals.0), Some(&enums.0)).unwrap();

        assert_eq!(ctx.enum_type("Mode").unwrap().literals, vec!["Idle", "Run", "Fault"]);
        assert_eq!(ctx.signal("mode").unwrap().class, InterfaceClass::Output);
        assert_eq!(ctx.data_type("mode"), Some(DataType::Enum("Mode".to_string())));
        assert!(ctx.is_known("limit"));
        assert!(ctx.is_enum_literal("Run"));
    }

    #[test]
    fn test_unknown_class_is_reported() {
        let signals = Scratch::new("bad-signals.csv", "name,class,type\nspeed,Sensor,int16_T\n");
        let err = load_context(Some(&signals.0), None).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown interface class `Sensor` of speed"));
    }

    #[test]
    fn test_load_requirements() {
        let table = Scratch::new(
            "requirements.csv",
            "id,formula,kind\nREQ-1,\"G(a -> F<=2 b)\n\nInitialConditionRequirement a\",\nREQ-2,G(c),deadlock\n",
        );
        let requirements = load_requirements(&table.0).unwrap();
        assert_eq!(requirements.len(), 2);
        assert_eq!(requirements[0].id, "REQ-1");
        assert_eq!(requirements[0].formula, "G(a -> F<=2 b)\n\nInitialConditionRequirement a");
        assert_eq!(requirements[0].kind, RequirementKind::Property);
        assert_eq!(requirements[1].kind, RequirementKind::Deadlock);

        let kept = table.0.clone();
        drop(table);
        assert!(!kept.exists());
    }

    #[test]
    fn test_missing_file() {
        let err = load_requirements(Path::new("/nonexistent/requirements.csv")).unwrap_err();
        assert!(err.to_string().starts_with("failed to open"));
    }
}
