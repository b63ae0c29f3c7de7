mod input;

use anyhow::{bail, Context};
use clap::Parser;
use encoder::{
    build_smt, render_divine, render_smv, splice_generated, standalone_source, store_asserts,
};
use expressions::{DEFAULT_MAX_UNROLL, LTL_SEPARATOR};
use formalizer::{ChunkRef, EngineConfig, Formalizer, FormulaStore, GroupingMode};
use ir::{CIdentifiers, NameSanitizer};
use logging::{raise_error, Level, Logger};
use std::fs;
use std::path::{Path, PathBuf};

/// Formalizes LTL/MTL requirements and renders them for model checkers,
/// SMT solvers and simulation asserts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Requirements table (`id,formula[,kind]`)
    #[arg(short = 'r', long)]
    requirements: PathBuf,

    /// Signal table (`name,class,type`)
    #[arg(short = 's', long)]
    signals: Option<PathBuf>,

    /// Enumeration table (`name,literals`, literals separated by `|`)
    #[arg(short = 'e', long)]
    enums: Option<PathBuf>,

    /// Directory receiving the generated artifacts
    #[arg(short = 'o', long, default_value = "out")]
    out_dir: PathBuf,

    /// C source whose generated blocks receive the asserts
    #[arg(short = 'c', long)]
    c_file: Option<PathBuf>,

    /// Check every property in one group (a system model is present)
    #[arg(long)]
    single_group: bool,

    /// Largest bound a bounded operator may be unrolled to
    #[arg(long, default_value_t = DEFAULT_MAX_UNROLL)]
    max_unroll: u32,

    /// Simulation step counter used by the C asserts
    #[arg(long, default_value = "i")]
    step_var: String,

    /// Print progress messages
    #[arg(short = 'd', long)]
    debug: bool,

    /// Minimum level of progress messages (1 = completion .. 5 = fatal)
    #[arg(long, default_value_t = 3)]
    debug_level: i32,
}

impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        if Level::from_i32(self.debug_level).is_none() {
            bail!("--debug-level must be between 1 and 5, got {}", self.debug_level);
        }
        if self.max_unroll == 0 {
            bail!("--max-unroll must be positive");
        }
        if CIdentifiers.safe_name(&self.step_var) != self.step_var {
            bail!("--step-var `{}` is not a C identifier", self.step_var);
        }
        if let Some(c_file) = &self.c_file {
            if !c_file.is_file() {
                bail!("--c-file {} does not exist", c_file.display());
            }
        }
        Ok(())
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_unroll_steps: self.max_unroll,
            step_variable: self.step_var.clone(),
            grouping: if self.single_group {
                GroupingMode::CorrectnessCheck
            } else {
                GroupingMode::Independent
            },
        }
    }
}

fn write_lines(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Per requirement: its structure and symbol table, or the failure reason.
fn structure_report(store: &FormulaStore) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, entry) in store.iter() {
        if !entry.is_formal() {
            let rendered = store.rendered_formula(id).unwrap_or_default();
            lines.push(format!("{}: {}", id, rendered));
            continue;
        }
        let decomposition = &entry.decomposition;
        lines.push(format!("{}: {}", id, decomposition.structure.replace(LTL_SEPARATOR, " ; ")));
        for (symbol, text) in &decomposition.propositions {
            lines.push(format!("    {} = {}", symbol, text));
        }
    }
    lines
}

fn group_report(groups: &[Vec<ChunkRef>]) -> Vec<String> {
    groups
        .iter()
        .enumerate()
        .map(|(g, group)| {
            let members: Vec<String> = group.iter().map(|(id, k)| format!("{}_{}", id, k)).collect();
            format!("group {}: {}", g, members.join(" "))
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    args.validate()?;

    // validate() guarantees the level is in range
    let level = Level::from_i32(args.debug_level).unwrap_or(Level::Warning);
    let logger = Logger::new(args.debug, level);

    let ctx = input::load_context(args.signals.as_deref(), args.enums.as_deref())?;
    let requirements = input::load_requirements(&args.requirements)?;
    logger.log(&format!("read {} requirement(s)", requirements.len()), Level::Info);

    let mut engine = Formalizer::new(ctx, args.engine_config());
    for requirement in &requirements {
        engine.add_requirement(&requirement.id, &requirement.formula, requirement.kind);
    }
    let formal = engine.formalize_all();
    logger.log(
        &format!("{} of {} requirement(s) formalized", formal, requirements.len()),
        Level::Info,
    );
    let groups = engine.groups();

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let mut diagnostics = engine.diagnostics().clone();
    let (store, ctx, config) = (engine.store(), engine.context(), engine.config());

    let smv = render_smv(store, ctx, config, &mut diagnostics);
    write_lines(&args.out_dir.join("requirements.smv"), &smv)?;

    let divine = render_divine(store, ctx, config, &mut diagnostics);
    write_lines(&args.out_dir.join("requirements.ltl"), &divine)?;

    let smt = build_smt(store, ctx, config, &groups, &mut diagnostics);
    let smt_path = args.out_dir.join("requirements.smt2");
    fs::write(&smt_path, smt.to_string())
        .with_context(|| format!("failed to write {}", smt_path.display()))?;

    write_lines(&args.out_dir.join("structure.txt"), &structure_report(store))?;
    write_lines(&args.out_dir.join("groups.txt"), &group_report(&groups))?;

    let bundle = store_asserts(store, ctx, config, &mut diagnostics);
    match &args.c_file {
        Some(c_file) => {
            let source = fs::read_to_string(c_file)
                .with_context(|| format!("failed to read {}", c_file.display()))?;
            let spliced = splice_generated(&source, &bundle)
                .with_context(|| format!("cannot splice asserts into {}", c_file.display()))?;
            fs::write(c_file, spliced)
                .with_context(|| format!("failed to write {}", c_file.display()))?;
        }
        None => {
            let path = args.out_dir.join("asserts.c");
            let text = standalone_source(&config.step_variable, &bundle)?;
            fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    logger.report(&diagnostics);
    if formal == 0 && !requirements.is_empty() {
        raise_error("no requirement could be formalized", Level::Fatal);
    }
    logger.log(
        &format!("artifacts written to {}", args.out_dir.display()),
        Level::Completion,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formalizer::RequirementKind;

    fn args() -> Args {
        Args::parse_from(["ltl-formalizer", "-r", "requirements.csv"])
    }

    #[test]
    fn test_defaults() {
        let args = args();
        assert_eq!(args.out_dir, PathBuf::from("out"));
        assert_eq!(args.max_unroll, DEFAULT_MAX_UNROLL);
        assert!(args.validate().is_ok());
        assert_eq!(args.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_flags() {
        let mut bad = args();
        bad.debug_level = 7;
        assert!(bad.validate().is_err());

        let mut bad = args();
        bad.step_var = "step count".to_string();
        assert!(bad.validate().is_err());

        let mut bad = args();
        bad.c_file = Some(PathBuf::from("/nonexistent/model.c"));
        assert!(bad.validate().is_err());

        let single = Args::parse_from(["ltl-formalizer", "-r", "r.csv", "--single-group"]);
        assert_eq!(single.engine_config().grouping, GroupingMode::CorrectnessCheck);
    }

    #[test]
    fn test_reports() {
        let mut engine = Formalizer::new(ir::SignalContext::new(), EngineConfig::default());
        engine.add_requirement("A", "G(a -> b)", RequirementKind::Property);
        engine.add_requirement("B", "G(a -> )", RequirementKind::Property);
        engine.formalize_all();

        let structure = structure_report(engine.store());
        assert_eq!(structure[0], "A: G(Q -> R)");
        assert_eq!(structure[1..3], ["    Q = a".to_string(), "    R = b".to_string()]);
        assert!(structure[3].starts_with("B: Error: "), "{}", structure[3]);

        assert_eq!(group_report(&engine.groups()), vec!["group 0: A_0"]);
    }
}
