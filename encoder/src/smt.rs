use crate::{formal_properties, report_marker, requirement_name};
use expressions::bounded::expand_bounded;
use expressions::form_to_exp::strip_globally;
use expressions::utils::{formula_to_string, term_to_string, SourceStyle};
use expressions::{ArithOp, Formula, Predicate, RelOp, Term};
use formalizer::{ChunkRef, EngineConfig, FormulaStore};
use indexmap::{IndexMap, IndexSet};
use ir::{DataType, EnumType, SignalContext};
use logging::Diagnostics;
use std::fmt;

/// Prefix of a variable one time step later.
pub const SHIFT_PREFIX: &str = "x";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtType {
    Bool,
    Int,
    Real,
    Enum(String),
    /// Whatever the named variable turns out to be.
    SameAs(String),
    Unknown,
}

impl SmtType {
    pub fn from_data_type(data_type: &DataType) -> SmtType {
        match data_type {
            DataType::Bool => SmtType::Bool,
            DataType::Int { .. } => SmtType::Int,
            DataType::Real => SmtType::Real,
            DataType::Enum(name) => SmtType::Enum(name.clone()),
            DataType::Unknown(_) => SmtType::Unknown,
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, SmtType::SameAs(_) | SmtType::Unknown)
    }

    /// Combines two types seen for one variable: `Real` wins over `Int`,
    /// a concrete type wins over `SameAs`/`Unknown`, otherwise the first
    /// type is kept.
    pub fn merge(self, other: SmtType) -> SmtType {
        if self == other {
            return self;
        }
        match (self.is_concrete(), other.is_concrete()) {
            (false, true) => other,
            (true, true) if self == SmtType::Int && other == SmtType::Real => other,
            _ => self,
        }
    }
}

/// Consolidated types of the SMT variables, keyed by SMT name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmtTypeMap {
    types: IndexMap<String, SmtType>,
    /// Names of declared signals; never read as time-shifted copies.
    declared: IndexSet<String>,
}

impl SmtTypeMap {
    pub fn new() -> SmtTypeMap {
        SmtTypeMap::default()
    }

    pub fn declare(&mut self, name: &str) {
        self.declared.insert(name.to_string());
    }

    pub fn register(&mut self, name: &str, ty: SmtType) {
        match self.types.get_mut(name) {
            Some(existing) => {
                let seen = std::mem::replace(existing, SmtType::Unknown);
                *existing = seen.merge(ty);
            }
            None => {
                self.types.insert(name.to_string(), ty);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SmtType> {
        self.types.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SmtType)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// `xspeed` is the shifted copy of `speed` when `speed` is registered
    /// and `xspeed` is not a signal of its own.
    fn shifted_base(&self, name: &str) -> Option<&str> {
        if self.declared.contains(name) {
            return None;
        }
        let base = name.strip_prefix(SHIFT_PREFIX)?;
        self.types.get_key_value(base).map(|(key, _)| key.as_str())
    }

    /// Propagates types along `SameAs` links and between a variable and its
    /// shifted copies until nothing changes, then defaults what is left to
    /// `Int`. Returns the defaulted names.
    pub fn resolve(&mut self) -> Vec<String> {
        // Every pass fixes at least one name or stops.
        for _ in 0..=self.types.len() {
            let mut changed = false;
            let names: Vec<String> = self.types.keys().cloned().collect();
            for name in &names {
                let current = match self.types.get(name) {
                    Some(ty) if !ty.is_concrete() => ty.clone(),
                    _ => continue,
                };
                let shifted = format!("{}{}", SHIFT_PREFIX, name);
                let mut peers: Vec<&str> = Vec::new();
                if let SmtType::SameAs(other) = &current {
                    peers.push(other);
                }
                if let Some(base) = self.shifted_base(name) {
                    peers.push(base);
                }
                if self.types.contains_key(&shifted) && !self.declared.contains(&shifted) {
                    peers.push(&shifted);
                }
                let found = peers
                    .iter()
                    .filter_map(|peer| self.types.get(*peer))
                    .find(|ty| ty.is_concrete())
                    .cloned();
                if let Some(ty) = found {
                    self.types.insert(name.clone(), ty);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut defaulted = Vec::new();
        for (name, ty) in self.types.iter_mut() {
            if !ty.is_concrete() {
                *ty = SmtType::Int;
                defaulted.push(name.clone());
            }
        }
        defaulted
    }
}

/// SMT name of every `(enumeration, literal)` pair.
///
/// A literal shared by several enumerations keeps its name in the one with
/// the longest name (the earliest registered among equals); everywhere else
/// it becomes `<literal>_<Enum>`.
pub fn enum_literal_names(ctx: &SignalContext) -> IndexMap<(String, String), String> {
    let mut names = IndexMap::new();
    for enum_type in ctx.enums() {
        for literal in &enum_type.literals {
            let keeper = ctx
                .enums_with_literal(literal)
                .into_iter()
                .fold(None::<&EnumType>, |best, candidate| match best {
                    Some(best) if best.name.len() >= candidate.name.len() => Some(best),
                    _ => Some(candidate),
                });
            let name = match keeper {
                Some(keeper) if keeper.name != enum_type.name => format!("{}_{}", literal, enum_type.name),
                _ => literal.clone(),
            };
            names.insert((enum_type.name.clone(), literal.clone()), name);
        }
    }
    names
}

struct Translator<'a> {
    ctx: &'a SignalContext,
    literals: &'a IndexMap<(String, String), String>,
    /// Variables in order of use, with the type their use suggests.
    seen: Vec<(String, SmtType)>,
}

impl Translator<'_> {
    fn is_literal(&self, name: &str) -> bool {
        self.ctx.is_enum_literal(name) && !self.ctx.is_known(name)
    }

    fn shifted(&self, name: &str, shift: usize) -> String {
        format!("{}{}", SHIFT_PREFIX.repeat(shift), self.ctx.safe_name(name))
    }

    /// Enumeration a bare literal belongs to when nothing else tells.
    fn literal_enum(&self, literal: &str) -> Option<String> {
        self.literals
            .iter()
            .find(|((_, l), name)| l == literal && name.as_str() == literal)
            .map(|((e, _), _)| e.clone())
    }

    fn literal_name(&self, literal: &str, hint: Option<&str>) -> String {
        hint.and_then(|e| self.literals.get(&(e.to_string(), literal.to_string())))
            .cloned()
            .unwrap_or_else(|| literal.to_string())
    }

    fn note(&mut self, var: &str, shift: usize, inferred: SmtType) {
        if self.is_literal(var) {
            return;
        }
        let name = self.shifted(var, shift);
        let ty = match self.ctx.data_type(var) {
            Some(declared) => SmtType::from_data_type(&declared),
            None => match inferred {
                SmtType::SameAs(other) if other == name => SmtType::Unknown,
                inferred => inferred,
            },
        };
        self.seen.push((name, ty));
    }

    fn term_type(&self, term: &Term, shift: usize) -> SmtType {
        match term {
            Term::Var(v) if self.is_literal(v) => {
                self.literal_enum(v).map_or(SmtType::Unknown, SmtType::Enum)
            }
            Term::Var(v) => match self.ctx.data_type(v) {
                Some(declared) => SmtType::from_data_type(&declared),
                None => SmtType::SameAs(self.shifted(v, shift)),
            },
            Term::Number(n) if n.contains('.') => SmtType::Real,
            Term::Number(_) => SmtType::Int,
            Term::Bool(_) => SmtType::Bool,
            Term::Neg(inner) => self.term_type(inner, shift),
            Term::Arith(_, l, r) => self.term_type(l, shift).merge(self.term_type(r, shift)),
            Term::Call(..) => SmtType::Unknown,
        }
    }

    fn formula(&mut self, f: &Formula, shift: usize) -> Result<String, String> {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
            let text = match f {
                Formula::Const(b) => b.to_string(),
                Formula::Atom(p) => self.predicate(&p.predicate, shift)?,
                Formula::Not(a) => format!("(not {})", self.formula(a, shift)?),
                Formula::Next(a) => self.formula(a, shift + 1)?,
                Formula::And(l, r) => self.apply("and", l, r, shift)?,
                Formula::Or(l, r) => self.apply("or", l, r, shift)?,
                Formula::Xor(l, r) => self.apply("xor", l, r, shift)?,
                Formula::Implies(l, r) => self.apply("=>", l, r, shift)?,
                Formula::Iff(l, r) => self.apply("=", l, r, shift)?,
                other => return Err(formula_to_string(other)),
            };
            Ok(text)
        })
    }

    fn apply(&mut self, op: &str, l: &Formula, r: &Formula, shift: usize) -> Result<String, String> {
        Ok(format!("({} {} {})", op, self.formula(l, shift)?, self.formula(r, shift)?))
    }

    fn predicate(&mut self, pred: &Predicate, shift: usize) -> Result<String, String> {
        match pred {
            Predicate::Holds(t) => {
                if let Term::Var(v) = t {
                    self.note(v, shift, SmtType::Bool);
                }
                self.term(t, shift, None, false)
            }
            Predicate::Compare(l, op, r) => {
                let (lt, rt) = (self.term_type(l, shift), self.term_type(r, shift));
                if let Term::Var(v) = l {
                    self.note(v, shift, rt.clone());
                }
                if let Term::Var(v) = r {
                    self.note(v, shift, lt.clone());
                }
                let real = lt.clone().merge(rt.clone()) == SmtType::Real;
                let l = self.term(l, shift, enum_name(&rt), real)?;
                let r = self.term(r, shift, enum_name(&lt), real)?;
                Ok(match op {
                    RelOp::Eq => format!("(= {} {})", l, r),
                    RelOp::Ne => format!("(not (= {} {}))", l, r),
                    op => format!("({} {} {})", op.symbol(), l, r),
                })
            }
        }
    }

    /// `hint` names the enumeration a literal in this position belongs to;
    /// `real` is set when the surrounding arithmetic is over reals.
    fn term(&mut self, term: &Term, shift: usize, hint: Option<&str>, real: bool) -> Result<String, String> {
        match term {
            Term::Var(v) if self.is_literal(v) => Ok(self.literal_name(v, hint)),
            Term::Var(v) => {
                self.note(v, shift, SmtType::Unknown);
                Ok(self.shifted(v, shift))
            }
            Term::Number(n) if real && !n.contains('.') => Ok(format!("{}.0", n)),
            Term::Number(n) => Ok(n.clone()),
            Term::Bool(b) => Ok(b.to_string()),
            Term::Neg(inner) => Ok(format!("(- {})", self.term(inner, shift, hint, real)?)),
            Term::Arith(op, l, r) => {
                let real = real || self.term_type(term, shift) == SmtType::Real;
                let op = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div if real => "/",
                    ArithOp::Div => "div",
                    ArithOp::Mod => "mod",
                };
                Ok(format!(
                    "({} {} {})",
                    op,
                    self.term(l, shift, hint, real)?,
                    self.term(r, shift, hint, real)?
                ))
            }
            Term::Call(..) => Err(term_to_string(term, &SourceStyle)),
        }
    }
}

fn enum_name(ty: &SmtType) -> Option<&str> {
    match ty {
        SmtType::Enum(name) => Some(name),
        _ => None,
    }
}

/// An SMT-LIB consistency script: declarations, then one
/// `push`/`check-sat`/`pop` block per requirement group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmtScript {
    pub datatypes: Vec<String>,
    pub constants: Vec<String>,
    pub blocks: Vec<Vec<String>>,
    pub types: SmtTypeMap,
}

impl fmt::Display for SmtScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(set-logic ALL)")?;
        for line in self.datatypes.iter().chain(&self.constants) {
            writeln!(f, "{}", line)?;
        }
        for block in &self.blocks {
            writeln!(f, "(push 1)")?;
            for line in block {
                writeln!(f, "{}", line)?;
            }
            writeln!(f, "(check-sat)")?;
            writeln!(f, "(pop 1)")?;
        }
        Ok(())
    }
}

/// Translates the formal properties into SMT-LIB, one block per group.
///
/// Each chunk is checked at a single step: bounded operators are unrolled,
/// a leading `G` is dropped and `X` shifts variables to their `x`-prefixed
/// copies. Chunks that keep an unbounded temporal operator or call a
/// function are skipped with a warning.
pub fn build_smt(
    store: &FormulaStore,
    ctx: &SignalContext,
    config: &EngineConfig,
    groups: &[Vec<ChunkRef>],
    diagnostics: &mut Diagnostics,
) -> SmtScript {
    let literals = enum_literal_names(ctx);
    let mut translator = Translator {
        ctx,
        literals: &literals,
        seen: Vec::new(),
    };

    let mut asserts: IndexMap<ChunkRef, String> = IndexMap::new();
    for (id, entry) in formal_properties(store) {
        let name = requirement_name(id, ctx);
        for (k, chunk) in entry.decomposition.chunks.iter().enumerate() {
            let expanded = match expand_bounded(&chunk.formula, config.max_unroll_steps) {
                Ok(expanded) => expanded,
                Err(e) => {
                    report_marker(diagnostics, id, k, &format!("Error: {}", e));
                    continue;
                }
            };
            let body = strip_globally(&expanded).unwrap_or(&expanded);
            let mark = translator.seen.len();
            match translator.formula(body, 0) {
                Ok(text) => {
                    asserts.insert((id.clone(), k), format!("(assert (! {} :named {}_{}))", text, name, k));
                }
                Err(what) => {
                    translator.seen.truncate(mark);
                    diagnostics.warn(
                        Some(id),
                        format!("chunk {}: `{}` has no SMT-LIB translation, chunk skipped", k, what),
                    );
                }
            }
        }
    }

    let mut types = SmtTypeMap::new();
    for signal in ctx.signals() {
        types.declare(&ctx.safe_name(&signal.name));
    }
    for (name, ty) in translator.seen {
        types.register(&name, ty);
    }
    let defaulted = types.resolve();
    if !defaulted.is_empty() {
        diagnostics.warn(
            None,
            format!("no type inferred for {}, assuming Int", defaulted.join(", ")),
        );
    }

    let datatypes: Vec<String> = ctx
        .enums()
        .map(|e| {
            let constructors: Vec<String> = e
                .literals
                .iter()
                .map(|l| {
                    let name = literals.get(&(e.name.clone(), l.clone())).unwrap_or(l);
                    format!("({})", name)
                })
                .collect();
            format!(
                "(declare-datatypes (({} 0)) (({})))",
                ctx.safe_name(&e.name),
                constructors.join(" ")
            )
        })
        .collect();

    let constants: Vec<String> = types
        .iter()
        .map(|(name, ty)| {
            let sort = match ty {
                SmtType::Bool => "Bool".to_string(),
                SmtType::Real => "Real".to_string(),
                SmtType::Enum(e) => ctx.safe_name(e),
                _ => "Int".to_string(),
            };
            format!("(declare-const {} {})", name, sort)
        })
        .collect();

    let blocks: Vec<Vec<String>> = groups
        .iter()
        .map(|group| group.iter().filter_map(|c| asserts.get(c).cloned()).collect::<Vec<_>>())
        .filter(|block| !block.is_empty())
        .collect();

    log::debug!("{} SMT block(s) over {} variable(s)", blocks.len(), types.len());
    SmtScript {
        datatypes,
        constants,
        blocks,
        types,
    }
}
