use crate::{formal_properties, requirement_name, CStyle};
use expressions::form_to_exp::{is_temporal, next_depth, strip_globally};
use expressions::utils::{formula_to_string, is_simple_atom, predicate_to_string};
use expressions::{Formula, ScopeTag};
use formalizer::{EngineConfig, FormulaStore};
use indexmap::{IndexMap, IndexSet};
use ir::SignalContext;
use logging::Diagnostics;
use parser::Chunk;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertSection {
    /// Counter, latch and flag variables.
    Declarations,
    /// Statements run once per simulation step before the assertions.
    Counters,
    Asserts,
}

impl AssertSection {
    pub const ALL: [AssertSection; 3] = [
        AssertSection::Declarations,
        AssertSection::Counters,
        AssertSection::Asserts,
    ];
}

/// Generated C statements, grouped by where they are spliced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertBundle {
    sections: IndexMap<AssertSection, IndexSet<String>>,
}

impl Default for AssertBundle {
    fn default() -> Self {
        AssertBundle::new()
    }
}

impl AssertBundle {
    pub fn new() -> AssertBundle {
        AssertBundle {
            sections: AssertSection::ALL
                .iter()
                .map(|section| (*section, IndexSet::new()))
                .collect(),
        }
    }

    /// Adds a statement; a statement already present is kept once.
    pub fn add(&mut self, section: AssertSection, line: impl Into<String>) {
        self.sections.entry(section).or_default().insert(line.into());
    }

    pub fn lines(&self, section: AssertSection) -> impl Iterator<Item = &str> {
        self.sections
            .get(&section)
            .into_iter()
            .flat_map(|lines| lines.iter().map(String::as_str))
    }

    pub fn merge(&mut self, other: AssertBundle) {
        for (section, lines) in other.sections {
            self.sections.entry(section).or_default().extend(lines);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(IndexSet::is_empty)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssertError {
    #[error("no C assertion for `{what}` in `{formula}`")]
    Unsupported { what: String, formula: String },
}

/// Steps at which the trigger of a chunk is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    EveryStep,
    Initial,
    AfterInitial,
}

impl Scope {
    /// Guard on the step counter for a trigger observed `lag` frames late.
    fn guard(&self, step: &str, lag: u32) -> Option<String> {
        match (self, lag) {
            (Scope::EveryStep, 0) => None,
            (Scope::EveryStep, lag) => Some(format!("{} >= {}", step, lag)),
            (Scope::Initial, lag) => Some(format!("{} == {}", step, lag)),
            (Scope::AfterInitial, lag) => Some(format!("{} > {}", step, lag)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    /// Exactly at the delay.
    At,
    /// At least once in `delay..=delay + n`.
    Within(u32),
    /// At every step of `delay..=delay + n`.
    Always(u32),
}

/// Conclusion with its timing peeled off.
struct Timed<'f> {
    delay: u32,
    window: Window,
    core: &'f Formula,
}

/// Trigger condition: a step guard and the premise, either may be absent.
struct Trigger {
    guard: Option<String>,
    premise: Option<String>,
}

impl Trigger {
    fn condition(&self, leading: Option<String>) -> Option<String> {
        let mut parts: Vec<String> = leading.into_iter().chain(self.guard.clone()).collect();
        if let Some(premise) = &self.premise {
            if parts.is_empty() || is_simple_atom(premise) {
                parts.push(premise.clone());
            } else {
                parts.push(format!("({})", premise));
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" && "))
        }
    }
}

/// Prints propositional formulas as C expressions.
///
/// With a latch prefix, atoms outside `X` read the previous frame through a
/// `Prev_*` variable and atoms under `X` read the current frame.
struct CExpr<'a> {
    style: CStyle<'a>,
    latch_prefix: Option<String>,
    /// Current-frame expression to its latch variable.
    latches: IndexMap<String, String>,
}

impl<'a> CExpr<'a> {
    fn plain(ctx: &'a SignalContext) -> CExpr<'a> {
        CExpr {
            style: CStyle { ctx },
            latch_prefix: None,
            latches: IndexMap::new(),
        }
    }

    fn latched(ctx: &'a SignalContext, prefix: &str) -> CExpr<'a> {
        CExpr {
            latch_prefix: Some(prefix.to_string()),
            ..CExpr::plain(ctx)
        }
    }

    fn latch(&mut self, prefix: &str, current: String) -> String {
        let next = self.latches.len();
        self.latches
            .entry(current)
            .or_insert_with(|| format!("Prev_{}_{}", prefix, next))
            .clone()
    }

    /// Prints `f`; the error carries the first sub-formula C cannot express.
    fn print(&mut self, f: &Formula, shifted: bool, operand: bool) -> Result<String, String> {
        let text = match f {
            Formula::Const(b) => return Ok(b.to_string()),
            Formula::Atom(p) => {
                let current = predicate_to_string(&p.predicate, &self.style);
                let text = match (self.latch_prefix.clone(), shifted) {
                    (Some(prefix), false) => self.latch(&prefix, current),
                    _ => current,
                };
                if !operand || is_simple_atom(&text) {
                    return Ok(text);
                }
                text
            }
            Formula::Not(inner) => return Ok(format!("!{}", self.print(inner, shifted, true)?)),
            Formula::Next(inner) if self.latch_prefix.is_some() && !shifted => {
                return self.print(inner, true, operand)
            }
            Formula::And(l, r) => self.binary("&&", l, r, shifted)?,
            Formula::Or(l, r) => self.binary("||", l, r, shifted)?,
            Formula::Iff(l, r) => self.binary("==", l, r, shifted)?,
            Formula::Xor(l, r) => self.binary("!=", l, r, shifted)?,
            Formula::Implies(l, r) => format!(
                "!{} || {}",
                self.print(l, shifted, true)?,
                self.print(r, shifted, true)?
            ),
            other => return Err(formula_to_string(other)),
        };
        Ok(if operand { format!("({})", text) } else { text })
    }

    fn binary(&mut self, op: &str, l: &Formula, r: &Formula, shifted: bool) -> Result<String, String> {
        Ok(format!(
            "{} {} {}",
            self.print(l, shifted, true)?,
            op,
            self.print(r, shifted, true)?
        ))
    }
}

/// Peels `X`, `F=n`, `F<=n` and `G<=n` off a conclusion.
fn peel_conclusion(conclusion: &Formula) -> Result<Timed<'_>, String> {
    let mut delay = 0u32;
    let mut window = Window::At;
    let mut current = conclusion;
    loop {
        current = match current {
            Formula::Next(inner) => {
                delay = delay.saturating_add(1);
                &**inner
            }
            Formula::FinallyAt(n, inner) => {
                delay = delay.saturating_add(*n);
                &**inner
            }
            Formula::FinallyWithin(n, inner) | Formula::GloballyWithin(n, inner) => {
                if window != Window::At {
                    return Err(formula_to_string(current));
                }
                window = match current {
                    Formula::FinallyWithin(..) => Window::Within(*n),
                    _ => Window::Always(*n),
                };
                &**inner
            }
            _ => break,
        };
    }
    if is_temporal(current) {
        return Err(formula_to_string(current));
    }
    Ok(Timed {
        delay,
        window,
        core: current,
    })
}

/// C statements checking one chunk at simulation time.
///
/// # Arguments
/// * `name` - unique prefix of the generated variables
/// * `chunk` - the parsed chunk
/// * `ctx` - naming context for signals and enum literals
/// * `step` - name of the simulation step counter
pub fn chunk_asserts(
    name: &str,
    chunk: &Chunk,
    ctx: &SignalContext,
    step: &str,
) -> Result<AssertBundle, AssertError> {
    let source = formula_to_string(&chunk.formula);
    let unsupported = |what: String| AssertError::Unsupported {
        what,
        formula: source.clone(),
    };

    let (scope, body) = match (chunk.tag, strip_globally(&chunk.formula)) {
        (Some(ScopeTag::AfterInitialCondition), Some(inner)) => (Scope::AfterInitial, inner),
        (_, Some(inner)) => (Scope::EveryStep, inner),
        (Some(ScopeTag::AfterInitialCondition), None) => (Scope::AfterInitial, &chunk.formula),
        (_, None) => (Scope::Initial, &chunk.formula),
    };

    let mut bundle = AssertBundle::new();

    let (premise, conclusion) = match body {
        Formula::Iff(l, r) => {
            let mut printer = CExpr::plain(ctx);
            let l = printer.print(l, false, false).map_err(&unsupported)?;
            let r = printer.print(r, false, false).map_err(&unsupported)?;
            let guard = scope.guard(step, 0);
            for (premise, conclusion) in [(&l, &r), (&r, &l)] {
                let trigger = Trigger {
                    guard: guard.clone(),
                    premise: Some(premise.clone()),
                };
                bundle.add(AssertSection::Asserts, plain_assert(&trigger, conclusion));
            }
            return Ok(bundle);
        }
        Formula::Implies(p, c) => (Some(&**p), &**c),
        invariant => (None, invariant),
    };

    let timed = peel_conclusion(conclusion).map_err(&unsupported)?;
    let checked = CExpr::plain(ctx).print(timed.core, false, false).map_err(&unsupported)?;
    let mut delay = timed.delay;
    let mut latch_updates = Vec::new();

    let trigger = match premise {
        None => Trigger {
            guard: scope.guard(step, 0),
            premise: None,
        },
        Some(premise) if next_depth(premise) == 0 => Trigger {
            guard: scope.guard(step, 0),
            premise: Some(CExpr::plain(ctx).print(premise, false, false).map_err(&unsupported)?),
        },
        Some(premise) => {
            // The premise looks one step ahead, so it is only known one frame later.
            if next_depth(premise) > 1 {
                return Err(unsupported(formula_to_string(premise)));
            }
            if delay == 0 {
                return Err(unsupported(formula_to_string(conclusion)));
            }
            delay -= 1;

            let mut printer = CExpr::latched(ctx, name);
            let condition = printer.print(premise, false, false).map_err(&unsupported)?;
            let transition = format!("TransCondition_{}", name);
            bundle.add(AssertSection::Declarations, format!("bool {} = false;", transition));
            for (current, previous) in printer.latches {
                bundle.add(AssertSection::Declarations, format!("bool {} = false;", previous));
                latch_updates.push(format!("{} = {};", previous, current));
            }
            let observed = Trigger {
                guard: scope.guard(step, 1),
                premise: Some(condition),
            };
            bundle.add(
                AssertSection::Counters,
                format!(
                    "{} = {};",
                    transition,
                    observed.condition(None).unwrap_or_else(|| "true".to_string())
                ),
            );
            Trigger {
                guard: None,
                premise: Some(transition),
            }
        }
    };

    if delay == 0 && timed.window == Window::At {
        bundle.add(AssertSection::Asserts, plain_assert(&trigger, &checked));
    } else {
        let counter = format!("Counter_{}", name);
        bundle.add(AssertSection::Declarations, format!("int {} = -1;", counter));
        bundle.add(
            AssertSection::Counters,
            format!("if ({c} >= 0) {{ {c}++; }}", c = counter),
        );
        // An obligation still waiting for its delay is dropped once the premise goes false.
        if let (Some(premise), true) = (&trigger.premise, delay > 0) {
            bundle.add(
                AssertSection::Counters,
                format!(
                    "if ({c} >= 0 && {c} < {d} && {np}) {{ {c} = -1; }}",
                    c = counter,
                    d = delay,
                    np = negated(premise)
                ),
            );
        }
        let start = trigger
            .condition(Some(format!("{} < 0", counter)))
            .unwrap_or_else(|| format!("{} < 0", counter));
        bundle.add(
            AssertSection::Counters,
            format!("if ({}) {{ {} = 0; }}", start, counter),
        );
        bundle.add(AssertSection::Asserts, counter_assert(&counter, delay, timed.window, &checked));
    }

    // Latches take the current frame only after every check has read them.
    for update in latch_updates {
        bundle.add(AssertSection::Asserts, update);
    }
    Ok(bundle)
}

fn negated(condition: &str) -> String {
    if is_simple_atom(condition) {
        format!("!{}", condition)
    } else {
        format!("!({})", condition)
    }
}

fn plain_assert(trigger: &Trigger, conclusion: &str) -> String {
    match trigger.condition(None) {
        Some(condition) => format!("if ({}) {{ assert({}); }}", condition, conclusion),
        None => format!("assert({});", conclusion),
    }
}

fn counter_assert(counter: &str, delay: u32, window: Window, conclusion: &str) -> String {
    match window {
        Window::At => format!(
            "if ({c} == {d}) {{ assert({p}); {c} = -1; }}",
            c = counter,
            d = delay,
            p = conclusion
        ),
        Window::Always(n) => format!(
            "if ({c} >= {d}) {{ assert({p}); if ({c} >= {end}) {{ {c} = -1; }} }}",
            c = counter,
            d = delay,
            p = conclusion,
            end = delay.saturating_add(n)
        ),
        Window::Within(n) => format!(
            "if ({c} >= {d}) {{ if ({p}) {{ {c} = -1; }} else {{ assert({c} < {end}); }} }}",
            c = counter,
            d = delay,
            p = conclusion,
            end = delay.saturating_add(n)
        ),
    }
}

/// Assertions for every chunk of every formal property.
///
/// A chunk C cannot check is reported as a warning and leaves an
/// `/* Error: ... */` comment in the asserts.
pub fn store_asserts(
    store: &FormulaStore,
    ctx: &SignalContext,
    config: &EngineConfig,
    diagnostics: &mut Diagnostics,
) -> AssertBundle {
    let mut bundle = AssertBundle::new();
    for (id, entry) in formal_properties(store) {
        let base = requirement_name(id, ctx);
        for (k, chunk) in entry.decomposition.chunks.iter().enumerate() {
            let name = format!("{}_{}", base, k);
            match chunk_asserts(&name, chunk, ctx, &config.step_variable) {
                Ok(chunk_bundle) => bundle.merge(chunk_bundle),
                Err(e) => {
                    diagnostics.warn(Some(id), format!("chunk {}: {}", k, e));
                    let comment = e.to_string().replace("*/", "* /");
                    bundle.add(AssertSection::Asserts, format!("/* Error: {}: {} */", name, comment));
                }
            }
        }
    }
    log::debug!(
        "generated {} assert statement(s)",
        bundle.lines(AssertSection::Asserts).count()
    );
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use formalizer::{Formalizer, RequirementKind};
    use parser::parse_chunk;

    fn asserts_of(name: &str, text: &str) -> Result<AssertBundle, AssertError> {
        let ctx = SignalContext::new();
        chunk_asserts(name, &parse_chunk(text).unwrap(), &ctx, "i")
    }

    fn section(bundle: &AssertBundle, section: AssertSection) -> Vec<&str> {
        bundle.lines(section).collect()
    }

    #[test]
    fn test_bounded_response_counter() {
        let bundle = asserts_of("REQ_1_0", "G (req -> F=3(ack))").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Declarations),
            vec!["int Counter_REQ_1_0 = -1;"]
        );
        assert_eq!(
            section(&bundle, AssertSection::Counters),
            vec![
                "if (Counter_REQ_1_0 >= 0) { Counter_REQ_1_0++; }",
                "if (Counter_REQ_1_0 >= 0 && Counter_REQ_1_0 < 3 && !req) { Counter_REQ_1_0 = -1; }",
                "if (Counter_REQ_1_0 < 0 && req) { Counter_REQ_1_0 = 0; }",
            ]
        );
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec!["if (Counter_REQ_1_0 == 3) { assert(ack); Counter_REQ_1_0 = -1; }"]
        );

        let bundle = asserts_of("REQ_2_0", "G (speed > 5 && ready -> F=2 G<=1 (ack))").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Counters)[1],
            "if (Counter_REQ_2_0 >= 0 && Counter_REQ_2_0 < 2 && !((speed > 5) && ready)) { Counter_REQ_2_0 = -1; }"
        );
    }

    #[test]
    fn test_plain_shapes() {
        let bundle = asserts_of("A_0", "G(speed > 5 || stop -> !brake)").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec!["if ((speed > 5) || stop) { assert(!brake); }"]
        );
        assert!(section(&bundle, AssertSection::Declarations).is_empty());

        let bundle = asserts_of("B_0", "InitialConditionRequirement (speed == 0)").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec!["if (i == 0) { assert(speed == 0); }"]
        );

        let bundle = asserts_of("C_0", "G(ready)").unwrap();
        assert_eq!(section(&bundle, AssertSection::Asserts), vec!["assert(ready);"]);
    }

    #[test]
    fn test_equivalence_two_asserts() {
        let bundle = asserts_of("E_0", "G(a <-> b > 2)").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec!["if (a) { assert(b > 2); }", "if (b > 2) { assert(a); }"]
        );
    }

    #[test]
    fn test_within_after_initial() {
        let bundle = asserts_of("R_0", "AfterInitialConditionRequirement G(req -> F<=2 ack)").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Counters)[1],
            "if (Counter_R_0 < 0 && i > 0 && req) { Counter_R_0 = 0; }"
        );
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec!["if (Counter_R_0 >= 0) { if (ack) { Counter_R_0 = -1; } else { assert(Counter_R_0 < 2); } }"]
        );
    }

    #[test]
    fn test_transition_premise() {
        let bundle = asserts_of("T_0", "G(!start && X(start) -> X(G<=2 busy))").unwrap();
        assert_eq!(
            section(&bundle, AssertSection::Declarations),
            vec![
                "bool TransCondition_T_0 = false;",
                "bool Prev_T_0_0 = false;",
                "int Counter_T_0 = -1;",
            ]
        );
        assert_eq!(
            section(&bundle, AssertSection::Counters),
            vec![
                "TransCondition_T_0 = i >= 1 && (!Prev_T_0_0 && start);",
                "if (Counter_T_0 >= 0) { Counter_T_0++; }",
                "if (Counter_T_0 < 0 && TransCondition_T_0) { Counter_T_0 = 0; }",
            ]
        );
        assert_eq!(
            section(&bundle, AssertSection::Asserts),
            vec![
                "if (Counter_T_0 >= 0) { assert(busy); if (Counter_T_0 >= 2) { Counter_T_0 = -1; } }",
                "Prev_T_0_0 = start;",
            ]
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        let err = asserts_of("U_0", "G(req -> F(ack))").unwrap_err();
        assert_eq!(
            err,
            AssertError::Unsupported {
                what: "F(ack)".to_string(),
                formula: "G(req -> F(ack))".to_string(),
            }
        );
        let err = asserts_of("U_1", "G(a -> F<=2 G<=3 b)").unwrap_err();
        assert!(matches!(err, AssertError::Unsupported { what, .. } if what == "G<=3(b)"));
        assert!(asserts_of("U_2", "G(X(X(a)) -> X(X(X(b))))").is_err());
    }

    #[test]
    fn test_store_asserts_reports_unsupported() {
        let mut engine = Formalizer::new(SignalContext::new(), EngineConfig::default());
        engine.add_requirement("REQ-1", "G (req -> F=3(ack))", RequirementKind::Property);
        engine.add_requirement("REQ-2", "G(a -> (b U c))", RequirementKind::Property);
        engine.formalize_all();

        let mut diagnostics = Diagnostics::new();
        let bundle = store_asserts(engine.store(), engine.context(), engine.config(), &mut diagnostics);
        let asserts = section(&bundle, AssertSection::Asserts);
        assert_eq!(asserts.len(), 2);
        assert!(asserts[1].starts_with("/* Error: REQ_2_0: no C assertion for `b U c`"));
        assert_eq!(diagnostics.warnings().count(), 1);
    }
}
