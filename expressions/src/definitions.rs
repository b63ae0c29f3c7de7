// ***************** Definitions *****************

pub type Variable = String; // A variable is a string.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            ArithOp::Add | ArithOp::Sub => 1,
            ArithOp::Mul | ArithOp::Div | ArithOp::Mod => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    /// C-style spelling, which is also the canonical one.
    pub fn symbol(&self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }

    pub fn parse(op: &str) -> Option<RelOp> {
        match op {
            "==" | "=" => Some(RelOp::Eq),
            "!=" => Some(RelOp::Ne),
            "<" => Some(RelOp::Lt),
            "<=" | "≤" => Some(RelOp::Le),
            ">" => Some(RelOp::Gt),
            ">=" | "≥" => Some(RelOp::Ge),
            _ => None,
        }
    }
}

/// Arithmetic term inside an atomic proposition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Variable),
    /// Numeric literal kept as written (`5`, `2.5`).
    Number(String),
    Bool(bool),
    Neg(Box<Term>),
    Arith(ArithOp, Box<Term>, Box<Term>),
    Call(String, Vec<Term>),
}

/// Boolean content of an atomic proposition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// A boolean-valued term on its own (`ack`, `isValid(x)`).
    Holds(Term),
    Compare(Term, RelOp, Term),
}

/// An atomic proposition: its normalized source text plus the parsed predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proposition {
    pub text: String,
    pub predicate: Predicate,
}

impl Proposition {
    pub fn new(text: impl Into<String>, predicate: Predicate) -> Proposition {
        Proposition {
            text: text.into(),
            predicate,
        }
    }

    /// A proposition consisting of a single boolean variable.
    pub fn var(name: &str) -> Proposition {
        Proposition::new(name, Predicate::Holds(Term::Var(name.to_string())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// An LTL/MTL formula.
pub enum Formula {
    Const(bool),
    Atom(Proposition),
    Not(Box<Formula>),
    Next(Box<Formula>),
    Finally(Box<Formula>),
    Globally(Box<Formula>),
    /// `F=n φ`: φ holds exactly `n` steps from now.
    FinallyAt(u32, Box<Formula>),
    /// `F≤n φ`: φ holds at some step within the next `n` steps.
    FinallyWithin(u32, Box<Formula>),
    /// `G≤n φ`: φ holds at every step within the next `n` steps.
    GloballyWithin(u32, Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Xor(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    Until(Box<Formula>, Box<Formula>),
    Release(Box<Formula>, Box<Formula>),
    WeakUntil(Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn var(name: &str) -> Formula {
        Formula::Atom(Proposition::var(name))
    }

    pub fn not(f: Formula) -> Formula {
        Formula::Not(Box::new(f))
    }

    pub fn next(f: Formula) -> Formula {
        Formula::Next(Box::new(f))
    }

    pub fn globally(f: Formula) -> Formula {
        Formula::Globally(Box::new(f))
    }

    pub fn and(l: Formula, r: Formula) -> Formula {
        Formula::And(Box::new(l), Box::new(r))
    }

    pub fn or(l: Formula, r: Formula) -> Formula {
        Formula::Or(Box::new(l), Box::new(r))
    }

    pub fn implies(l: Formula, r: Formula) -> Formula {
        Formula::Implies(Box::new(l), Box::new(r))
    }

    pub fn iff(l: Formula, r: Formula) -> Formula {
        Formula::Iff(Box::new(l), Box::new(r))
    }
}

/// Keyword prefix that scopes an LTL chunk to the initial step or to every
/// step after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    InitialCondition,
    AfterInitialCondition,
}

impl ScopeTag {
    /// Longest keyword first: `AfterInitialConditionRequirement` ends with the other one.
    pub const ALL: [ScopeTag; 2] = [ScopeTag::AfterInitialCondition, ScopeTag::InitialCondition];

    pub fn keyword(&self) -> &'static str {
        match self {
            ScopeTag::InitialCondition => INITIAL_CONDITION_KEYWORD,
            ScopeTag::AfterInitialCondition => AFTER_INITIAL_CONDITION_KEYWORD,
        }
    }

    /// Splits a leading scope keyword off `text`.
    pub fn split(text: &str) -> (Option<ScopeTag>, &str) {
        let trimmed = text.trim_start();
        for tag in ScopeTag::ALL {
            if let Some(rest) = trimmed.strip_prefix(tag.keyword()) {
                return (Some(tag), rest);
            }
        }
        (None, text)
    }
}

pub const INITIAL_CONDITION_KEYWORD: &str = "InitialConditionRequirement";
pub const AFTER_INITIAL_CONDITION_KEYWORD: &str = "AfterInitialConditionRequirement";

/// Separates the LTL properties of one requirement.
pub const LTL_SEPARATOR: &str = "\n\n";

pub const TRUE_SYM: &str = "true";
pub const FALSE_SYM: &str = "false";
pub const NEG_SYM: &str = "!";
pub const AND_SYM: &str = "&&";
pub const OR_SYM: &str = "||";
pub const XOR_SYM: &str = "^";
pub const IMPL_SYM: &str = "->";
pub const IFF_SYM: &str = "<->";
pub const GLOBAL: &str = "G";
pub const EVENTUALLY: &str = "F";
pub const NEXT: &str = "X";
pub const UNTIL: &str = "U";
pub const RELEASE: &str = "V";
pub const WEAK_UNTIL: &str = "W";
