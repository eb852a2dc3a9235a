//! Compiled trigger expression tree

use domus_core::{Value, ValueKind};
use std::fmt;

/// Comparison operator of a stable-event test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    /// Whether this operator only tests (in)equality
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    /// Apply the operator to `value OP literal`
    ///
    /// Uses `PartialOrd`, so numbers follow IEEE-754 (NaN compares unequal
    /// to everything).
    pub fn holds<T: PartialOrd + ?Sized>(&self, value: &T, literal: &T) -> bool {
        match self {
            CompareOp::Eq => value == literal,
            CompareOp::Ne => value != literal,
            CompareOp::Gt => value > literal,
            CompareOp::Lt => value < literal,
            CompareOp::Ge => value >= literal,
            CompareOp::Le => value <= literal,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a comparison, tagged with the kind it expects
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    String(String),
    Number(f64),
    Bool(bool),
    /// Presence test: no literal, checks whether the id has a value
    Unknown,
}

impl Operand {
    /// The value kind the resolved event value must have, `None` for
    /// presence tests which accept anything
    pub fn expected_kind(&self) -> Option<ValueKind> {
        match self {
            Operand::String(_) => Some(ValueKind::String),
            Operand::Number(_) => Some(ValueKind::Number),
            Operand::Bool(_) => Some(ValueKind::Bool),
            Operand::Unknown => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::String(s) => write!(f, "{}", Value::String(s.clone())),
            Operand::Number(n) => write!(f, "{}", Value::Number(*n)),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Unknown => f.write_str("unknown"),
        }
    }
}

/// Stable-event comparison leaf: `id OP operand`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub id: String,
    pub op: CompareOp,
    pub operand: Operand,
    /// Source line of the comparison, reported in type errors
    pub line: usize,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.op, self.operand)
    }
}

/// Node of the compiled expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    /// Matches arrival of the token's id or any id below it
    Transient(String),
    Compare(Comparison),
}

impl Expr {
    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Expr::Or(children) | Expr::And(children) => {
                for child in children {
                    child.collect_ids(ids);
                }
            }
            Expr::Not(child) => child.collect_ids(ids),
            Expr::Transient(token) => ids.push(token),
            Expr::Compare(c) => ids.push(&c.id),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, wrap: bool) -> fmt::Result {
        if wrap {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    child.fmt_operand(f, matches!(child, Expr::Or(_)))?;
                }
                Ok(())
            }
            Expr::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" & ")?;
                    }
                    child.fmt_operand(f, matches!(child, Expr::Or(_) | Expr::And(_)))?;
                }
                Ok(())
            }
            Expr::Not(child) => {
                f.write_str("!")?;
                child.fmt_operand(f, matches!(**child, Expr::Or(_) | Expr::And(_) | Expr::Not(_)))
            }
            Expr::Transient(token) => f.write_str(token),
            Expr::Compare(c) => write!(f, "{}", c),
        }
    }
}

/// A compiled rule trigger
///
/// Built once when the rule is loaded, immutable afterwards and safe to
/// evaluate from many threads at once.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCondition {
    source: String,
    root: Expr,
}

impl TriggerCondition {
    pub(crate) fn new(source: impl Into<String>, root: Expr) -> Self {
        Self {
            source: source.into(),
            root,
        }
    }

    /// The text this condition was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Every id referenced by the condition, in source order
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.root.collect_ids(&mut ids);
        ids
    }
}

/// Canonical textual form; compiles back to an equivalent condition
impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
