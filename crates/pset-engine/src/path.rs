//! Path expressions
//!
//! Paths are built with operators on labels:
//!
//! - `a * b` runs `a` then `b`; `b` only runs if `a` did not reject
//! - `a + b` groups `a` and `b` as independent members
//! - `!a` negates a filter decision (written `~a` on the wire)
//!
//! `*` binds tighter than `+` and both are left-associative. Neither is
//! commutative. Nested sequences and nested groups are flattened so equal
//! expressions have equal structure.

use std::fmt;
use std::ops::{Add, Mul, Not};

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Expression tree over module and sequence labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathExpr {
    Leaf(String),
    Not(Box<PathExpr>),
    Seq(Vec<PathExpr>),
    Group(Vec<PathExpr>),
}

/// Path expression naming a single module or sequence
pub fn module(label: impl Into<String>) -> PathExpr {
    PathExpr::Leaf(label.into())
}

impl PathExpr {
    /// An expression with no members
    pub fn empty() -> Self {
        Self::Seq(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Seq(items) | Self::Group(items) => items.is_empty(),
            Self::Not(inner) => inner.is_empty(),
            Self::Leaf(_) => false,
        }
    }

    /// Sequence combinator, equivalent to `a * b`
    pub fn seq(self, next: impl Into<PathExpr>) -> Self {
        let mut items = match self {
            Self::Seq(items) => items,
            other if other.is_empty() => Vec::new(),
            other => vec![other],
        };
        match next.into() {
            Self::Seq(more) => items.extend(more),
            other if other.is_empty() => {}
            other => items.push(other),
        }
        Self::normalize(Self::Seq(items))
    }

    /// Grouping combinator, equivalent to `a + b`
    pub fn group(self, other: impl Into<PathExpr>) -> Self {
        let mut items = match self {
            Self::Group(items) => items,
            expr if expr.is_empty() => Vec::new(),
            expr => vec![expr],
        };
        match other.into() {
            Self::Group(more) => items.extend(more),
            expr if expr.is_empty() => {}
            expr => items.push(expr),
        }
        Self::normalize(Self::Group(items))
    }

    /// Negation combinator, equivalent to `!a`. Negating nothing is nothing.
    pub fn negate(self) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        Self::Not(Box::new(self))
    }

    /// Collapse single-member sequences and groups
    fn normalize(self) -> Self {
        match self {
            Self::Seq(mut items) | Self::Group(mut items) if items.len() == 1 => {
                items.remove(0)
            }
            other => other,
        }
    }

    /// Every leaf label, left to right, with whether it sits under a negation
    pub fn leaves(&self) -> Vec<(&str, bool)> {
        let mut out = Vec::new();
        self.collect_leaves(false, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, negated: bool, out: &mut Vec<(&'a str, bool)>) {
        match self {
            Self::Leaf(label) => out.push((label.as_str(), negated)),
            Self::Not(inner) => inner.collect_leaves(!negated, out),
            Self::Seq(items) | Self::Group(items) => {
                for item in items {
                    item.collect_leaves(negated, out);
                }
            }
        }
    }

    /// Leaf labels, left to right
    pub fn labels(&self) -> Vec<&str> {
        self.leaves().into_iter().map(|(label, _)| label).collect()
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Group(_) => 1,
            Self::Seq(_) => 2,
            Self::Not(_) | Self::Leaf(_) => 3,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min && !self.is_empty() {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(label) => f.write_str(label),
            Self::Not(inner) if inner.is_empty() => Ok(()),
            Self::Not(inner) => {
                f.write_str("~")?;
                inner.fmt_operand(f, 3)
            }
            Self::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" * ")?;
                    }
                    item.fmt_operand(f, 3)?;
                }
                Ok(())
            }
            Self::Group(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    item.fmt_operand(f, 2)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for PathExpr {
    fn from(label: &str) -> Self {
        Self::Leaf(label.to_string())
    }
}

impl From<String> for PathExpr {
    fn from(label: String) -> Self {
        Self::Leaf(label)
    }
}

impl From<&Node> for PathExpr {
    fn from(node: &Node) -> Self {
        Self::Leaf(node.display_name().to_string())
    }
}

impl<T: Into<PathExpr>> Mul<T> for PathExpr {
    type Output = PathExpr;

    fn mul(self, rhs: T) -> PathExpr {
        self.seq(rhs)
    }
}

impl<T: Into<PathExpr>> Add<T> for PathExpr {
    type Output = PathExpr;

    fn add(self, rhs: T) -> PathExpr {
        self.group(rhs)
    }
}

impl Not for PathExpr {
    type Output = PathExpr;

    fn not(self) -> PathExpr {
        self.negate()
    }
}

/// Whether a named expression is a Path or an EndPath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathKind {
    Path,
    EndPath,
}

impl PathKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::EndPath => "endpath",
        }
    }
}

/// A named path or end path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDef {
    pub kind: PathKind,
    pub expr: PathExpr,
}

/// Unordered set of labels that run unscheduled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    members: Vec<String>,
}

impl Task {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut task = Self::default();
        for member in members {
            task.add(member);
        }
        task
    }

    /// Add a member; duplicates are ignored
    pub fn add(&mut self, member: impl Into<String>) {
        let member = member.into();
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }
}

/// Explicit execution order of paths and end paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub paths: Vec<String>,
    pub tasks: Vec<String>,
}

impl Schedule {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            tasks: Vec::new(),
        }
    }

    /// Attach tasks whose members run unscheduled
    pub fn with_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks = tasks.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_flattens() {
        let expr = module("a") * "b" * "c";
        assert_eq!(
            expr,
            PathExpr::Seq(vec![module("a"), module("b"), module("c")])
        );
        assert_eq!(module("a") * (module("b") * "c"), expr);
        assert_eq!(expr.to_string(), "a * b * c");
    }

    #[test]
    fn test_star_binds_tighter_than_plus() {
        let expr = module("a") * "b" + module("c") * "d";
        assert_eq!(expr.to_string(), "a * b + c * d");
        match &expr {
            PathExpr::Group(items) => assert_eq!(items.len(), 2),
            other => panic!("expected group, got {other:?}"),
        }

        let nested = module("a") * (module("b") + "c");
        assert_eq!(nested.to_string(), "a * (b + c)");
    }

    #[test]
    fn test_not_commutative() {
        assert_ne!(module("a") * "b", module("b") * "a");
        assert_ne!(module("a") + "b", module("b") + "a");
    }

    #[test]
    fn test_negation() {
        let expr = !module("filter") * "producer";
        assert_eq!(expr.to_string(), "~filter * producer");
        assert_eq!(expr.leaves(), vec![("filter", true), ("producer", false)]);

        let grouped = !(module("a") * "b");
        assert_eq!(grouped.to_string(), "~(a * b)");
    }

    #[test]
    fn test_empty_members_are_dropped() {
        let expr = PathExpr::empty() * "a";
        assert_eq!(expr, module("a"));
        assert!(PathExpr::empty().is_empty());
        assert_eq!(PathExpr::empty().to_string(), "");
    }

    #[test]
    fn test_negating_nothing_is_empty() {
        let negated = !PathExpr::empty();
        assert!(negated.is_empty());
        assert_eq!(negated.to_string(), "");
        assert_eq!(negated * "a", module("a"));

        let raw = PathExpr::Not(Box::new(PathExpr::empty()));
        assert!(raw.is_empty());
        assert_eq!(raw.to_string(), "");
        assert_eq!(module("a") + raw, module("a"));
    }

    #[test]
    fn test_task_dedups() {
        let task = Task::new(["a", "b", "a"]);
        assert_eq!(task.members(), &["a".to_string(), "b".to_string()]);
    }
}
