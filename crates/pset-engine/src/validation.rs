//! Process validation
//!
//! Hard findings fail fast with the first [`ConfigError`]. Soft findings
//! (local InputTags that do not resolve) are collected as
//! [`ValidationWarning`]s, logged, and never fail the build.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SerializeOptions;
use crate::error::{ConfigError, Result};
use crate::node::{check_class_param, CLASS_PARAM};
use crate::path::{PathExpr, PathKind};
use crate::process::{check_member_role, check_name, Process, ProcessState};
use crate::types::{InputTag, Value, ValueKind};

/// A soft validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWarning {
    /// An InputTag names a local module label that is not registered
    UnresolvedInputTag { path: String, label: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedInputTag { path, label } => write!(
                f,
                "InputTag at '{}' refers to '{}', which is not a registered label",
                path, label
            ),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Temp,
    Perm,
}

/// Depth-first cycle check over a name graph
fn dfs<'a>(
    v: &'a str,
    children: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Result<()> {
    if let Some(Mark::Perm) = marks.get(v) {
        return Ok(());
    }
    if let Some(Mark::Temp) = marks.get(v) {
        stack.push(v);
        return Err(ConfigError::CycleDetected(stack.join(" -> ")));
    }

    marks.insert(v, Mark::Temp);
    stack.push(v);

    if let Some(kids) = children.get(v) {
        for k in kids {
            dfs(*k, children, marks, stack)?;
        }
    }

    stack.pop();
    marks.insert(v, Mark::Perm);
    Ok(())
}

fn check_acyclic<'a>(children: &HashMap<&'a str, Vec<&'a str>>, order: &[&'a str]) -> Result<()> {
    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for root in order {
        stack.clear();
        dfs(*root, children, &mut marks, &mut stack)?;
    }
    Ok(())
}

impl Process {
    /// Apply eras and validate with default options
    pub fn validate(&mut self) -> Result<Vec<ValidationWarning>> {
        self.validate_with(&SerializeOptions::default())
    }

    /// Apply pending era modifiers, then check the whole process.
    ///
    /// Validation is idempotent; a serialized process can still be checked.
    pub fn validate_with(&mut self, opts: &SerializeOptions) -> Result<Vec<ValidationWarning>> {
        self.apply_era_modifiers()?;
        let warnings = self.check(opts)?;
        if self.state != ProcessState::Serialized {
            self.set_state(ProcessState::Validated);
        }
        Ok(warnings)
    }

    /// The checks themselves; never mutates
    pub(crate) fn check(&self, opts: &SerializeOptions) -> Result<Vec<ValidationWarning>> {
        check_name("process name", &self.name)?;
        if self.source.is_none() {
            return Err(ConfigError::not_found("process.source"));
        }
        for node in self.nodes() {
            let class = node.get(CLASS_PARAM).and_then(check_class_param);
            class.map_err(|e| e.prefixed(node.display_name()).prefixed("process"))?;
        }
        self.check_sequences()?;
        self.check_paths()?;
        self.check_tasks()?;
        self.check_schedule()?;
        self.check_top_level_kinds()?;

        let warnings = if opts.check_input_tags {
            self.unresolved_input_tags()
        } else {
            Vec::new()
        };
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        Ok(warnings)
    }

    fn check_sequences(&self) -> Result<()> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, expr) in &self.sequences {
            let mut kids = Vec::new();
            for label in expr.labels() {
                if self.sequences.contains_key(label) {
                    kids.push(label);
                } else if !self.modules.contains_key(label) {
                    return Err(ConfigError::UnresolvedLabel {
                        label: label.to_string(),
                        referrer: name.clone(),
                    });
                }
            }
            children.insert(name.as_str(), kids);
        }
        let order: Vec<&str> = self.sequences.keys().map(String::as_str).collect();
        check_acyclic(&children, &order)
    }

    /// Expand sequences and check every module against the path's roles
    fn check_paths(&self) -> Result<()> {
        for (name, def) in &self.paths {
            self.check_expr(name, def.kind, &def.expr, false)?;
        }
        Ok(())
    }

    fn check_expr(&self, owner: &str, kind: PathKind, expr: &PathExpr, negated: bool) -> Result<()> {
        for (label, leaf_negated) in expr.leaves() {
            let negated = negated != leaf_negated;
            if let Some(node) = self.modules.get(label) {
                check_member_role(owner, Some(kind), label, node.role(), negated)?;
            } else if let Some(sequence) = self.sequences.get(label) {
                self.check_expr(owner, kind, sequence, negated)?;
            } else {
                return Err(ConfigError::UnresolvedLabel {
                    label: label.to_string(),
                    referrer: owner.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_tasks(&self) -> Result<()> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, task) in &self.tasks {
            let mut kids = Vec::new();
            for member in task.members() {
                if self.tasks.contains_key(member) {
                    kids.push(member.as_str());
                    continue;
                }
                let resolves = self.modules.contains_key(member)
                    || self
                        .keyed
                        .iter()
                        .any(|((_, class, _), n)| class == member || n.label() == Some(member.as_str()));
                if !resolves {
                    return Err(ConfigError::UnresolvedLabel {
                        label: member.clone(),
                        referrer: name.clone(),
                    });
                }
            }
            children.insert(name.as_str(), kids);
        }
        let order: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        check_acyclic(&children, &order)
    }

    fn check_schedule(&self) -> Result<()> {
        let Some(schedule) = &self.schedule else {
            return Ok(());
        };
        let mut seen: Vec<&str> = Vec::new();
        for name in &schedule.paths {
            if !self.paths.contains_key(name) {
                return Err(ConfigError::UnresolvedLabel {
                    label: name.clone(),
                    referrer: "schedule".to_string(),
                });
            }
            if seen.contains(&name.as_str()) {
                return Err(ConfigError::role_conflict(
                    name,
                    "listed more than once on the schedule",
                ));
            }
            seen.push(name);
        }
        for name in &schedule.tasks {
            if !self.tasks.contains_key(name) {
                return Err(ConfigError::UnresolvedLabel {
                    label: name.clone(),
                    referrer: "schedule".to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_top_level_kinds(&self) -> Result<()> {
        let expected = [
            ("maxEvents", "input", ValueKind::Int32),
            ("options", "numberOfThreads", ValueKind::UInt32),
            ("options", "numberOfStreams", ValueKind::UInt32),
        ];
        for (pset, name, kind) in expected {
            let Ok(top) = self.pset(pset) else {
                continue;
            };
            let Ok(param) = top.get(name) else {
                continue;
            };
            if param.kind() != kind {
                return Err(ConfigError::type_mismatch(
                    format!("process.{}.{}", pset, name),
                    kind.type_name(),
                    param.kind().type_name(),
                ));
            }
        }
        Ok(())
    }

    /// A tag is local when it names no process or this process
    fn is_unresolved_local(&self, tag: &InputTag) -> bool {
        if tag.label.is_empty() {
            return false;
        }
        if !(tag.process.is_empty() || tag.process == self.name) {
            return false;
        }
        self.slot_of(&tag.label).is_none()
    }

    fn unresolved_input_tags(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for node in self.nodes() {
            let prefix = format!("process.{}", node.display_name());
            node.params().visit(&prefix, &mut |path, param| {
                let tags: Vec<&InputTag> = match param.value() {
                    Some(Value::InputTag(tag)) => vec![tag],
                    Some(Value::VInputTag(tags)) => tags.iter().collect(),
                    _ => Vec::new(),
                };
                for tag in tags {
                    if self.is_unresolved_local(tag) {
                        warnings.push(ValidationWarning::UnresolvedInputTag {
                            path: path.to_string(),
                            label: tag.label.clone(),
                        });
                    }
                }
            });
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::path::{module, Schedule, Task};
    use crate::pset::Parameter;

    fn minimal() -> Process {
        let mut process = Process::new("Reader");
        process.add("source", Node::source("EmptySource")).unwrap();
        process
            .add("reader", Node::analyzer("SiStripQualityStatistics"))
            .unwrap();
        process.add_path("p1", module("reader")).unwrap();
        process
    }

    #[test]
    fn test_minimal_validates() {
        let mut process = minimal();
        assert!(process.validate().unwrap().is_empty());
        assert_eq!(process.state(), ProcessState::Validated);
        // idempotent
        assert!(process.validate().unwrap().is_empty());
        assert_eq!(process.state(), ProcessState::Validated);
    }

    #[test]
    fn test_missing_source() {
        let mut process = Process::new("P");
        let err = process.validate().unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { path } if path == "process.source"));
    }

    #[test]
    fn test_unresolved_path_label() {
        let mut process = minimal();
        process.add_path("p2", module("reader") * "ghost").unwrap();
        let err = process.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnresolvedLabel { label, referrer } if label == "ghost" && referrer == "p2"
        ));
    }

    #[test]
    fn test_late_registered_role_is_checked() {
        let mut process = minimal();
        process.add_path("p2", !module("late") * "reader").unwrap();
        process.add("late", Node::producer("Late")).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::RoleConflict { .. })
        ));
    }

    #[test]
    fn test_sequences_expand_and_must_be_acyclic() {
        let mut process = minimal();
        process.add("filter", Node::filter("F")).unwrap();
        process.add_sequence("s1", module("filter") * "s2").unwrap();
        process.add_sequence("s2", module("reader")).unwrap();
        process.add_path("p2", module("s1")).unwrap();
        process.validate().unwrap();

        process.add_sequence("s2", module("s1")).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_filter_in_sequence_on_end_path() {
        let mut process = minimal();
        process.add("filter", Node::filter("F")).unwrap();
        process.add_sequence("s", module("filter")).unwrap();
        process.add_end_path("e", module("s")).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::RoleConflict { .. })
        ));
    }

    #[test]
    fn test_tasks_resolve() {
        let mut process = minimal();
        process.add("jets", Node::producer("J")).unwrap();
        process.add_task("t1", Task::new(["jets"])).unwrap();
        process.add_task("t2", Task::new(["t1", "SiStripQualityESProducer"])).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::UnresolvedLabel { label, .. }) if label == "SiStripQualityESProducer"
        ));
        process
            .add_unlabeled(Node::es_producer("SiStripQualityESProducer"))
            .unwrap();
        process.validate().unwrap();

        process.add_task("t1", Task::new(["t2"])).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_schedule_checks() {
        let mut process = minimal();
        process.set_schedule(Schedule::new(["p1", "p1"])).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::RoleConflict { .. })
        ));
        process.set_schedule(Schedule::new(["p9"])).unwrap();
        assert!(matches!(
            process.validate(),
            Err(ConfigError::UnresolvedLabel { .. })
        ));
        process.set_schedule(Schedule::new(["p1"])).unwrap();
        process.validate().unwrap();
    }

    #[test]
    fn test_top_level_kinds() {
        let mut process = minimal();
        process
            .set_param("options.numberOfThreads", Parameter::untracked(4i32))
            .unwrap();
        let err = process.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Type { path, .. } if path == "process.options.numberOfThreads"
        ));

        let mut process = minimal();
        process
            .set_param("maxEvents.input", Parameter::untracked(10i64))
            .unwrap();
        assert!(process.validate().is_err());
    }

    #[test]
    fn test_unresolved_input_tag_is_a_warning() {
        let mut process = minimal();
        process
            .add(
                "table",
                Node::producer("SimpleFlatTableProducer")
                    .with_tracked("src", InputTag::label("finalJetsAK8"))
                    .with_tracked("other", InputTag::new("reader", "", ""))
                    .with_tracked("remote", InputTag::new("x", "", "HLT")),
            )
            .unwrap();
        let warnings = process.validate().unwrap();
        assert_eq!(
            warnings,
            vec![ValidationWarning::UnresolvedInputTag {
                path: "process.table.src".to_string(),
                label: "finalJetsAK8".to_string(),
            }]
        );

        let quiet = SerializeOptions {
            check_input_tags: false,
            ..SerializeOptions::default()
        };
        assert!(process.validate_with(&quiet).unwrap().is_empty());
    }
}
