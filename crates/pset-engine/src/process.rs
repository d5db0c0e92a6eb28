//! The process
//!
//! A [`Process`] owns every node, path and top-level parameter set of a job
//! configuration. It moves through
//! `Building -> ErasApplied -> Validated -> Serialized`; once serialized,
//! every mutating call fails with [`ConfigError::Frozen`].
//!
//! # Example
//!
//! ```ignore
//! let mut process = Process::new("Reader");
//! process.add(
//!     "source",
//!     Node::source("EmptySource")
//!         .with_tracked("numberEventsInRun", 1u32)
//!         .with_tracked("firstRun", 1u32),
//! )?;
//! process.add("reader", Node::analyzer("SiStripQualityStatistics"))?;
//! process.add_path("p1", module("reader"))?;
//! let out = process.serialize()?;
//! ```

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::modifier::{ModifierRegistry, Patch, PatchAction};
use crate::node::{guard_class, KeyedId, Node, Role, CLASS_PARAM, PREFERRED_PARAM};
use crate::path::{PathDef, PathExpr, PathKind, Schedule, Task};
use crate::pset::{Parameter, ParameterSet};
use crate::types::{Value, ValueKind};

/// Lifecycle state of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Building,
    ErasApplied,
    Validated,
    Serialized,
}

/// What a name in the process namespace currently refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Node(Role),
    TopPSet,
    Path,
    Sequence,
    Task,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(role) => write!(f, "{}", role),
            Self::TopPSet => f.write_str("top-level PSet"),
            Self::Path => f.write_str("path"),
            Self::Sequence => f.write_str("sequence"),
            Self::Task => f.write_str("task"),
        }
    }
}

/// A complete job configuration
#[derive(Debug, Clone)]
pub struct Process {
    pub(crate) name: String,
    pub(crate) eras: IndexSet<String>,
    pub(crate) state: ProcessState,
    pub(crate) top_psets: IndexMap<String, Parameter>,
    pub(crate) source: Option<Node>,
    pub(crate) looper: Option<Node>,
    pub(crate) modules: IndexMap<String, Node>,
    /// Services and event-setup nodes, keyed by role, class and preferred label
    pub(crate) keyed: IndexMap<KeyedId, Node>,
    pub(crate) paths: IndexMap<String, PathDef>,
    pub(crate) sequences: IndexMap<String, PathExpr>,
    pub(crate) tasks: IndexMap<String, Task>,
    pub(crate) schedule: Option<Schedule>,
    pub(crate) modifiers: ModifierRegistry,
}

impl Process {
    /// Create a process with the standard `maxEvents` and `options` PSets
    pub fn new(name: impl Into<String>) -> Self {
        let mut top_psets = IndexMap::new();
        top_psets.insert(
            "maxEvents".to_string(),
            Parameter::untracked(ParameterSet::new().with_untracked("input", -1i32)),
        );
        top_psets.insert(
            "options".to_string(),
            Parameter::untracked(ParameterSet::new()),
        );
        Self::bare(name, top_psets)
    }

    /// A process with no top-level PSets at all
    pub(crate) fn bare(name: impl Into<String>, top_psets: IndexMap<String, Parameter>) -> Self {
        Self {
            name: name.into(),
            eras: IndexSet::new(),
            state: ProcessState::Building,
            top_psets,
            source: None,
            looper: None,
            modules: IndexMap::new(),
            keyed: IndexMap::new(),
            paths: IndexMap::new(),
            sequences: IndexMap::new(),
            tasks: IndexMap::new(),
            schedule: None,
            modifiers: ModifierRegistry::default(),
        }
    }

    /// Create a process declaring `eras` from the start
    pub fn new_with_eras<I, S>(name: impl Into<String>, eras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut process = Self::new(name);
        process.eras.extend(eras.into_iter().map(Into::into));
        process
    }

    /// Declare an era; rejected once serialized
    pub fn add_era(&mut self, era: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.eras.insert(era.into());
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eras(&self) -> &IndexSet<String> {
        &self.eras
    }

    pub fn has_era(&self, era: &str) -> bool {
        self.eras.contains(era)
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Fail once serialized; any accepted mutation returns the process to
    /// `Building`.
    pub(crate) fn ensure_mutable(&mut self) -> Result<()> {
        if self.state == ProcessState::Serialized {
            return Err(ConfigError::Frozen(self.name.clone()));
        }
        if self.state != ProcessState::Building {
            log::debug!("process '{}': {:?} -> Building", self.name, self.state);
            self.state = ProcessState::Building;
        }
        Ok(())
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        if self.state != state {
            log::debug!("process '{}': {:?} -> {:?}", self.name, self.state, state);
            self.state = state;
        }
    }

    /// What `name` currently refers to, if anything
    pub(crate) fn slot_of(&self, name: &str) -> Option<Slot> {
        if let Some(node) = self.modules.get(name) {
            return Some(Slot::Node(node.role()));
        }
        if self.source.as_ref().and_then(Node::label) == Some(name) {
            return Some(Slot::Node(Role::Source));
        }
        if self.looper.as_ref().and_then(Node::label) == Some(name) {
            return Some(Slot::Node(Role::Looper));
        }
        if let Some(node) = self.keyed.values().find(|n| n.label() == Some(name)) {
            return Some(Slot::Node(node.role()));
        }
        if self.top_psets.contains_key(name) {
            return Some(Slot::TopPSet);
        }
        if self.paths.contains_key(name) {
            return Some(Slot::Path);
        }
        if self.sequences.contains_key(name) {
            return Some(Slot::Sequence);
        }
        if self.tasks.contains_key(name) {
            return Some(Slot::Task);
        }
        None
    }

    /// Register a node under `label`.
    ///
    /// Re-using a label replaces the node when the role matches and fails
    /// with [`ConfigError::RoleConflict`] otherwise. Services and
    /// event-setup nodes are keyed by their class; the label is kept for
    /// display and lookup.
    pub fn add(&mut self, label: impl Into<String>, mut node: Node) -> Result<()> {
        self.ensure_mutable()?;
        let label = label.into();
        check_name("label", &label)?;
        let role = node.role();

        match self.slot_of(&label) {
            None => {}
            Some(Slot::Node(existing)) if existing == role => {}
            Some(other) => {
                return Err(ConfigError::role_conflict(
                    &label,
                    format!("already used by a {}, cannot register a {}", other, role),
                ))
            }
        }

        node.set_label(Some(label.clone()));
        match role {
            Role::Source => {
                if let Some(existing) = self.source.as_ref().and_then(Node::label) {
                    if existing != label {
                        return Err(ConfigError::DuplicateSource {
                            existing: existing.to_string(),
                            label,
                        });
                    }
                }
                self.source = Some(node);
            }
            Role::Looper => {
                if let Some(existing) = self.looper.as_ref().and_then(Node::label) {
                    if existing != label {
                        return Err(ConfigError::role_conflict(
                            &label,
                            format!("looper '{}' is already registered", existing),
                        ));
                    }
                }
                self.looper = Some(node);
            }
            role if role.is_keyed_by_class() => {
                // a different identity under the same label drops the old entry
                let id = node.keyed_id();
                if let Some(index) = self
                    .keyed
                    .values()
                    .position(|n| n.label() == Some(label.as_str()) && n.keyed_id() != id)
                {
                    self.keyed.shift_remove_index(index);
                }
                self.insert_keyed(node);
            }
            _ => {
                self.modules.insert(label, node);
            }
        }
        Ok(())
    }

    /// Register a service or event-setup node under its class only
    pub fn add_unlabeled(&mut self, mut node: Node) -> Result<()> {
        self.ensure_mutable()?;
        if !node.role().is_keyed_by_class() {
            return Err(ConfigError::role_conflict(
                node.class(),
                format!("a {} must be registered under a label", node.role()),
            ));
        }
        node.set_label(None);
        self.insert_keyed(node);
        Ok(())
    }

    fn insert_keyed(&mut self, node: Node) {
        let replacing = node.label().map(str::to_string);
        if let Some(previous) = self.keyed.insert(node.keyed_id(), node) {
            match (previous.label(), replacing.as_deref()) {
                (Some(old), Some(new)) if old != new => log::warn!(
                    "process '{}': {} '{}' registered as '{}' replaces '{}'",
                    self.name,
                    previous.role(),
                    previous.class(),
                    new,
                    old
                ),
                _ => log::debug!(
                    "process '{}': replaced {} '{}'",
                    self.name,
                    previous.role(),
                    previous.class()
                ),
            }
        }
    }

    /// Position of a keyed node by label, falling back to class
    fn keyed_index(&self, name: &str) -> Option<usize> {
        self.keyed
            .values()
            .position(|n| n.label() == Some(name))
            .or_else(|| self.keyed.keys().position(|(_, class, _)| class == name))
    }

    /// Look up a node by label. `source` always names the source; services
    /// and event-setup nodes may also be found by class.
    pub fn get(&self, label: &str) -> Result<&Node> {
        if let Some(node) = self.modules.get(label) {
            return Ok(node);
        }
        for node in self.source.iter().chain(self.looper.iter()) {
            if node.label() == Some(label) {
                return Ok(node);
            }
        }
        if label == "source" {
            if let Some(node) = self.source.as_ref() {
                return Ok(node);
            }
        }
        self.keyed_index(label)
            .and_then(|i| self.keyed.get_index(i))
            .map(|(_, node)| node)
            .ok_or_else(|| ConfigError::not_found(label))
    }

    /// Mutable form of [`get`](Self::get)
    pub fn get_mut(&mut self, label: &str) -> Result<&mut Node> {
        self.ensure_mutable()?;
        self.node_mut(label)
            .ok_or_else(|| ConfigError::not_found(label))
    }

    pub(crate) fn node_mut(&mut self, label: &str) -> Option<&mut Node> {
        if self.modules.contains_key(label) {
            return self.modules.get_mut(label);
        }
        let is_source = self.source.as_ref().map_or(false, |n| {
            n.label() == Some(label) || label == "source"
        });
        if is_source {
            return self.source.as_mut();
        }
        if self.looper.as_ref().and_then(Node::label) == Some(label) {
            return self.looper.as_mut();
        }
        let index = self.keyed_index(label)?;
        self.keyed.get_index_mut(index).map(|(_, node)| node)
    }

    /// Remove a node by label
    pub fn remove(&mut self, label: &str) -> Result<Node> {
        self.ensure_mutable()?;
        if let Some(node) = self.modules.shift_remove(label) {
            return Ok(node);
        }
        if self.source.as_ref().and_then(Node::label) == Some(label) {
            if let Some(node) = self.source.take() {
                return Ok(node);
            }
        }
        if self.looper.as_ref().and_then(Node::label) == Some(label) {
            if let Some(node) = self.looper.take() {
                return Ok(node);
            }
        }
        self.keyed_index(label)
            .and_then(|i| self.keyed.shift_remove_index(i))
            .map(|(_, node)| node)
            .ok_or_else(|| ConfigError::not_found(label))
    }

    pub fn source(&self) -> Option<&Node> {
        self.source.as_ref()
    }

    pub fn looper(&self) -> Option<&Node> {
        self.looper.as_ref()
    }

    /// Event-data modules in registration order
    pub fn modules(&self) -> impl Iterator<Item = &Node> {
        self.modules.values()
    }

    /// Services and event-setup nodes of `role` in registration order
    pub fn keyed_nodes(&self, role: Role) -> impl Iterator<Item = &Node> {
        self.keyed.values().filter(move |n| n.role() == role)
    }

    /// Every node in wire order: services, ES sources, ES producers,
    /// ES prefers, source, looper, modules
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.keyed_nodes(Role::Service)
            .chain(self.keyed_nodes(Role::ESSource))
            .chain(self.keyed_nodes(Role::ESProducer))
            .chain(self.keyed_nodes(Role::ESPrefer))
            .chain(self.source.iter())
            .chain(self.looper.iter())
            .chain(self.modules.values())
    }

    /// Register a path
    pub fn add_path(&mut self, name: impl Into<String>, expr: impl Into<PathExpr>) -> Result<()> {
        self.insert_path(name.into(), PathKind::Path, expr.into())
    }

    /// Register an end path
    pub fn add_end_path(
        &mut self,
        name: impl Into<String>,
        expr: impl Into<PathExpr>,
    ) -> Result<()> {
        self.insert_path(name.into(), PathKind::EndPath, expr.into())
    }

    fn insert_path(&mut self, name: String, kind: PathKind, expr: PathExpr) -> Result<()> {
        self.ensure_mutable()?;
        check_name("path name", &name)?;
        self.check_free(&name, Slot::Path)?;
        self.check_known_roles(&name, Some(kind), &expr)?;
        self.paths.insert(name, PathDef { kind, expr });
        Ok(())
    }

    /// Register a named sequence usable as a path member
    pub fn add_sequence(&mut self, name: impl Into<String>, expr: impl Into<PathExpr>) -> Result<()> {
        self.ensure_mutable()?;
        let name = name.into();
        let expr = expr.into();
        check_name("sequence name", &name)?;
        self.check_free(&name, Slot::Sequence)?;
        self.check_known_roles(&name, None, &expr)?;
        self.sequences.insert(name, expr);
        Ok(())
    }

    /// Register a task of unscheduled members
    pub fn add_task(&mut self, name: impl Into<String>, task: Task) -> Result<()> {
        self.ensure_mutable()?;
        let name = name.into();
        check_name("task name", &name)?;
        self.check_free(&name, Slot::Task)?;
        self.tasks.insert(name, task);
        Ok(())
    }

    /// `name` must be unused or already hold the same kind of entry
    fn check_free(&self, name: &str, wanted: Slot) -> Result<()> {
        match self.slot_of(name) {
            None => Ok(()),
            Some(slot) if slot == wanted => Ok(()),
            Some(other) => Err(ConfigError::role_conflict(
                name,
                format!("already used by a {}, cannot register a {}", other, wanted),
            )),
        }
    }

    /// Reject role violations for labels that are already registered.
    /// Unknown labels are left to validation.
    fn check_known_roles(&self, owner: &str, kind: Option<PathKind>, expr: &PathExpr) -> Result<()> {
        for (label, negated) in expr.leaves() {
            let Some(node) = self.modules.get(label) else {
                continue;
            };
            check_member_role(owner, kind, label, node.role(), negated)?;
        }
        Ok(())
    }

    pub fn path(&self, name: &str) -> Option<&PathDef> {
        self.paths.get(name)
    }

    /// Paths and end paths in registration order
    pub fn paths(&self) -> impl Iterator<Item = (&str, &PathDef)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn sequence(&self, name: &str) -> Option<&PathExpr> {
        self.sequences.get(name)
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Set the explicit schedule
    pub fn set_schedule(&mut self, schedule: Schedule) -> Result<()> {
        self.ensure_mutable()?;
        self.schedule = Some(schedule);
        Ok(())
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// The explicit schedule, or every path in registration order
    pub fn effective_schedule(&self) -> Vec<&str> {
        match &self.schedule {
            Some(schedule) => schedule.paths.iter().map(String::as_str).collect(),
            None => self.paths.keys().map(String::as_str).collect(),
        }
    }

    /// Install or replace a top-level PSet such as `maxEvents` or `options`
    pub fn set_pset(&mut self, name: impl Into<String>, param: Parameter) -> Result<()> {
        self.ensure_mutable()?;
        let name = name.into();
        check_name("PSet name", &name)?;
        if param.kind() != ValueKind::PSet {
            return Err(ConfigError::type_mismatch(
                format!("process.{}", name),
                ValueKind::PSet.type_name(),
                param.kind().type_name(),
            ));
        }
        if !param.is_present() {
            return Err(ConfigError::not_found(format!("process.{}", name)));
        }
        self.check_free(&name, Slot::TopPSet)?;
        self.top_psets.insert(name, param);
        Ok(())
    }

    /// A top-level PSet
    pub fn pset(&self, name: &str) -> Result<&ParameterSet> {
        self.top_psets
            .get(name)
            .ok_or_else(|| ConfigError::not_found(format!("process.{}", name)))?
            .pset()
            .map_err(|e| e.prefixed(name).prefixed("process"))
    }

    pub fn top_psets(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.top_psets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn max_events(&self) -> Result<&ParameterSet> {
        self.pset("maxEvents")
    }

    pub fn options(&self) -> Result<&ParameterSet> {
        self.pset("options")
    }

    /// Read a parameter by dotted path, e.g.
    /// `MessageLogger.cerr.FwkReport.reportEvery` or `maxEvents.input`.
    /// A leading `process.` is accepted.
    pub fn param(&self, path: &str) -> Result<&Parameter> {
        let path = path.strip_prefix("process.").unwrap_or(path);
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));

        if let Some(top) = self.top_psets.get(head) {
            if rest.is_empty() {
                return Ok(top);
            }
            return top
                .pset()
                .and_then(|p| p.find(rest))
                .map_err(|e| e.prefixed(head).prefixed("process"));
        }
        let node = self.get(head).map_err(|e| e.prefixed("process"))?;
        if rest.is_empty() {
            return Err(ConfigError::type_mismatch(
                format!("process.{}", head),
                "parameter",
                node.role().to_string(),
            ));
        }
        node.params()
            .find(rest)
            .map_err(|e| e.prefixed(node.display_name()).prefixed("process"))
    }

    /// Mutable form of [`param`](Self::param)
    pub fn param_mut(&mut self, path: &str) -> Result<&mut Parameter> {
        self.ensure_mutable()?;
        let path = path.strip_prefix("process.").unwrap_or(path);
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));

        if self.top_psets.contains_key(head) {
            let top = self
                .top_psets
                .get_mut(head)
                .ok_or_else(|| ConfigError::not_found(format!("process.{}", head)))?;
            if rest.is_empty() {
                return Ok(top);
            }
            return top
                .value_mut()
                .ok_or_else(|| ConfigError::not_found(""))
                .and_then(Value::as_pset_mut)
                .and_then(|p| p.find_mut(rest))
                .map_err(|e| e.prefixed(head).prefixed("process"));
        }
        if rest.is_empty() || rest == CLASS_PARAM || rest == PREFERRED_PARAM {
            return Err(ConfigError::type_mismatch(
                format!("process.{}", path),
                "mutable parameter",
                head.to_string(),
            ));
        }
        let node = self
            .node_mut(head)
            .ok_or_else(|| ConfigError::not_found(format!("process.{}", head)))?;
        let name = node.display_name().to_string();
        node.params_mut()
            .find_mut(rest)
            .map_err(|e| e.prefixed(&name).prefixed("process"))
    }

    /// Set a parameter by dotted path, creating intermediate PSets
    pub fn set_param(&mut self, path: &str, param: Parameter) -> Result<()> {
        self.ensure_mutable()?;
        let path = path.strip_prefix("process.").unwrap_or(path);
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));
        if rest.is_empty() {
            return self.set_pset(head, param);
        }
        let (parent, leaf) = rest.rsplit_once('.').unwrap_or(("", rest));

        if let Some(top) = self.top_psets.get_mut(head) {
            let pset = top
                .value_mut()
                .ok_or_else(|| ConfigError::not_found(""))
                .and_then(Value::as_pset_mut)
                .and_then(|p| p.ensure_pset_mut(parent))
                .map_err(|e| e.prefixed(head).prefixed("process"))?;
            pset.set(leaf, param);
            return Ok(());
        }
        if parent.is_empty() && (leaf == CLASS_PARAM || leaf == PREFERRED_PARAM) {
            return Err(ConfigError::role_conflict(
                head,
                format!("{} cannot be reassigned; replace the node instead", leaf),
            ));
        }
        let node = self
            .node_mut(head)
            .ok_or_else(|| ConfigError::not_found(format!("process.{}", head)))?;
        let name = node.display_name().to_string();
        let pset = node
            .params_mut()
            .ensure_pset_mut(parent)
            .map_err(|e| e.prefixed(&name).prefixed("process"))?;
        pset.set(leaf, param);
        Ok(())
    }

    /// Register an era patch; it takes effect when eras are applied
    pub fn add_modifier(&mut self, patch: Patch) -> Result<()> {
        self.ensure_mutable()?;
        self.modifiers.push(patch);
        Ok(())
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Apply every pending patch whose modifier is active, in registration
    /// order. Patches already applied are never re-applied, so calling this
    /// twice equals calling it once. Inactive patches stay pending and run
    /// once their era is declared.
    pub fn apply_era_modifiers(&mut self) -> Result<()> {
        if self.state == ProcessState::Serialized {
            return Ok(());
        }
        for index in self.modifiers.pending_indices() {
            let Some(patch) = self.modifiers.get(index).cloned() else {
                continue;
            };
            if !patch.modifier.is_active(&self.eras) {
                log::debug!(
                    "modifier '{}' inactive, skipping patch on '{}'",
                    patch.modifier.name(),
                    patch.target.node
                );
                continue;
            }
            self.apply_patch(&patch)?;
            self.modifiers.mark_applied(index);
        }
        if self.state == ProcessState::Building {
            self.set_state(ProcessState::ErasApplied);
        }
        Ok(())
    }

    fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        let target = &patch.target;
        log::debug!(
            "modifier '{}' patching '{}{}{}'",
            patch.modifier.name(),
            target.node,
            if target.params.is_empty() { "" } else { "." },
            target.params
        );
        match &patch.action {
            PatchAction::Modify(overrides) => {
                if let Some(top) = self.top_psets.get_mut(&target.node) {
                    let pset = top
                        .value_mut()
                        .ok_or_else(|| ConfigError::not_found(""))
                        .and_then(Value::as_pset_mut)
                        .and_then(|p| p.ensure_pset_mut(&target.params))
                        .map_err(|e| e.prefixed(&target.node).prefixed("process"))?;
                    return pset.apply_overrides(overrides).map_err(|e| {
                        e.prefixed(&target.params)
                            .prefixed(&target.node)
                            .prefixed("process")
                    });
                }
                let Some(node) = self.node_mut(&target.node) else {
                    log::debug!("modifier target '{}' is not registered, skipping", target.node);
                    return Ok(());
                };
                let name = node.display_name().to_string();
                if target.params.is_empty() {
                    guard_class(&name, overrides)?;
                }
                let pset = node
                    .params_mut()
                    .ensure_pset_mut(&target.params)
                    .map_err(|e| e.prefixed(&name).prefixed("process"))?;
                pset.apply_overrides(overrides).map_err(|e| {
                    e.prefixed(&target.params)
                        .prefixed(&name)
                        .prefixed("process")
                })
            }
            PatchAction::ReplaceWith(replacement) => {
                let Some(existing) = self.node_mut(&target.node) else {
                    log::debug!("modifier target '{}' is not registered, skipping", target.node);
                    return Ok(());
                };
                if existing.role() != replacement.role() {
                    return Err(ConfigError::role_conflict(
                        &target.node,
                        format!(
                            "cannot replace a {} with a {}",
                            existing.role(),
                            replacement.role()
                        ),
                    ));
                }
                let mut node = (**replacement).clone();
                node.set_label(existing.label().map(str::to_string));
                if node.role().is_keyed_by_class() && node.keyed_id() != existing.keyed_id() {
                    let old_key = existing.keyed_id();
                    self.keyed.shift_remove(&old_key);
                    self.insert_keyed(node);
                } else {
                    *existing = node;
                }
                Ok(())
            }
        }
    }
}

/// Role admission for a path member
pub(crate) fn check_member_role(
    owner: &str,
    kind: Option<PathKind>,
    label: &str,
    role: Role,
    negated: bool,
) -> Result<()> {
    if negated && role != Role::EDFilter {
        return Err(ConfigError::role_conflict(
            label,
            format!("negation in '{}' applies only to an EDFilter, found {}", owner, role),
        ));
    }
    let admitted = match kind {
        Some(PathKind::Path) => role.allowed_on_path(),
        Some(PathKind::EndPath) => role.allowed_on_end_path(),
        None => role.allowed_on_path() || role.allowed_on_end_path(),
    };
    if !admitted {
        let place = match kind {
            Some(PathKind::Path) => "path",
            Some(PathKind::EndPath) => "endpath",
            None => "sequence",
        };
        return Err(ConfigError::role_conflict(
            label,
            format!("a {} is not allowed on {} '{}'", role, place, owner),
        ));
    }
    Ok(())
}

/// Names must be identifiers so they survive the wire format
pub(crate) fn check_name(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::parse(
            what,
            name,
            "expected an identifier of ASCII letters, digits and '_'",
        ))
    }
}
