//! Configuration fragments
//!
//! A [`ConfigFragment`] is a reusable bundle of nodes, paths, top-level
//! PSets and modifier patches that a process imports with
//! [`Process::load`]. Fragments are registered at link time with
//! `inventory`:
//!
//! ```ignore
//! inventory::submit!(pset_engine::FragmentFn {
//!     id: "FWCore.MessageService.MessageLogger_cfi",
//!     build: message_logger_cfi,
//! });
//! ```
//!
//! [`FragmentStore::global`] builds each registered fragment once and hands
//! out clones.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::{ConfigError, Result};
use crate::modifier::Patch;
use crate::node::Node;
use crate::path::{PathExpr, PathKind, Task};
use crate::process::Process;
use crate::pset::Parameter;

/// A named bundle of configuration imported as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFragment {
    id: String,
    top_psets: IndexMap<String, Parameter>,
    /// Nodes in declaration order; `None` registers a keyed node by class
    nodes: Vec<(Option<String>, Node)>,
    sequences: IndexMap<String, PathExpr>,
    paths: IndexMap<String, (PathKind, PathExpr)>,
    tasks: IndexMap<String, Task>,
    patches: Vec<Patch>,
}

impl ConfigFragment {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            top_psets: IndexMap::new(),
            nodes: Vec::new(),
            sequences: IndexMap::new(),
            paths: IndexMap::new(),
            tasks: IndexMap::new(),
            patches: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn with_node(mut self, label: impl Into<String>, node: Node) -> Self {
        self.nodes.push((Some(label.into()), node));
        self
    }

    /// Add a service or event-setup node registered under its class
    pub fn with_unlabeled(mut self, node: Node) -> Self {
        self.nodes.push((None, node));
        self
    }

    pub fn with_pset(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.top_psets.insert(name.into(), param);
        self
    }

    pub fn with_sequence(mut self, name: impl Into<String>, expr: impl Into<PathExpr>) -> Self {
        self.sequences.insert(name.into(), expr.into());
        self
    }

    pub fn with_path(mut self, name: impl Into<String>, expr: impl Into<PathExpr>) -> Self {
        self.paths.insert(name.into(), (PathKind::Path, expr.into()));
        self
    }

    pub fn with_end_path(mut self, name: impl Into<String>, expr: impl Into<PathExpr>) -> Self {
        self.paths.insert(name.into(), (PathKind::EndPath, expr.into()));
        self
    }

    pub fn with_task(mut self, name: impl Into<String>, task: Task) -> Self {
        self.tasks.insert(name.into(), task);
        self
    }

    pub fn with_modifier(mut self, patch: Patch) -> Self {
        self.patches.push(patch);
        self
    }

    /// Labels or classes of the nodes in this fragment
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(|(label, node)| label.as_deref().unwrap_or_else(|| node.class()))
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|(label, node)| label.as_deref().unwrap_or_else(|| node.class()) == name)
            .map(|(_, node)| node)
    }

    pub fn is_empty(&self) -> bool {
        self.top_psets.is_empty()
            && self.nodes.is_empty()
            && self.sequences.is_empty()
            && self.paths.is_empty()
            && self.tasks.is_empty()
            && self.patches.is_empty()
    }
}

/// Link-time registration of a fragment factory
pub struct FragmentFn {
    /// Dotted fragment id, e.g. `Configuration.StandardSequences.Services_cff`
    pub id: &'static str,
    /// Builds a fresh copy of the fragment
    pub build: fn() -> ConfigFragment,
}

inventory::collect!(FragmentFn);

/// Process-wide cache of materialized fragments
pub struct FragmentStore {
    cache: Mutex<HashMap<String, Arc<ConfigFragment>>>,
}

static GLOBAL_STORE: Lazy<FragmentStore> = Lazy::new(FragmentStore::new);

impl FragmentStore {
    fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static FragmentStore {
        &GLOBAL_STORE
    }

    /// Ids of every registered fragment, sorted
    pub fn ids() -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = inventory::iter::<FragmentFn>
            .into_iter()
            .map(|f| f.id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Materialize a fragment by id, building it on first use
    pub fn get(&self, id: &str) -> Result<ConfigFragment> {
        if let Some(cached) = self.cache.lock().get(id) {
            return Ok(cached.as_ref().clone());
        }

        let factory = inventory::iter::<FragmentFn>
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ConfigError::not_found(format!("fragment {}", id)))?;
        let fragment = Arc::new((factory.build)());
        log::debug!("materialized fragment '{}'", id);

        let mut cache = self.cache.lock();
        let entry = cache.entry(id.to_string()).or_insert(fragment);
        Ok(entry.as_ref().clone())
    }
}

impl Process {
    /// Merge a fragment into this process.
    ///
    /// Names that already exist in the process are kept and the fragment's
    /// entry is skipped. The same holds for the source, the looper and
    /// keyed nodes of the same class. Modifier patches are appended.
    pub fn load(&mut self, fragment: &ConfigFragment) -> Result<()> {
        self.ensure_mutable()?;
        let mut skipped = 0usize;

        for (name, param) in &fragment.top_psets {
            if self.slot_of(name).is_some() {
                log::debug!("fragment '{}': keeping existing PSet '{}'", fragment.id, name);
                skipped += 1;
                continue;
            }
            self.set_pset(name.as_str(), param.clone())?;
        }

        for (label, node) in &fragment.nodes {
            if self.owns_node_slot(label.as_deref(), node) {
                log::debug!(
                    "fragment '{}': keeping existing {} '{}'",
                    fragment.id,
                    node.role(),
                    label.as_deref().unwrap_or_else(|| node.class())
                );
                skipped += 1;
                continue;
            }
            match label {
                Some(label) => self.add(label.as_str(), node.clone())?,
                None => self.add_unlabeled(node.clone())?,
            }
        }

        for (name, expr) in &fragment.sequences {
            if self.slot_of(name).is_some() {
                skipped += 1;
                continue;
            }
            self.add_sequence(name.as_str(), expr.clone())?;
        }
        for (name, (kind, expr)) in &fragment.paths {
            if self.slot_of(name).is_some() {
                skipped += 1;
                continue;
            }
            match kind {
                PathKind::Path => self.add_path(name.as_str(), expr.clone())?,
                PathKind::EndPath => self.add_end_path(name.as_str(), expr.clone())?,
            }
        }
        for (name, task) in &fragment.tasks {
            if self.slot_of(name).is_some() {
                skipped += 1;
                continue;
            }
            self.add_task(name.as_str(), task.clone())?;
        }

        for patch in &fragment.patches {
            self.add_modifier(patch.clone())?;
        }

        log::info!(
            "process '{}': loaded fragment '{}' ({} entries kept from the importer)",
            self.name,
            fragment.id,
            skipped
        );
        Ok(())
    }

    /// Look a fragment up in the global store and merge it
    pub fn load_by_id(&mut self, id: &str) -> Result<()> {
        let fragment = FragmentStore::global().get(id)?;
        self.load(&fragment)
    }

    /// Whether the importer already holds the slot a fragment node would take
    fn owns_node_slot(&self, label: Option<&str>, node: &Node) -> bool {
        use crate::node::Role;

        if let Some(label) = label {
            if self.slot_of(label).is_some() {
                return true;
            }
        }
        match node.role() {
            Role::Source => self.source.is_some(),
            Role::Looper => self.looper.is_some(),
            role if role.is_keyed_by_class() => self.keyed.contains_key(&node.keyed_id()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::Modifier;
    use crate::path::module;
    use crate::pset::{Overrides, ParameterSet};
    use crate::types::Value;

    fn message_logger_cfi() -> ConfigFragment {
        ConfigFragment::new("FWCore.MessageService.MessageLogger_cfi").with_unlabeled(
            Node::service("MessageLogger").with_untracked(
                "cerr",
                ParameterSet::new().with_untracked("threshold", "INFO"),
            ),
        )
    }

    inventory::submit!(FragmentFn {
        id: "test.MessageLogger_cfi",
        build: message_logger_cfi,
    });

    fn jets_fragment() -> ConfigFragment {
        ConfigFragment::new("test.jets_cff")
            .with_node("jets", Node::producer("JetProducer").with_tracked("ptMin", 15.0))
            .with_node("jetFilter", Node::filter("JetFilter"))
            .with_sequence("jetSequence", module("jets") * "jetFilter")
            .with_path("jetPath", module("jetSequence"))
            .with_pset(
                "options",
                Parameter::untracked(ParameterSet::new().with_untracked("numberOfThreads", 8u32)),
            )
            .with_modifier(
                Modifier::new("run3").to_modify("jets", Overrides::new().set("ptMin", 20.0)),
            )
    }

    #[test]
    fn test_load_merges_everything() {
        let mut process = Process::new("P");
        process.load(&jets_fragment()).unwrap();

        assert_eq!(process.get("jets").unwrap().class(), "JetProducer");
        assert!(process.sequence("jetSequence").is_some());
        assert!(process.path("jetPath").is_some());
        assert_eq!(process.modifiers().patches().len(), 1);
        // options already existed on the importer
        assert!(process.options().unwrap().is_empty());
    }

    #[test]
    fn test_importer_wins() {
        let mut process = Process::new("P");
        process
            .add("jets", Node::producer("MyJets").with_tracked("ptMin", 30.0))
            .unwrap();
        process.load(&jets_fragment()).unwrap();

        let jets = process.get("jets").unwrap();
        assert_eq!(jets.class(), "MyJets");
        assert_eq!(jets.value("ptMin").unwrap(), &Value::Double(30.0));
        assert_eq!(process.get("jetFilter").unwrap().class(), "JetFilter");
    }

    #[test]
    fn test_keyed_node_conflict_keeps_importer() {
        let mut process = Process::new("P");
        process
            .add_unlabeled(Node::service("MessageLogger").with_untracked("mine", true))
            .unwrap();
        process.load(&message_logger_cfi()).unwrap();
        let logger = process.get("MessageLogger").unwrap();
        assert!(logger.get("mine").is_ok());
        assert!(logger.get("cerr").is_err());
    }

    #[test]
    fn test_store_lookup() {
        let fragment = FragmentStore::global().get("test.MessageLogger_cfi").unwrap();
        assert_eq!(fragment.node_names().collect::<Vec<_>>(), vec!["MessageLogger"]);
        assert!(FragmentStore::ids().contains(&"test.MessageLogger_cfi"));

        let again = FragmentStore::global().get("test.MessageLogger_cfi").unwrap();
        assert_eq!(fragment, again);

        let mut process = Process::new("P");
        process.load_by_id("test.MessageLogger_cfi").unwrap();
        assert!(process.get("MessageLogger").is_ok());
    }

    #[test]
    fn test_unknown_fragment() {
        let mut process = Process::new("P");
        assert!(matches!(
            process.load_by_id("no.such_cfi"),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_on_frozen_process_fails() {
        let mut process = Process::new("P");
        process.add("source", Node::source("EmptySource")).unwrap();
        process.serialize().unwrap();
        assert!(matches!(
            process.load(&jets_fragment()),
            Err(ConfigError::Frozen(_))
        ));
    }
}
