//! Labeled nodes
//!
//! A [`Node`] is a parameter set plus a [`Role`] tag. The mandatory tracked
//! `@class` parameter names the native plugin and is always the first
//! parameter of the set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pset::{Overrides, Parameter, ParameterSet};
use crate::types::{Value, ValueKind};

/// Name of the mandatory plugin-class parameter
pub const CLASS_PARAM: &str = "@class";

/// Tracked label of the producer an ESPrefer selects among those of its class
pub const PREFERRED_PARAM: &str = "@preferred";

/// Registry identity of a service or event-setup node: role, class and the
/// preferred label of an ESPrefer
pub(crate) type KeyedId = (Role, String, Option<String>);

/// The role a node plays in a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Source,
    ESSource,
    ESProducer,
    ESPrefer,
    Service,
    EDProducer,
    EDFilter,
    EDAnalyzer,
    OutputModule,
    Looper,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Source,
        Role::ESSource,
        Role::ESProducer,
        Role::ESPrefer,
        Role::Service,
        Role::EDProducer,
        Role::EDFilter,
        Role::EDAnalyzer,
        Role::OutputModule,
        Role::Looper,
    ];

    /// Keyword used for this role on the wire
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::ESSource => "essource",
            Self::ESProducer => "esproducer",
            Self::ESPrefer => "esprefer",
            Self::Service => "service",
            Self::EDProducer => "producer",
            Self::EDFilter => "filter",
            Self::EDAnalyzer => "analyzer",
            Self::OutputModule => "output",
            Self::Looper => "looper",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.keyword() == keyword)
    }

    /// Event-data modules share one label namespace and may appear on paths
    pub fn is_module(&self) -> bool {
        matches!(
            self,
            Self::EDProducer | Self::EDFilter | Self::EDAnalyzer | Self::OutputModule
        )
    }

    /// Services and event-setup nodes are registered under their class
    pub fn is_keyed_by_class(&self) -> bool {
        matches!(
            self,
            Self::Service | Self::ESSource | Self::ESProducer | Self::ESPrefer
        )
    }

    pub fn is_event_setup(&self) -> bool {
        matches!(self, Self::ESSource | Self::ESProducer | Self::ESPrefer)
    }

    pub fn allowed_on_path(&self) -> bool {
        matches!(self, Self::EDProducer | Self::EDFilter | Self::EDAnalyzer)
    }

    pub fn allowed_on_end_path(&self) -> bool {
        matches!(
            self,
            Self::EDProducer | Self::EDAnalyzer | Self::OutputModule
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "Source",
            Self::ESSource => "ESSource",
            Self::ESProducer => "ESProducer",
            Self::ESPrefer => "ESPrefer",
            Self::Service => "Service",
            Self::EDProducer => "EDProducer",
            Self::EDFilter => "EDFilter",
            Self::EDAnalyzer => "EDAnalyzer",
            Self::OutputModule => "OutputModule",
            Self::Looper => "Looper",
        };
        f.write_str(name)
    }
}

/// A parameter set with a role, an optional label and a plugin class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    role: Role,
    label: Option<String>,
    pset: ParameterSet,
}

impl Node {
    /// Create a node of `role` for the plugin `class`
    pub fn new(role: Role, class: impl Into<String>) -> Self {
        let class: String = class.into();
        Self {
            role,
            label: None,
            pset: ParameterSet::new().with_tracked(CLASS_PARAM, class),
        }
    }

    pub fn source(class: impl Into<String>) -> Self {
        Self::new(Role::Source, class)
    }

    pub fn es_source(class: impl Into<String>) -> Self {
        Self::new(Role::ESSource, class)
    }

    pub fn es_producer(class: impl Into<String>) -> Self {
        Self::new(Role::ESProducer, class)
    }

    pub fn es_prefer(class: impl Into<String>) -> Self {
        Self::new(Role::ESPrefer, class)
    }

    /// Prefer the `class` producer registered under `label`
    pub fn es_prefer_label(class: impl Into<String>, label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self::new(Role::ESPrefer, class).with_tracked(PREFERRED_PARAM, label)
    }

    pub fn service(class: impl Into<String>) -> Self {
        Self::new(Role::Service, class)
    }

    pub fn producer(class: impl Into<String>) -> Self {
        Self::new(Role::EDProducer, class)
    }

    pub fn filter(class: impl Into<String>) -> Self {
        Self::new(Role::EDFilter, class)
    }

    pub fn analyzer(class: impl Into<String>) -> Self {
        Self::new(Role::EDAnalyzer, class)
    }

    pub fn output(class: impl Into<String>) -> Self {
        Self::new(Role::OutputModule, class)
    }

    pub fn looper(class: impl Into<String>) -> Self {
        Self::new(Role::Looper, class)
    }

    /// Wrap an existing parameter set. `@class` must be present, tracked and
    /// a string; it is moved to the front if it is not already there.
    pub fn from_pset(role: Role, pset: ParameterSet) -> Result<Self> {
        let class_param = pset.get(CLASS_PARAM)?.clone();
        check_class_param(&class_param)?;
        let mut ordered = ParameterSet::new().with_param(CLASS_PARAM, class_param);
        for (name, param) in pset.iter().filter(|(n, _)| *n != CLASS_PARAM) {
            ordered.set(name, param.clone());
        }
        Ok(Self {
            role,
            label: None,
            pset: ordered,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Label under which the node was registered, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Plugin class name
    pub fn class(&self) -> &str {
        self.pset
            .value(CLASS_PARAM)
            .ok()
            .and_then(|v| v.as_str().ok())
            .unwrap_or("")
    }

    /// Label of the preferred producer, for an ESPrefer that names one
    pub fn preferred_label(&self) -> Option<&str> {
        if self.role != Role::ESPrefer {
            return None;
        }
        self.pset
            .value(PREFERRED_PARAM)
            .ok()
            .and_then(|v| v.as_str().ok())
    }

    pub(crate) fn keyed_id(&self) -> KeyedId {
        (
            self.role,
            self.class().to_string(),
            self.preferred_label().map(str::to_string),
        )
    }

    /// Key used in the process registry: the class for services and
    /// event-setup nodes, the label for everything else
    pub fn registry_key(&self) -> &str {
        if self.role.is_keyed_by_class() {
            self.class()
        } else {
            self.label.as_deref().unwrap_or_else(|| self.class())
        }
    }

    /// Name used in error paths and on the wire: the label when set,
    /// otherwise the class
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.class())
    }

    pub fn params(&self) -> &ParameterSet {
        &self.pset
    }

    pub(crate) fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.pset
    }

    pub(crate) fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn with_tracked(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if name != CLASS_PARAM {
            self.pset.set(name, Parameter::tracked(value));
        }
        self
    }

    pub fn with_untracked(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if name != CLASS_PARAM {
            self.pset.set(name, Parameter::untracked(value));
        }
        self
    }

    pub fn with_optional(mut self, name: impl Into<String>, kind: ValueKind, tracked: bool) -> Self {
        let name = name.into();
        if name != CLASS_PARAM {
            self.pset.set(name, Parameter::optional(kind, tracked));
        }
        self
    }

    /// Append every parameter of a shared block
    pub fn with_block(mut self, block: &ParameterSet) -> Self {
        for (name, param) in block.iter().filter(|(n, _)| *n != CLASS_PARAM) {
            self.pset.set(name, param.clone());
        }
        self
    }

    /// Insert or replace a parameter; `@class` cannot be changed this way
    pub fn set(&mut self, name: &str, param: Parameter) -> Result<()> {
        if name == CLASS_PARAM {
            return Err(ConfigError::role_conflict(
                self.display_name(),
                "@class cannot be reassigned; replace the node instead",
            ));
        }
        self.pset.set(name, param);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Parameter> {
        self.pset.get(name)
    }

    pub fn value(&self, name: &str) -> Result<&Value> {
        self.pset.value(name)
    }

    /// Independent copy with overrides applied. The copy is unlabeled until
    /// it is registered.
    pub fn clone_with(&self, overrides: &Overrides) -> Result<Node> {
        guard_class(self.display_name(), overrides)?;
        Ok(Node {
            role: self.role,
            label: None,
            pset: self.pset.clone_with(overrides)?,
        })
    }
}

/// `@class` must be a present, tracked string
pub(crate) fn check_class_param(param: &Parameter) -> Result<()> {
    if param.kind() != ValueKind::String {
        return Err(ConfigError::type_mismatch(
            CLASS_PARAM,
            ValueKind::String.type_name(),
            param.kind().type_name(),
        ));
    }
    if !param.is_tracked() {
        return Err(ConfigError::type_mismatch(
            CLASS_PARAM,
            "tracked string",
            "untracked string",
        ));
    }
    match param.value() {
        Some(Value::String(class)) if !class.is_empty() => Ok(()),
        _ => Err(ConfigError::not_found(CLASS_PARAM)),
    }
}

/// Overrides may not touch `@class`
pub(crate) fn guard_class(owner: &str, overrides: &Overrides) -> Result<()> {
    if overrides.get(CLASS_PARAM).is_some() {
        return Err(ConfigError::role_conflict(
            owner,
            "@class cannot be overridden; replace the node instead",
        ));
    }
    Ok(())
}
