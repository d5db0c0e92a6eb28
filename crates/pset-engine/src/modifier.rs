//! Era modifiers
//!
//! A [`Modifier`] is active when the process declares one of its eras.
//! Modifiers produce [`Patch`]es against a stable target path (node label
//! plus dotted parameter path); the process stores them in registration
//! order and applies the active ones when eras are applied.
//!
//! # Example
//!
//! ```ignore
//! let run2 = Modifier::new("run2_nanoAOD_106Xv2");
//! process.add_modifier(run2.to_modify(
//!     "fatJetTable.variables",
//!     Overrides::new().set("btagCSVV2", var("bDiscriminator('pfCombinedInclusiveSecondaryVertexV2BJetTags')")),
//! ))?;
//! ```

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::pset::Overrides;

/// A named configuration variant, possibly a chain of several eras
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    name: String,
    eras: Vec<String>,
}

impl Modifier {
    /// A modifier that is active under the era of the same name
    pub fn new(era: impl Into<String>) -> Self {
        let era = era.into();
        Self {
            name: era.clone(),
            eras: vec![era],
        }
    }

    /// A modifier active when any member is active
    pub fn chain(name: impl Into<String>, members: &[&Modifier]) -> Self {
        let mut eras: Vec<String> = Vec::new();
        for member in members {
            for era in &member.eras {
                if !eras.contains(era) {
                    eras.push(era.clone());
                }
            }
        }
        Self {
            name: name.into(),
            eras,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn eras(&self) -> &[String] {
        &self.eras
    }

    /// Whether any of this modifier's eras is declared
    pub fn is_active(&self, declared: &IndexSet<String>) -> bool {
        self.eras.iter().any(|era| declared.contains(era))
    }

    /// Patch parameters of a node (or of one of its nested PSets).
    ///
    /// `target` is a label optionally followed by a dotted parameter path,
    /// e.g. `fatJetTable.variables`.
    pub fn to_modify(&self, target: &str, overrides: Overrides) -> Patch {
        Patch {
            modifier: self.clone(),
            target: Target::parse(target),
            action: PatchAction::Modify(overrides),
        }
    }

    /// Replace a node wholesale; the replacement keeps the target's label
    pub fn to_replace_with(&self, label: &str, node: Node) -> Patch {
        Patch {
            modifier: self.clone(),
            target: Target::parse(label),
            action: PatchAction::ReplaceWith(Box::new(node)),
        }
    }
}

/// A modifier built with [`Modifier::chain`], active under any member era
pub type ModifierChain = Modifier;

/// A label plus a dotted parameter path inside the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub node: String,
    pub params: String,
}

impl Target {
    pub fn parse(target: &str) -> Self {
        match target.split_once('.') {
            Some((node, params)) => Self {
                node: node.to_string(),
                params: params.to_string(),
            },
            None => Self {
                node: target.to_string(),
                params: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchAction {
    Modify(Overrides),
    ReplaceWith(Box<Node>),
}

/// A declarative change conditioned on a modifier
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub modifier: Modifier,
    pub target: Target,
    pub action: PatchAction,
}

/// Registered patches in declaration order, each with its applied flag.
///
/// A patch whose modifier was inactive stays pending, so declaring its era
/// later still lets it run on the next application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierRegistry {
    patches: Vec<Patch>,
    applied: Vec<bool>,
}

impl ModifierRegistry {
    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
        self.applied.push(false);
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Patches not yet applied, in declaration order
    pub fn pending(&self) -> impl Iterator<Item = &Patch> {
        self.patches
            .iter()
            .zip(&self.applied)
            .filter(|(_, applied)| !**applied)
            .map(|(patch, _)| patch)
    }

    /// Indices of the pending patches
    pub(crate) fn pending_indices(&self) -> Vec<usize> {
        (0..self.patches.len()).filter(|&i| !self.applied[i]).collect()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Patch> {
        self.patches.get(index)
    }

    pub(crate) fn mark_applied(&mut self, index: usize) {
        if let Some(flag) = self.applied.get_mut(index) {
            *flag = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
