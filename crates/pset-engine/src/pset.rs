//! Parameter sets
//!
//! A [`ParameterSet`] is an insertion-ordered mapping from parameter name to a
//! typed [`Parameter`] slot. Each slot carries its own tracked flag; a slot
//! may also be an optional parameter whose value is absent.
//!
//! # Example
//!
//! ```ignore
//! let to_get = ParameterSet::new()
//!     .with_tracked("record", "SiStripBadModuleRcd")
//!     .with_tracked("tag", "SiStripBadModule_Fake_merged2");
//!
//! let changed = to_get.clone_with(&Overrides::new().set("tag", "T2"))?;
//! ```

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{join_path, ConfigError, Result};
use crate::serialize::write_literals;
use crate::types::{Value, ValueKind};

/// One slot of a parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    tracked: bool,
    kind: ValueKind,
    /// `None` for an optional parameter that was never given a value
    value: Option<Value>,
}

impl Parameter {
    /// A tracked parameter (participates in the provenance hash)
    pub fn tracked(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            tracked: true,
            kind: value.kind(),
            value: Some(value),
        }
    }

    /// An untracked parameter (runtime-only, excluded from provenance)
    pub fn untracked(value: impl Into<Value>) -> Self {
        Self {
            tracked: false,
            ..Self::tracked(value)
        }
    }

    /// An optional parameter of `kind` whose presence is itself data
    pub fn optional(kind: ValueKind, tracked: bool) -> Self {
        Self {
            tracked,
            kind,
            value: None,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether the slot holds a value
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut Value> {
        self.value.as_mut()
    }

    /// Replace the value while keeping the slot's kind and tracked flag.
    ///
    /// The new value is coerced into the slot kind.
    pub fn assign(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into().coerce_to(self.kind)?;
        self.value = Some(value);
        Ok(())
    }

    /// Change the tracked flag
    pub fn with_tracked(mut self, tracked: bool) -> Self {
        self.tracked = tracked;
        self
    }

    /// Read a nested parameter set
    pub fn pset(&self) -> Result<&ParameterSet> {
        self.present()?.as_pset()
    }

    fn present(&self) -> Result<&Value> {
        self.value.as_ref().ok_or_else(|| ConfigError::not_found(""))
    }
}

/// Insertion-ordered mapping from parameter name to parameter slot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    params: IndexMap<String, Parameter>,
}

/// Two sets are equal iff they have the same names in the same order with
/// equal tracked flags and equal values.
impl PartialEq for ParameterSet {
    fn eq(&self, other: &Self) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a == b)
    }
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of a shared block of parameters
    pub fn with_block(block: &ParameterSet) -> Self {
        block.clone()
    }

    /// Insert or replace a parameter; replacement keeps the original position
    pub fn set(&mut self, name: impl Into<String>, param: Parameter) -> Option<Parameter> {
        self.params.insert(name.into(), param)
    }

    /// Builder form of [`set`](Self::set) for a tracked value
    pub fn with_tracked(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Parameter::tracked(value));
        self
    }

    /// Builder form of [`set`](Self::set) for an untracked value
    pub fn with_untracked(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Parameter::untracked(value));
        self
    }

    /// Builder form of [`set`](Self::set) for an optional slot
    pub fn with_optional(mut self, name: impl Into<String>, kind: ValueKind, tracked: bool) -> Self {
        self.set(name, Parameter::optional(kind, tracked));
        self
    }

    /// Builder form of [`set`](Self::set) for a fully typed parameter
    pub fn with_param(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.set(name, param);
        self
    }

    /// Look up a parameter slot
    pub fn get(&self, name: &str) -> Result<&Parameter> {
        self.params
            .get(name)
            .ok_or_else(|| ConfigError::not_found(name))
    }

    /// Look up a parameter slot for mutation
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.params
            .get_mut(name)
            .ok_or_else(|| ConfigError::not_found(name))
    }

    /// Look up the value of a parameter; absent optional slots are not found
    pub fn value(&self, name: &str) -> Result<&Value> {
        self.get(name)?.present().map_err(|e| e.prefixed(name))
    }

    /// The value of `name`, or `default` when absent. Never mutates.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Value {
        match self.params.get(name).and_then(Parameter::value) {
            Some(v) => v.clone(),
            None => default.into(),
        }
    }

    /// Presence test
    pub fn has(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Remove a parameter, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        self.params.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Deep copy with named overrides. The receiver is never mutated.
    pub fn clone_with(&self, overrides: &Overrides) -> Result<ParameterSet> {
        let mut copy = self.clone();
        copy.apply_overrides(overrides)?;
        Ok(copy)
    }

    /// Apply overrides in place.
    ///
    /// A PSet override landing on a PSet slot is merged name by name; any
    /// other override replaces the slot. Bare values adopt the existing
    /// slot's kind and tracked flag, typed parameters may change both.
    /// Overrides for absent names append.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        for (name, ov) in &overrides.entries {
            self.apply_override(name, ov)
                .map_err(|e| e.prefixed(name))?;
        }
        Ok(())
    }

    fn apply_override(&mut self, name: &str, ov: &Override) -> Result<()> {
        match ov {
            Override::Remove => {
                self.params.shift_remove(name);
            }
            Override::Value(value) => match self.params.get_mut(name) {
                Some(slot) => match (slot.value.as_mut(), value) {
                    (Some(Value::PSet(existing)), Value::PSet(incoming)) => {
                        existing.merge_from(incoming)?;
                    }
                    _ => slot.assign(value.clone())?,
                },
                None => {
                    self.params
                        .insert(name.to_string(), Parameter::tracked(value.clone()));
                }
            },
            Override::Typed(param) => match self.params.get_mut(name) {
                Some(slot) => match (slot.value.as_mut(), param.value()) {
                    (Some(Value::PSet(existing)), Some(Value::PSet(incoming))) => {
                        existing.merge_from(incoming)?;
                        slot.tracked = param.tracked;
                    }
                    _ => *slot = param.clone(),
                },
                None => {
                    self.params.insert(name.to_string(), param.clone());
                }
            },
            Override::Nested(inner) => {
                let slot = self
                    .params
                    .entry(name.to_string())
                    .or_insert_with(|| Parameter::tracked(ParameterSet::new()));
                if slot.value.is_none() && slot.kind == ValueKind::PSet {
                    slot.value = Some(Value::PSet(ParameterSet::new()));
                }
                match slot.value.as_mut() {
                    Some(Value::PSet(existing)) => existing.apply_overrides(inner)?,
                    _ => {
                        return Err(ConfigError::type_mismatch(
                            "",
                            ValueKind::PSet.type_name(),
                            slot.kind.type_name(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    /// Merge every parameter of `incoming` as a typed override
    fn merge_from(&mut self, incoming: &ParameterSet) -> Result<()> {
        for (name, param) in &incoming.params {
            self.apply_override(name, &Override::Typed(param.clone()))
                .map_err(|e| e.prefixed(name))?;
        }
        Ok(())
    }

    /// Resolve a dotted parameter path such as `cerr.FwkReport.reportEvery`
    /// or `toGet[0].tag`.
    pub fn find(&self, path: &str) -> Result<&Parameter> {
        let segments = parse_param_path(path)?;
        let mut current = self;
        let mut walked = String::new();
        for (i, seg) in segments.iter().enumerate() {
            let param = current
                .get(&seg.name)
                .map_err(|_| ConfigError::not_found(join_path(&walked, &seg.name)))?;
            walked = join_path(&walked, &seg.name);
            let last = i + 1 == segments.len();
            match seg.index {
                None if last => return Ok(param),
                None => {
                    current = param
                        .pset()
                        .map_err(|e| e.prefixed(&walked))?;
                }
                Some(idx) => {
                    let vpset = param
                        .present()
                        .and_then(Value::as_vpset)
                        .map_err(|e| e.prefixed(&walked))?;
                    walked = format!("{}[{}]", walked, idx);
                    current = vpset
                        .get(idx)
                        .ok_or_else(|| ConfigError::not_found(walked.clone()))?;
                    if last {
                        return Err(ConfigError::type_mismatch(
                            walked,
                            "parameter",
                            ValueKind::PSet.type_name(),
                        ));
                    }
                }
            }
        }
        Err(ConfigError::not_found(path))
    }

    /// Mutable form of [`find`](Self::find)
    pub fn find_mut(&mut self, path: &str) -> Result<&mut Parameter> {
        let segments = parse_param_path(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::not_found(path))?;
        if leaf.index.is_some() {
            return Err(ConfigError::type_mismatch(path, "parameter", ValueKind::PSet.type_name()));
        }
        let mut current = self;
        let mut walked = String::new();
        for seg in parents {
            walked = join_path(&walked, &seg.name);
            let param = current
                .params
                .get_mut(&seg.name)
                .ok_or_else(|| ConfigError::not_found(walked.clone()))?;
            let value = param
                .value
                .as_mut()
                .ok_or_else(|| ConfigError::not_found(walked.clone()))?;
            current = match seg.index {
                None => value.as_pset_mut().map_err(|e| e.prefixed(&walked))?,
                Some(idx) => {
                    let vpset = value.as_vpset_mut().map_err(|e| e.prefixed(&walked))?;
                    walked = format!("{}[{}]", walked, idx);
                    vpset
                        .get_mut(idx)
                        .ok_or_else(|| ConfigError::not_found(walked.clone()))?
                }
            };
        }
        current
            .params
            .get_mut(&leaf.name)
            .ok_or_else(|| ConfigError::not_found(join_path(&walked, &leaf.name)))
    }

    /// Walk to the PSet at `path`, creating tracked empty PSets for missing
    /// segments. An empty path returns `self`.
    pub(crate) fn ensure_pset_mut(&mut self, path: &str) -> Result<&mut ParameterSet> {
        if path.is_empty() {
            return Ok(self);
        }
        let segments = parse_param_path(path)?;
        let mut current = self;
        let mut walked = String::new();
        for seg in &segments {
            walked = join_path(&walked, &seg.name);
            let param = current
                .params
                .entry(seg.name.clone())
                .or_insert_with(|| Parameter::tracked(ParameterSet::new()));
            if param.value.is_none() && param.kind == ValueKind::PSet {
                param.value = Some(Value::PSet(ParameterSet::new()));
            }
            let value = param
                .value
                .as_mut()
                .ok_or_else(|| ConfigError::not_found(walked.clone()))?;
            current = match seg.index {
                None => value.as_pset_mut().map_err(|e| e.prefixed(&walked))?,
                Some(idx) => {
                    let vpset = value.as_vpset_mut().map_err(|e| e.prefixed(&walked))?;
                    walked = format!("{}[{}]", walked, idx);
                    vpset
                        .get_mut(idx)
                        .ok_or_else(|| ConfigError::not_found(walked.clone()))?
                }
            };
        }
        Ok(current)
    }

    /// Visit every parameter depth-first in insertion order.
    ///
    /// The callback receives the dotted path (relative to `prefix`) of each
    /// slot. Nested PSets and VPSet elements are visited after their parent.
    pub fn visit<F>(&self, prefix: &str, f: &mut F)
    where
        F: FnMut(&str, &Parameter),
    {
        for (name, param) in &self.params {
            let path = join_path(prefix, name);
            f(&path, param);
            match param.value() {
                Some(Value::PSet(inner)) => inner.visit(&path, f),
                Some(Value::VPSet(items)) => {
                    for (i, inner) in items.iter().enumerate() {
                        inner.visit(&format!("{}[{}]", path, i), f);
                    }
                }
                _ => {}
            }
        }
    }

    /// Stable human-readable rendering in configuration-script notation
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, "cms.PSet", 0);
        out
    }

    fn write_pretty(&self, out: &mut String, head: &str, depth: usize) {
        out.push_str(head);
        if self.params.is_empty() {
            out.push_str("()");
            return;
        }
        out.push_str("(\n");
        let count = self.params.len();
        for (i, (name, param)) in self.params.iter().enumerate() {
            indent(out, depth + 1);
            let _ = write!(out, "{} = ", name);
            write_pretty_param(out, param, depth + 1);
            if i + 1 < count {
                out.push(',');
            }
            out.push('\n');
        }
        indent(out, depth);
        out.push(')');
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn write_pretty_param(out: &mut String, param: &Parameter, depth: usize) {
    let tracking = if param.tracked { "" } else { "untracked." };
    match param.value() {
        None => {
            let _ = write!(out, "cms.optional.{}{}", tracking, param.kind.type_name());
        }
        Some(Value::PSet(inner)) => {
            inner.write_pretty(out, &format!("cms.{}PSet", tracking), depth);
        }
        Some(Value::VPSet(items)) => {
            let _ = write!(out, "cms.{}VPSet(", tracking);
            if items.is_empty() {
                out.push(')');
                return;
            }
            out.push('\n');
            for (i, inner) in items.iter().enumerate() {
                indent(out, depth + 1);
                inner.write_pretty(out, "cms.PSet", depth + 1);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(')');
        }
        Some(value) => {
            let _ = write!(out, "cms.{}{}(", tracking, param.kind.type_name());
            write_literals(out, value);
            out.push(')');
        }
    }
}

/// One override in a [`Overrides`] map
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    /// Bare value: keeps the slot's kind (coercing) and tracked flag
    Value(Value),
    /// Fully typed parameter: may change kind and tracked flag
    Typed(Parameter),
    /// Explicit merge into a nested PSet, creating it when absent
    Nested(Overrides),
    /// Delete the slot
    Remove,
}

/// Ordered, named overrides for [`ParameterSet::clone_with`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: IndexMap<String, Override>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override with a bare value
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), Override::Value(value.into()));
        self
    }

    /// Override with a fully typed parameter
    pub fn typed(mut self, name: impl Into<String>, param: Parameter) -> Self {
        self.entries.insert(name.into(), Override::Typed(param));
        self
    }

    /// Merge overrides into a nested PSet
    pub fn nested(mut self, name: impl Into<String>, inner: Overrides) -> Self {
        self.entries.insert(name.into(), Override::Nested(inner));
        self
    }

    /// Remove a slot
    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), Override::Remove);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Override)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&Override> {
        self.entries.get(name)
    }
}

/// A segment of a dotted parameter path: `name` or `name[index]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathSegment {
    pub name: String,
    pub index: Option<usize>,
}

/// Split `a.b[0].c` into segments
pub(crate) fn parse_param_path(path: &str) -> Result<Vec<PathSegment>> {
    let bad = |reason: &str| ConfigError::parse("parameter path", path, reason);
    if path.is_empty() {
        return Err(bad("empty path"));
    }
    path.split('.')
        .map(|part| {
            let (name, index) = match part.find('[') {
                Some(open) => {
                    let close = part
                        .strip_suffix(']')
                        .ok_or_else(|| bad("unterminated index"))?;
                    let idx = close[open + 1..]
                        .parse::<usize>()
                        .map_err(|_| bad("index is not a non-negative integer"))?;
                    (&part[..open], Some(idx))
                }
                None => (part, None),
            };
            if name.is_empty() {
                return Err(bad("empty segment"));
            }
            Ok(PathSegment {
                name: name.to_string(),
                index,
            })
        })
        .collect()
}
