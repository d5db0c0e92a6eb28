//! Provenance hash
//!
//! A SHA-256 digest over the tracked projection of a process, truncated to
//! 128 bits. Every item is written with a one-byte tag and every variable
//! length field with a length prefix, so distinct trees never share an
//! encoding. Untracked parameters and untracked subtrees contribute
//! nothing; eras contribute only through the parameters their modifiers
//! changed.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::process::Process;
use crate::pset::{Parameter, ParameterSet};
use crate::types::{EventId, InputTag, Value};

const TAG_PROCESS: u8 = 0x01;
const TAG_TOP_PSET: u8 = 0x02;
const TAG_NODE: u8 = 0x03;
const TAG_PATH: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x05;
const TAG_TASK: u8 = 0x06;
const TAG_SCHEDULE: u8 = 0x07;
const TAG_PSET: u8 = 0x10;
const TAG_PARAM: u8 = 0x11;
const TAG_ABSENT: u8 = 0x12;
const TAG_END: u8 = 0xff;

/// 128-bit provenance fingerprint, displayed as 32 lowercase hex chars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceId(pub [u8; 16]);

impl fmt::Display for ProvenanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

struct Hasher {
    inner: Sha256,
}

impl Hasher {
    fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    fn tag(&mut self, tag: u8) {
        self.inner.update([tag]);
    }

    fn len(&mut self, n: usize) {
        self.inner.update((n as u64).to_le_bytes());
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.len(bytes.len());
        self.inner.update(bytes);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn finish(self) -> ProvenanceId {
        let digest = self.inner.finalize();
        let mut id = [0u8; 16];
        id.copy_from_slice(&digest[..16]);
        ProvenanceId(id)
    }

    fn pset(&mut self, pset: &ParameterSet) {
        let tracked: Vec<(&str, &Parameter)> =
            pset.iter().filter(|(_, p)| p.is_tracked()).collect();
        self.tag(TAG_PSET);
        self.len(tracked.len());
        for (name, param) in tracked {
            self.tag(TAG_PARAM);
            self.str(name);
            self.tag(param.kind().tag());
            match param.value() {
                Some(value) => self.value(value),
                None => self.tag(TAG_ABSENT),
            }
        }
    }

    fn input_tag(&mut self, tag: &InputTag) {
        self.str(&tag.label);
        self.str(&tag.instance);
        self.str(&tag.process);
    }

    fn event_id(&mut self, id: &EventId) {
        self.inner.update(id.run.to_le_bytes());
        self.inner.update(id.lumi.to_le_bytes());
        self.inner.update(id.event.to_le_bytes());
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Bool(v) => self.inner.update([u8::from(*v)]),
            Value::Int32(v) => self.inner.update(v.to_le_bytes()),
            Value::UInt32(v) => self.inner.update(v.to_le_bytes()),
            Value::Int64(v) => self.inner.update(v.to_le_bytes()),
            Value::UInt64(v) => self.inner.update(v.to_le_bytes()),
            Value::Double(v) => self.inner.update(v.to_bits().to_le_bytes()),
            Value::String(v) => self.str(v),
            Value::InputTag(v) => self.input_tag(v),
            Value::EventId(v) => self.event_id(v),
            Value::EventRange(v) => {
                self.event_id(&v.start);
                self.event_id(&v.end);
            }
            Value::FileInPath(v) => self.str(v.relative()),
            Value::PSet(v) => self.pset(v),
            Value::VBool(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update([u8::from(*v)]);
                }
            }
            Value::VInt32(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update(v.to_le_bytes());
                }
            }
            Value::VUInt32(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update(v.to_le_bytes());
                }
            }
            Value::VInt64(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update(v.to_le_bytes());
                }
            }
            Value::VUInt64(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update(v.to_le_bytes());
                }
            }
            Value::VDouble(items) => {
                self.len(items.len());
                for v in items {
                    self.inner.update(v.to_bits().to_le_bytes());
                }
            }
            Value::VString(items) => {
                self.len(items.len());
                for v in items {
                    self.str(v);
                }
            }
            Value::VInputTag(items) => {
                self.len(items.len());
                for v in items {
                    self.input_tag(v);
                }
            }
            Value::VEventId(items) => {
                self.len(items.len());
                for v in items {
                    self.event_id(v);
                }
            }
            Value::VEventRange(items) => {
                self.len(items.len());
                for v in items {
                    self.event_id(&v.start);
                    self.event_id(&v.end);
                }
            }
            Value::VFileInPath(items) => {
                self.len(items.len());
                for v in items {
                    self.str(v.relative());
                }
            }
            Value::VPSet(items) => {
                self.len(items.len());
                for v in items {
                    self.pset(v);
                }
            }
        }
    }
}

impl ParameterSet {
    /// Digest of the tracked projection of this set
    pub fn provenance_id(&self) -> ProvenanceId {
        let mut hasher = Hasher::new();
        hasher.pset(self);
        hasher.finish()
    }
}

impl Process {
    /// Digest of the tracked projection of the whole process, in its current
    /// state. [`Process::serialize`] computes it after era modifiers.
    pub fn provenance_id(&self) -> ProvenanceId {
        let mut h = Hasher::new();
        h.tag(TAG_PROCESS);
        h.str(&self.name);

        for (name, param) in self.top_psets.iter().filter(|(_, p)| p.is_tracked()) {
            if let Some(Value::PSet(pset)) = param.value() {
                h.tag(TAG_TOP_PSET);
                h.str(name);
                h.pset(pset);
            }
        }

        for node in self.nodes() {
            h.tag(TAG_NODE);
            h.str(node.role().keyword());
            h.str(node.registry_key());
            h.pset(node.params());
        }

        for (name, def) in &self.paths {
            h.tag(TAG_PATH);
            h.str(def.kind.keyword());
            h.str(name);
            h.str(&def.expr.to_string());
        }
        for (name, expr) in &self.sequences {
            h.tag(TAG_SEQUENCE);
            h.str(name);
            h.str(&expr.to_string());
        }
        for (name, task) in &self.tasks {
            h.tag(TAG_TASK);
            h.str(name);
            h.len(task.members().len());
            for member in task.members() {
                h.str(member);
            }
        }

        h.tag(TAG_SCHEDULE);
        let schedule = self.effective_schedule();
        h.len(schedule.len());
        for name in schedule {
            h.str(name);
        }
        let tasks = self.schedule.as_ref().map(|s| s.tasks.as_slice()).unwrap_or(&[]);
        h.len(tasks.len());
        for name in tasks {
            h.str(name);
        }

        h.tag(TAG_END);
        h.finish()
    }
}
