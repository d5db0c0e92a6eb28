//! Canonical serialization
//!
//! The text form is brace-delimited and indentation-insensitive. Names are
//! emitted in insertion order and each parameter carries its tracked marker
//! (`T` or `U`) and its type, so the output parses back without loss:
//!
//! ```text
//! process Reader {
//!   pset U maxEvents = {
//!     U input: int32 = -1
//!   }
//!   source source = {
//!     T @class: string = "EmptySource"
//!     T firstRun: uint32 = 1
//!   }
//!   analyzer reader = {
//!     T @class: string = "SiStripQualityStatistics"
//!   }
//!   path p1 = { reader }
//! }
//! ```
//!
//! The binary form is the same text compressed with zstd.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::SerializeOptions;
use crate::error::{ConfigError, Result};
use crate::hash::ProvenanceId;
use crate::node::{Node, Role};
use crate::parse::parse_process;
use crate::path::{PathDef, PathExpr, Schedule, Task};
use crate::process::{Process, ProcessState};
use crate::pset::{Parameter, ParameterSet};
use crate::types::Value;
use crate::validation::ValidationWarning;

/// Output of [`Process::serialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedProcess {
    /// Canonical text form
    pub text: String,
    /// 128-bit digest of the tracked projection
    pub provenance: ProvenanceId,
    /// Soft findings from validation
    pub warnings: Vec<ValidationWarning>,
}

impl SerializedProcess {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Binary form: the canonical text compressed with zstd at
    /// `opts.compression_level`
    pub fn to_compressed(&self, opts: &SerializeOptions) -> Result<Vec<u8>> {
        Ok(zstd::encode_all(self.text.as_bytes(), opts.compression_level)?)
    }

    /// Decode a binary form back into a process
    pub fn parse_compressed(bytes: &[u8]) -> Result<Process> {
        let raw = zstd::decode_all(bytes)?;
        let text = String::from_utf8(raw).map_err(|e| {
            ConfigError::parse("compressed process", "<binary>", e.to_string())
        })?;
        parse_process(&text)
    }
}

impl Process {
    /// Apply eras, validate, emit and freeze with default options
    pub fn serialize(&mut self) -> Result<SerializedProcess> {
        self.serialize_with(&SerializeOptions::default())
    }

    /// Apply eras, validate, emit and freeze.
    ///
    /// Serializing again after the process is frozen yields the same bytes.
    pub fn serialize_with(&mut self, opts: &SerializeOptions) -> Result<SerializedProcess> {
        let warnings = self.validate_with(opts)?;
        let text = self.to_text(opts);
        let provenance = self.provenance_id();
        self.set_state(ProcessState::Serialized);
        Ok(SerializedProcess {
            text,
            provenance,
            warnings,
        })
    }

    /// Canonical text of the current state, without validation
    pub fn to_text(&self, opts: &SerializeOptions) -> String {
        let mut w = Writer::new(opts.indent);
        w.process(self);
        w.out
    }

    /// JSON export of the process tree for tooling
    pub fn to_json(&self) -> Result<String> {
        let view = ProcessView {
            name: &self.name,
            eras: self.eras.iter().map(String::as_str).collect(),
            state: self.state,
            psets: self.top_psets.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            services: self.nodes().filter(|n| n.role() == Role::Service).collect(),
            event_setup: self.nodes().filter(|n| n.role().is_event_setup()).collect(),
            source: self.source.as_ref(),
            looper: self.looper.as_ref(),
            modules: self.modules.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            paths: self.paths.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            sequences: self.sequences.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            tasks: self.tasks.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            schedule: self.schedule.as_ref(),
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessView<'a> {
    name: &'a str,
    eras: Vec<&'a str>,
    state: ProcessState,
    psets: indexmap::IndexMap<&'a str, &'a Parameter>,
    services: Vec<&'a Node>,
    event_setup: Vec<&'a Node>,
    source: Option<&'a Node>,
    looper: Option<&'a Node>,
    modules: indexmap::IndexMap<&'a str, &'a Node>,
    paths: indexmap::IndexMap<&'a str, &'a PathDef>,
    sequences: indexmap::IndexMap<&'a str, &'a PathExpr>,
    tasks: indexmap::IndexMap<&'a str, &'a Task>,
    schedule: Option<&'a Schedule>,
}

struct Writer {
    out: String,
    indent: usize,
}

impl Writer {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent,
        }
    }

    fn pad(&mut self, depth: usize) {
        for _ in 0..depth * self.indent {
            self.out.push(' ');
        }
    }

    fn process(&mut self, process: &Process) {
        let _ = writeln!(self.out, "process {} {{", process.name);

        if !process.eras.is_empty() {
            self.pad(1);
            self.out.push_str("eras = [");
            for (i, era) in process.eras.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                write_quoted(&mut self.out, era);
            }
            self.out.push_str("]\n");
        }

        for (name, param) in &process.top_psets {
            self.pad(1);
            let _ = write!(self.out, "pset {} {} = ", marker(param), name);
            match param.value() {
                Some(Value::PSet(pset)) => self.pset(pset, 1),
                _ => self.out.push_str("{}"),
            }
            self.out.push('\n');
        }

        for node in process.nodes() {
            self.pad(1);
            let _ = write!(self.out, "{} {} = ", node.role().keyword(), node.display_name());
            self.pset(node.params(), 1);
            self.out.push('\n');
        }

        for (name, def) in &process.paths {
            self.pad(1);
            let _ = writeln!(self.out, "{} {} = {}", def.kind.keyword(), name, braced(&def.expr));
        }
        for (name, expr) in &process.sequences {
            self.pad(1);
            let _ = writeln!(self.out, "sequence {} = {}", name, braced(expr));
        }
        for (name, task) in &process.tasks {
            self.pad(1);
            let members = task.members().join(", ");
            if members.is_empty() {
                let _ = writeln!(self.out, "task {} = {{}}", name);
            } else {
                let _ = writeln!(self.out, "task {} = {{ {} }}", name, members);
            }
        }

        if let Some(schedule) = &process.schedule {
            self.pad(1);
            let _ = write!(self.out, "schedule = [{}]", schedule.paths.join(", "));
            if !schedule.tasks.is_empty() {
                let _ = write!(self.out, " tasks = [{}]", schedule.tasks.join(", "));
            }
            self.out.push('\n');
        }

        self.out.push_str("}\n");
    }

    fn pset(&mut self, pset: &ParameterSet, depth: usize) {
        if pset.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        for (name, param) in pset.iter() {
            self.pad(depth + 1);
            let _ = write!(
                self.out,
                "{} {}: {} = ",
                marker(param),
                name,
                param.kind().type_name()
            );
            self.value(param.value(), depth + 1);
            self.out.push('\n');
        }
        self.pad(depth);
        self.out.push('}');
    }

    fn value(&mut self, value: Option<&Value>, depth: usize) {
        match value {
            None => self.out.push_str("@none"),
            Some(Value::PSet(pset)) => self.pset(pset, depth),
            Some(Value::VPSet(items)) => {
                if items.is_empty() {
                    self.out.push_str("[]");
                    return;
                }
                self.out.push_str("[\n");
                for (i, item) in items.iter().enumerate() {
                    self.pad(depth + 1);
                    self.pset(item, depth + 1);
                    if i + 1 < items.len() {
                        self.out.push(',');
                    }
                    self.out.push('\n');
                }
                self.pad(depth);
                self.out.push(']');
            }
            Some(v) if v.kind().is_vector() => {
                self.out.push('[');
                write_literals(&mut self.out, v);
                self.out.push(']');
            }
            Some(v) => write_literals(&mut self.out, v),
        }
    }
}

fn marker(param: &Parameter) -> &'static str {
    if param.is_tracked() {
        "T"
    } else {
        "U"
    }
}

fn braced(expr: &PathExpr) -> String {
    if expr.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", expr)
    }
}

/// Write a scalar literal, or the comma-separated elements of a non-PSet
/// vector. Nested sets are written by the caller.
pub(crate) fn write_literals(out: &mut String, value: &Value) {
    fn join<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            each(out, item);
        }
    }

    match value {
        Value::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Value::Int32(v) => {
            let _ = write!(out, "{}", v);
        }
        Value::UInt32(v) => {
            let _ = write!(out, "{}", v);
        }
        Value::Int64(v) => {
            let _ = write!(out, "{}", v);
        }
        Value::UInt64(v) => {
            let _ = write!(out, "{}", v);
        }
        Value::Double(v) => write_double(out, *v),
        Value::String(v) => write_quoted(out, v),
        Value::InputTag(v) => write_quoted(out, &v.to_string()),
        Value::EventId(v) => write_quoted(out, &v.to_string()),
        Value::EventRange(v) => write_quoted(out, &v.to_string()),
        Value::FileInPath(v) => write_quoted(out, v.relative()),
        Value::PSet(_) | Value::VPSet(_) => {}
        Value::VBool(items) => join(out, items, |o, v| o.push_str(if *v { "true" } else { "false" })),
        Value::VInt32(items) => join(out, items, |o, v| {
            let _ = write!(o, "{}", v);
        }),
        Value::VUInt32(items) => join(out, items, |o, v| {
            let _ = write!(o, "{}", v);
        }),
        Value::VInt64(items) => join(out, items, |o, v| {
            let _ = write!(o, "{}", v);
        }),
        Value::VUInt64(items) => join(out, items, |o, v| {
            let _ = write!(o, "{}", v);
        }),
        Value::VDouble(items) => join(out, items, |o, v| write_double(o, *v)),
        Value::VString(items) => join(out, items, |o, v| write_quoted(o, v)),
        Value::VInputTag(items) => join(out, items, |o, v| write_quoted(o, &v.to_string())),
        Value::VEventId(items) => join(out, items, |o, v| write_quoted(o, &v.to_string())),
        Value::VEventRange(items) => join(out, items, |o, v| write_quoted(o, &v.to_string())),
        Value::VFileInPath(items) => join(out, items, |o, v| write_quoted(o, v.relative())),
    }
}

/// Shortest round-trip form; non-finite values as `+inf`, `-inf`, `+nan`
fn write_double(out: &mut String, v: f64) {
    if v.is_nan() {
        out.push_str("+nan");
    } else if v.is_infinite() {
        out.push_str(if v > 0.0 { "+inf" } else { "-inf" });
    } else {
        let _ = write!(out, "{:?}", v);
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
