//! Core value types for parameter sets
//!
//! These types define the closed set of leaf parameter kinds, their vector
//! forms, and the identifiers (InputTag, EventID, EventRange, FileInPath)
//! that have a canonical text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pset::ParameterSet;

/// The concrete kind of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    InputTag,
    EventId,
    EventRange,
    FileInPath,
    PSet,
    VBool,
    VInt32,
    VUInt32,
    VInt64,
    VUInt64,
    VDouble,
    VString,
    VInputTag,
    VEventId,
    VEventRange,
    VFileInPath,
    VPSet,
}

impl ValueKind {
    /// Every kind, in tag order
    pub const ALL: [ValueKind; 24] = [
        ValueKind::Bool,
        ValueKind::Int32,
        ValueKind::UInt32,
        ValueKind::Int64,
        ValueKind::UInt64,
        ValueKind::Double,
        ValueKind::String,
        ValueKind::InputTag,
        ValueKind::EventId,
        ValueKind::EventRange,
        ValueKind::FileInPath,
        ValueKind::PSet,
        ValueKind::VBool,
        ValueKind::VInt32,
        ValueKind::VUInt32,
        ValueKind::VInt64,
        ValueKind::VUInt64,
        ValueKind::VDouble,
        ValueKind::VString,
        ValueKind::VInputTag,
        ValueKind::VEventId,
        ValueKind::VEventRange,
        ValueKind::VFileInPath,
        ValueKind::VPSet,
    ];

    /// Type name as it appears on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Double => "double",
            Self::String => "string",
            Self::InputTag => "InputTag",
            Self::EventId => "EventID",
            Self::EventRange => "EventRange",
            Self::FileInPath => "FileInPath",
            Self::PSet => "PSet",
            Self::VBool => "vbool",
            Self::VInt32 => "vint32",
            Self::VUInt32 => "vuint32",
            Self::VInt64 => "vint64",
            Self::VUInt64 => "vuint64",
            Self::VDouble => "vdouble",
            Self::VString => "vstring",
            Self::VInputTag => "vInputTag",
            Self::VEventId => "vEventID",
            Self::VEventRange => "vEventRange",
            Self::VFileInPath => "vFileInPath",
            Self::VPSet => "VPSet",
        }
    }

    /// Resolve a wire type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.type_name() == name)
    }

    /// Whether this kind is a vector (including VPSet)
    pub fn is_vector(&self) -> bool {
        self.element_kind().is_some()
    }

    /// Element kind of a vector kind
    pub fn element_kind(&self) -> Option<ValueKind> {
        match self {
            Self::VBool => Some(Self::Bool),
            Self::VInt32 => Some(Self::Int32),
            Self::VUInt32 => Some(Self::UInt32),
            Self::VInt64 => Some(Self::Int64),
            Self::VUInt64 => Some(Self::UInt64),
            Self::VDouble => Some(Self::Double),
            Self::VString => Some(Self::String),
            Self::VInputTag => Some(Self::InputTag),
            Self::VEventId => Some(Self::EventId),
            Self::VEventRange => Some(Self::EventRange),
            Self::VFileInPath => Some(Self::FileInPath),
            Self::VPSet => Some(Self::PSet),
            _ => None,
        }
    }

    /// Whether this kind is one of the four integer widths
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64)
    }

    /// Stable one-byte tag used by the provenance digest
    pub(crate) fn tag(&self) -> u8 {
        Self::ALL
            .iter()
            .position(|k| k == self)
            .map(|p| p as u8)
            .unwrap_or(u8::MAX)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Three-part reference to a data product
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputTag {
    pub label: String,
    pub instance: String,
    pub process: String,
}

impl InputTag {
    /// Create a tag with all three fields
    pub fn new(
        label: impl Into<String>,
        instance: impl Into<String>,
        process: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            instance: instance.into(),
            process: process.into(),
        }
    }

    /// Create a tag naming only a module label
    pub fn label(label: impl Into<String>) -> Self {
        Self::new(label, "", "")
    }
}

impl FromStr for InputTag {
    type Err = ConfigError;

    /// Parse `label:instance:process`, missing trailing fields default to empty
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() > 3 {
            return Err(ConfigError::parse(
                "InputTag",
                s,
                "expected at most three ':'-separated fields",
            ));
        }
        if parts.iter().any(|p| p.chars().any(char::is_whitespace)) {
            return Err(ConfigError::parse("InputTag", s, "fields may not contain whitespace"));
        }
        Ok(Self::new(
            parts[0],
            parts.get(1).copied().unwrap_or(""),
            parts.get(2).copied().unwrap_or(""),
        ))
    }
}

impl fmt::Display for InputTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)?;
        if !self.process.is_empty() {
            write!(f, ":{}:{}", self.instance, self.process)
        } else if !self.instance.is_empty() {
            write!(f, ":{}", self.instance)
        } else {
            Ok(())
        }
    }
}

/// Run / luminosity block / event triple
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventId {
    pub run: u32,
    pub lumi: u32,
    pub event: u64,
}

impl EventId {
    pub fn new(run: u32, lumi: u32, event: u64) -> Self {
        Self { run, lumi, event }
    }
}

impl FromStr for EventId {
    type Err = ConfigError;

    /// Parse `run:lumi:event`, or `run:event` with the lumi defaulting to 0
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let bad = |reason: &str| ConfigError::parse("EventID", s, reason);
        let (run, lumi, event) = match parts.as_slice() {
            [run, event] => (*run, "0", *event),
            [run, lumi, event] => (*run, *lumi, *event),
            _ => return Err(bad("expected run:lumi:event or run:event")),
        };
        Ok(Self {
            run: run.parse().map_err(|_| bad("run is not a uint32"))?,
            lumi: lumi.parse().map_err(|_| bad("lumi is not a uint32"))?,
            event: event.parse().map_err(|_| bad("event is not a uint64"))?,
        })
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.run, self.lumi, self.event)
    }
}

/// Inclusive range of events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRange {
    pub start: EventId,
    pub end: EventId,
}

impl EventRange {
    pub fn new(start: EventId, end: EventId) -> Self {
        Self { start, end }
    }
}

impl FromStr for EventRange {
    type Err = ConfigError;

    /// Parse `start-end` where both sides are EventIDs; a single EventID is a one-event range
    fn from_str(s: &str) -> Result<Self> {
        let halves: Vec<&str> = s.split('-').collect();
        let wrap = |e: ConfigError| match e {
            ConfigError::Parse { reason, .. } => ConfigError::parse("EventRange", s, reason),
            other => other,
        };
        match halves.as_slice() {
            [single] => {
                let id: EventId = single.parse().map_err(wrap)?;
                Ok(Self::new(id, id))
            }
            [start, end] => Ok(Self::new(
                start.parse().map_err(wrap)?,
                end.parse().map_err(wrap)?,
            )),
            _ => Err(ConfigError::parse(
                "EventRange",
                s,
                "expected start-end",
            )),
        }
    }
}

impl fmt::Display for EventRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A file path relative to one of the search-path roots
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileInPath(pub String);

impl FileInPath {
    pub fn new(relative: impl Into<String>) -> Self {
        Self(relative.into())
    }

    pub fn relative(&self) -> &str {
        &self.0
    }
}

impl FromStr for FileInPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.starts_with('/') {
            return Err(ConfigError::parse(
                "FileInPath",
                s,
                "expected a non-empty relative path",
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for FileInPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed parameter value
///
/// All elements of a vector share the vector's element kind. The tracked
/// flag lives on the enclosing [`crate::pset::Parameter`] slot, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    InputTag(InputTag),
    EventId(EventId),
    EventRange(EventRange),
    FileInPath(FileInPath),
    PSet(ParameterSet),
    VBool(Vec<bool>),
    VInt32(Vec<i32>),
    VUInt32(Vec<u32>),
    VInt64(Vec<i64>),
    VUInt64(Vec<u64>),
    VDouble(Vec<f64>),
    VString(Vec<String>),
    VInputTag(Vec<InputTag>),
    VEventId(Vec<EventId>),
    VEventRange(Vec<EventRange>),
    VFileInPath(Vec<FileInPath>),
    VPSet(Vec<ParameterSet>),
}

impl Value {
    /// Kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int32(_) => ValueKind::Int32,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::InputTag(_) => ValueKind::InputTag,
            Self::EventId(_) => ValueKind::EventId,
            Self::EventRange(_) => ValueKind::EventRange,
            Self::FileInPath(_) => ValueKind::FileInPath,
            Self::PSet(_) => ValueKind::PSet,
            Self::VBool(_) => ValueKind::VBool,
            Self::VInt32(_) => ValueKind::VInt32,
            Self::VUInt32(_) => ValueKind::VUInt32,
            Self::VInt64(_) => ValueKind::VInt64,
            Self::VUInt64(_) => ValueKind::VUInt64,
            Self::VDouble(_) => ValueKind::VDouble,
            Self::VString(_) => ValueKind::VString,
            Self::VInputTag(_) => ValueKind::VInputTag,
            Self::VEventId(_) => ValueKind::VEventId,
            Self::VEventRange(_) => ValueKind::VEventRange,
            Self::VFileInPath(_) => ValueKind::VFileInPath,
            Self::VPSet(_) => ValueKind::VPSet,
        }
    }

    fn mismatch(&self, expected: ValueKind) -> ConfigError {
        ConfigError::type_mismatch("", expected.type_name(), self.kind().type_name())
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Self::Int32(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::Int32)),
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match self {
            Self::UInt32(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::UInt32)),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::Int64(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::Int64)),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self {
            Self::UInt64(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::UInt64)),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Double(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::Double)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn as_input_tag(&self) -> Result<&InputTag> {
        match self {
            Self::InputTag(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::InputTag)),
        }
    }

    pub fn as_event_id(&self) -> Result<EventId> {
        match self {
            Self::EventId(v) => Ok(*v),
            other => Err(other.mismatch(ValueKind::EventId)),
        }
    }

    pub fn as_pset(&self) -> Result<&ParameterSet> {
        match self {
            Self::PSet(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::PSet)),
        }
    }

    pub fn as_pset_mut(&mut self) -> Result<&mut ParameterSet> {
        match self {
            Self::PSet(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::PSet)),
        }
    }

    pub fn as_vpset(&self) -> Result<&[ParameterSet]> {
        match self {
            Self::VPSet(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::VPSet)),
        }
    }

    pub fn as_vpset_mut(&mut self) -> Result<&mut Vec<ParameterSet>> {
        match self {
            Self::VPSet(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::VPSet)),
        }
    }

    pub fn as_vstring(&self) -> Result<&[String]> {
        match self {
            Self::VString(v) => Ok(v),
            other => Err(other.mismatch(ValueKind::VString)),
        }
    }

    /// Integer payload widened to i128, for width conversions
    fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Int32(v) => Some(i128::from(*v)),
            Self::UInt32(v) => Some(i128::from(*v)),
            Self::Int64(v) => Some(i128::from(*v)),
            Self::UInt64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Convert this value into `kind`, the way a bare override adopts the
    /// kind of the slot it lands in.
    ///
    /// Integers narrow with a range check and widen into doubles only while
    /// exactly representable. Strings parse into InputTag/EventID/EventRange/
    /// FileInPath. Vectors convert element-wise. Anything else is a type error.
    pub fn coerce_to(self, kind: ValueKind) -> Result<Value> {
        if self.kind() == kind {
            return Ok(self);
        }
        if let Some(n) = self.as_integer() {
            return integer_as(n, kind);
        }
        if let Value::String(s) = &self {
            match kind {
                ValueKind::InputTag => return Ok(Value::InputTag(s.parse()?)),
                ValueKind::EventId => return Ok(Value::EventId(s.parse()?)),
                ValueKind::EventRange => return Ok(Value::EventRange(s.parse()?)),
                ValueKind::FileInPath => return Ok(Value::FileInPath(s.parse()?)),
                _ => {}
            }
        }
        if let (Some(from_elem), Some(to_elem)) = (self.kind().element_kind(), kind.element_kind()) {
            if from_elem != ValueKind::PSet && to_elem != ValueKind::PSet {
                let converted = self
                    .into_elements()
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| v.coerce_to(to_elem).map_err(|e| e.prefixed(&format!("[{}]", i))))
                    .collect::<Result<Vec<_>>>()?;
                return Value::from_elements(kind, converted);
            }
        }
        Err(self.mismatch(kind))
    }

    /// Split a non-PSet vector into its scalar elements
    fn into_elements(self) -> Vec<Value> {
        match self {
            Self::VBool(v) => v.into_iter().map(Value::Bool).collect(),
            Self::VInt32(v) => v.into_iter().map(Value::Int32).collect(),
            Self::VUInt32(v) => v.into_iter().map(Value::UInt32).collect(),
            Self::VInt64(v) => v.into_iter().map(Value::Int64).collect(),
            Self::VUInt64(v) => v.into_iter().map(Value::UInt64).collect(),
            Self::VDouble(v) => v.into_iter().map(Value::Double).collect(),
            Self::VString(v) => v.into_iter().map(Value::String).collect(),
            Self::VInputTag(v) => v.into_iter().map(Value::InputTag).collect(),
            Self::VEventId(v) => v.into_iter().map(Value::EventId).collect(),
            Self::VEventRange(v) => v.into_iter().map(Value::EventRange).collect(),
            Self::VFileInPath(v) => v.into_iter().map(Value::FileInPath).collect(),
            Self::VPSet(v) => v.into_iter().map(Value::PSet).collect(),
            scalar => vec![scalar],
        }
    }

    /// Assemble a vector of `kind` from scalar elements of its element kind
    pub fn from_elements(kind: ValueKind, elements: Vec<Value>) -> Result<Value> {
        macro_rules! collect {
            ($variant:ident, $accessor:ident) => {
                Value::$variant(
                    elements
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| match v {
                            Value::$accessor(x) => Ok(x),
                            other => Err(other
                                .mismatch(ValueKind::$accessor)
                                .prefixed(&format!("[{}]", i))),
                        })
                        .collect::<Result<Vec<_>>>()?,
                )
            };
        }
        Ok(match kind {
            ValueKind::VBool => collect!(VBool, Bool),
            ValueKind::VInt32 => collect!(VInt32, Int32),
            ValueKind::VUInt32 => collect!(VUInt32, UInt32),
            ValueKind::VInt64 => collect!(VInt64, Int64),
            ValueKind::VUInt64 => collect!(VUInt64, UInt64),
            ValueKind::VDouble => collect!(VDouble, Double),
            ValueKind::VString => collect!(VString, String),
            ValueKind::VInputTag => collect!(VInputTag, InputTag),
            ValueKind::VEventId => collect!(VEventId, EventId),
            ValueKind::VEventRange => collect!(VEventRange, EventRange),
            ValueKind::VFileInPath => collect!(VFileInPath, FileInPath),
            ValueKind::VPSet => collect!(VPSet, PSet),
            scalar => {
                return Err(ConfigError::type_mismatch(
                    "",
                    "vector kind",
                    scalar.type_name(),
                ))
            }
        })
    }
}

/// Narrow or widen an integer into one of the integer kinds
const MAX_EXACT_DOUBLE: u128 = 1 << 53;

fn integer_as(n: i128, kind: ValueKind) -> Result<Value> {
    let range = || ConfigError::Range {
        path: String::new(),
        value: n.to_string(),
        kind: kind.type_name().to_string(),
    };
    match kind {
        ValueKind::Int32 => i32::try_from(n).map(Value::Int32).map_err(|_| range()),
        ValueKind::UInt32 => u32::try_from(n).map(Value::UInt32).map_err(|_| range()),
        ValueKind::Int64 => i64::try_from(n).map(Value::Int64).map_err(|_| range()),
        ValueKind::UInt64 => u64::try_from(n).map(Value::UInt64).map_err(|_| range()),
        // exact only up to 2^53
        ValueKind::Double if n.unsigned_abs() <= MAX_EXACT_DOUBLE => Ok(Value::Double(n as f64)),
        ValueKind::Double => Err(range()),
        other => Err(ConfigError::type_mismatch("", other.type_name(), "integer")),
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    String => String,
    InputTag => InputTag,
    EventId => EventId,
    EventRange => EventRange,
    FileInPath => FileInPath,
    ParameterSet => PSet,
    Vec<bool> => VBool,
    Vec<i32> => VInt32,
    Vec<u32> => VUInt32,
    Vec<i64> => VInt64,
    Vec<u64> => VUInt64,
    Vec<f64> => VDouble,
    Vec<String> => VString,
    Vec<InputTag> => VInputTag,
    Vec<EventId> => VEventId,
    Vec<EventRange> => VEventRange,
    Vec<FileInPath> => VFileInPath,
    Vec<ParameterSet> => VPSet,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::VString(v.into_iter().map(str::to_string).collect())
    }
}
