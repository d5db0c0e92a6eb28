//! pset-engine - Typed job configuration for an event-processing framework
//!
//! A [`Process`] is built from typed parameter sets, labeled plugin nodes,
//! path expressions and era modifiers, then validated and frozen into a
//! deterministic text form with a 128-bit provenance id.
//!
//! - `ParameterSet`: ordered, typed, tracked/untracked parameters
//! - `Node`: a plugin instance with a role and a `@class`
//! - `PathExpr`: `a * b` runs in order, `a + b` groups, `!f` negates a filter
//! - `Modifier`: era-conditioned patches applied before validation
//! - `parse_process`: the inverse of serialization
//!
//! # Example
//!
//! ```ignore
//! use pset_engine::{module, Node, Process};
//!
//! let mut process = Process::new("Reader");
//! process.add("source", Node::source("EmptySource").with_tracked("firstRun", 1u32))?;
//! process.add("reader", Node::analyzer("SiStripQualityStatistics"))?;
//! process.add_path("p1", module("reader"))?;
//! let out = process.serialize()?;
//! println!("{} {}", out.provenance, out.text);
//! ```

pub mod config;
pub mod error;
pub mod file_in_path;
pub mod fragment;
pub mod hash;
pub mod modifier;
pub mod node;
pub mod parse;
pub mod path;
pub mod process;
pub mod pset;
pub mod serialize;
pub mod types;
pub mod validation;
pub mod var_parsing;

// Re-export key types
pub use config::SerializeOptions;
pub use error::{ConfigError, Result};
pub use file_in_path::SearchPath;
pub use fragment::{ConfigFragment, FragmentFn, FragmentStore};
pub use hash::ProvenanceId;
pub use modifier::{Modifier, ModifierChain, Patch, PatchAction};
pub use node::{Node, Role, CLASS_PARAM, PREFERRED_PARAM};
pub use parse::parse_process;
pub use path::{module, PathDef, PathExpr, PathKind, Schedule, Task};
pub use process::{Process, ProcessState};
pub use pset::{Override, Overrides, Parameter, ParameterSet};
pub use serialize::SerializedProcess;
pub use types::{EventId, EventRange, FileInPath, InputTag, Value, ValueKind};
pub use validation::ValidationWarning;
pub use var_parsing::{Multiplicity, VarParsing, VarType, VarValue};

// Fragment crates register with `inventory::submit!`
pub use inventory;
