//! Command-line options for configuration scripts
//!
//! A [`VarParsing`] registry declares named, typed options with defaults,
//! then reads `name=value` tokens. List options may repeat or take
//! comma-separated values; the first value given on the command line
//! replaces the default list.
//!
//! ```ignore
//! let mut options = VarParsing::analysis();
//! options.register("runNumber", 1i64, Multiplicity::Singleton, VarType::Int, "run to process")?;
//! options.parse_arguments(std::env::args().skip(1))?;
//! process.set_param("source.firstRun", options.to_parameter("runNumber", true)?)?;
//! ```

use std::fmt;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pset::Parameter;
use crate::types::{Value, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    Singleton,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    Int,
    Float,
    Bool,
    String,
}

impl VarType {
    fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
        }
    }

    fn parse(&self, option: &str, text: &str) -> Result<VarValue> {
        let bad = |reason: &str| {
            ConfigError::parse(format!("option '{}'", option), text, reason)
        };
        match self {
            Self::Int => text
                .trim()
                .parse::<i64>()
                .map(VarValue::Int)
                .map_err(|_| bad("expected an integer")),
            Self::Float => text
                .trim()
                .parse::<f64>()
                .map(VarValue::Float)
                .map_err(|_| bad("expected a number")),
            Self::Bool => match text.trim() {
                "1" | "true" | "True" | "TRUE" => Ok(VarValue::Bool(true)),
                "0" | "false" | "False" | "FALSE" => Ok(VarValue::Bool(false)),
                _ => Err(bad("expected true/false or 1/0")),
            },
            Self::String => Ok(VarValue::String(text.to_string())),
        }
    }
}

/// A single option value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl VarValue {
    /// Adopt `ty`, widening integers into floats
    fn conform(self, option: &str, ty: VarType) -> Result<VarValue> {
        match (self, ty) {
            (v @ VarValue::Int(_), VarType::Int)
            | (v @ VarValue::Float(_), VarType::Float)
            | (v @ VarValue::Bool(_), VarType::Bool)
            | (v @ VarValue::String(_), VarType::String) => Ok(v),
            (VarValue::Int(n), VarType::Float) => Ok(VarValue::Float(n as f64)),
            (other, ty) => Err(ConfigError::type_mismatch(option, ty.name(), other.type_name())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for VarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for VarValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct VarOption {
    multiplicity: Multiplicity,
    var_type: VarType,
    help: String,
    default: Vec<VarValue>,
    values: Vec<VarValue>,
    /// A list option given on the command line drops its default first
    set_from_args: bool,
}

/// Registry of command-line options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarParsing {
    options: IndexMap<String, VarOption>,
}

impl VarParsing {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard analysis options: `maxEvents`, `inputFiles`,
    /// `secondaryInputFiles` and `outputFile`
    pub fn analysis() -> Self {
        let mut options = Self::new();
        let standard = [
            ("maxEvents", Multiplicity::Singleton, VarType::Int, Some(VarValue::Int(-1)), "Number of events to process (-1 for all)"),
            ("inputFiles", Multiplicity::List, VarType::String, None, "Files to process"),
            ("secondaryInputFiles", Multiplicity::List, VarType::String, None, "Second group of files to process (if needed)"),
            ("outputFile", Multiplicity::Singleton, VarType::String, Some(VarValue::from("output.root")), "Name of output file (if needed)"),
        ];
        for (name, multiplicity, var_type, default, help) in standard {
            options.options.insert(
                name.to_string(),
                VarOption {
                    multiplicity,
                    var_type,
                    help: help.to_string(),
                    default: default.clone().into_iter().collect(),
                    values: default.into_iter().collect(),
                    set_from_args: false,
                },
            );
        }
        options
    }

    /// Declare an option. A list option starts with `default` as its only
    /// element; use [`register_list`](Self::register_list) for other
    /// defaults.
    pub fn register(
        &mut self,
        name: &str,
        default: impl Into<VarValue>,
        multiplicity: Multiplicity,
        var_type: VarType,
        help: &str,
    ) -> Result<()> {
        let default = default.into().conform(name, var_type)?;
        self.insert(name, multiplicity, var_type, vec![default], help)
    }

    /// Declare a list option with any number of default elements
    pub fn register_list<I, V>(&mut self, name: &str, defaults: I, var_type: VarType, help: &str) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<VarValue>,
    {
        let defaults = defaults
            .into_iter()
            .map(|v| v.into().conform(name, var_type))
            .collect::<Result<Vec<_>>>()?;
        self.insert(name, Multiplicity::List, var_type, defaults, help)
    }

    fn insert(
        &mut self,
        name: &str,
        multiplicity: Multiplicity,
        var_type: VarType,
        default: Vec<VarValue>,
        help: &str,
    ) -> Result<()> {
        if self.options.contains_key(name) {
            return Err(ConfigError::parse("option name", name, "already registered"));
        }
        self.options.insert(
            name.to_string(),
            VarOption {
                multiplicity,
                var_type,
                help: help.to_string(),
                values: default.clone(),
                default,
                set_from_args: false,
            },
        );
        Ok(())
    }

    /// Read `name=value` tokens
    pub fn parse_arguments<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            let (name, text) = arg
                .split_once('=')
                .ok_or_else(|| ConfigError::parse("argument", arg, "expected name=value"))?;
            let option = self
                .options
                .get_mut(name)
                .ok_or_else(|| ConfigError::parse("argument", arg, format!("unknown option '{}'", name)))?;

            match option.multiplicity {
                Multiplicity::Singleton => {
                    option.values = vec![option.var_type.parse(name, text)?];
                }
                Multiplicity::List => {
                    if !option.set_from_args {
                        option.values.clear();
                        option.set_from_args = true;
                    }
                    for piece in text.split(',').filter(|p| !p.is_empty()) {
                        option.values.push(option.var_type.parse(name, piece)?);
                    }
                }
            }
            log::debug!("option {} = {}", name, text);
        }
        Ok(())
    }

    /// Set a singleton or replace a list from code
    pub fn set(&mut self, name: &str, value: impl Into<VarValue>) -> Result<()> {
        let option = self.option_mut(name)?;
        let value = value.into().conform(name, option.var_type)?;
        option.values = vec![value];
        Ok(())
    }

    /// Reset every option to its default
    pub fn clear(&mut self) {
        for option in self.options.values_mut() {
            option.values = option.default.clone();
            option.set_from_args = false;
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    fn option(&self, name: &str) -> Result<&VarOption> {
        self.options
            .get(name)
            .ok_or_else(|| ConfigError::not_found(format!("options.{}", name)))
    }

    fn option_mut(&mut self, name: &str) -> Result<&mut VarOption> {
        self.options
            .get_mut(name)
            .ok_or_else(|| ConfigError::not_found(format!("options.{}", name)))
    }

    /// Value of a singleton option
    pub fn value(&self, name: &str) -> Result<&VarValue> {
        let option = self.option(name)?;
        if option.multiplicity == Multiplicity::List {
            return Err(ConfigError::type_mismatch(name, "singleton", "list"));
        }
        option
            .values
            .first()
            .ok_or_else(|| ConfigError::not_found(format!("options.{}", name)))
    }

    /// Every value of an option, in order
    pub fn values(&self, name: &str) -> Result<&[VarValue]> {
        Ok(&self.option(name)?.values)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            VarValue::Int(v) => Ok(*v),
            other => Err(ConfigError::type_mismatch(name, "int", other.type_name())),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.value(name)? {
            VarValue::Float(v) => Ok(*v),
            VarValue::Int(v) => Ok(*v as f64),
            other => Err(ConfigError::type_mismatch(name, "float", other.type_name())),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.value(name)? {
            VarValue::Bool(v) => Ok(*v),
            other => Err(ConfigError::type_mismatch(name, "bool", other.type_name())),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        match self.value(name)? {
            VarValue::String(v) => Ok(v),
            other => Err(ConfigError::type_mismatch(name, "string", other.type_name())),
        }
    }

    pub fn strings(&self, name: &str) -> Result<Vec<&str>> {
        self.values(name)?
            .iter()
            .map(|v| match v {
                VarValue::String(s) => Ok(s.as_str()),
                other => Err(ConfigError::type_mismatch(name, "string", other.type_name())),
            })
            .collect()
    }

    /// Convert an option into a parameter: ints become `int32`, floats
    /// `double`, lists the matching vector type
    pub fn to_parameter(&self, name: &str, tracked: bool) -> Result<Parameter> {
        let option = self.option(name)?;
        let scalar_kind = match option.var_type {
            VarType::Int => ValueKind::Int32,
            VarType::Float => ValueKind::Double,
            VarType::Bool => ValueKind::Bool,
            VarType::String => ValueKind::String,
        };
        let to_value = |v: &VarValue| -> Result<Value> {
            let raw = match v {
                VarValue::Int(n) => Value::Int64(*n),
                VarValue::Float(x) => Value::Double(*x),
                VarValue::Bool(b) => Value::Bool(*b),
                VarValue::String(s) => Value::String(s.clone()),
            };
            raw.coerce_to(scalar_kind)
        };

        let value = match option.multiplicity {
            Multiplicity::Singleton => to_value(self.value(name)?),
            Multiplicity::List => {
                let kind = match option.var_type {
                    VarType::Int => ValueKind::VInt32,
                    VarType::Float => ValueKind::VDouble,
                    VarType::Bool => ValueKind::VBool,
                    VarType::String => ValueKind::VString,
                };
                let items = option
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| to_value(v).map_err(|e| e.prefixed(&format!("[{}]", i))))
                    .collect::<Result<Vec<_>>>()?;
                Value::from_elements(kind, items)
            }
        }
        .map_err(|e| e.prefixed(name))?;

        Ok(Parameter::tracked(value).with_tracked(tracked))
    }

    /// One line per option: name, type, current value and help
    pub fn help_text(&self) -> String {
        let width = self.options.keys().map(String::len).max().unwrap_or(0);
        let mut out = String::new();
        for (name, option) in &self.options {
            let current = option
                .values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let kind = match option.multiplicity {
                Multiplicity::Singleton => option.var_type.name().to_string(),
                Multiplicity::List => format!("{} list", option.var_type.name()),
            };
            let _ = writeln!(
                out,
                "{:width$}  ({}) = {}  {}",
                name,
                kind,
                current,
                option.help,
                width = width
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streamer_options() -> VarParsing {
        let mut options = VarParsing::analysis();
        options
            .register("runkey", "pp_run", Multiplicity::Singleton, VarType::String, "Run Keys of CMS")
            .unwrap();
        options
            .register("runNumber", 356383i64, Multiplicity::Singleton, VarType::Int, "Run number")
            .unwrap();
        options
            .register("noDB", true, Multiplicity::Singleton, VarType::Bool, "Don't upload the BeamSpot conditions")
            .unwrap();
        options
    }

    #[test]
    fn test_defaults() {
        let options = streamer_options();
        assert_eq!(options.string("runkey").unwrap(), "pp_run");
        assert_eq!(options.int("runNumber").unwrap(), 356383);
        assert_eq!(options.int("maxEvents").unwrap(), -1);
        assert_eq!(options.string("outputFile").unwrap(), "output.root");
        assert!(options.strings("inputFiles").unwrap().is_empty());
    }

    #[test]
    fn test_parse_arguments() {
        let mut options = streamer_options();
        options
            .parse_arguments([
                "runNumber=1",
                "noDB=False",
                "inputFiles=a.root,b.root",
                "inputFiles=c.root",
            ])
            .unwrap();
        assert_eq!(options.int("runNumber").unwrap(), 1);
        assert!(!options.bool("noDB").unwrap());
        assert_eq!(options.strings("inputFiles").unwrap(), vec!["a.root", "b.root", "c.root"]);
    }

    #[test]
    fn test_list_default_replaced_once() {
        let mut options = VarParsing::new();
        options
            .register_list("detIds", [1i64, 2], VarType::Int, "modules to mask")
            .unwrap();
        options.parse_arguments(["detIds=7", "detIds=8,9"]).unwrap();
        assert_eq!(
            options.values("detIds").unwrap(),
            &[VarValue::Int(7), VarValue::Int(8), VarValue::Int(9)]
        );
        options.clear();
        assert_eq!(options.values("detIds").unwrap(), &[VarValue::Int(1), VarValue::Int(2)]);
    }

    #[test]
    fn test_parse_errors() {
        let mut options = streamer_options();
        assert!(matches!(
            options.parse_arguments(["nosuch=1"]),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            options.parse_arguments(["runNumber=abc"]),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            options.parse_arguments(["runNumber"]),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            options.register("runkey", "x", Multiplicity::Singleton, VarType::String, ""),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            options.register("flag", "yes", Multiplicity::Singleton, VarType::Bool, ""),
            Err(ConfigError::Type { .. })
        ));
    }

    #[test]
    fn test_set_and_getters() {
        let mut options = streamer_options();
        options.set("runkey", "cosmic_run").unwrap();
        assert_eq!(options.string("runkey").unwrap(), "cosmic_run");
        assert!(matches!(options.int("runkey"), Err(ConfigError::Type { .. })));
        assert!(matches!(options.value("inputFiles"), Err(ConfigError::Type { .. })));
        assert!(matches!(options.int("missing"), Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_to_parameter() {
        let mut options = streamer_options();
        options.parse_arguments(["inputFiles=file:a.root"]).unwrap();

        let run = options.to_parameter("runNumber", true).unwrap();
        assert_eq!(run.value(), Some(&Value::Int32(356383)));
        assert!(run.is_tracked());

        let files = options.to_parameter("inputFiles", false).unwrap();
        assert_eq!(files.value(), Some(&Value::VString(vec!["file:a.root".to_string()])));
        assert!(!files.is_tracked());

        options.set("runNumber", 5_000_000_000i64).unwrap();
        assert!(matches!(
            options.to_parameter("runNumber", true),
            Err(ConfigError::Range { path, .. }) if path == "runNumber"
        ));
    }

    #[test]
    fn test_help_text_lists_options() {
        let help = streamer_options().help_text();
        assert!(help.contains("runkey"));
        assert!(help.contains("(int) = 356383"));
        assert!(help.contains("(string list)"));
        assert_eq!(help.lines().count(), 7);
    }
}
