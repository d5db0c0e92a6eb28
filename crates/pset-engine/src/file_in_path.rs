//! FileInPath resolution against a search path

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::process::Process;
use crate::pset::Parameter;
use crate::types::{FileInPath, Value};

/// Environment variable holding the colon-separated search path
pub const SEARCH_PATH_VAR: &str = "CMSSW_SEARCH_PATH";

/// Ordered list of directories searched for relative data files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Read `CMSSW_SEARCH_PATH`; unset means an empty search path
    pub fn from_env() -> Self {
        match env::var_os(SEARCH_PATH_VAR) {
            Some(value) => Self::new(env::split_paths(&value).filter(|p| !p.as_os_str().is_empty())),
            None => Self::default(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn display(&self) -> String {
        self.dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl FileInPath {
    /// First existing `dir/relative` in search order
    pub fn resolve(&self, search: &SearchPath) -> Result<PathBuf> {
        for dir in search.dirs() {
            let candidate = dir.join(Path::new(self.relative()));
            if candidate.is_file() {
                log::debug!("resolved '{}' to {}", self.relative(), candidate.display());
                return Ok(candidate);
            }
        }
        Err(ConfigError::FileInPathNotFound {
            path: String::new(),
            file: self.relative().to_string(),
            search_path: search.display(),
        })
    }
}

impl Process {
    /// Resolve every FileInPath parameter of the process, in wire order.
    ///
    /// Returns the parameter path and absolute location of each file. Stops
    /// at the first file that cannot be found.
    pub fn resolve_file_in_paths(&self, search: &SearchPath) -> Result<Vec<(String, PathBuf)>> {
        let mut files: Vec<(String, FileInPath)> = Vec::new();
        let mut collect = |path: &str, param: &Parameter| match param.value() {
            Some(Value::FileInPath(f)) => files.push((path.to_string(), f.clone())),
            Some(Value::VFileInPath(items)) => {
                for (i, f) in items.iter().enumerate() {
                    files.push((format!("{}[{}]", path, i), f.clone()));
                }
            }
            _ => {}
        };

        for (name, param) in &self.top_psets {
            if let Some(Value::PSet(pset)) = param.value() {
                pset.visit(&format!("process.{}", name), &mut collect);
            }
        }
        for node in self.nodes() {
            let prefix = format!("process.{}", node.display_name());
            node.params().visit(&prefix, &mut collect);
        }

        files
            .into_iter()
            .map(|(path, file)| {
                let resolved = file.resolve(search).map_err(|e| e.prefixed(&path))?;
                Ok((path, resolved))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::pset::ParameterSet;
    use std::fs;

    #[test]
    fn test_resolve_first_match_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(second.path().join("CalibTracker/Data")).unwrap();
        fs::write(second.path().join("CalibTracker/Data/detids.dat"), "1 2 3").unwrap();

        let search = SearchPath::new([first.path(), second.path()]);
        let file = FileInPath::new("CalibTracker/Data/detids.dat");
        assert_eq!(
            file.resolve(&search).unwrap(),
            second.path().join("CalibTracker/Data/detids.dat")
        );

        fs::create_dir_all(first.path().join("CalibTracker/Data")).unwrap();
        fs::write(first.path().join("CalibTracker/Data/detids.dat"), "4").unwrap();
        assert_eq!(
            file.resolve(&search).unwrap(),
            first.path().join("CalibTracker/Data/detids.dat")
        );
    }

    #[test]
    fn test_process_resolution_names_the_parameter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("present.txt"), "").unwrap();
        let search = SearchPath::new([dir.path()]);

        let mut process = Process::new("P");
        process
            .add(
                "reader",
                Node::analyzer("Reader")
                    .with_tracked("file", FileInPath::new("present.txt"))
                    .with_tracked(
                        "extra",
                        ParameterSet::new()
                            .with_untracked("more", vec![FileInPath::new("present.txt")]),
                    ),
            )
            .unwrap();
        let found = process.resolve_file_in_paths(&search).unwrap();
        assert_eq!(
            found.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            vec!["process.reader.file", "process.reader.extra.more[0]"]
        );

        process
            .add("missing", Node::analyzer("Reader").with_tracked("file", FileInPath::new("gone.txt")))
            .unwrap();
        match process.resolve_file_in_paths(&search) {
            Err(ConfigError::FileInPathNotFound { path, file, .. }) => {
                assert_eq!(path, "process.missing.file");
                assert_eq!(file, "gone.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_search_path_finds_nothing() {
        let file = FileInPath::new("anything.txt");
        assert!(matches!(
            file.resolve(&SearchPath::default()),
            Err(ConfigError::FileInPathNotFound { .. })
        ));
    }
}
