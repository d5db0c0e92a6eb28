//! Event sources and output modules

use pset_engine::{Node, ValueKind};

/// Read events from ROOT files.
///
/// File lists are untracked so that changing inputs keeps the provenance.
pub fn pool_source<I, S>(file_names: I) -> Node
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let files: Vec<String> = file_names.into_iter().map(Into::into).collect();
    Node::source("PoolSource")
        .with_untracked("fileNames", files)
        .with_untracked("secondaryFileNames", Vec::<String>::new())
        .with_untracked("skipEvents", 0u32)
        .with_optional("eventsToProcess", ValueKind::VEventRange, true)
}

/// Generate empty events, numbered from `first_run`
pub fn empty_source(first_run: u32, events_in_run: u32) -> Node {
    Node::source("EmptySource")
        .with_untracked("firstRun", first_run)
        .with_untracked("firstLuminosityBlock", 1u32)
        .with_untracked("numberEventsInRun", events_in_run)
}

/// Write the kept products to a ROOT file
pub fn pool_output_module(file_name: impl Into<String>) -> Node {
    Node::output("PoolOutputModule")
        .with_untracked("fileName", file_name.into())
        .with_untracked("outputCommands", vec!["keep *"])
        .with_untracked("compressionAlgorithm", "ZSTD")
        .with_untracked("compressionLevel", 4i32)
}

/// Dump products as text
pub fn ascii_output_module(verbosity: u32) -> Node {
    Node::output("AsciiOutputModule")
        .with_untracked("verbosity", verbosity)
        .with_untracked("outputCommands", vec!["keep *"])
}
