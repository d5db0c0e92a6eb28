//! Framework services

use pset_engine::{ConfigFragment, FragmentFn, Node, ParameterSet};

/// The message logger with its standard `cerr` destination
pub fn message_logger() -> Node {
    Node::service("MessageLogger")
        .with_untracked(
            "cerr",
            ParameterSet::new()
                .with_untracked("enable", true)
                .with_untracked("threshold", "INFO")
                .with_untracked("noTimeStamps", false)
                .with_untracked(
                    "FwkReport",
                    ParameterSet::new()
                        .with_untracked("reportEvery", 1i32)
                        .with_untracked("limit", 10_000_000i32),
                )
                .with_untracked(
                    "default",
                    ParameterSet::new().with_untracked("limit", 10_000_000i32),
                ),
        )
        .with_untracked("debugModules", Vec::<String>::new())
        .with_untracked("suppressInfo", Vec::<String>::new())
        .with_untracked("suppressWarning", Vec::<String>::new())
        .with_untracked("files", ParameterSet::new())
}

/// Per-module timing summary
pub fn timing(summary_only: bool) -> Node {
    Node::service("Timing")
        .with_untracked("summaryOnly", summary_only)
        .with_untracked("useJobReport", true)
}

fn message_logger_cfi() -> ConfigFragment {
    ConfigFragment::new("FWCore.MessageService.MessageLogger_cfi").with_unlabeled(message_logger())
}

inventory::submit!(FragmentFn {
    id: "FWCore.MessageService.MessageLogger_cfi",
    build: message_logger_cfi,
});

fn timing_cfi() -> ConfigFragment {
    ConfigFragment::new("FWCore.Services.Timing_cfi").with_unlabeled(timing(false))
}

inventory::submit!(FragmentFn {
    id: "FWCore.Services.Timing_cfi",
    build: timing_cfi,
});

#[cfg(test)]
mod tests {
    use super::*;
    use pset_engine::{Parameter, Process, Value};

    #[test]
    fn test_report_every_is_adjustable_after_load() {
        let mut process = Process::new("Test");
        process
            .load_by_id("FWCore.MessageService.MessageLogger_cfi")
            .unwrap();
        process
            .set_param(
                "MessageLogger.cerr.FwkReport.reportEvery",
                Parameter::untracked(100i32),
            )
            .unwrap();
        assert_eq!(
            process
                .param("MessageLogger.cerr.FwkReport.reportEvery")
                .unwrap()
                .value(),
            Some(&Value::Int32(100))
        );
    }

    #[test]
    fn test_timing_is_keyed_by_class() {
        let mut process = Process::new("Test");
        process.add_unlabeled(timing(true)).unwrap();
        let node = process.get("Timing").unwrap();
        assert_eq!(node.label(), None);
        assert_eq!(node.value("summaryOnly").unwrap(), &Value::Bool(true));
    }
}
