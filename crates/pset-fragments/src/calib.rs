//! Tracker calibration: strip quality and conditions access

use pset_engine::{ConfigFragment, FragmentFn, Node, ParameterSet};

/// A `{record, tag}` entry as used by `toGet` and `ListOfRecordToMerge`
pub fn record(record: &str, tag: &str) -> ParameterSet {
    ParameterSet::new()
        .with_tracked("record", record)
        .with_tracked("tag", tag)
}

/// Conditions read from a database connection
pub fn pool_db_es_source(connect: &str, to_get: &[(&str, &str)]) -> Node {
    Node::es_source("PoolDBESSource")
        .with_tracked(
            "DBParameters",
            ParameterSet::new()
                .with_untracked("messageLevel", 0i32)
                .with_untracked("authenticationPath", ""),
        )
        .with_tracked("connect", connect)
        .with_tracked(
            "toGet",
            to_get
                .iter()
                .map(|(rcd, tag)| record(rcd, tag))
                .collect::<Vec<_>>(),
        )
}

const QUALITY_RECORDS: [&str; 7] = [
    "SiStripDetVOffRcd",
    "SiStripDetCablingRcd",
    "RunInfoRcd",
    "SiStripBadChannelRcd",
    "SiStripBadFiberRcd",
    "SiStripBadModuleRcd",
    "SiStripBadStripRcd",
];

/// Merges the bad-component records into one strip quality object
pub fn si_strip_quality_es_producer() -> Node {
    Node::es_producer("SiStripQualityESProducer")
        .with_tracked("appendToDataLabel", "")
        .with_tracked(
            "ListOfRecordToMerge",
            QUALITY_RECORDS
                .iter()
                .map(|rcd| record(rcd, ""))
                .collect::<Vec<_>>(),
        )
        .with_tracked("ReduceGranularity", false)
        .with_tracked("ThresholdForReducedGranularity", 0.3)
        .with_tracked("PrintDebugOutput", false)
        .with_tracked("UseEmptyRunInfo", false)
}

/// Summary of the bad components seen by the strip quality
pub fn si_strip_quality_statistics() -> Node {
    Node::analyzer("SiStripQualityStatistics")
        .with_untracked("TkMapFileName", "")
        .with_untracked("dataLabel", "")
        .with_untracked("SaveTkHistoMap", true)
}

fn si_strip_quality_es_producer_cfi() -> ConfigFragment {
    ConfigFragment::new("CalibTracker.SiStripESProducers.SiStripQualityESProducer_cfi")
        .with_node("siStripQualityESProducer", si_strip_quality_es_producer())
}

inventory::submit!(FragmentFn {
    id: "CalibTracker.SiStripESProducers.SiStripQualityESProducer_cfi",
    build: si_strip_quality_es_producer_cfi,
});

fn si_strip_quality_statistics_cfi() -> ConfigFragment {
    ConfigFragment::new("CalibTracker.SiStripQuality.siStripQualityStatistics_cfi")
        .with_node("siStripQualityStatistics", si_strip_quality_statistics())
}

inventory::submit!(FragmentFn {
    id: "CalibTracker.SiStripQuality.siStripQualityStatistics_cfi",
    build: si_strip_quality_statistics_cfi,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::empty_source;
    use pset_engine::{module, FragmentStore, Overrides, Parameter, Process, Value};
    use pretty_assertions::assert_eq;

    fn quality_reader() -> Process {
        let mut process = Process::new("Reader");
        process.add("source", empty_source(1, 1)).unwrap();
        process
            .add(
                "poolDBESSource",
                pool_db_es_source(
                    "sqlite_file:dbfile.db",
                    &[("SiStripBadModuleRcd", "SiStripBadModule_Fake_merged2")],
                ),
            )
            .unwrap();
        process
            .load_by_id("CalibTracker.SiStripESProducers.SiStripQualityESProducer_cfi")
            .unwrap();
        process
            .set_param(
                "siStripQualityESProducer.ListOfRecordToMerge",
                Parameter::tracked(vec![record("SiStripBadModuleRcd", "")]),
            )
            .unwrap();

        let statistics = FragmentStore::global()
            .get("CalibTracker.SiStripQuality.siStripQualityStatistics_cfi")
            .unwrap();
        let reader = statistics
            .node("siStripQualityStatistics")
            .unwrap()
            .clone_with(&Overrides::new())
            .unwrap();
        process.add("reader", reader).unwrap();
        process.add_path("p1", module("reader")).unwrap();
        process
    }

    #[test]
    fn test_merge_list_is_replaced() {
        let mut process = quality_reader();
        assert!(process.validate().unwrap().is_empty());
        let merged = process
            .param("siStripQualityESProducer.ListOfRecordToMerge")
            .unwrap()
            .value()
            .unwrap()
            .as_vpset()
            .unwrap()
            .to_vec();
        assert_eq!(merged, vec![record("SiStripBadModuleRcd", "")]);
    }

    #[test]
    fn test_default_merge_list_covers_every_record() {
        let node = si_strip_quality_es_producer();
        let list = node.value("ListOfRecordToMerge").unwrap().as_vpset().unwrap();
        assert_eq!(list.len(), QUALITY_RECORDS.len());
        assert_eq!(
            list[2].value("record").unwrap(),
            &Value::String("RunInfoRcd".to_string())
        );
    }

    #[test]
    fn test_reader_survives_a_text_round_trip() {
        let mut process = quality_reader();
        let serialized = process.serialize().unwrap();
        let mut reparsed = pset_engine::parse_process(&serialized.text).unwrap();
        assert_eq!(reparsed.serialize().unwrap(), serialized);
    }
}
