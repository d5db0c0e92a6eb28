//! End-to-end scenarios: build, modify, validate, serialize and parse back

use pretty_assertions::assert_eq;

use pset_engine::{
    module, parse_process, ConfigError, InputTag, Modifier, Node, Overrides, Parameter,
    ParameterSet, Process, ProcessState, SerializeOptions, SerializedProcess, Task, Value,
    ValueKind,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn reader_process() -> Process {
    let mut process = Process::new("Reader");
    process
        .add(
            "source",
            Node::source("EmptySource")
                .with_tracked("numberEventsInRun", 1u32)
                .with_tracked("firstRun", 1u32),
        )
        .unwrap();
    process
        .add("reader", Node::analyzer("SiStripQualityStatistics"))
        .unwrap();
    process.add_path("p1", module("reader")).unwrap();
    process
}

/// A process touching every declaration kind of the wire format
fn rich_process() -> Process {
    let mut process = Process::new_with_eras("RICH", ["Run3"]);
    process
        .set_param("options.numberOfThreads", Parameter::untracked(4u32))
        .unwrap();
    process
        .add_unlabeled(
            Node::service("MessageLogger").with_untracked(
                "cerr",
                ParameterSet::new()
                    .with_untracked("threshold", "INFO")
                    .with_untracked(
                        "FwkReport",
                        ParameterSet::new().with_untracked("reportEvery", 1000i32),
                    ),
            ),
        )
        .unwrap();
    process
        .add(
            "siStripQualityESProducer",
            Node::es_producer("SiStripQualityESProducer")
                .with_tracked(
                    "ListOfRecordToMerge",
                    vec![ParameterSet::new()
                        .with_tracked("record", "SiStripBadChannelRcd")
                        .with_tracked("tag", "")],
                )
                .with_tracked("ReduceGranularity", false)
                .with_tracked("ThresholdForReducedGranularity", 0.3),
        )
        .unwrap();
    process
        .add("GlobalTag", Node::es_source("PoolDBESSource").with_tracked("globaltag", "auto:run3_data"))
        .unwrap();
    process
        .add("prefer", Node::es_prefer("PoolDBESSource"))
        .unwrap();
    process
        .add(
            "source",
            Node::source("PoolSource")
                .with_untracked("fileNames", vec!["file:in.root"])
                .with_untracked("skipEvents", 0u32)
                .with_optional("lumisToProcess", ValueKind::VEventRange, false),
        )
        .unwrap();
    process
        .add(
            "jets",
            Node::producer("JetProducer")
                .with_tracked("src", InputTag::label("particleFlow"))
                .with_tracked("ptMin", 1e-3)
                .with_tracked("etaMax", f64::INFINITY)
                .with_tracked("ids", vec![1i64, -2, 3])
                .with_tracked("label", "quote \" and\ttab"),
        )
        .unwrap();
    process
        .add("jetFilter", Node::filter("JetFilter").with_tracked("src", InputTag::label("jets")))
        .unwrap();
    process
        .add(
            "out",
            Node::output("PoolOutputModule").with_untracked("fileName", "out.root"),
        )
        .unwrap();
    process.add_sequence("jetSeq", module("jets") * "jetFilter").unwrap();
    process
        .add_task("helpers", Task::new(["siStripQualityESProducer"]))
        .unwrap();
    process.add_path("p", !module("jetFilter") * "jets" + "jetSeq").unwrap();
    process.add_end_path("e", module("out")).unwrap();
    process
        .add_modifier(Modifier::new("Run3").to_modify("jets", Overrides::new().set("ptMin", 5.0)))
        .unwrap();
    process
}

#[test]
fn s1_minimal_reader() {
    init_logger();
    let mut process = reader_process();
    let out = process.serialize().unwrap();

    assert_eq!(out.text.matches("\n  source ").count(), 1);
    assert_eq!(out.text.matches("\n  analyzer ").count(), 1);
    assert_eq!(out.text.matches("\n  path p1 = { reader }").count(), 1);
    assert!(out.text.contains("pset U maxEvents = {\n    U input: int32 = -1\n  }"));
    assert_eq!(out.provenance.to_string().len(), 32);
    assert!(out.warnings.is_empty());
    assert_eq!(process.state(), ProcessState::Serialized);
}

#[test]
fn s2_clone_with_override() {
    let n = Node::producer("SoftDropJets").with_tracked("pt_cut", 30.0);
    let n2 = n.clone_with(&Overrides::new().set("pt_cut", 170.0)).unwrap();

    assert_eq!(n2.value("pt_cut").unwrap(), &Value::Double(170.0));
    assert_eq!(n.value("pt_cut").unwrap(), &Value::Double(30.0));
    assert_eq!(n2.class(), n.class());
    assert_eq!(n2.params().len(), n.params().len());
}

#[test]
fn s3_vpset_replace() {
    let record = |tag: &str| {
        ParameterSet::new()
            .with_tracked("record", "R")
            .with_tracked("tag", tag)
    };
    let original = ParameterSet::new().with_tracked("toGet", vec![record("T1")]);
    let cloned = original
        .clone_with(&Overrides::new().set("toGet", vec![record("T2")]))
        .unwrap();

    assert_eq!(
        cloned.find("toGet[0].tag").unwrap().value(),
        Some(&Value::String("T2".to_string()))
    );
    assert_eq!(
        original.find("toGet[0].tag").unwrap().value(),
        Some(&Value::String("T1".to_string()))
    );
}

fn nano_process(era: Option<&str>) -> Process {
    let mut process = Process::new("NANO");
    if let Some(era) = era {
        process.add_era(era).unwrap();
    }
    process.add("source", Node::source("EmptySource")).unwrap();
    process
        .add(
            "fatJetTable",
            Node::producer("SimpleCandidateFlatTableProducer")
                .with_tracked("src", InputTag::label("finalJetsAK8"))
                .with_tracked(
                    "variables",
                    ParameterSet::new().with_tracked(
                        "tau1",
                        ParameterSet::new()
                            .with_tracked("expr", "userFloat('NjettinessAK8Puppi:tau1')")
                            .with_tracked("type", "float"),
                    ),
                ),
        )
        .unwrap();
    let btag = ParameterSet::new()
        .with_tracked("expr", "bDiscriminator('pfCombinedInclusiveSecondaryVertexV2BJetTags')")
        .with_tracked("doc", "CSV V2 btag discriminator")
        .with_tracked("precision", 10i32);
    process
        .add_modifier(
            Modifier::new("run2_nanoAOD_106Xv2")
                .to_modify("fatJetTable.variables", Overrides::new().set("btagCSVV2", btag)),
        )
        .unwrap();
    process.add_path("nanoSequence", module("fatJetTable")).unwrap();
    process
}

#[test]
fn s4_era_modification() {
    let mut with_era = nano_process(Some("run2_nanoAOD_106Xv2"));
    let mut without = nano_process(None);
    let a = with_era.serialize().unwrap();
    let b = without.serialize().unwrap();

    assert!(with_era
        .param("fatJetTable.variables.btagCSVV2.precision")
        .is_ok());
    assert!(matches!(
        without.param("fatJetTable.variables.btagCSVV2"),
        Err(ConfigError::NotFound { .. })
    ));
    assert!(a.text.contains("T btagCSVV2: PSet = {"));
    assert!(!b.text.contains("btagCSVV2"));
    assert_ne!(a.provenance, b.provenance);
}

#[test]
fn s5_path_operators() {
    let mut process = Process::new("PathTest");
    process.add("source", Node::source("EmptySource")).unwrap();
    process.add("busy1", Node::producer("BusyWaitIntProducer")).unwrap();
    process.add("throwException", Node::producer("ExceptionThrowingProducer")).unwrap();
    process.add("filter", Node::filter("Prescaler")).unwrap();
    process.add("producer", Node::producer("IntProducer")).unwrap();

    process
        .add_path("p", module("busy1") * "throwException")
        .unwrap();
    process.add_path("f", !module("filter") * "producer").unwrap();
    assert!(matches!(
        process.add_path("bad", !module("producer") * "busy1"),
        Err(ConfigError::RoleConflict { .. })
    ));

    let out = process.serialize().unwrap();
    assert!(out.text.contains("path p = { busy1 * throwException }"));
    assert!(out.text.contains("path f = { ~filter * producer }"));
}

#[test]
fn s5_negated_producer_rejected_at_validation() {
    let mut process = Process::new("PathTest");
    process.add("source", Node::source("EmptySource")).unwrap();
    // the label is unknown when the path is added, so only validation sees it
    process.add_path("p", !module("producer")).unwrap();
    process.add("producer", Node::producer("IntProducer")).unwrap();
    assert!(matches!(
        process.validate(),
        Err(ConfigError::RoleConflict { .. })
    ));
}

fn logger_text(threshold: &str, comment: &str, first_run: u32) -> String {
    format!(
        r#"# {comment}
process Reader {{
  pset U maxEvents = {{
    U input: int32 = -1
  }}
  service MessageLogger = {{
    T @class: string = "MessageLogger"
    U cerr: PSet = {{
      U threshold: string = "{threshold}"  # {comment}
    }}
  }}
  source source = {{
    T @class: string = "EmptySource"
    T firstRun: uint32 = {first_run}
  }}
  analyzer reader = {{
    T @class: string = "SiStripQualityStatistics"
  }}
  path p1 = {{ reader }}
}}
"#
    )
}

#[test]
fn s6_provenance_invariance() {
    let mut a = parse_process(&logger_text("INFO", "first", 1)).unwrap();
    let mut b = parse_process(&logger_text("ERROR", "second comment", 1)).unwrap();
    let mut c = parse_process(&logger_text("INFO", "first", 2)).unwrap();

    let a = a.serialize().unwrap();
    let b = b.serialize().unwrap();
    let c = c.serialize().unwrap();
    assert_eq!(a.provenance.to_string(), b.provenance.to_string());
    assert_ne!(a.provenance, c.provenance);
}

#[test]
fn round_trip_preserves_text_and_provenance() {
    init_logger();
    let mut process = rich_process();
    let out = process.serialize().unwrap();

    let mut parsed = parse_process(&out.text).unwrap();
    assert_eq!(parsed.state(), ProcessState::Building);
    assert!(parsed.modifiers().is_empty());
    assert_eq!(parsed.to_text(&SerializeOptions::default()), out.text);

    let again = parsed.serialize().unwrap();
    assert_eq!(again.text, out.text);
    assert_eq!(again.provenance, out.provenance);
}

#[test]
fn round_trip_through_zstd() {
    let mut process = rich_process();
    let out = process.serialize().unwrap();
    let bytes = out.to_compressed(&SerializeOptions::default()).unwrap();

    let mut decoded = SerializedProcess::parse_compressed(&bytes).unwrap();
    assert_eq!(decoded.serialize().unwrap().provenance, out.provenance);
}

#[test]
fn compression_level_comes_from_options() {
    let mut process = rich_process();
    let out = process.serialize().unwrap();
    let fast = out
        .to_compressed(&SerializeOptions {
            compression_level: 1,
            ..SerializeOptions::default()
        })
        .unwrap();
    let best = out
        .to_compressed(&SerializeOptions {
            compression_level: 19,
            ..SerializeOptions::default()
        })
        .unwrap();
    assert_eq!(fast, zstd::encode_all(out.as_bytes(), 1).unwrap());
    assert_eq!(best, zstd::encode_all(out.as_bytes(), 19).unwrap());
}

#[test]
fn corrupt_binary_form_is_an_io_error() {
    assert!(matches!(
        SerializedProcess::parse_compressed(b"not zstd"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn preferred_label_survives_round_trip_and_changes_provenance() {
    let build = |target: &str| {
        let mut process = reader_process();
        process
            .add("menu", Node::es_producer("L1TUtmTriggerMenuESProducer"))
            .unwrap();
        process
            .add(
                "preferMenu",
                Node::es_prefer_label("L1TUtmTriggerMenuESProducer", target),
            )
            .unwrap();
        process
    };
    let out = build("TriggerMenu").serialize().unwrap();
    assert!(out.text.contains("T @preferred: string = \"TriggerMenu\""));

    let mut parsed = parse_process(&out.text).unwrap();
    assert_eq!(
        parsed.get("preferMenu").unwrap().preferred_label(),
        Some("TriggerMenu")
    );
    assert_eq!(parsed.serialize().unwrap(), out);
    assert_ne!(build("OtherMenu").serialize().unwrap().provenance, out.provenance);
}

#[test]
fn era_application_is_idempotent() {
    let mut once = rich_process();
    once.apply_era_modifiers().unwrap();
    let mut twice = rich_process();
    twice.apply_era_modifiers().unwrap();
    twice.apply_era_modifiers().unwrap();

    let opts = SerializeOptions::default();
    assert_eq!(once.to_text(&opts), twice.to_text(&opts));
    assert_eq!(
        twice.get("jets").unwrap().value("ptMin").unwrap(),
        &Value::Double(5.0)
    );
    assert_eq!(once.provenance_id(), twice.provenance_id());
}

#[test]
fn clone_purity() {
    let pset = ParameterSet::new()
        .with_tracked("a", 1i32)
        .with_tracked("nested", ParameterSet::new().with_tracked("b", "x"));
    let snapshot = pset.clone();

    assert_eq!(pset.clone_with(&Overrides::new()).unwrap(), pset);
    let changed = pset
        .clone_with(
            &Overrides::new()
                .nested("nested", Overrides::new().set("b", "y").set("c", 2u32))
                .remove("a"),
        )
        .unwrap();
    assert_eq!(pset, snapshot);
    assert!(!changed.has("a"));
    assert_eq!(changed.find("nested.c").unwrap().value(), Some(&Value::UInt32(2)));
}

#[test]
fn source_is_a_singleton() {
    let mut process = reader_process();
    assert!(matches!(
        process.add("otherSource", Node::source("PoolSource")),
        Err(ConfigError::DuplicateSource { .. })
    ));
    process
        .add("source", Node::source("PoolSource"))
        .unwrap();
    assert_eq!(process.source().unwrap().class(), "PoolSource");
}

#[test]
fn validation_reports_unresolved_labels_and_missing_source() {
    let mut process = Process::new("P");
    process.add("reader", Node::analyzer("A")).unwrap();
    process.add_path("p1", module("reader")).unwrap();
    assert!(matches!(
        process.validate(),
        Err(ConfigError::NotFound { path }) if path == "process.source"
    ));

    process.add("source", Node::source("EmptySource")).unwrap();
    process.add_path("p2", module("ghost")).unwrap();
    assert!(matches!(
        process.validate(),
        Err(ConfigError::UnresolvedLabel { label, .. }) if label == "ghost"
    ));
}

#[test]
fn frozen_after_serialize() {
    let mut process = reader_process();
    let first = process.serialize().unwrap();
    assert!(matches!(
        process.add("more", Node::analyzer("A")),
        Err(ConfigError::Frozen(_))
    ));
    assert!(matches!(
        process.set_param("source.firstRun", Parameter::tracked(2u32)),
        Err(ConfigError::Frozen(_))
    ));
    assert_eq!(process.serialize().unwrap(), first);
}

#[test]
fn eras_are_frozen_after_serialize() {
    let mut process = reader_process();
    let first = process.serialize().unwrap();
    assert!(matches!(
        process.add_era("Run3"),
        Err(ConfigError::Frozen(name)) if name == "Reader"
    ));
    assert!(process.eras().is_empty());
    assert_eq!(process.serialize().unwrap(), first);
}

#[test]
fn era_declared_after_validation_still_applies() {
    init_logger();
    let mut process = reader_process();
    process
        .add("jets", Node::producer("JetProducer").with_tracked("ptMin", 1.0))
        .unwrap();
    process
        .add_modifier(Modifier::new("Run3").to_modify("jets", Overrides::new().set("ptMin", 5.0)))
        .unwrap();

    process.validate().unwrap();
    assert_eq!(
        process.get("jets").unwrap().value("ptMin").unwrap(),
        &Value::Double(1.0)
    );

    process.add_era("Run3").unwrap();
    assert_eq!(process.state(), ProcessState::Building);
    let out = process.serialize().unwrap();
    assert_eq!(
        process.get("jets").unwrap().value("ptMin").unwrap(),
        &Value::Double(5.0)
    );
    assert!(out.text.contains("T ptMin: double = 5.0"));
}

#[test]
fn errors_name_the_full_parameter_path() {
    let mut process = rich_process();
    process
        .add_modifier(Modifier::new("Run3").to_modify(
            "siStripQualityESProducer",
            Overrides::new().set("ReduceGranularity", "yes"),
        ))
        .unwrap();
    match process.apply_era_modifiers() {
        Err(ConfigError::Type { path, .. }) => {
            assert_eq!(path, "process.siStripQualityESProducer.ReduceGranularity")
        }
        other => panic!("unexpected {other:?}"),
    }

    let process = rich_process();
    match process.param("siStripQualityESProducer.ListOfRecordToMerge[0].missing") {
        Err(ConfigError::NotFound { path }) => assert_eq!(
            path,
            "process.siStripQualityESProducer.ListOfRecordToMerge[0].missing"
        ),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn json_export_carries_the_tree() {
    let process = rich_process();
    let json: serde_json::Value = serde_json::from_str(&process.to_json().unwrap()).unwrap();
    assert_eq!(json["name"], "RICH");
    assert_eq!(json["eras"], serde_json::json!(["Run3"]));
    assert_eq!(json["modules"].as_object().unwrap().len(), 3);
    assert!(json["modules"]["jets"].is_object());
    assert_eq!(json["source"]["role"], "Source");
    assert_eq!(json["services"].as_array().unwrap().len(), 1);
}
