//! NanoAOD flat-table configuration: eras, column helpers and the AK8 jet tables

use pset_engine::{
    ConfigFragment, FragmentFn, InputTag, Modifier, ModifierChain, Node, Overrides, Parameter,
    ParameterSet, Task, Value,
};

pub fn run2_nanoaod_94x2016() -> Modifier {
    Modifier::new("run2_nanoAOD_94X2016")
}

pub fn run2_nanoaod_102xv1() -> Modifier {
    Modifier::new("run2_nanoAOD_102Xv1")
}

pub fn run2_nanoaod_106xv2() -> Modifier {
    Modifier::new("run2_nanoAOD_106Xv2")
}

pub fn run3_nanoaod_pre142x() -> Modifier {
    Modifier::new("run3_nanoAOD_pre142X")
}

/// Any Run 2 NanoAOD production
pub fn run2_nanoaod_any() -> ModifierChain {
    Modifier::chain(
        "run2_nanoAOD_ANY",
        &[
            &run2_nanoaod_94x2016(),
            &run2_nanoaod_102xv1(),
            &run2_nanoaod_106xv2(),
        ],
    )
}

/// One flat-table column computed from a string expression
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    expr: String,
    kind: String,
    doc: String,
    precision: i32,
    mc_only: bool,
}

impl Var {
    pub fn new(expr: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            kind: kind.into(),
            doc: String::new(),
            precision: -1,
            mc_only: false,
        }
    }

    pub fn float(expr: impl Into<String>) -> Self {
        Self::new(expr, "float")
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Mantissa bits kept on write; -1 keeps full precision
    pub fn precision(mut self, bits: i32) -> Self {
        self.precision = bits;
        self
    }

    pub fn mc_only(mut self) -> Self {
        self.mc_only = true;
        self
    }

    pub fn to_pset(&self) -> ParameterSet {
        ParameterSet::new()
            .with_tracked("expr", self.expr.as_str())
            .with_tracked("type", self.kind.as_str())
            .with_tracked("doc", self.doc.as_str())
            .with_tracked("precision", self.precision)
            .with_tracked("mcOnly", self.mc_only)
            .with_untracked("lazyEval", false)
    }
}

impl From<Var> for Value {
    fn from(var: Var) -> Self {
        Value::PSet(var.to_pset())
    }
}

/// A column read from a value map produced by another module
pub fn ext_var(src: InputTag, kind: &str, doc: &str, precision: i32) -> ParameterSet {
    ParameterSet::new()
        .with_tracked("src", src)
        .with_tracked("type", kind)
        .with_tracked("doc", doc)
        .with_tracked("precision", precision)
        .with_tracked("mcOnly", false)
}

/// Kinematic columns shared by every candidate table
pub fn p4_vars() -> ParameterSet {
    ParameterSet::new()
        .with_tracked("pt", Var::float("pt").precision(-1))
        .with_tracked("phi", Var::float("phi").precision(12))
        .with_tracked("eta", Var::float("eta").precision(12))
        .with_tracked("mass", Var::float("mass").precision(-1))
}

/// Table writer for PAT jets; `variables` starts from [`p4_vars`]
pub fn simple_pat_jet_flat_table(src: InputTag, name: &str, doc: &str) -> Node {
    Node::producer("SimplePATJetFlatTableProducer")
        .with_tracked("src", src)
        .with_tracked("cut", "")
        .with_tracked("name", name)
        .with_tracked("doc", doc)
        .with_tracked("singleton", false)
        .with_tracked("extension", false)
        .with_tracked("skipNonExistingSrc", false)
        .with_tracked("variables", p4_vars())
        .with_tracked("externalVariables", ParameterSet::new())
}

fn csv_v2() -> Var {
    Var::float("bDiscriminator('pfCombinedInclusiveSecondaryVertexV2BJetTags')")
        .doc(" pfCombinedInclusiveSecondaryVertexV2 b-tag discriminator (aka CSVV2)")
        .precision(10)
}

fn fat_jet_variables() -> ParameterSet {
    ParameterSet::with_block(&p4_vars())
        .with_tracked("pt", Var::float("pt").precision(10))
        .with_tracked(
            "area",
            Var::float("jetArea()").doc("jet catchment area, for JECs").precision(10),
        )
        .with_tracked(
            "rawFactor",
            Var::float("1.-jecFactor('Uncorrected')")
                .doc("1 - Factor to get back to raw pT")
                .precision(6),
        )
        .with_tracked(
            "tau1",
            Var::float("userFloat('NjettinessAK8Puppi:tau1')")
                .doc("Nsubjettiness (1 axis)")
                .precision(10),
        )
        .with_tracked(
            "tau2",
            Var::float("userFloat('NjettinessAK8Puppi:tau2')")
                .doc("Nsubjettiness (2 axis)")
                .precision(10),
        )
        .with_tracked(
            "msoftdrop",
            Var::float("groomedMass('SoftDropPuppi')")
                .doc("Corrected soft drop mass with PUPPI")
                .precision(10),
        )
        .with_tracked(
            "particleNet_XbbVsQCD",
            Var::float("bDiscriminator('pfParticleNetFromMiniAODAK8DiscriminatorsJetTags:HbbvsQCD')")
                .doc("ParticleNet X->bb vs. QCD score: Xbb/(Xbb+QCD)")
                .precision(10),
        )
        .with_tracked(
            "subJetIdx1",
            Var::new(
                "?nSubjetCollections()>0 && subjets('SoftDropPuppi').size()>0?subjets('SoftDropPuppi')[0].key():-1",
                "int16",
            )
            .doc("index of first subjet"),
        )
        .with_tracked(
            "subJetIdx2",
            Var::new(
                "?nSubjetCollections()>0 && subjets('SoftDropPuppi').size()>1?subjets('SoftDropPuppi')[1].key():-1",
                "int16",
            )
            .doc("index of second subjet"),
        )
        .with_tracked(
            "nConstituents",
            Var::new("numberOfDaughters()", "uint8").doc("Number of particles in the jet"),
        )
        .with_tracked(
            "chMultiplicity",
            Var::new("?isPFJet()?chargedMultiplicity():-1", "int16")
                .doc("(Puppi-weighted) Number of charged particles in the jet"),
        )
        .with_tracked(
            "neMultiplicity",
            Var::new("?isPFJet()?neutralMultiplicity():-1", "int16")
                .doc("(Puppi-weighted) Number of neutral particles in the jet"),
        )
        .with_tracked(
            "chHEF",
            Var::float("?isPFJet()?chargedHadronEnergyFraction():-1")
                .doc("charged Hadron Energy Fraction")
                .precision(10),
        )
        .with_tracked(
            "neHEF",
            Var::float("?isPFJet()?neutralHadronEnergyFraction():-1")
                .doc("neutral Hadron Energy Fraction")
                .precision(10),
        )
        .with_tracked(
            "muEF",
            Var::float("?isPFJet()?muonEnergyFraction():-1")
                .doc("muon Energy Fraction")
                .precision(10),
        )
}

fn sub_jet_variables() -> ParameterSet {
    ParameterSet::with_block(&p4_vars())
        .with_tracked("pt", Var::float("pt").precision(10))
        .with_tracked(
            "btagDeepFlavB",
            Var::float(
                "bDiscriminator('pfDeepFlavourJetTags:probb')+bDiscriminator('pfDeepFlavourJetTags:probbb')+bDiscriminator('pfDeepFlavourJetTags:problepb')",
            )
            .doc("DeepJet b+bb+lepb tag discriminator")
            .precision(10),
        )
        .with_tracked(
            "UParTAK4RegPtRawCorr",
            Var::float(
                "?bDiscriminator('pfUnifiedParticleTransformerAK4JetTags:ptcorr')>0?bDiscriminator('pfUnifiedParticleTransformerAK4JetTags:ptcorr'):-1",
            )
            .doc("UnifiedParT universal flavor-aware visible pT regression (no neutrinos), correction relative to raw jet pT")
            .precision(10),
        )
        .with_tracked(
            "rawFactor",
            Var::float("1.-jecFactor('Uncorrected')")
                .doc("1 - Factor to get back to raw pT")
                .precision(6),
        )
        .with_tracked(
            "area",
            Var::float("jetArea()").doc("jet catchment area, for JECs").precision(10),
        )
        .with_tracked(
            "n2b1",
            Var::float("userFloat('nb1AK8PuppiSoftDropSubjets:ecfN2')")
                .doc("N2 with beta=1")
                .precision(10),
        )
}

/// Switches for re-running the AK8 taggers on older inputs
pub fn deep_info_ak8_switch() -> ParameterSet {
    ParameterSet::new()
        .with_untracked("nanoAOD_addDeepBTag_switch", false)
        .with_untracked("nanoAOD_addDeepBoostedJet_switch", false)
        .with_untracked("nanoAOD_addDeepDoubleX_switch", false)
        .with_untracked("nanoAOD_addDeepDoubleXV2_switch", false)
        .with_untracked("nanoAOD_addParticleNetMassLegacy_switch", false)
        .with_untracked("nanoAOD_addParticleNet_switch", false)
        .with_untracked("nanoAOD_addGlobalParT_switch", false)
        .with_untracked("jecPayload", "AK8PFPuppi")
}

fn jets_ak8_cff() -> ConfigFragment {
    let fat_jet_table = simple_pat_jet_flat_table(
        InputTag::label("finalJetsAK8"),
        "FatJet",
        "slimmedJetsAK8, i.e. ak8 fat jets for boosted analysis",
    )
    .with_tracked("cut", " pt > 170")
    .with_tracked("variables", fat_jet_variables())
    .with_tracked(
        "externalVariables",
        ParameterSet::new()
            .with_tracked(
                "lsf3",
                ext_var(
                    InputTag::new("lepInAK8JetVars", "lsf3", ""),
                    "float",
                    "Lepton Subjet Fraction (3 subjets)",
                    10,
                ),
            )
            .with_tracked(
                "muonIdx3SJ",
                ext_var(
                    InputTag::new("lepInAK8JetVars", "muIdx3SJ", ""),
                    "int16",
                    "index of muon matched to jet",
                    -1,
                ),
            ),
    );
    let sub_jet_table = simple_pat_jet_flat_table(
        InputTag::new("slimmedJetsAK8PFPuppiSoftDropPacked", "SubJets", ""),
        "SubJet",
        "slimmedJetsAK8PFPuppiSoftDropPacked::SubJets, i.e. soft-drop subjets for ak8 fat jets for boosted analysis",
    )
    .with_tracked("variables", sub_jet_variables());

    ConfigFragment::new("PhysicsTools.NanoAOD.jetsAK8_cff")
        .with_pset(
            "nanoAOD_addDeepInfoAK8_switch",
            Parameter::tracked(deep_info_ak8_switch()),
        )
        .with_node(
            "jetCorrFactorsAK8",
            Node::producer("JetCorrFactorsProducer")
                .with_tracked("src", InputTag::label("slimmedJetsAK8"))
                .with_tracked(
                    "levels",
                    vec!["L1FastJet", "L2Relative", "L3Absolute", "L2L3Residual"],
                )
                .with_tracked("payload", "AK8PFPuppi")
                .with_tracked("primaryVertices", InputTag::label("offlineSlimmedPrimaryVertices")),
        )
        .with_node(
            "updatedJetsAK8",
            Node::producer("PATJetUpdater")
                .with_tracked("addBTagInfo", false)
                .with_tracked("jetSource", InputTag::label("slimmedJetsAK8"))
                .with_tracked(
                    "jetCorrFactorsSource",
                    vec![InputTag::label("jetCorrFactorsAK8")],
                ),
        )
        .with_node(
            "updatedJetsAK8WithUserData",
            Node::producer("PATJetUserDataEmbedder")
                .with_tracked("src", InputTag::label("updatedJetsAK8"))
                .with_tracked("userFloats", ParameterSet::new())
                .with_tracked("userInts", ParameterSet::new()),
        )
        .with_node(
            "finalJetsAK8",
            Node::filter("PATJetRefSelector")
                .with_tracked("src", InputTag::label("updatedJetsAK8WithUserData"))
                .with_tracked("cut", "pt > 170"),
        )
        .with_node(
            "lepInAK8JetVars",
            Node::producer("LepInJetProducer")
                .with_tracked("src", InputTag::label("updatedJetsAK8WithUserData"))
                .with_tracked("srcEle", InputTag::label("finalElectrons"))
                .with_tracked("srcMu", InputTag::label("finalMuons")),
        )
        .with_node("fatJetTable", fat_jet_table)
        .with_node("subJetTable", sub_jet_table)
        .with_modifier(
            run2_nanoaod_any().to_modify(
                "fatJetTable.variables",
                Overrides::new()
                    .set("btagCSVV2", csv_v2())
                    .remove("chMultiplicity")
                    .remove("neMultiplicity")
                    .remove("chHEF")
                    .remove("neHEF")
                    .remove("muEF"),
            ),
        )
        .with_modifier(
            run2_nanoaod_106xv2().to_modify(
                "fatJetTable.variables",
                Overrides::new().set(
                    "btagHbb",
                    Var::float("bDiscriminator('pfBoostedDoubleSecondaryVertexAK8BJetTags')")
                        .doc("Higgs to BB tagger discriminator")
                        .precision(10),
                ),
            ),
        )
        .with_modifier(
            run2_nanoaod_106xv2().to_modify(
                "nanoAOD_addDeepInfoAK8_switch",
                Overrides::new()
                    .set("nanoAOD_addParticleNetMassLegacy_switch", true)
                    .set("nanoAOD_addParticleNet_switch", true)
                    .set("nanoAOD_addGlobalParT_switch", true),
            ),
        )
        .with_modifier(
            run2_nanoaod_any().to_modify("subJetTable.variables", Overrides::new().set("btagCSVV2", csv_v2())),
        )
        .with_modifier(run2_nanoaod_106xv2().to_modify(
            "subJetTable.variables",
            Overrides::new().remove("area").remove("UParTAK4RegPtRawCorr"),
        ))
        .with_modifier(
            run3_nanoaod_pre142x().to_modify(
                "subJetTable.variables",
                Overrides::new()
                    .remove("btagDeepFlavB")
                    .remove("UParTAK4RegPtRawCorr")
                    .set(
                        "btagDeepB",
                        Var::float(
                            "bDiscriminator('pfDeepCSVJetTags:probb')+bDiscriminator('pfDeepCSVJetTags:probbb')",
                        )
                        .doc("DeepCSV b+bb tag discriminator")
                        .precision(10),
                    ),
            ),
        )
        .with_task("jetAK8UserDataTask", Task::default())
        .with_task(
            "jetAK8Task",
            Task::new([
                "jetCorrFactorsAK8",
                "updatedJetsAK8",
                "jetAK8UserDataTask",
                "updatedJetsAK8WithUserData",
                "finalJetsAK8",
            ]),
        )
        .with_task("jetAK8LepTask", Task::new(["lepInAK8JetVars"]))
        .with_task("jetAK8TablesTask", Task::new(["fatJetTable", "subJetTable"]))
}

inventory::submit!(FragmentFn {
    id: "PhysicsTools.NanoAOD.jetsAK8_cff",
    build: jets_ak8_cff,
});
