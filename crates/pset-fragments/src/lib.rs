//! Built-in configuration fragments
//!
//! Each module registers its fragments with [`pset_engine::FragmentStore`]
//! at link time and exposes typed constructors for the plugins it uses.
//!
//! ```no_run
//! use pset_engine::Process;
//!
//! // Make sure the registrations are linked in
//! pset_fragments::link();
//!
//! let mut process = Process::new_with_eras("NANO", ["run2_nanoAOD_106Xv2"]);
//! process.load_by_id("PhysicsTools.NanoAOD.jetsAK8_cff").unwrap();
//! ```

pub mod calib;
pub mod io;
pub mod nano;
pub mod services;

pub use calib::{pool_db_es_source, si_strip_quality_es_producer, si_strip_quality_statistics};
pub use io::{ascii_output_module, empty_source, pool_output_module, pool_source};
pub use nano::{ext_var, p4_vars, simple_pat_jet_flat_table, Var};
pub use services::{message_logger, timing};

/// Forces the linker to keep this crate so its fragments are registered
pub fn link() {
    log::trace!(
        "pset-fragments linked, {} fragments registered",
        pset_engine::FragmentStore::ids().len()
    );
}
