//! The engine's view of the program that embeds it.

use qcvm_debug::AbortReport;
use qcvm_foundation::EdictId;
use tracing::{debug, info};

/// Services builtins need from the embedding simulation.
///
/// Every method has a default so a host only implements what it provides.
pub trait Host {
    /// Console output from `bprint`-style builtins.
    fn print(&mut self, text: &str) {
        info!(target: "qcvm::print", "{}", text.trim_end());
    }

    /// Developer output from `dprint`.
    fn dprint(&mut self, text: &str) {
        debug!(target: "qcvm::print", "{}", text.trim_end());
    }

    /// Current value of a console variable, if the host has one by that name.
    fn cvar(&mut self, name: &str) -> Option<f32> {
        let _ = name;
        None
    }

    /// Called before an edict is freed so the host can drop it from its
    /// spatial structures.
    fn unlink_edict(&mut self, id: EdictId) {
        let _ = id;
    }

    /// Receives the diagnostics for every aborted execution.
    fn report(&mut self, report: &AbortReport) {
        let _ = report;
    }
}

/// Host that provides nothing beyond the defaults.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoHost;

impl Host for NoHost {}
