//! Configuration for abort diagnostics.

/// Controls what an abort report contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// Disassemble the offending statement.
    pub disassemble_statement: bool,
    /// Dump the `self` edict when a null or out-of-range function is called.
    pub dump_self_on_null_call: bool,
    /// Frames to include in stack traces (innermost first).
    pub max_trace_frames: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            disassemble_statement: true,
            dump_self_on_null_call: true,
            max_trace_frames: 64,
        }
    }
}

impl DiagnosticsConfig {
    /// A configuration that only keeps the message and the stack.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            disassemble_statement: false,
            dump_self_on_null_call: false,
            max_trace_frames: 16,
        }
    }

    /// Builder method to enable/disable statement disassembly.
    #[must_use]
    pub fn with_disassembly(mut self, enabled: bool) -> Self {
        self.disassemble_statement = enabled;
        self
    }

    /// Builder method to enable/disable the `self` dump.
    #[must_use]
    pub fn with_self_dump(mut self, enabled: bool) -> Self {
        self.dump_self_on_null_call = enabled;
        self
    }

    /// Builder method to set the frame limit.
    #[must_use]
    pub fn with_max_trace_frames(mut self, frames: usize) -> Self {
        self.max_trace_frames = frames;
        self
    }
}
