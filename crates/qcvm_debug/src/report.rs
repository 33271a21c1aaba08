//! The diagnostics bundle produced when execution aborts.

use std::fmt;

use qcvm_foundation::{EdictId, Error, ErrorContext};
use qcvm_storage::EdictStore;

use crate::config::DiagnosticsConfig;
use crate::disasm::disassemble;
use crate::dump::dump_edict;
use crate::stack::{StackFrame, format_stack};
use crate::view::ProgramView;

/// Message plus context for one fatal error.
#[derive(Clone, Debug)]
pub struct AbortReport {
    /// The error message.
    pub message: String,
    /// Statement, stack, and edict diagnostics.
    pub context: ErrorContext,
}

impl AbortReport {
    /// Gathers diagnostics for an abort at `statement`.
    ///
    /// `frames` is innermost first. `edict`, when given, is dumped if it
    /// names an existing edict. Nothing here can fail: missing pieces
    /// render as placeholders.
    #[must_use]
    pub fn capture(
        view: &ProgramView<'_>,
        config: &DiagnosticsConfig,
        statement: Option<usize>,
        frames: &[StackFrame],
        edicts: &EdictStore,
        edict: Option<EdictId>,
    ) -> ErrorContext {
        let mut context = ErrorContext::new();
        if config.disassemble_statement {
            if let Some(index) = statement {
                context = context.with_statement(disassemble(view, index));
            }
        }
        for line in format_stack(view, frames, config.max_trace_frames) {
            if line != "<NO STACK>" {
                context = context.with_frame(line);
            }
        }
        if let Some(id) = edict {
            if let Ok(e) = edicts.get(id) {
                context = context.with_edict(dump_edict(view, &e));
            }
        }
        context
    }

    /// Builds the report for an error that already carries its context.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self {
            message: error.kind.to_string(),
            context: error.context.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for AbortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context)?;
        write!(f, "{}", self.message)
    }
}
