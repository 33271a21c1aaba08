//! Diagnostics for qcvm.
//!
//! This crate provides:
//! - [`ProgramView`] - Borrowed program state used to render values by name
//! - [`disassemble`] - Statement disassembly with resolved operand names
//! - [`StackFrame`] / [`format_stack`] - Call-stack traces
//! - [`dump_edict`] - Human-readable edict dumps
//! - [`AbortReport`] - The diagnostics attached to a fatal error
//! - [`DiagnosticsConfig`] - What to include in reports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod disasm;
pub mod dump;
pub mod report;
pub mod stack;
pub mod view;

pub use config::DiagnosticsConfig;
pub use disasm::{disassemble, disassemble_function};
pub use dump::dump_edict;
pub use report::AbortReport;
pub use stack::{StackFrame, format_stack};
pub use view::ProgramView;
