//! Execution engine for qcvm.
//!
//! This crate provides:
//! - [`Vm`] - One loaded program with its interpreter, stacks, and edicts
//! - [`VmConfig`] - Limits and switches for an engine instance
//! - [`BuiltinRegistry`] / [`BuiltinTable`] - Native functions and their
//!   per-program numbering
//! - [`Host`] - Services the embedding simulation provides to builtins
//! - [`ProfileEntry`] - Per-function execution counters

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builtins;
pub mod config;
pub mod host;
pub mod profile;
pub mod stack;
pub mod vm;

pub use builtins::{Builtin, BuiltinFn, BuiltinRegistry, BuiltinTable};
pub use config::{BuiltinNumbering, VmConfig};
pub use host::{Host, NoHost};
pub use profile::{Profile, ProfileEntry};
pub use stack::{CallStack, Frame, LocalStack};
pub use vm::{ExecState, SimState, Vm};
