//! qcvm - loader and bytecode interpreter for QuakeC progs images
//!
//! This crate re-exports all layers of the qcvm system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: qcvm_runtime    — Session facade, snapshots, CLI
//! Layer 3: qcvm_vm         — Interpreter, builtins, host interface
//! Layer 2: qcvm_debug      — Disassembly, stack traces, edict dumps
//! Layer 1: qcvm_progs      — Image format, loader, symbols, strings
//!          qcvm_storage    — Edict storage and allocation
//! Layer 0: qcvm_foundation — Core types (Word, Value, ids, Error)
//! ```

pub use qcvm_debug as debug;
pub use qcvm_foundation as foundation;
pub use qcvm_progs as progs;
pub use qcvm_runtime as runtime;
pub use qcvm_storage as storage;
pub use qcvm_vm as vm;
