//! Integration tests for Layer 3: Execution engine
//!
//! Tests for opcode semantics, the calling convention, builtins, and the
//! abort path, driven through the public `Vm` API.

mod aborts;
mod builtins;
mod opcodes;
