//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Word, Value, program ids, and Error.

mod errors;
mod values;
