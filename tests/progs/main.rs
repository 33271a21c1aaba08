//! Integration tests for Layer 1: Program images
//!
//! Tests for the loader's validation, string table, and symbol resolution.

mod loader;
mod strings;
mod symbols;
