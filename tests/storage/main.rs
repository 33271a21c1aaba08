//! Integration tests for Layer 1: Storage
//!
//! Tests for the edict store: allocation, growth, field access, pointers,
//! and snapshots.
