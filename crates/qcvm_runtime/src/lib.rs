//! Session facade, snapshots, and command-line tool for qcvm.
//!
//! This crate provides:
//! - [`Session`] - a loaded program plus host-side chores (thinks, listings)
//! - [`Snapshot`] - engine state saved and restored as `MessagePack`
//! - the `qcvm` binary for inspecting and running program images

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod serialize;
pub mod session;

pub use serialize::Snapshot;
pub use session::Session;
