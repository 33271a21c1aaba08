//! Entity storage for qcvm.
//!
//! This crate provides:
//! - [`EdictStore`] - Growable, batched array of fixed-stride edict records
//! - [`Edict`] / [`EdictMut`] - Borrowed views of one record
//! - [`EdictHeader`] - Engine-side per-edict bookkeeping (free flag, free time)
//! - [`FieldPointer`] - Encoding of edict field addresses into a single word

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod edict;
pub mod pointer;
pub mod store;

pub use edict::{Edict, EdictHeader, EdictMut};
pub use pointer::FieldPointer;
pub use store::{EdictRecord, EdictStore, StoreConfig, StoreSnapshot};
