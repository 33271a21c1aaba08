//! Core words, values, identifiers, and errors for qcvm.
//!
//! This crate provides:
//! - [`Word`] - The raw 32-bit slot every global and edict field is made of
//! - [`Type`] - Definition types as declared by compiled programs
//! - [`Value`] - Typed view over one or three words
//! - [`EdictId`], [`FuncRef`], [`StringRef`] - Program-level references
//! - [`Error`] - Rich error types with abort diagnostics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod types;
pub mod value;
pub mod word;

pub use error::{Error, ErrorContext, ErrorKind, ErrorTier};
pub use ids::{EdictId, FuncRef, StringRef};
pub use types::Type;
pub use value::{Value, Vec3};
pub use word::Word;

/// Result type alias using qcvm's Error.
pub type Result<T> = std::result::Result<T, Error>;
