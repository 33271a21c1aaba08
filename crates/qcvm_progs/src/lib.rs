//! Program image format, loader, string table, and symbol resolution.
//!
//! This crate provides:
//! - [`ProgramImage`] - A validated program loaded from raw bytes
//! - [`Program`] - The immutable tables: functions, statements, definitions
//! - [`Opcode`] / [`Statement`] - The instruction set
//! - [`StringTable`] - The string blob plus runtime-appended strings
//! - [`GlobalBlock`] - Word-addressed global storage and well-known offsets
//! - [`HotFields`] / [`FieldCache`] - Name-to-offset resolution for native code
//! - [`ImageBuilder`] - Assembles images in memory (tests, benches, tools)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builder;
pub mod checksum;
pub mod format;
pub mod globals;
pub mod image;
pub mod opcode;
pub mod program;
pub mod source;
pub mod strings;
pub mod symbols;

pub use builder::{FunctionBuilder, ImageBuilder};
pub use format::{Header, PROG_VERSION, PROGHEADER_CRC};
pub use globals::{GlobalBlock, WELL_KNOWN, ofs};
pub use image::{LoadOptions, ProgramImage, hex};
pub use opcode::{Opcode, Operand, Statement};
pub use program::{Def, Function, Program};
pub use source::{ContentSource, DirSource, MemorySource};
pub use strings::StringTable;
pub use symbols::{FieldCache, HotFields};
