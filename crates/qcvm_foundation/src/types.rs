//! Definition types declared by compiled programs.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type tag attached to every global and field definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// No value.
    Void,
    /// Offset into the string table.
    String,
    /// 32-bit float.
    Float,
    /// Three consecutive floats.
    Vector,
    /// Edict reference.
    Entity,
    /// Field offset within an edict.
    Field,
    /// Function table index.
    Function,
    /// Address of an edict field (produced by `ADDRESS`).
    Pointer,
}

impl Type {
    /// Bit set on a global definition that should be written to savegames.
    pub const SAVE_GLOBAL: u16 = 1 << 15;

    /// Decodes the low bits of a raw definition type.
    ///
    /// Returns `None` for tags outside the known set.
    #[must_use]
    pub fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw & !Self::SAVE_GLOBAL {
            0 => Self::Void,
            1 => Self::String,
            2 => Self::Float,
            3 => Self::Vector,
            4 => Self::Entity,
            5 => Self::Field,
            6 => Self::Function,
            7 => Self::Pointer,
            _ => return None,
        })
    }

    /// Returns the raw tag value.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::Void => 0,
            Self::String => 1,
            Self::Float => 2,
            Self::Vector => 3,
            Self::Entity => 4,
            Self::Field => 5,
            Self::Function => 6,
            Self::Pointer => 7,
        }
    }

    /// Number of words a value of this type occupies.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Vector => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::String => "string",
            Self::Float => "float",
            Self::Vector => "vector",
            Self::Entity => "entity",
            Self::Field => "field",
            Self::Function => "function",
            Self::Pointer => "pointer",
        };
        f.write_str(name)
    }
}
