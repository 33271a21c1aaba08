//! Program-level references stored inside words.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::word::Word;

/// Index of an edict in the entity store.
///
/// Edict 0 is the world and is never freed.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdictId(pub u32);

impl EdictId {
    /// The world edict.
    pub const WORLD: EdictId = EdictId(0);

    /// Creates an edict id from an index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index as `usize`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true if this is the world edict.
    #[must_use]
    pub const fn is_world(self) -> bool {
        self.0 == 0
    }

    /// Reads an edict reference out of a word.
    #[must_use]
    pub const fn from_word(word: Word) -> Self {
        Self(word.bits())
    }

    /// Stores this reference in a word.
    #[must_use]
    pub const fn to_word(self) -> Word {
        Word::from_bits(self.0)
    }
}

impl fmt::Debug for EdictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdictId({})", self.0)
    }
}

impl fmt::Display for EdictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}", self.0)
    }
}

/// Index into the function table. Function 0 is the null function.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FuncRef(pub u32);

impl FuncRef {
    /// The null function.
    pub const NULL: FuncRef = FuncRef(0);

    /// Returns the index as `usize`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for the null function.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reads a function reference out of a word.
    #[must_use]
    pub const fn from_word(word: Word) -> Self {
        Self(word.bits())
    }

    /// Stores this reference in a word.
    #[must_use]
    pub const fn to_word(self) -> Word {
        Word::from_bits(self.0)
    }
}

impl fmt::Debug for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncRef({})", self.0)
    }
}

/// Byte offset into the string table. Offset 0 is the null string.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StringRef(pub i32);

impl StringRef {
    /// The null (empty) string.
    pub const NULL: StringRef = StringRef(0);

    /// Returns true for the null string.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reads a string reference out of a word.
    #[must_use]
    pub const fn from_word(word: Word) -> Self {
        Self(word.as_i32())
    }

    /// Stores this reference in a word.
    #[must_use]
    pub const fn to_word(self) -> Word {
        Word::from_i32(self.0)
    }
}

impl fmt::Debug for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringRef({})", self.0)
    }
}
