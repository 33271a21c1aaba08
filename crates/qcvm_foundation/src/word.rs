//! The raw 32-bit slot.
//!
//! Globals and edict fields are arrays of words. A word has no type of its
//! own: the instruction that touches it decides whether the bits are read
//! as a float, an integer reference, or copied verbatim. Copying the bit
//! pattern (rather than converting) is what lets integer-valued stores
//! move a float's bits untouched.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One untyped 32-bit slot.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct Word(u32);

impl Word {
    /// The all-zero word (float `0.0`, integer `0`, null reference).
    pub const ZERO: Word = Word(0);

    /// Creates a word from a raw bit pattern.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Creates a word holding a float.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Self(value.to_bits())
    }

    /// Reads the word as a float.
    #[must_use]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    /// Creates a word holding a signed integer.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_i32(value: i32) -> Self {
        Self(value as u32)
    }

    /// Reads the word as a signed integer.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    /// Returns true if every bit is zero.
    ///
    /// Note that `-0.0` is *not* zero under this test.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Creates a word holding a boolean as `1.0` or `0.0`.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        Self::from_f32(if value { 1.0 } else { 0.0 })
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#010x} / {})", self.0, self.as_f32())
    }
}

impl From<f32> for Word {
    fn from(value: f32) -> Self {
        Self::from_f32(value)
    }
}

impl From<i32> for Word {
    fn from(value: i32) -> Self {
        Self::from_i32(value)
    }
}
