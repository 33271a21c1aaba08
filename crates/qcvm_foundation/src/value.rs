//! Typed view over words.
//!
//! Instructions operate on raw [`Word`]s. `Value` is the typed form used at
//! the boundaries: when a builtin reads its arguments, when a host reads a
//! named global, and when diagnostics print a slot.

use std::fmt;

use crate::ids::{EdictId, FuncRef, StringRef};
use crate::types::Type;
use crate::word::Word;

/// Three floats.
pub type Vec3 = [f32; 3];

/// A typed value decoded from one or three words.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    /// No value.
    Void,
    /// String table reference.
    String(StringRef),
    /// Float.
    Float(f32),
    /// Vector.
    Vector(Vec3),
    /// Edict reference.
    Entity(EdictId),
    /// Field offset.
    Field(u32),
    /// Function reference.
    Function(FuncRef),
    /// Encoded field address.
    Pointer(u32),
}

impl Value {
    /// Decodes a value of type `ty` from `words`.
    ///
    /// Missing words (a vector at the very end of a block) read as zero.
    #[must_use]
    pub fn read(ty: Type, words: &[Word]) -> Self {
        let word = |i: usize| words.get(i).copied().unwrap_or(Word::ZERO);
        match ty {
            Type::Void => Self::Void,
            Type::String => Self::String(StringRef::from_word(word(0))),
            Type::Float => Self::Float(word(0).as_f32()),
            Type::Vector => Self::Vector([word(0).as_f32(), word(1).as_f32(), word(2).as_f32()]),
            Type::Entity => Self::Entity(EdictId::from_word(word(0))),
            Type::Field => Self::Field(word(0).bits()),
            Type::Function => Self::Function(FuncRef::from_word(word(0))),
            Type::Pointer => Self::Pointer(word(0).bits()),
        }
    }

    /// Encodes this value into `out`, writing as many words as the type needs.
    ///
    /// Words beyond the end of `out` are dropped.
    pub fn write(&self, out: &mut [Word]) {
        let encoded = self.to_words();
        for (slot, word) in out.iter_mut().zip(encoded.iter().take(self.ty().size())) {
            *slot = *word;
        }
    }

    /// Encodes this value as three words (unused trailing words are zero).
    #[must_use]
    pub fn to_words(&self) -> [Word; 3] {
        match *self {
            Self::Void => [Word::ZERO; 3],
            Self::String(s) => [s.to_word(), Word::ZERO, Word::ZERO],
            Self::Float(f) => [Word::from_f32(f), Word::ZERO, Word::ZERO],
            Self::Vector(v) => [
                Word::from_f32(v[0]),
                Word::from_f32(v[1]),
                Word::from_f32(v[2]),
            ],
            Self::Entity(e) => [e.to_word(), Word::ZERO, Word::ZERO],
            Self::Field(ofs) | Self::Pointer(ofs) => {
                [Word::from_bits(ofs), Word::ZERO, Word::ZERO]
            }
            Self::Function(f) => [f.to_word(), Word::ZERO, Word::ZERO],
        }
    }

    /// Returns the definition type of this value.
    #[must_use]
    pub const fn ty(&self) -> Type {
        match self {
            Self::Void => Type::Void,
            Self::String(_) => Type::String,
            Self::Float(_) => Type::Float,
            Self::Vector(_) => Type::Vector,
            Self::Entity(_) => Type::Entity,
            Self::Field(_) => Type::Field,
            Self::Function(_) => Type::Function,
            Self::Pointer(_) => Type::Pointer,
        }
    }

    /// Returns the float payload, if this is a float.
    #[must_use]
    pub const fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the vector payload, if this is a vector.
    #[must_use]
    pub const fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the edict payload, if this is an entity.
    #[must_use]
    pub const fn as_entity(&self) -> Option<EdictId> {
        match self {
            Self::Entity(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::String(s) => write!(f, "string@{}", s.0),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector(v) => write!(f, "'{} {} {}'", v[0], v[1], v[2]),
            Self::Entity(e) => write!(f, "{e}"),
            Self::Field(ofs) => write!(f, ".{ofs}"),
            Self::Function(func) => write!(f, "function {}", func.0),
            Self::Pointer(p) => write!(f, "pointer {p}"),
        }
    }
}
