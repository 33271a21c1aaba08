//! Views of a single edict record.

use qcvm_foundation::{EdictId, Error, ErrorKind, Result, Type, Value, Vec3, Word};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Engine-side bookkeeping stored alongside every edict's fields.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdictHeader {
    /// The slot is unused and may be handed out again.
    pub free: bool,
    /// Simulated time at which the slot was freed.
    pub free_time: f32,
}

/// Shared view of one edict.
#[derive(Copy, Clone, Debug)]
pub struct Edict<'a> {
    pub(crate) id: EdictId,
    pub(crate) header: &'a EdictHeader,
    pub(crate) fields: &'a [Word],
}

impl<'a> Edict<'a> {
    /// Which edict this is.
    #[must_use]
    pub fn id(&self) -> EdictId {
        self.id
    }

    /// Bookkeeping header.
    #[must_use]
    pub fn header(&self) -> &'a EdictHeader {
        self.header
    }

    /// True if the slot is free.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.header.free
    }

    /// All field words.
    #[must_use]
    pub fn fields(&self) -> &'a [Word] {
        self.fields
    }

    /// Reads one field word.
    pub fn word(&self, ofs: usize) -> Result<Word> {
        self.fields
            .get(ofs)
            .copied()
            .ok_or_else(|| bad_field(ofs, self.fields.len()))
    }

    /// Reads `len` consecutive field words.
    pub fn words(&self, ofs: usize, len: usize) -> Result<&'a [Word]> {
        ofs.checked_add(len)
            .and_then(|end| self.fields.get(ofs..end))
            .ok_or_else(|| bad_field(ofs, self.fields.len()))
    }

    /// Reads a float field.
    pub fn float(&self, ofs: usize) -> Result<f32> {
        Ok(self.word(ofs)?.as_f32())
    }

    /// Reads a vector field.
    pub fn vector(&self, ofs: usize) -> Result<Vec3> {
        let w = self.words(ofs, 3)?;
        Ok([w[0].as_f32(), w[1].as_f32(), w[2].as_f32()])
    }

    /// Reads a typed field.
    pub fn value(&self, ofs: usize, ty: Type) -> Result<Value> {
        Ok(Value::read(ty, self.words(ofs, ty.size())?))
    }
}

/// Exclusive view of one edict.
#[derive(Debug)]
pub struct EdictMut<'a> {
    pub(crate) id: EdictId,
    pub(crate) header: &'a mut EdictHeader,
    pub(crate) fields: &'a mut [Word],
}

impl EdictMut<'_> {
    /// Which edict this is.
    #[must_use]
    pub fn id(&self) -> EdictId {
        self.id
    }

    /// Bookkeeping header.
    pub fn header_mut(&mut self) -> &mut EdictHeader {
        &mut *self.header
    }

    /// All field words.
    pub fn fields_mut(&mut self) -> &mut [Word] {
        &mut *self.fields
    }

    /// Reads one field word.
    pub fn word(&self, ofs: usize) -> Result<Word> {
        self.fields
            .get(ofs)
            .copied()
            .ok_or_else(|| bad_field(ofs, self.fields.len()))
    }

    /// Writes one field word.
    pub fn set_word(&mut self, ofs: usize, word: Word) -> Result<()> {
        let len = self.fields.len();
        let slot = self.fields.get_mut(ofs).ok_or_else(|| bad_field(ofs, len))?;
        *slot = word;
        Ok(())
    }

    /// Mutably borrows `len` consecutive field words.
    pub fn words_mut(&mut self, ofs: usize, len: usize) -> Result<&mut [Word]> {
        let total = self.fields.len();
        ofs.checked_add(len)
            .and_then(|end| self.fields.get_mut(ofs..end))
            .ok_or_else(|| bad_field(ofs, total))
    }

    /// Writes a float field.
    pub fn set_float(&mut self, ofs: usize, value: f32) -> Result<()> {
        self.set_word(ofs, Word::from_f32(value))
    }

    /// Writes a vector field.
    pub fn set_vector(&mut self, ofs: usize, value: Vec3) -> Result<()> {
        for (slot, v) in self.words_mut(ofs, 3)?.iter_mut().zip(value) {
            *slot = Word::from_f32(v);
        }
        Ok(())
    }

    /// Writes a typed field.
    pub fn set_value(&mut self, ofs: usize, value: Value) -> Result<()> {
        value.write(self.words_mut(ofs, value.ty().size())?);
        Ok(())
    }

    /// Zeroes every field.
    pub fn clear(&mut self) {
        self.fields.fill(Word::ZERO);
    }
}

fn bad_field(ofs: usize, len: usize) -> Error {
    Error::new(ErrorKind::BadField {
        offset: u32::try_from(ofs).unwrap_or(u32::MAX),
        len,
    })
}
