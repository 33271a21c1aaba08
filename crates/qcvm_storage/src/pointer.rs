//! Field addresses packed into a single word.
//!
//! `ADDRESS` yields a pointer to one field of one edict; `STOREP_*` writes
//! through it. The encoding is `edict * field_words + field`, so pointers
//! stay valid when the store grows.

use qcvm_foundation::{EdictId, Error, ErrorKind, Result};

/// A decoded field address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldPointer {
    /// Target edict.
    pub edict: EdictId,
    /// Field word offset within the edict.
    pub field: usize,
}

impl FieldPointer {
    /// Creates a pointer.
    #[must_use]
    pub fn new(edict: EdictId, field: usize) -> Self {
        Self { edict, field }
    }

    /// Packs this pointer for a store with `field_words` words per edict.
    pub fn encode(self, field_words: usize) -> Result<u32> {
        if self.field >= field_words {
            return Err(Error::new(ErrorKind::BadField {
                offset: u32::try_from(self.field).unwrap_or(u32::MAX),
                len: field_words,
            }));
        }
        self.edict
            .index()
            .checked_mul(field_words)
            .and_then(|base| base.checked_add(self.field))
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| Error::new(ErrorKind::BadPointer(u32::MAX)))
    }

    /// Unpacks a pointer, checking it addresses one of `edict_count` edicts.
    pub fn decode(ptr: u32, field_words: usize, edict_count: usize) -> Result<Self> {
        if field_words == 0 {
            return Err(Error::new(ErrorKind::BadPointer(ptr)));
        }
        let p = ptr as usize;
        let edict = p / field_words;
        if edict >= edict_count {
            return Err(Error::new(ErrorKind::BadPointer(ptr)));
        }
        let edict = u32::try_from(edict).map_err(|_| Error::new(ErrorKind::BadPointer(ptr)))?;
        Ok(Self {
            edict: EdictId(edict),
            field: p % field_words,
        })
    }
}
