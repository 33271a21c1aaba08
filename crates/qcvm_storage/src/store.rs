//! Batched edict storage with stable indices.
//!
//! Edicts live in batches. Each batch is one contiguous allocation of
//! `len * field_words` words plus `len` headers; batches are only ever
//! appended, so an index handed out once refers to the same record until
//! the store is dropped or [`EdictStore::reset`] starts a new level.
//!
//! Slot allocation follows the usual progs rules: edict 0 is the world,
//! the next `reserved - 1` slots belong to clients, and a freed slot is
//! only recycled once it has been free for half a second (or if it was
//! freed during the first two seconds of the level), so that lingering
//! references on the client side do not see a new object in an old slot.

// Allow u32 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use std::mem;

use tracing::debug;

use qcvm_foundation::{EdictId, Error, ErrorKind, Result, Word};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::edict::{Edict, EdictHeader, EdictMut};

/// Free time below which a freed slot may be reused immediately.
const REUSE_GRACE_START: f32 = 2.0;
/// Minimum age of a freed slot before reuse.
const REUSE_DELAY: f32 = 0.5;

/// Sizing limits for an edict store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Edicts allocated when the store is created.
    pub initial: usize,
    /// Edicts added per growth step.
    pub batch: usize,
    /// Hard limit on edicts.
    pub max: usize,
    /// Slots never handed out by [`EdictStore::alloc`] (world plus clients).
    pub reserved: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial: 256,
            batch: 256,
            max: 8192,
            reserved: 17,
        }
    }
}

#[derive(Clone, Debug)]
struct Batch {
    start: usize,
    headers: Vec<EdictHeader>,
    fields: Vec<Word>,
}

/// Growable array of edict records.
#[derive(Clone, Debug)]
pub struct EdictStore {
    field_words: usize,
    batches: Vec<Batch>,
    count: usize,
    num_edicts: usize,
    config: StoreConfig,
}

impl EdictStore {
    /// Creates a store whose edicts carry `field_words` words each.
    #[must_use]
    pub fn new(field_words: usize, config: StoreConfig) -> Self {
        let mut store = Self {
            field_words,
            batches: Vec::new(),
            count: 0,
            num_edicts: 0,
            config,
        };
        let initial = store.config.initial.max(store.config.reserved).max(1);
        store.grow(initial.min(store.config.max.max(1)));
        store.num_edicts = store.config.reserved.clamp(1, store.count);
        store
    }

    /// Appends `n` zeroed edicts in one contiguous batch.
    ///
    /// New edicts get indices `count()..count() + n`; existing indices are
    /// unaffected.
    pub fn grow(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.batches.push(Batch {
            start: self.count,
            headers: vec![EdictHeader::default(); n],
            fields: vec![Word::ZERO; n * self.field_words],
        });
        self.count += n;
        debug!(added = n, total = self.count, "edict store grown");
    }

    /// Total edict slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// One past the highest slot ever handed out; iteration bound for
    /// program-visible scans.
    #[must_use]
    pub fn num_edicts(&self) -> usize {
        self.num_edicts
    }

    /// Field words per edict.
    #[must_use]
    pub fn field_words(&self) -> usize {
        self.field_words
    }

    /// Bytes per edict: field block plus header.
    #[must_use]
    pub fn edict_size(&self) -> usize {
        self.field_words * mem::size_of::<Word>() + mem::size_of::<EdictHeader>()
    }

    /// The sizing limits.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        let b = self.batches.partition_point(|batch| batch.start <= index) - 1;
        (b, index - self.batches[b].start)
    }

    /// Returns edict `index`.
    ///
    /// Indices must be below [`count`](Self::count); all indices the engine
    /// produces internally are.
    #[must_use]
    pub fn at(&self, index: usize) -> Edict<'_> {
        debug_assert!(index < self.count, "edict {index} >= {}", self.count);
        let (b, i) = self.locate(index);
        let batch = &self.batches[b];
        Edict {
            id: EdictId(index as u32),
            header: &batch.headers[i],
            fields: &batch.fields[i * self.field_words..(i + 1) * self.field_words],
        }
    }

    /// Returns edict `index` mutably.
    pub fn at_mut(&mut self, index: usize) -> EdictMut<'_> {
        debug_assert!(index < self.count, "edict {index} >= {}", self.count);
        let (b, i) = self.locate(index);
        let fw = self.field_words;
        let batch = &mut self.batches[b];
        EdictMut {
            id: EdictId(index as u32),
            header: &mut batch.headers[i],
            fields: &mut batch.fields[i * fw..(i + 1) * fw],
        }
    }

    /// Checked lookup for references coming from program data.
    pub fn get(&self, id: EdictId) -> Result<Edict<'_>> {
        if id.index() >= self.count {
            return Err(Error::bad_edict(id.0, self.count));
        }
        Ok(self.at(id.index()))
    }

    /// Checked mutable lookup for references coming from program data.
    pub fn get_mut(&mut self, id: EdictId) -> Result<EdictMut<'_>> {
        if id.index() >= self.count {
            return Err(Error::bad_edict(id.0, self.count));
        }
        Ok(self.at_mut(id.index()))
    }

    /// Hands out a cleared slot.
    ///
    /// Reuses a free slot above the reserved range when it has aged enough,
    /// otherwise extends the high-water mark, growing by one batch if needed.
    pub fn alloc(&mut self, time: f32) -> Result<EdictId> {
        let first = self.config.reserved.max(1);
        for index in first..self.num_edicts {
            let h = *self.at(index).header();
            if h.free && (h.free_time < REUSE_GRACE_START || time - h.free_time > REUSE_DELAY) {
                return Ok(self.init_slot(index));
            }
        }

        if self.num_edicts >= self.config.max {
            return Err(Error::new(ErrorKind::NoFreeEdicts {
                limit: self.config.max,
            }));
        }
        if self.num_edicts >= self.count {
            let room = self.config.max - self.count;
            self.grow(self.config.batch.max(1).min(room));
        }
        let index = self.num_edicts;
        self.num_edicts += 1;
        Ok(self.init_slot(index))
    }

    fn init_slot(&mut self, index: usize) -> EdictId {
        let mut e = self.at_mut(index);
        e.clear();
        *e.header_mut() = EdictHeader::default();
        EdictId(index as u32)
    }

    /// Releases a slot: clears its fields and records when it was freed.
    ///
    /// The world cannot be freed.
    pub fn free(&mut self, id: EdictId, time: f32) -> Result<()> {
        if id.is_world() {
            return Err(Error::program("tried to free the world entity"));
        }
        let mut e = self.get_mut(id)?;
        e.clear();
        *e.header_mut() = EdictHeader {
            free: true,
            free_time: time,
        };
        Ok(())
    }

    /// Clears every edict and resets the high-water mark, keeping the batches.
    pub fn reset(&mut self) {
        for batch in &mut self.batches {
            batch.fields.fill(Word::ZERO);
            batch.headers.fill(EdictHeader::default());
        }
        self.num_edicts = self.config.reserved.clamp(1, self.count);
    }

    /// Iterates over in-use edicts below the high-water mark.
    pub fn iter_live(&self) -> impl Iterator<Item = Edict<'_>> + '_ {
        (0..self.num_edicts)
            .map(|i| self.at(i))
            .filter(|e| !e.is_free())
    }

    /// Number of in-use edicts.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.iter_live().count()
    }

    /// Copies the used part of the store out.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            field_words: self.field_words,
            edicts: (0..self.num_edicts)
                .map(|i| {
                    let e = self.at(i);
                    EdictRecord {
                        free: e.header().free,
                        free_time: e.header().free_time,
                        fields: e.fields().iter().map(|w| w.bits()).collect(),
                    }
                })
                .collect(),
        }
    }

    /// Replaces the store contents with a snapshot taken from a store with
    /// the same field layout.
    pub fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        if snapshot.field_words != self.field_words {
            return Err(Error::new(ErrorKind::Serialization(format!(
                "snapshot has {} field words, program has {}",
                snapshot.field_words, self.field_words
            ))));
        }
        if snapshot.edicts.len() > self.config.max {
            return Err(Error::new(ErrorKind::NoFreeEdicts {
                limit: self.config.max,
            }));
        }
        if snapshot.edicts.iter().any(|r| r.fields.len() != self.field_words) {
            return Err(Error::new(ErrorKind::Serialization(
                "edict record with wrong field count".into(),
            )));
        }
        self.reset();
        if snapshot.edicts.len() > self.count {
            self.grow(snapshot.edicts.len() - self.count);
        }
        for (i, record) in snapshot.edicts.iter().enumerate() {
            let mut e = self.at_mut(i);
            *e.header_mut() = EdictHeader {
                free: record.free,
                free_time: record.free_time,
            };
            for (slot, &bits) in e.fields_mut().iter_mut().zip(&record.fields) {
                *slot = Word::from_bits(bits);
            }
        }
        self.num_edicts = snapshot.edicts.len().max(self.num_edicts);
        Ok(())
    }
}

/// Saved edict contents.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoreSnapshot {
    /// Field words per edict.
    pub field_words: usize,
    /// Edicts below the high-water mark, in index order.
    pub edicts: Vec<EdictRecord>,
}

/// One saved edict.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdictRecord {
    /// Free flag.
    pub free: bool,
    /// Time freed.
    pub free_time: f32,
    /// Raw field words.
    pub fields: Vec<u32>,
}
