//! String table: the image's string blob followed by runtime strings.
//!
//! Layout, by byte offset:
//!
//! ```text
//! [0, base)                      strings loaded from the image
//! [base, base + slots * size)    ring of temp slots (ftos, vtos, strcat, ...)
//! [base + slots * size, ..)      permanent strings appended by `set`
//! ```
//!
//! References are byte offsets into this combined space, so a reference
//! handed to program code stays valid (and keeps yielding the same bytes)
//! until the image is unloaded. Temp slots are the exception: they are
//! reused round-robin.

use std::borrow::Cow;
use std::collections::HashMap;

use qcvm_foundation::{Error, ErrorKind, Result, StringRef};

/// The string table of a loaded program.
#[derive(Clone, Debug)]
pub struct StringTable {
    bytes: Vec<u8>,
    base_len: usize,
    temp_slots: usize,
    temp_size: usize,
    next_temp: usize,
    capacity: usize,
    interned: HashMap<Vec<u8>, i32>,
}

impl StringTable {
    /// Creates a table over `blob` with the given temp ring and dynamic capacity.
    #[must_use]
    pub fn new(blob: Vec<u8>, temp_slots: usize, temp_size: usize, capacity: usize) -> Self {
        let base_len = blob.len();
        let mut bytes = blob;
        bytes.resize(base_len + temp_slots * temp_size, 0);
        Self {
            bytes,
            base_len,
            temp_slots,
            temp_size,
            next_temp: 0,
            capacity,
            interned: HashMap::new(),
        }
    }

    /// Length of the blob loaded from the image.
    #[must_use]
    pub fn base_len(&self) -> usize {
        self.base_len
    }

    /// Total addressable bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the table holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn dynamic_start(&self) -> usize {
        self.base_len + self.temp_slots * self.temp_size
    }

    /// Bytes used in the permanent dynamic region.
    #[must_use]
    pub fn dynamic_len(&self) -> usize {
        self.bytes.len() - self.dynamic_start()
    }

    /// Returns the bytes of a string, without its terminator.
    pub fn get(&self, s: StringRef) -> Result<&[u8]> {
        let start = usize::try_from(s.0).map_err(|_| Error::new(ErrorKind::BadString(s.0)))?;
        let tail = self
            .bytes
            .get(start..)
            .ok_or_else(|| Error::new(ErrorKind::BadString(s.0)))?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Ok(&tail[..end])
    }

    /// Returns a string as text, replacing invalid UTF-8.
    pub fn get_str(&self, s: StringRef) -> Result<Cow<'_, str>> {
        Ok(String::from_utf8_lossy(self.get(s)?))
    }

    /// True for the null reference or an empty string.
    ///
    /// Out-of-range references count as empty.
    #[must_use]
    pub fn is_empty_string(&self, s: StringRef) -> bool {
        s.is_null() || self.get(s).map_or(true, <[u8]>::is_empty)
    }

    /// Compares two strings byte-wise, C style.
    ///
    /// Returns the difference of the first differing bytes (the terminator
    /// counts as zero), or zero when equal.
    pub fn compare(&self, a: StringRef, b: StringRef) -> Result<i32> {
        let a = self.get(a)?;
        let b = self.get(b)?;
        let len = a.len().max(b.len());
        for i in 0..len {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            if x != y {
                return Ok(i32::from(x) - i32::from(y));
            }
        }
        Ok(0)
    }

    /// Appends a permanent string, reusing an identical earlier one.
    pub fn set(&mut self, s: &[u8]) -> Result<StringRef> {
        let s = s.split(|&b| b == 0).next().unwrap_or_default();
        if let Some(&ofs) = self.interned.get(s) {
            return Ok(StringRef(ofs));
        }
        if self.dynamic_len() + s.len() + 1 > self.capacity {
            return Err(Error::new(ErrorKind::StringTableFull {
                capacity: self.capacity,
            }));
        }
        let ofs = i32::try_from(self.bytes.len()).map_err(|_| {
            Error::new(ErrorKind::StringTableFull {
                capacity: self.capacity,
            })
        })?;
        self.bytes.extend_from_slice(s);
        self.bytes.push(0);
        self.interned.insert(s.to_vec(), ofs);
        Ok(StringRef(ofs))
    }

    /// Writes a short-lived string into the next temp slot.
    ///
    /// Text longer than a slot is truncated. With no temp slots configured
    /// the string is appended permanently instead.
    pub fn temp(&mut self, s: &[u8]) -> Result<StringRef> {
        if self.temp_slots == 0 || self.temp_size == 0 {
            return self.set(s);
        }
        let slot = self.next_temp;
        self.next_temp = (self.next_temp + 1) % self.temp_slots;
        let start = self.base_len + slot * self.temp_size;
        let n = s.len().min(self.temp_size - 1);
        let dst = &mut self.bytes[start..start + self.temp_size];
        dst[..n].copy_from_slice(&s[..n]);
        dst[n] = 0;
        i32::try_from(start)
            .map(StringRef)
            .map_err(|_| Error::internal("temp string offset overflow"))
    }

    /// Bytes after the image blob (temp ring and permanent strings).
    #[must_use]
    pub fn runtime_bytes(&self) -> &[u8] {
        &self.bytes[self.base_len..]
    }

    /// Replaces everything after the image blob, as saved by [`runtime_bytes`].
    ///
    /// [`runtime_bytes`]: Self::runtime_bytes
    pub fn restore_runtime_bytes(&mut self, saved: &[u8]) -> Result<()> {
        let dynamic_start = self.dynamic_start();
        if saved.len() < dynamic_start - self.base_len {
            return Err(Error::malformed("saved string region shorter than temp ring"));
        }
        if saved.len() - (dynamic_start - self.base_len) > self.capacity {
            return Err(Error::new(ErrorKind::StringTableFull {
                capacity: self.capacity,
            }));
        }
        self.bytes.truncate(self.base_len);
        self.bytes.extend_from_slice(saved);
        self.interned.clear();
        let mut ofs = dynamic_start;
        while ofs < self.bytes.len() {
            let rest = &self.bytes[ofs..];
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            if let Ok(at) = i32::try_from(ofs) {
                self.interned.entry(rest[..end].to_vec()).or_insert(at);
            }
            ofs += end + 1;
        }
        Ok(())
    }
}
