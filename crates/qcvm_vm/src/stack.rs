//! The call stack and the local-save stack.
//!
//! Locals live in the global block, so a call overwrites whatever the
//! callee's local range held. The caller's words are pushed onto the
//! [`LocalStack`] on entry and popped back on return; both stacks are plain
//! counters over preallocated storage and may be re-entered from builtins.

use qcvm_foundation::{Error, ErrorKind, FuncRef, Result, Word};

/// One saved return point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Statement to resume after (the caller's `CALL`).
    pub statement: usize,
    /// Function that was executing at the call.
    pub function: FuncRef,
}

/// Bounded stack of return frames.
#[derive(Clone, Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    limit: usize,
}

impl CallStack {
    /// Creates a stack holding at most `limit` frames.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Vec::with_capacity(limit.min(1024)),
            limit,
        }
    }

    /// Current depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Depth limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Pushes a frame, failing at the depth limit.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= self.limit {
            return Err(Error::new(ErrorKind::StackOverflow { limit: self.limit }));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the innermost frame.
    pub fn pop(&mut self) -> Result<Frame> {
        self.frames
            .pop()
            .ok_or_else(|| Error::new(ErrorKind::StackUnderflow))
    }

    /// Frames from outermost to innermost.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Drops every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Fixed-capacity arena of saved global words.
#[derive(Clone, Debug)]
pub struct LocalStack {
    words: Vec<Word>,
    capacity: usize,
}

impl LocalStack {
    /// Creates a stack of `capacity` words.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity.min(16384)),
            capacity,
        }
    }

    /// Words currently saved.
    #[must_use]
    pub fn used(&self) -> usize {
        self.words.len()
    }

    /// Capacity in words.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Saves `region`.
    pub fn push(&mut self, region: &[Word]) -> Result<()> {
        if self.words.len() + region.len() > self.capacity {
            return Err(Error::new(ErrorKind::LocalStackOverflow {
                requested: region.len(),
                used: self.words.len(),
                capacity: self.capacity,
            }));
        }
        self.words.extend_from_slice(region);
        Ok(())
    }

    /// Restores the most recently saved `region.len()` words into `region`.
    pub fn pop_into(&mut self, region: &mut [Word]) -> Result<()> {
        let n = region.len();
        if n > self.words.len() {
            return Err(Error::new(ErrorKind::LocalStackUnderflow));
        }
        let start = self.words.len() - n;
        region.copy_from_slice(&self.words[start..]);
        self.words.truncate(start);
        Ok(())
    }

    /// Discards every saved word.
    pub fn clear(&mut self) {
        self.words.clear();
    }
}
