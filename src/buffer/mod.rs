//! Byte buffer backing an interpretation
//!
//! The buffer is the single source of truth for bytes. Mutations go through
//! a scoped modifier that fires `begin_modify`/`end_modify` per sub-edit and
//! `end_edit` once per atomic edit on scope exit. Readers on other threads
//! share the byte store through a reader lock that is excluded only while a
//! splice is being applied.

use crate::event::EventList;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Fired before a sub-edit's bytes change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginModify {
    pub start_byte: usize,
    pub erase_len: usize,
}

/// Fired after a sub-edit's bytes have been spliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndModify {
    pub start_byte: usize,
    pub erase_len: usize,
    pub insert_len: usize,
}

/// One sub-edit of an atomic edit, in pre-edit byte coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceRecord {
    pub start: usize,
    pub erased: usize,
    pub inserted: usize,
}

/// Fired once per atomic edit when the scoped modifier closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndEdit {
    pub splices: Vec<SpliceRecord>,
}

/// Observer lists for buffer mutation events.
#[derive(Debug, Default)]
pub struct BufferEvents {
    pub begin_modify: EventList<BeginModify>,
    pub end_modify: EventList<EndModify>,
    pub end_edit: EventList<EndEdit>,
}

pub struct ByteBuffer {
    bytes: Arc<RwLock<Vec<u8>>>,
    last_edit: Vec<SpliceRecord>,
    generation: u64,
    pub events: BufferEvents,
}

impl ByteBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
            last_edit: Vec::new(),
            generation: 0,
            events: BufferEvents::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.read().expect("buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes
            .read()
            .expect("buffer lock poisoned")
            .get(index)
            .copied()
    }

    /// Copy out the bytes in `range` (clamped to the buffer length).
    pub fn clip(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        let guard = self.bytes.read().expect("buffer lock poisoned");
        let start = range.start.min(guard.len());
        let end = range.end.clamp(start, guard.len());
        guard[start..end].to_vec()
    }

    /// Shared handle to the byte store for off-thread readers. Holders take
    /// the read side for the duration of a decode pass.
    pub fn share(&self) -> Arc<RwLock<Vec<u8>>> {
        self.bytes.clone()
    }

    /// Read guard over the whole byte store.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.bytes.read().expect("buffer lock poisoned")
    }

    /// Monotone counter bumped once per atomic edit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open a scoped modifier; the `end_edit` event fires when it is dropped.
    pub fn modifier(&mut self) -> BufferModifier<'_> {
        BufferModifier {
            buffer: self,
            records: Vec::new(),
            delta: 0,
        }
    }

    /// Patcher replaying the most recent atomic edit over pre-edit byte
    /// positions.
    pub fn position_patcher(&self) -> PositionPatcher {
        PositionPatcher::new(self.last_edit.clone())
    }

    fn splice(&mut self, start: usize, erase_len: usize, new_bytes: &[u8]) {
        // Writers exclude readers only for the splice itself.
        let mut guard = self.bytes.write().expect("buffer lock poisoned");
        let start = start.min(guard.len());
        let end = (start + erase_len).min(guard.len());
        guard.splice(start..end, new_bytes.iter().copied());
    }

    /// One sub-edit with the surrounding events, without a modifier scope.
    /// Used by drivers that interleave their own work between sub-edits.
    pub(crate) fn apply_splice(&mut self, start: usize, erase_len: usize, new_bytes: &[u8]) {
        self.events
            .begin_modify
            .dispatch(&BeginModify { start_byte: start, erase_len });
        self.splice(start, erase_len, new_bytes);
        self.events.end_modify.dispatch(&EndModify {
            start_byte: start,
            erase_len,
            insert_len: new_bytes.len(),
        });
    }

    /// Close an atomic edit applied through [`ByteBuffer::apply_splice`].
    pub(crate) fn commit_edit(&mut self, splices: Vec<SpliceRecord>) {
        self.last_edit = splices.clone();
        self.generation += 1;
        self.events.end_edit.dispatch(&EndEdit { splices });
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Scope through which all byte mutations flow.
pub struct BufferModifier<'a> {
    buffer: &'a mut ByteBuffer,
    records: Vec<SpliceRecord>,
    delta: isize,
}

impl BufferModifier<'_> {
    /// Replace `erase_len` bytes at `start` (current coordinates) with
    /// `new_bytes`, firing the per-sub-edit events.
    pub fn modify(&mut self, start: usize, erase_len: usize, new_bytes: &[u8]) {
        self.buffer.apply_splice(start, erase_len, new_bytes);

        // Record the splice in pre-edit coordinates for the patcher.
        let start_old = (start as isize - self.delta) as usize;
        self.records.push(SpliceRecord {
            start: start_old,
            erased: erase_len,
            inserted: new_bytes.len(),
        });
        self.delta += new_bytes.len() as isize - erase_len as isize;
    }
}

impl Drop for BufferModifier<'_> {
    fn drop(&mut self) {
        let splices = std::mem::take(&mut self.records);
        self.buffer.commit_edit(splices);
    }
}

/// Bias applied when a patched position falls inside an edited region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchBias {
    /// Clamp to the start of the replacement.
    Front,
    /// Clamp past the end of the replacement.
    Back,
}

/// Maps pre-edit byte positions to post-edit byte positions. Queries must be
/// non-decreasing.
pub struct PositionPatcher {
    records: Vec<SpliceRecord>,
    next: usize,
    delta: isize,
}

impl PositionPatcher {
    fn new(records: Vec<SpliceRecord>) -> Self {
        Self {
            records,
            next: 0,
            delta: 0,
        }
    }

    /// Patch the next (non-decreasing) pre-edit position.
    pub fn patch_next(&mut self, old_byte: usize, bias: PatchBias) -> usize {
        while self.next < self.records.len() {
            let rec = self.records[self.next];
            if old_byte < rec.start {
                break;
            }
            if old_byte < rec.start + rec.erased || (old_byte == rec.start && rec.erased == 0) {
                // Inside the erased region (or at a pure insertion point).
                let base = (rec.start as isize + self.delta) as usize;
                return match bias {
                    PatchBias::Front => base,
                    PatchBias::Back => base + rec.inserted,
                };
            }
            self.delta += rec.inserted as isize - rec.erased as isize;
            self.next += 1;
        }
        (old_byte as isize + self.delta) as usize
    }
}
