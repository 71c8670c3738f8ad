//! Fixed ring of reusable message records with heap overflow.
//!
//! Claiming scans the ring from a cursor that keeps advancing, so recently
//! freed slots are not immediately handed out again. When every slot is busy
//! the pool allocates an overflow record instead of failing; overflow records
//! are dropped on reclaim while slots are wiped and reused.
//!
//! The pool does no locking. Callers feeding it from several execution
//! contexts must serialize access themselves.

use std::collections::HashMap;

use tracing::debug;

use crate::config::ProtocolConfig;
use crate::error::{FrameError, Result};
use crate::record::{Home, MessageRecord, ProcState, SessionId};

/// Handle to a claimed record.
///
/// Slot keys carry a generation so a key kept past reclamation cannot reach
/// the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey {
    home: Home,
    generation: u32,
}

impl RecordKey {
    pub fn home(&self) -> Home {
        self.home
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self.home, Home::Heap(_))
    }
}

/// Pool occupancy and overflow counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub overflow_live: usize,
    pub overflow_allocated: u64,
    pub overflow_freed: u64,
}

struct Slot {
    record: MessageRecord,
    generation: u32,
}

/// Arena of preallocated message records.
pub struct MessageObjectPool {
    slots: Box<[Slot]>,
    overflow: HashMap<u64, MessageRecord>,
    cursor: usize,
    next_overflow: u64,
    overflow_allocated: u64,
    overflow_freed: u64,
    preload: u8,
}

impl MessageObjectPool {
    /// Pool with `capacity` slots whose records are seeded with `preload`.
    pub fn new(capacity: usize, preload: u8) -> Self {
        let slots = (0..capacity)
            .map(|index| Slot {
                record: MessageRecord::new(Home::Pool(index), preload),
                generation: 0,
            })
            .collect();
        Self {
            slots,
            overflow: HashMap::new(),
            cursor: 0,
            next_overflow: 1,
            overflow_allocated: 0,
            overflow_freed: 0,
            preload,
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.pool_capacity, config.preload)
    }

    /// Claim a free record for `session`, overflowing to the heap if needed.
    pub fn fetch(&mut self, session: SessionId) -> RecordKey {
        let capacity = self.slots.len();
        for _ in 0..capacity {
            let index = self.cursor % capacity;
            self.cursor = self.cursor.wrapping_add(1);
            let slot = &mut self.slots[index];
            if slot.record.state() == ProcState::Uninitialized {
                slot.record.claim(session);
                return RecordKey {
                    home: Home::Pool(index),
                    generation: slot.generation,
                };
            }
        }

        let serial = self.next_overflow;
        self.next_overflow += 1;
        self.overflow_allocated += 1;
        let mut record = MessageRecord::new(Home::Heap(serial), self.preload);
        record.claim(session);
        self.overflow.insert(serial, record);
        debug!(
            serial,
            capacity,
            allocated = self.overflow_allocated,
            "pool exhausted, allocated overflow record"
        );
        RecordKey {
            home: Home::Heap(serial),
            generation: 0,
        }
    }

    pub fn get(&self, key: RecordKey) -> Option<&MessageRecord> {
        match key.home {
            Home::Pool(index) => self
                .slots
                .get(index)
                .filter(|slot| slot.generation == key.generation)
                .map(|slot| &slot.record)
                .filter(|record| record.state() != ProcState::Uninitialized),
            Home::Heap(serial) => self.overflow.get(&serial),
        }
    }

    pub fn get_mut(&mut self, key: RecordKey) -> Option<&mut MessageRecord> {
        match key.home {
            Home::Pool(index) => self
                .slots
                .get_mut(index)
                .filter(|slot| slot.generation == key.generation)
                .map(|slot| &mut slot.record)
                .filter(|record| record.state() != ProcState::Uninitialized),
            Home::Heap(serial) => self.overflow.get_mut(&serial),
        }
    }

    /// Return a record to the pool.
    ///
    /// Slot records are wiped and become claimable again; overflow records
    /// are dropped. Reclaiming a key twice fails with `StaleRecord`.
    pub fn reclaim(&mut self, key: RecordKey) -> Result<()> {
        match key.home {
            Home::Pool(index) => {
                let preload = self.preload;
                let slot = self
                    .slots
                    .get_mut(index)
                    .filter(|slot| slot.generation == key.generation)
                    .ok_or(FrameError::StaleRecord)?;
                if slot.record.state() == ProcState::Uninitialized {
                    return Err(FrameError::StaleRecord);
                }
                slot.record.wipe(preload);
                slot.generation = slot.generation.wrapping_add(1);
                Ok(())
            }
            Home::Heap(serial) => {
                self.overflow
                    .remove(&serial)
                    .ok_or(FrameError::StaleRecord)?;
                self.overflow_freed += 1;
                debug!(serial, freed = self.overflow_freed, "dropped overflow record");
                Ok(())
            }
        }
    }

    /// Reclaim every claimed record belonging to `session`.
    pub fn reclaim_session(&mut self, session: SessionId) -> usize {
        let mut reclaimed = 0;
        let preload = self.preload;
        for slot in self.slots.iter_mut() {
            if slot.record.state() != ProcState::Uninitialized
                && slot.record.session() == Some(session)
            {
                slot.record.wipe(preload);
                slot.generation = slot.generation.wrapping_add(1);
                reclaimed += 1;
            }
        }
        let before = self.overflow.len();
        self.overflow
            .retain(|_, record| record.session() != Some(session));
        let dropped = before - self.overflow.len();
        self.overflow_freed += dropped as u64;
        reclaimed + dropped
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claimed records, slots and overflow together.
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.record.state() != ProcState::Uninitialized)
            .count()
            + self.overflow.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            in_use: self.in_use(),
            overflow_live: self.overflow.len(),
            overflow_allocated: self.overflow_allocated,
            overflow_freed: self.overflow_freed,
        }
    }
}

impl std::fmt::Debug for MessageObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageObjectPool")
            .field("cursor", &self.cursor)
            .field("stats", &self.stats())
            .finish()
    }
}
