//! Message Pool - fixed-capacity arena of payload buffers.
//!
//! Buffers live in a `Vec` and are recycled through a stack of free slot
//! indices, so allocate and release are O(1) and a warmed-up run performs no
//! heap allocation when nodes send.
//!
//! The capacity doubles as the network-wide backpressure limit: it equals
//! `max_pending_messages`, and every undelivered message (in flight or queued
//! at a node) holds exactly one buffer. Evolved programs are untrusted, so a
//! program that floods the network runs into this cap instead of into memory
//! exhaustion.

use gpnet_env::Value;

/// Owning handle to a pooled message.
///
/// Deliberately neither `Clone` nor `Copy`: releasing consumes the handle,
/// so a buffer cannot be touched after it went back to the pool.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageHandle(usize);

impl MessageHandle {
    /// Slot index inside the pool (for logs).
    pub fn slot(&self) -> usize {
        self.0
    }
}

/// A pooled message buffer.
#[derive(Debug, Clone)]
pub struct Message {
    /// Fixed-size payload (send range of the sender)
    pub payload: Vec<Value>,

    /// Sending node index
    pub source: usize,

    /// Destination node index
    pub destination: usize,

    /// Tick at which the destination consumes the message
    pub arrival_tick: u64,
}

/// Free-list allocator for message buffers.
#[derive(Debug)]
pub struct MessagePool {
    /// Slots created so far (grows lazily up to `capacity`)
    slots: Vec<Message>,

    /// Indices of slots available for reuse
    free: Vec<usize>,

    /// Hard cap on live buffers
    capacity: usize,

    /// Words per payload
    payload_size: usize,

    /// Live buffers right now
    in_use: usize,

    /// High-water mark of `in_use`
    peak_in_use: usize,
}

impl MessagePool {
    /// Creates an empty pool.
    pub fn new(capacity: usize, payload_size: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(1024)),
            free: Vec::new(),
            capacity,
            payload_size,
            in_use: 0,
            peak_in_use: 0,
        }
    }

    /// Takes a zeroed buffer from the pool.
    ///
    /// # Returns
    /// * `Some(handle)` - Buffer reserved for the caller
    /// * `None` - Capacity exhausted (backpressure, not an exception)
    pub fn allocate(&mut self) -> Option<MessageHandle> {
        if self.in_use >= self.capacity {
            return None;
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                let msg = &mut self.slots[slot];
                msg.payload.fill(0);
                msg.source = 0;
                msg.destination = 0;
                msg.arrival_tick = 0;
                slot
            }
            None => {
                self.slots.push(Message {
                    payload: vec![0; self.payload_size],
                    source: 0,
                    destination: 0,
                    arrival_tick: 0,
                });
                self.slots.len() - 1
            }
        };

        self.in_use += 1;
        self.peak_in_use = self.peak_in_use.max(self.in_use);
        Some(MessageHandle(slot))
    }

    /// Allocates a second buffer carrying the same payload and source.
    pub fn duplicate(&mut self, original: &MessageHandle) -> Option<MessageHandle> {
        let copy = self.allocate()?;
        let (src, dst) = if original.0 < copy.0 {
            let (lo, hi) = self.slots.split_at_mut(copy.0);
            (&lo[original.0], &mut hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(original.0);
            (&hi[0], &mut lo[copy.0])
        };
        dst.payload.copy_from_slice(&src.payload);
        dst.source = src.source;
        Some(copy)
    }

    /// Returns a buffer to the free list.
    pub fn release(&mut self, handle: MessageHandle) {
        debug_assert!(self.in_use > 0, "release on an empty pool");
        self.free.push(handle.0);
        self.in_use -= 1;
    }

    /// Reads a live message.
    pub fn message(&self, handle: &MessageHandle) -> &Message {
        &self.slots[handle.0]
    }

    /// Mutates a live message.
    pub fn message_mut(&mut self, handle: &MessageHandle) -> &mut Message {
        &mut self.slots[handle.0]
    }

    /// Payload of a live message.
    pub fn payload(&self, handle: &MessageHandle) -> &[Value] {
        &self.slots[handle.0].payload
    }

    /// Forgets every outstanding handle and makes all slots free again.
    ///
    /// Only valid once every handle has been dropped by its holder, i.e.
    /// when a network begins a fresh simulation.
    pub fn reset(&mut self) {
        self.free.clear();
        self.free.extend((0..self.slots.len()).rev());
        self.in_use = 0;
        self.peak_in_use = 0;
    }

    /// Maximum number of live buffers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live buffers.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Buffers still available.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }

    /// Highest `in_use` seen since the last reset.
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use
    }

    /// Words per payload.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_until_exhausted() {
        let mut pool = MessagePool::new(2, 3);

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert!(pool.allocate().is_none());
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.available(), 0);

        pool.release(a);
        assert_eq!(pool.available(), 1);

        let c = pool.allocate().unwrap();
        assert_ne!(c.slot(), b.slot());
        assert_eq!(pool.peak_in_use(), 2);
    }

    #[test]
    fn test_recycled_buffer_is_zeroed() {
        let mut pool = MessagePool::new(1, 2);

        let a = pool.allocate().unwrap();
        pool.message_mut(&a).payload.copy_from_slice(&[7, 9]);
        pool.message_mut(&a).destination = 4;
        pool.release(a);

        let b = pool.allocate().unwrap();
        assert_eq!(pool.payload(&b), &[0, 0]);
        assert_eq!(pool.message(&b).destination, 0);
    }

    #[test]
    fn test_duplicate_copies_payload_both_directions() {
        let mut pool = MessagePool::new(4, 2);

        // Low slot original, high slot copy
        let a = pool.allocate().unwrap();
        pool.message_mut(&a).payload.copy_from_slice(&[1, 2]);
        pool.message_mut(&a).source = 3;
        let b = pool.duplicate(&a).unwrap();
        assert_eq!(pool.payload(&b), &[1, 2]);
        assert_eq!(pool.message(&b).source, 3);

        // Free the low slot so the next copy lands below the original
        pool.release(a);
        let c = pool.duplicate(&b).unwrap();
        assert!(c.slot() < b.slot());
        assert_eq!(pool.payload(&c), &[1, 2]);
    }

    #[test]
    fn test_duplicate_respects_capacity() {
        let mut pool = MessagePool::new(1, 1);
        let a = pool.allocate().unwrap();
        assert!(pool.duplicate(&a).is_none());
    }

    #[test]
    fn test_reset_frees_everything() {
        let mut pool = MessagePool::new(3, 1);
        let _a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();

        pool.reset();

        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.peak_in_use(), 0);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }
}
