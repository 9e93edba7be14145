//! Pending-delivery schedule keyed by arrival tick.

use crate::pool::MessageHandle;
use std::collections::BTreeMap;

/// Buckets of in-flight messages keyed by arrival tick.
///
/// Only ticks that actually have a message due get a bucket, so memory is
/// bounded by the number of messages in flight rather than by the delay
/// window. Each bucket keeps scheduling order, which gives FIFO delivery
/// for equal arrival ticks. Drained buckets are kept on a spare list and
/// reused, so steady state does not allocate new vectors.
#[derive(Debug, Default)]
pub struct DeliverySchedule {
    buckets: BTreeMap<u64, Vec<MessageHandle>>,
    spare: Vec<Vec<MessageHandle>>,
    in_flight: usize,
}

impl DeliverySchedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message for the given arrival tick.
    pub fn schedule(&mut self, arrival_tick: u64, handle: MessageHandle) {
        let spare = &mut self.spare;
        self.buckets
            .entry(arrival_tick)
            .or_insert_with(|| spare.pop().unwrap_or_default())
            .push(handle);
        self.in_flight += 1;
    }

    /// Hands every message due at `arrival_tick` to `deliver`, oldest first.
    pub fn drain_due<F>(&mut self, arrival_tick: u64, mut deliver: F)
    where
        F: FnMut(MessageHandle),
    {
        let Some(mut due) = self.buckets.remove(&arrival_tick) else {
            return;
        };
        self.in_flight -= due.len();
        for handle in due.drain(..) {
            deliver(handle);
        }
        self.spare.push(due);
    }

    /// Empties every bucket, handing the handles back to the caller.
    pub fn clear<F>(&mut self, mut release: F)
    where
        F: FnMut(MessageHandle),
    {
        while let Some((_, mut bucket)) = self.buckets.pop_first() {
            for handle in bucket.drain(..) {
                release(handle);
            }
            self.spare.push(bucket);
        }
        self.in_flight = 0;
    }

    /// Messages scheduled but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Distinct arrival ticks that still have messages pending.
    pub fn pending_ticks(&self) -> usize {
        self.buckets.len()
    }
}
