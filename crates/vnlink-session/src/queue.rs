//! Fixed-capacity handoff between the I/O context and the consumer.
//!
//! Each slot carries an atomic state tag. The producer claims a free slot,
//! fills it and publishes its index on an order ring; the consumer pops
//! indices in publish order and releases the slot when done. The slot's own
//! mutex is only ever taken by whichever side owns the slot's tag, so it is
//! never contended.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

const FREE: u8 = 0;
const PUTTING: u8 = 1;
const IN_QUEUE: u8 = 2;
const GETTING: u8 = 3;

struct Slot<T> {
    state: AtomicU8,
    value: Mutex<Option<T>>,
}

/// Bounded single-producer, single-consumer queue of slots.
pub struct MeasurementQueue<T> {
    slots: Box<[Slot<T>]>,
    order: Box<[AtomicUsize]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    next_free: AtomicUsize,
}

impl<T> MeasurementQueue<T> {
    /// A queue with `capacity` slots. Zero capacity disables the queue.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                state: AtomicU8::new(FREE),
                value: Mutex::new(None),
            })
            .collect();
        let order = (0..capacity).map(|_| AtomicUsize::new(0)).collect();
        Self {
            slots,
            order,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            next_free: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_enabled(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Items published and not yet taken.
    pub fn len(&self) -> usize {
        self.tail
            .load(Ordering::Acquire)
            .wrapping_sub(self.head.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish `value`, handing it back if every slot is in use.
    pub fn try_put(&self, value: T) -> Result<(), T> {
        let Some(idx) = self.claim() else {
            return Err(value);
        };
        let slot = &self.slots[idx];
        *slot.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        slot.state.store(IN_QUEUE, Ordering::Release);

        let tail = self.tail.load(Ordering::Relaxed);
        self.order[tail % self.slots.len()].store(idx, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Oldest published value, if any.
    pub fn try_get(&self) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head == self.tail.load(Ordering::Acquire) {
                return None;
            }
            let idx = self.order[head % self.slots.len()].load(Ordering::Relaxed);
            if self
                .head
                .compare_exchange(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let slot = &self.slots[idx];
            if slot
                .state
                .compare_exchange(IN_QUEUE, GETTING, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }
            let value = slot
                .value
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            slot.state.store(FREE, Ordering::Release);
            return value;
        }
    }

    /// Drain everything currently published.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.try_get())
    }

    fn claim(&self) -> Option<usize> {
        let n = self.slots.len();
        let start = self.next_free.load(Ordering::Relaxed);
        for i in 0..n {
            let idx = (start + i) % n;
            if self.slots[idx]
                .state
                .compare_exchange(FREE, PUTTING, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.next_free.store((idx + 1) % n, Ordering::Relaxed);
                return Some(idx);
            }
        }
        None
    }
}

impl<T> std::fmt::Debug for MeasurementQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn preserves_order_and_rejects_when_full() {
        let q = MeasurementQueue::new(3);
        for i in 0..3 {
            q.try_put(i).unwrap();
        }
        assert_eq!(q.try_put(99), Err(99));
        assert_eq!(q.len(), 3);

        assert_eq!(q.try_get(), Some(0));
        q.try_put(3).unwrap();
        let rest: Vec<_> = q.drain().collect();
        assert_eq!(rest, vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn zero_capacity_is_disabled() {
        let q = MeasurementQueue::new(0);
        assert!(!q.is_enabled());
        assert_eq!(q.try_put("x"), Err("x"));
        assert_eq!(q.try_get(), None);
    }

    #[test]
    fn producer_and_consumer_threads() {
        let q = Arc::new(MeasurementQueue::new(4));
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    let mut v = i;
                    while let Err(back) = q.try_put(v) {
                        v = back;
                        thread::yield_now();
                    }
                }
            })
        };

        let mut got = Vec::with_capacity(1000);
        while got.len() < 1000 {
            match q.try_get() {
                Some(v) => got.push(v),
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert!(got.windows(2).all(|w| w[0] + 1 == w[1]));
    }
}
