//! Single-writer/single-reader relay over a preallocated slot array.
//!
//! Every slot is written once by the [`Publisher`] and then read once by the
//! [`Acquirer`]. The only state shared between the two sides, apart from the
//! slots themselves, is a [`CountingSignal`] holding the number of published
//! but not yet acquired slots. Both handles walk the array with their own
//! monotonic cursor, so at any instant they touch disjoint slots.

use std::cell::UnsafeCell;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("slot {got} used out of order, expected slot {expected}")]
    OutOfOrder { expected: usize, got: usize },
    #[error("relay holds {capacity} slots, all of them already used")]
    Exhausted { capacity: usize },
    #[error("publisher closed before slot {index} was published")]
    Closed { index: usize },
    #[error("slot {0} was empty when acquired")]
    EmptySlot(usize),
}

#[derive(Debug, Default)]
struct SignalState {
    available: u64,
    closed: bool,
}

/// Counting semaphore: `post` increments, `wait` blocks until positive and
/// then decrements.
#[derive(Debug, Default)]
pub struct CountingSignal {
    state: Mutex<SignalState>,
    ready: Condvar,
}

impl CountingSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) {
        let mut state = self.state.lock();
        state.available += 1;
        drop(state);
        self.ready.notify_one();
    }

    /// Block until a unit is available and take it. Returns `false` once the
    /// signal is closed and drained.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while state.available == 0 {
            if state.closed {
                return false;
            }
            self.ready.wait(&mut state);
        }
        state.available -= 1;
        true
    }

    /// No further posts will happen; wakes every waiter.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn available(&self) -> u64 {
        self.state.lock().available
    }
}

struct Shared<T> {
    slots: Box<[UnsafeCell<Option<T>>]>,
    signal: CountingSignal,
}

// SAFETY: a slot is only written by the publisher before it is posted and only
// read by the acquirer after the matching `wait`. The signal's mutex orders the
// write before the read.
unsafe impl<T: Send> Sync for Shared<T> {}

/// Create a relay with exactly `capacity` slots.
pub fn relay<T: Send>(capacity: usize) -> (Publisher<T>, Acquirer<T>) {
    let shared = Arc::new(Shared {
        slots: (0..capacity).map(|_| UnsafeCell::new(None)).collect(),
        signal: CountingSignal::new(),
    });
    (
        Publisher {
            shared: Arc::clone(&shared),
            next: 0,
        },
        Acquirer { shared, next: 0 },
    )
}

fn check_cursor(next: usize, index: usize, capacity: usize) -> Result<(), RelayError> {
    if next >= capacity {
        return Err(RelayError::Exhausted { capacity });
    }
    if index != next {
        return Err(RelayError::OutOfOrder {
            expected: next,
            got: index,
        });
    }
    Ok(())
}

/// Producer side of the relay. Dropping it closes the relay.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
    next: usize,
}

impl<T: Send> Publisher<T> {
    /// Store `value` in slot `index` and make it eligible for acquisition.
    /// Slots must be published in order `0..capacity`.
    pub fn publish(&mut self, index: usize, value: T) -> Result<(), RelayError> {
        check_cursor(self.next, index, self.capacity())?;
        let slot = self.shared.slots[index].get();
        // SAFETY: slot `index` is not posted yet, so the acquirer cannot be reading it.
        unsafe {
            *slot = Some(value);
        }
        self.next += 1;
        self.shared.signal.post();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn published(&self) -> usize {
        self.next
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.shared.signal.close();
    }
}

/// Consumer side of the relay.
pub struct Acquirer<T> {
    shared: Arc<Shared<T>>,
    next: usize,
}

impl<T: Send> Acquirer<T> {
    /// Block until slot `index` is published, then move its value out.
    /// Slots must be acquired in order `0..capacity`.
    pub fn acquire_next(&mut self, index: usize) -> Result<T, RelayError> {
        check_cursor(self.next, index, self.capacity())?;
        if !self.shared.signal.wait() {
            return Err(RelayError::Closed { index });
        }
        let slot = self.shared.slots[index].get();
        // SAFETY: `wait` succeeded, so the publisher has moved past slot `index`.
        let value = unsafe { (*slot).take() };
        self.next += 1;
        value.ok_or(RelayError::EmptySlot(index))
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn acquired(&self) -> usize {
        self.next
    }

    /// Published slots not yet acquired.
    pub fn pending(&self) -> u64 {
        self.shared.signal.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_signal_counts_posts() {
        let signal = CountingSignal::new();
        signal.post();
        signal.post();
        assert_eq!(signal.available(), 2);
        assert!(signal.wait());
        assert!(signal.wait());
        assert_eq!(signal.available(), 0);
        signal.close();
        assert!(!signal.wait());
    }

    #[test]
    fn test_signal_wait_blocks_until_post() {
        let signal = Arc::new(CountingSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        signal.post();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_every_slot_delivered_once_in_order() {
        const COUNT: usize = 10_000;
        let (mut publisher, mut acquirer) = relay::<(usize, u64)>(COUNT);

        let producer = thread::spawn(move || {
            for i in 0..COUNT {
                publisher.publish(i, (i, (i as u64).wrapping_mul(31))).unwrap();
            }
        });
        let consumer = thread::spawn(move || {
            (0..COUNT)
                .map(|i| acquirer.acquire_next(i).unwrap())
                .collect::<Vec<_>>()
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();
        assert_eq!(received.len(), COUNT);
        for (i, value) in received.into_iter().enumerate() {
            assert_eq!(value, (i, (i as u64).wrapping_mul(31)));
        }
    }

    #[test]
    fn test_out_of_order_and_overrun_are_rejected() {
        let (mut publisher, mut acquirer) = relay::<u8>(2);
        assert_eq!(
            publisher.publish(1, 0),
            Err(RelayError::OutOfOrder {
                expected: 0,
                got: 1
            })
        );
        publisher.publish(0, 10).unwrap();
        publisher.publish(1, 11).unwrap();
        assert_eq!(
            publisher.publish(2, 12),
            Err(RelayError::Exhausted { capacity: 2 })
        );

        assert_eq!(acquirer.pending(), 2);
        assert_eq!(acquirer.acquire_next(0), Ok(10));
        assert_eq!(
            acquirer.acquire_next(0),
            Err(RelayError::OutOfOrder {
                expected: 1,
                got: 0
            })
        );
        assert_eq!(acquirer.acquire_next(1), Ok(11));
        assert_eq!(
            acquirer.acquire_next(2),
            Err(RelayError::Exhausted { capacity: 2 })
        );
    }

    #[test]
    fn test_dropped_publisher_unblocks_acquirer() {
        let (mut publisher, mut acquirer) = relay::<u8>(3);
        publisher.publish(0, 1).unwrap();
        let consumer = thread::spawn(move || {
            let first = acquirer.acquire_next(0);
            let second = acquirer.acquire_next(1);
            (first, second)
        });
        thread::sleep(Duration::from_millis(20));
        drop(publisher);
        let (first, second) = consumer.join().unwrap();
        assert_eq!(first, Ok(1));
        assert_eq!(second, Err(RelayError::Closed { index: 1 }));
    }

    #[test]
    fn test_single_slot_relay() {
        let (mut publisher, mut acquirer) = relay::<&str>(1);
        publisher.publish(0, "only").unwrap();
        drop(publisher);
        assert_eq!(acquirer.acquire_next(0), Ok("only"));
        assert_eq!(acquirer.acquired(), 1);
    }
}
