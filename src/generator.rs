use std::num::NonZeroU32;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{Event, unix_millis};
use crate::region::RegionPool;

/// Seed used when none is configured, so repeated runs are reproducible.
pub const DEFAULT_SEED: u64 = 123;
pub const DEFAULT_MAX_PRICE: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Produces synthetic events, rotating through the region pool.
pub struct EventGenerator {
    pool: RegionPool,
    cursor: usize,
    max_price: NonZeroU32,
    rng: StdRng,
}

impl EventGenerator {
    pub fn new(pool: RegionPool, max_price: NonZeroU32, seed: u64) -> Self {
        Self {
            pool,
            cursor: 0,
            max_price,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pool(&self) -> &RegionPool {
        &self.pool
    }

    /// Next event stamped with the current wall clock time.
    pub fn next_event(&mut self) -> Event {
        self.next_event_at(unix_millis())
    }

    pub fn next_event_at(&mut self, timestamp_ms: u64) -> Event {
        let region = self.pool.get(self.cursor);
        let price = self.rng.random_range(0..self.max_price.get());
        self.cursor = (self.cursor + 1) % self.pool.len();
        Event {
            region,
            price,
            timestamp_ms,
        }
    }
}

impl Iterator for EventGenerator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        Some(self.next_event())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(fraction: f64, seed: u64) -> EventGenerator {
        let pool = RegionPool::from_fraction(fraction).unwrap();
        EventGenerator::new(pool, DEFAULT_MAX_PRICE, seed)
    }

    #[test]
    fn test_region_rotation_is_cyclic() {
        let mut generator = generator(0.1, DEFAULT_SEED);
        let pool_size = generator.pool().len();
        let first: Vec<_> = (0..pool_size).map(|_| generator.next_event().region).collect();
        assert_eq!(first, generator.pool().iter().collect::<Vec<_>>());

        for _ in 0..3 {
            let again: Vec<_> = (0..pool_size).map(|_| generator.next_event().region).collect();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_prices_in_range_and_reproducible() {
        let a: Vec<_> = generator(-0.3, 7).take(500).map(|e| e.price).collect();
        let b: Vec<_> = generator(-0.3, 7).take(500).map(|e| e.price).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|p| *p < DEFAULT_MAX_PRICE.get()));
    }

    #[test]
    fn test_single_region_pool_and_fixed_timestamp() {
        let pool = RegionPool::from_fraction(-1.0 / 253.0).unwrap();
        assert_eq!(pool.len(), 1);
        let mut generator = EventGenerator::new(pool, NonZeroU32::new(1).unwrap(), 1);
        for _ in 0..5 {
            let event = generator.next_event_at(99);
            assert_eq!(event.region, "ZW");
            assert_eq!(event.price, 0);
            assert_eq!(event.timestamp_ms, 99);
        }
    }
}
