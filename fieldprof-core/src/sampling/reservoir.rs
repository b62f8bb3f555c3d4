//! Fixed-capacity uniform reservoir sampling (Vitter's Algorithm R).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default reservoir capacity and exactness threshold per field.
pub const MAX_EXACT_VALUES: usize = 1_000_000;

/// Uniform random sample without replacement of a stream of items.
///
/// Item `k` (1-indexed) is kept unconditionally while fewer than `capacity`
/// items are retained; afterwards it replaces a uniformly chosen slot with
/// probability `capacity / k`. At every point the retained items are a
/// uniform sample of everything seen so far.
///
/// Storage grows on demand, so a large capacity costs nothing for short
/// streams. Each slot remembers the ordinal of the item it holds, so the
/// sample can be read back in stream order after replacements.
#[derive(Debug, Clone)]
pub struct ReservoirSampler<T> {
    capacity: usize,
    items: Vec<T>,
    ordinals: Vec<u64>,
    count_seen: u64,
    rng: StdRng,
}

impl<T> ReservoirSampler<T> {
    /// Creates a sampler seeded from the operating system.
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    /// Creates a sampler with a fixed seed for reproducible samples.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            items: Vec::new(),
            ordinals: Vec::new(),
            count_seen: 0,
            rng,
        }
    }

    /// Offers one item to the reservoir.
    pub fn update(&mut self, item: T) {
        self.count_seen = self.count_seen.saturating_add(1);
        if self.items.len() < self.capacity {
            self.items.push(item);
            self.ordinals.push(self.count_seen);
            return;
        }
        if self.capacity == 0 {
            return;
        }
        let slot = self.rng.random_range(0..self.count_seen);
        if let Ok(slot) = usize::try_from(slot) {
            if slot < self.capacity {
                self.items[slot] = item;
                self.ordinals[slot] = self.count_seen;
            }
        }
    }

    /// Currently retained items, at most `capacity`, in slot order.
    pub fn sample(&self) -> &[T] {
        &self.items
    }

    /// Retained items in the order they were offered.
    pub fn arrival_order(&self) -> Vec<&T> {
        let mut slots: Vec<usize> = (0..self.items.len()).collect();
        slots.sort_unstable_by_key(|&slot| self.ordinals[slot]);
        slots.into_iter().map(|slot| &self.items[slot]).collect()
    }

    /// Total number of items offered so far.
    pub fn count_seen(&self) -> u64 {
        self.count_seen
    }

    /// Maximum number of retained items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
