// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Count-min frequency sketch.
//!
//! A compact approximate counter: `width × depth` cells, one seeded hash
//! per row. `estimate` returns the minimum cell across rows, so collisions
//! can only inflate a count; the sketch may overestimate but never
//! underestimates.
//!
//! Counters are halved once the observation window fills. Without aging
//! the sketch saturates over long uptimes and loses the ability to tell a
//! recently-popular key from one that was popular last week.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Fixed per-row seeds (splitmix64 increments), deterministic across runs.
const ROW_SEEDS: [u64; 8] = [
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
    0x2545_f491_4f6c_dd1d,
    0xd6e8_feb8_6659_fd93,
    0xa0761_d649_5b9f_59d,
    0xe703_7ed1_a0b4_28db,
    0x8ebc_6af0_9c88_c6e3,
];

pub struct FrequencySketch {
    width: usize,
    depth: usize,
    counters: Vec<AtomicU32>,
    /// Additions since the last halving.
    additions: AtomicU64,
    /// Additions that trigger a halving (0 = never age).
    reset_threshold: u64,
}

impl FrequencySketch {
    /// Create a sketch. Width is rounded up to a power of two (min 16);
    /// depth is clamped to the available seed rows.
    #[must_use]
    pub fn new(width: usize, depth: usize, reset_threshold: u64) -> Self {
        let width = width.next_power_of_two().max(16);
        let depth = depth.clamp(1, ROW_SEEDS.len());
        let counters = (0..width * depth).map(|_| AtomicU32::new(0)).collect();
        Self {
            width,
            depth,
            counters,
            additions: AtomicU64::new(0),
            reset_threshold,
        }
    }

    fn cell(&self, row: usize, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        ROW_SEEDS[row].hash(&mut hasher);
        key.hash(&mut hasher);
        row * self.width + (hasher.finish() as usize & (self.width - 1))
    }

    /// Record one observation of `key`.
    pub fn add(&self, key: &str) {
        for row in 0..self.depth {
            let cell = &self.counters[self.cell(row, key)];
            // Saturate rather than wrap
            let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                (v < u32::MAX).then(|| v + 1)
            });
        }

        if self.reset_threshold > 0 {
            let additions = self.additions.fetch_add(1, Ordering::Relaxed) + 1;
            if additions >= self.reset_threshold {
                self.additions.store(0, Ordering::Relaxed);
                self.age();
            }
        }
    }

    /// Approximate observation count for `key`. May overestimate, never
    /// underestimates (modulo aging).
    #[must_use]
    pub fn estimate(&self, key: &str) -> u64 {
        (0..self.depth)
            .map(|row| self.counters[self.cell(row, key)].load(Ordering::Relaxed))
            .min()
            .unwrap_or(0) as u64
    }

    /// Halve every counter. Racy against concurrent adds; acceptable for a
    /// heuristic popularity signal.
    fn age(&self) {
        for cell in &self.counters {
            let v = cell.load(Ordering::Relaxed);
            cell.store(v / 2, Ordering::Relaxed);
        }
    }

    /// (width, depth) for stats/debugging.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.depth)
    }
}
