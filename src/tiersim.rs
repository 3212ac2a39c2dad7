//! Tier simulation harness for strategy validation.
//!
//! A deterministic, in-memory stand-in for production tiering: three
//! ordered maps (hot/warm/cold), each with its own TTL and capacity.
//! Lookup order is hot → warm → cold-with-similarity; warm and cold hits
//! promote the value to all faster tiers; capacity overflow evicts the
//! oldest-inserted entry.
//!
//! Two deliberate simplifications, flagged for anyone comparing against
//! production behavior:
//!
//! - Eviction is insertion-order, not LRU. Recency of *access* is not
//!   tracked, only recency of *insertion*. If strategy comparisons need
//!   true LRU, use an ordered map with move-to-end-on-access instead.
//! - The cold tier's "semantic" lookup is a crude character-overlap
//!   heuristic. It produces comparative statistics for tuning; it is not
//!   the production vector-similarity path and must not be trusted as a
//!   correctness oracle.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Which tier served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    Hot,
    Warm,
    Cold,
}

/// Per-tier settings.
#[derive(Debug, Clone)]
pub struct TierConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub enabled: bool,
}

/// Simulator settings.
#[derive(Debug, Clone)]
pub struct TierSimConfig {
    pub hot: TierConfig,
    pub warm: TierConfig,
    pub cold: TierConfig,
    /// Minimum character overlap for a cold-tier similarity hit.
    pub similarity_threshold: f64,
}

impl Default for TierSimConfig {
    fn default() -> Self {
        Self {
            hot: TierConfig {
                ttl: Duration::from_secs(60),
                max_entries: 100,
                enabled: true,
            },
            warm: TierConfig {
                ttl: Duration::from_secs(3600),
                max_entries: 1_000,
                enabled: true,
            },
            cold: TierConfig {
                ttl: Duration::from_secs(86_400),
                max_entries: 10_000,
                enabled: true,
            },
            similarity_threshold: 0.8,
        }
    }
}

/// A successful simulated lookup.
#[derive(Debug, Clone)]
pub struct SimHit {
    pub value: String,
    pub tier: TierLevel,
    /// Set when the cold tier matched a different key by similarity.
    pub similar_key: Option<String>,
}

/// Counters for strategy comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierSimStats {
    pub hot_hits: u64,
    pub warm_hits: u64,
    pub cold_hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub evictions: u64,
}

struct TierEntry {
    value: String,
    inserted_at: Instant,
}

struct Tier {
    config: TierConfig,
    entries: HashMap<String, TierEntry>,
    /// Insertion order; front = oldest = next eviction victim.
    order: VecDeque<String>,
}

impl Tier {
    fn new(config: TierConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.config.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Insert, evicting oldest-inserted entries past capacity. Returns the
    /// number of evictions.
    fn insert(&mut self, key: &str, value: &str) -> u64 {
        if !self.config.enabled || self.config.max_entries == 0 {
            return 0;
        }

        let replaced = self
            .entries
            .insert(
                key.to_string(),
                TierEntry {
                    value: value.to_string(),
                    inserted_at: Instant::now(),
                },
            )
            .is_some();
        if !replaced {
            self.order.push_back(key.to_string());
        }

        let mut evicted = 0;
        while self.entries.len() > self.config.max_entries {
            match self.order.pop_front() {
                Some(victim) => {
                    // Stale order entries (already removed via expiry) don't count
                    if self.entries.remove(&victim).is_some() {
                        evicted += 1;
                    }
                }
                None => break,
            }
        }
        evicted
    }

    fn live_keys(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.inserted_at.elapsed() < self.config.ttl)
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}

/// Character-set overlap (Jaccard), the harness's stand-in for semantic
/// similarity.
#[must_use]
pub fn char_overlap(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// The simulator.
pub struct TierSimulator {
    hot: Tier,
    warm: Tier,
    cold: Tier,
    similarity_threshold: f64,
    stats: TierSimStats,
}

impl TierSimulator {
    #[must_use]
    pub fn new(config: TierSimConfig) -> Self {
        Self {
            hot: Tier::new(config.hot),
            warm: Tier::new(config.warm),
            cold: Tier::new(config.cold),
            similarity_threshold: config.similarity_threshold,
            stats: TierSimStats::default(),
        }
    }

    /// Look up a key: hot → warm → cold (exact, then similarity). Lower-
    /// tier hits are promoted to all faster tiers.
    pub fn lookup(&mut self, key: &str) -> Option<SimHit> {
        if let Some(value) = self.hot.get(key) {
            self.stats.hot_hits += 1;
            return Some(SimHit {
                value,
                tier: TierLevel::Hot,
                similar_key: None,
            });
        }

        if let Some(value) = self.warm.get(key) {
            self.stats.warm_hits += 1;
            self.promote(key, &value, TierLevel::Warm);
            return Some(SimHit {
                value,
                tier: TierLevel::Warm,
                similar_key: None,
            });
        }

        if let Some(value) = self.cold.get(key) {
            self.stats.cold_hits += 1;
            self.promote(key, &value, TierLevel::Cold);
            return Some(SimHit {
                value,
                tier: TierLevel::Cold,
                similar_key: None,
            });
        }

        // Similarity pass over live cold entries
        if self.cold.config.enabled {
            let mut best: Option<(String, String, f64)> = None;
            for (candidate, value) in self.cold.live_keys() {
                let overlap = char_overlap(key, &candidate);
                if overlap >= self.similarity_threshold
                    && best.as_ref().is_none_or(|(_, _, b)| overlap > *b)
                {
                    best = Some((candidate, value, overlap));
                }
            }
            if let Some((similar_key, value, _)) = best {
                self.stats.cold_hits += 1;
                self.promote(key, &value, TierLevel::Cold);
                return Some(SimHit {
                    value,
                    tier: TierLevel::Cold,
                    similar_key: Some(similar_key),
                });
            }
        }

        self.stats.misses += 1;
        None
    }

    /// Write a (freshly synthesized) value to every enabled tier.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.stats.evictions += self.hot.insert(key, value);
        self.stats.evictions += self.warm.insert(key, value);
        self.stats.evictions += self.cold.insert(key, value);
    }

    fn promote(&mut self, key: &str, value: &str, from: TierLevel) {
        self.stats.promotions += 1;
        self.stats.evictions += self.hot.insert(key, value);
        if from == TierLevel::Cold {
            self.stats.evictions += self.warm.insert(key, value);
        }
    }

    #[must_use]
    pub fn stats(&self) -> &TierSimStats {
        &self.stats
    }

    /// Live entry counts per tier (hot, warm, cold).
    #[must_use]
    pub fn sizes(&self) -> (usize, usize, usize) {
        (
            self.hot.live_keys().len(),
            self.warm.live_keys().len(),
            self.cold.live_keys().len(),
        )
    }
}
