//! One immutable snapshot of the cache with its lookup indexes.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::{CharacterId, Rarity};
use crate::models::CharacterRecord;

/// Per-tier counts of a generation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub common: usize,
    pub uncommon: usize,
    pub rare: usize,
    pub epic: usize,
    pub legendary: usize,
    pub total: usize,
    pub last_refresh: DateTime<Utc>,
    pub generation: u64,
}

impl CacheStats {
    #[must_use]
    pub const fn count(&self, tier: Rarity) -> usize {
        match tier {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

pub struct Generation {
    number: u64,
    refreshed_at: DateTime<Utc>,
    buckets: [Vec<Arc<CharacterRecord>>; 5],
    by_id: HashMap<CharacterId, Arc<CharacterRecord>>,
    by_name: HashMap<String, Vec<Arc<CharacterRecord>>>,
    /// Name index keys in first-insertion order, so substring scans are
    /// repeatable.
    names: Vec<String>,
}

impl Generation {
    /// Distributes merged records into tier buckets and builds both indexes.
    #[must_use]
    pub fn build(records: Vec<CharacterRecord>, number: u64, refreshed_at: DateTime<Utc>) -> Self {
        let mut buckets: [Vec<Arc<CharacterRecord>>; 5] = Default::default();
        let mut by_id = HashMap::with_capacity(records.len());
        let mut by_name: HashMap<String, Vec<Arc<CharacterRecord>>> = HashMap::new();
        let mut names = Vec::new();

        for record in records {
            let record = Arc::new(record);
            buckets[record.rarity.index()].push(Arc::clone(&record));
            by_id.insert(record.id, Arc::clone(&record));

            let key = record.name.to_lowercase();
            let entry = by_name.entry(key).or_insert_with_key(|k| {
                names.push(k.clone());
                Vec::new()
            });
            entry.push(record);
        }

        Self {
            number,
            refreshed_at,
            buckets,
            by_id,
            by_name,
            names,
        }
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[must_use]
    pub fn bucket(&self, tier: Rarity) -> &[Arc<CharacterRecord>] {
        &self.buckets[tier.index()]
    }

    /// Uniform draw from `tier`; when that bucket is empty, draws from the
    /// first non-empty bucket in [`Rarity::FALLBACK_ORDER`].
    pub fn random<R: Rng + ?Sized>(&self, tier: Rarity, rng: &mut R) -> Option<Arc<CharacterRecord>> {
        let bucket = self.bucket(tier);
        if !bucket.is_empty() {
            return bucket.choose(rng).cloned();
        }

        Rarity::FALLBACK_ORDER
            .iter()
            .map(|&t| self.bucket(t))
            .find(|b| !b.is_empty())
            .and_then(|b| b.choose(rng).cloned())
    }

    /// Case-insensitive search: exact name, then name substring, then
    /// anime substring. Results are unique by id and capped at `limit`.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<Arc<CharacterRecord>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |record: &Arc<CharacterRecord>| {
            if seen.insert(record.id) {
                results.push(Arc::clone(record));
            }
            results.len() >= limit
        };

        if let Some(exact) = self.by_name.get(&query) {
            for record in exact {
                if push(record) {
                    return results;
                }
            }
        }

        for name in self.names.iter().filter(|n| n.contains(&query)) {
            for record in self.by_name.get(name).into_iter().flatten() {
                if push(record) {
                    return results;
                }
            }
        }

        for tier in Rarity::FALLBACK_ORDER {
            for record in self.bucket(tier) {
                if record.anime.to_lowercase().contains(&query) && push(record) {
                    return results;
                }
            }
        }

        results
    }

    #[must_use]
    pub fn get(&self, id: CharacterId) -> Option<Arc<CharacterRecord>> {
        self.by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            common: self.bucket(Rarity::Common).len(),
            uncommon: self.bucket(Rarity::Uncommon).len(),
            rare: self.bucket(Rarity::Rare).len(),
            epic: self.bucket(Rarity::Epic).len(),
            legendary: self.bucket(Rarity::Legendary).len(),
            total: self.len(),
            last_refresh: self.refreshed_at,
            generation: self.number,
        }
    }
}
