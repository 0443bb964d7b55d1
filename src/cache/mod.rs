//! In-memory character cache.
//!
//! A rebuild fans out to every provider, merges their output and builds a
//! fresh [`Generation`] off to the side. The new generation is published by
//! swapping a single `Arc`, so readers always see one complete generation.
//!
//! # Lifecycle
//! 1. [`CharacterCache::initialize`] builds and publishes the first generation
//! 2. [`CharacterCache::refresh_cache`] replaces it wholesale (scheduler or API)
//! 3. Queries clone the current `Arc<Generation>` and never wait on a rebuild

pub mod generation;
pub mod merge;

pub use generation::{CacheStats, Generation};

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::clients::CharacterProvider;
use crate::domain::{CharacterId, Rarity};
use crate::models::{CharacterRecord, RawCharacter};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Character cache has not been initialized")]
    NotInitialized,
}

pub struct CharacterCache {
    providers: Vec<Arc<dyn CharacterProvider>>,
    current: RwLock<Option<Arc<Generation>>>,
    rebuild_lock: Mutex<()>,
    generations: AtomicU64,
}

impl CharacterCache {
    /// Creates an empty, not yet initialized cache.
    ///
    /// Provider order is the dedup priority: on a name/anime conflict the
    /// record from the earlier provider is kept.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn CharacterProvider>>) -> Self {
        Self {
            providers,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Builds and publishes a generation. Calling it again simply rebuilds.
    pub async fn initialize(&self) -> CacheStats {
        self.rebuild("initialize").await
    }

    /// Replaces the current generation with a freshly built one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotInitialized`] if no generation has been
    /// published yet.
    pub async fn refresh_cache(&self) -> Result<CacheStats, CacheError> {
        if !self.is_loaded() {
            return Err(CacheError::NotInitialized);
        }
        Ok(self.rebuild("refresh").await)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.read_current().is_some()
    }

    /// Current generation, shared with any other in-flight reader.
    pub fn snapshot(&self) -> Result<Arc<Generation>, CacheError> {
        self.read_current().ok_or(CacheError::NotInitialized)
    }

    pub fn get_random_character(
        &self,
        tier: Rarity,
    ) -> Result<Option<Arc<CharacterRecord>>, CacheError> {
        let generation = self.snapshot()?;
        Ok(generation.random(tier, &mut rand::rng()))
    }

    pub fn search_characters(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Arc<CharacterRecord>>, CacheError> {
        Ok(self.snapshot()?.search(query, limit))
    }

    pub fn get_character_by_id(
        &self,
        id: CharacterId,
    ) -> Result<Option<Arc<CharacterRecord>>, CacheError> {
        Ok(self.snapshot()?.get(id))
    }

    pub fn get_stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.snapshot()?.stats())
    }

    fn read_current(&self) -> Option<Arc<Generation>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, generation: Generation) {
        let generation = Arc::new(generation);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(generation);
    }

    #[instrument(skip(self), fields(providers = self.providers.len()))]
    async fn rebuild(&self, trigger: &'static str) -> CacheStats {
        let _guard = self.rebuild_lock.lock().await;
        let start = Instant::now();
        info!(event = "cache_rebuild_started", trigger, "Rebuilding character cache");

        let characters = self.fetch_all().await;
        let fetched = characters.len();

        let refreshed_at = Utc::now();
        let outcome = merge::merge(characters, refreshed_at.timestamp_millis());
        let number = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Generation::build(outcome.records, number, refreshed_at);
        let stats = generation.stats();

        self.publish(generation);
        record_metrics(&stats, start);

        info!(
            event = "cache_rebuild_finished",
            trigger,
            generation = number,
            fetched,
            incomplete = outcome.incomplete,
            duplicates = outcome.duplicates,
            total = stats.total,
            legendary = stats.legendary,
            epic = stats.epic,
            rare = stats.rare,
            uncommon = stats.uncommon,
            common = stats.common,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Character cache rebuilt"
        );

        stats
    }

    /// Runs every provider concurrently and concatenates their output in
    /// provider order. A provider task that panics contributes nothing.
    async fn fetch_all(&self) -> Vec<RawCharacter> {
        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let name = provider.name();
                (
                    name,
                    tokio::spawn(async move { provider.fetch_characters().await }),
                )
            })
            .collect();

        let mut characters = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(batch) => {
                    metrics::gauge!("provider_characters_fetched", "provider" => name)
                        .set(u32::try_from(batch.len()).unwrap_or(u32::MAX));
                    characters.extend(batch);
                }
                Err(e) => {
                    metrics::counter!("provider_failures_total", "provider" => name).increment(1);
                    error!(
                        event = "provider_failed",
                        provider = name,
                        error = %e,
                        "Provider task failed, continuing without it"
                    );
                }
            }
        }
        characters
    }
}

fn record_metrics(stats: &CacheStats, start: Instant) {
    metrics::counter!("character_cache_rebuilds_total").increment(1);
    metrics::histogram!("character_cache_rebuild_duration_seconds")
        .record(start.elapsed().as_secs_f64());
    for tier in Rarity::FALLBACK_ORDER {
        metrics::gauge!("character_cache_records", "rarity" => tier.as_str())
            .set(u32::try_from(stats.count(tier)).unwrap_or(u32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(Vec<RawCharacter>);

    #[async_trait::async_trait]
    impl CharacterProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_characters(&self) -> Vec<RawCharacter> {
            self.0.clone()
        }
    }

    struct PanickingProvider;

    #[async_trait::async_trait]
    impl CharacterProvider for PanickingProvider {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn fetch_characters(&self) -> Vec<RawCharacter> {
            panic!("upstream exploded");
        }
    }

    fn character(name: &str) -> RawCharacter {
        RawCharacter::new("static", name, "Bleach", format!("https://img/{name}.png"))
    }

    #[tokio::test]
    async fn queries_before_initialize_are_rejected() {
        let cache = CharacterCache::new(vec![Arc::new(StaticProvider(vec![character("Ichigo")]))]);

        assert!(!cache.is_loaded());
        assert_eq!(cache.get_stats().unwrap_err(), CacheError::NotInitialized);
        assert!(cache.get_random_character(Rarity::Common).is_err());
        assert!(cache.search_characters("ichigo", 5).is_err());
        assert!(cache.get_character_by_id(CharacterId::new(1)).is_err());
        assert_eq!(cache.refresh_cache().await.unwrap_err(), CacheError::NotInitialized);
    }

    #[tokio::test]
    async fn initialize_then_refresh_bumps_generation() {
        let cache = CharacterCache::new(vec![Arc::new(StaticProvider(vec![
            character("Ichigo"),
            character("Rukia"),
        ]))]);

        let stats = cache.initialize().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.generation, 1);
        assert!(cache.is_loaded());

        let stats = cache.refresh_cache().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.generation, 2);
    }

    #[tokio::test]
    async fn panicking_provider_is_isolated() {
        let cache = CharacterCache::new(vec![
            Arc::new(PanickingProvider),
            Arc::new(StaticProvider(vec![character("Ichigo")])),
        ]);

        let stats = cache.initialize().await;
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn build_profiles_unwind_so_provider_panics_stay_isolated() {
        let manifest: toml::Value = toml::from_str(include_str!("../../Cargo.toml")).unwrap();
        let profiles = manifest.get("profile").and_then(toml::Value::as_table);

        for (name, profile) in profiles.into_iter().flatten() {
            assert_ne!(
                profile.get("panic").and_then(toml::Value::as_str),
                Some("abort"),
                "profile.{name} aborts on panic"
            );
        }
    }

    #[tokio::test]
    async fn total_outage_still_loads() {
        let cache = CharacterCache::new(vec![Arc::new(StaticProvider(Vec::new()))]);
        let stats = cache.initialize().await;

        assert!(cache.is_loaded());
        assert_eq!(stats.total, 0);
        assert!(cache.get_random_character(Rarity::Legendary).unwrap().is_none());
    }
}
