//! Integration tests for the character cache lifecycle.
//!
//! Providers are replaced with in-memory fakes so no network is touched.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gachadex::cache::{CacheError, CharacterCache};
use gachadex::clients::CharacterProvider;
use gachadex::domain::Rarity;
use gachadex::models::RawCharacter;

struct FakeProvider {
    name: &'static str,
    characters: Vec<RawCharacter>,
}

#[async_trait::async_trait]
impl CharacterProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        self.characters.clone()
    }
}

/// Returns a different, internally consistent batch on every call.
struct ShiftingProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CharacterProvider for ShiftingProvider {
    fn name(&self) -> &'static str {
        "shifting"
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        let batch = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        (0..50 + batch * 10)
            .map(|i| {
                let mut c = character(
                    "shifting",
                    &format!("Character {i}"),
                    &format!("Batch {batch}"),
                );
                c.favorites = (i as u64) * 200;
                c
            })
            .collect()
    }
}

struct FailingProvider;

#[async_trait::async_trait]
impl CharacterProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        panic!("connection refused");
    }
}

fn character(source: &str, name: &str, anime: &str) -> RawCharacter {
    RawCharacter::new(source, name, anime, format!("https://img.example/{name}.png"))
}

fn pikachu(source: &'static str) -> Arc<dyn CharacterProvider> {
    let mut c = character(source, "Pikachu", "Pokémon");
    c.favorites = 9000;
    c.anime_popularity = 1_000_000;
    Arc::new(FakeProvider {
        name: source,
        characters: vec![c],
    })
}

#[tokio::test]
async fn test_same_character_from_every_provider_collapses_to_one() {
    let cache = CharacterCache::new(vec![pikachu("anilist"), pikachu("jikan"), pikachu("kitsu")]);

    let stats = cache.initialize().await;

    assert_eq!(stats.total, 1);
    assert_eq!(stats.legendary, 1);
    assert_eq!(stats.common + stats.uncommon + stats.rare + stats.epic, 0);

    let drawn = cache
        .get_random_character(Rarity::Legendary)
        .unwrap()
        .unwrap();
    assert_eq!(drawn.name, "Pikachu");
    assert_eq!(drawn.api_source, "anilist");
}

#[tokio::test]
async fn test_earlier_provider_wins_conflicts() {
    let mut first = character("anilist", "Levi", "Attack on Titan");
    first.role = "Supporting".to_string();
    let mut second = character("jikan", "LEVI", "attack on titan");
    second.role = "Main".to_string();
    second.favorites = 100_000;

    let cache = CharacterCache::new(vec![
        Arc::new(FakeProvider {
            name: "anilist",
            characters: vec![first],
        }),
        Arc::new(FakeProvider {
            name: "jikan",
            characters: vec![second],
        }),
    ]);
    cache.initialize().await;

    let results = cache.search_characters("levi", 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].api_source, "anilist");
    assert_eq!(results[0].role, "Supporting");
    assert_eq!(results[0].rarity, Rarity::Common);
}

#[tokio::test]
async fn test_every_record_is_found_by_its_id_and_keys_are_unique() {
    let characters: Vec<_> = (0..40)
        .map(|i| {
            let mut c = character("fake", &format!("Hero {}", i % 20), &format!("Show {}", i % 3));
            c.id = Some(i % 7);
            c.favorites = u64::from(i) * 250;
            c
        })
        .collect();

    let cache = CharacterCache::new(vec![Arc::new(FakeProvider {
        name: "fake",
        characters,
    })]);
    cache.initialize().await;

    let generation = cache.snapshot().unwrap();
    let mut keys = HashSet::new();
    let mut ids = HashSet::new();

    for tier in Rarity::FALLBACK_ORDER {
        for record in generation.bucket(tier) {
            assert_eq!(record.rarity, tier);
            assert!(keys.insert(format!(
                "{}-{}",
                record.name.to_lowercase(),
                record.anime.to_lowercase()
            )));
            assert!(ids.insert(record.id));

            let found = cache.get_character_by_id(record.id).unwrap().unwrap();
            assert_eq!(found.name, record.name);
            assert_eq!(found.anime, record.anime);
        }
    }

    assert_eq!(keys.len(), generation.len());
}

#[tokio::test]
async fn test_queries_fail_until_initialized() {
    let cache = CharacterCache::new(vec![pikachu("anilist")]);

    assert_eq!(
        cache.get_random_character(Rarity::Common).unwrap_err(),
        CacheError::NotInitialized
    );
    assert_eq!(
        cache.refresh_cache().await.unwrap_err(),
        CacheError::NotInitialized
    );

    cache.initialize().await;
    assert!(cache.get_random_character(Rarity::Common).unwrap().is_some());
}

#[tokio::test]
async fn test_failing_provider_does_not_block_others() {
    let cache = CharacterCache::new(vec![
        Arc::new(FailingProvider),
        pikachu("jikan"),
        Arc::new(FakeProvider {
            name: "kitsu",
            characters: vec![character("kitsu", "Eevee", "Pokémon")],
        }),
    ]);

    let stats = cache.initialize().await;
    assert_eq!(stats.total, 2);
    assert_eq!(cache.search_characters("pokémon", 10).unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_a_partial_generation() {
    let cache = Arc::new(CharacterCache::new(vec![Arc::new(ShiftingProvider {
        calls: AtomicUsize::new(0),
    })]));
    cache.initialize().await;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let generation = cache.snapshot().unwrap();
                    let stats = generation.stats();

                    let animes: HashSet<String> = Rarity::FALLBACK_ORDER
                        .iter()
                        .flat_map(|&t| generation.bucket(t))
                        .map(|r| r.anime.clone())
                        .collect();
                    assert_eq!(animes.len(), 1, "generation mixes batches");

                    let batch: usize = animes
                        .iter()
                        .next()
                        .and_then(|a| a.strip_prefix("Batch "))
                        .and_then(|n| n.parse().ok())
                        .unwrap();
                    assert_eq!(stats.total, 50 + batch * 10);
                    assert_eq!(
                        stats.common + stats.uncommon + stats.rare + stats.epic + stats.legendary,
                        stats.total
                    );

                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let (a, b, c) = tokio::join!(
        cache.refresh_cache(),
        cache.refresh_cache(),
        cache.refresh_cache()
    );
    let mut generations = vec![
        a.unwrap().generation,
        b.unwrap().generation,
        c.unwrap().generation,
    ];
    generations.sort_unstable();
    assert_eq!(generations, vec![2, 3, 4]);

    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(cache.get_stats().unwrap().generation, 4);
    assert_eq!(cache.get_stats().unwrap().total, 80);
}
