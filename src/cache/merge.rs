//! Merge and deduplication of provider output into one generation.

use std::collections::HashSet;

use crate::domain::{CharacterId, classify};
use crate::models::{CharacterRecord, RawCharacter};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Result of one merge pass.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub records: Vec<CharacterRecord>,
    pub incomplete: usize,
    pub duplicates: usize,
}

fn fnv1a(parts: &[&[u8]]) -> u32 {
    parts.iter().flat_map(|p| p.iter()).fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 32-bit FNV-1a over `name + anime + salt`, folded to a non-negative
/// 31-bit value.
///
/// `attempt` is appended when non-zero to reprobe after a collision.
#[must_use]
pub fn synthetic_id(name: &str, anime: &str, salt: i64, attempt: u32) -> u32 {
    let salt = salt.to_string();
    let hash = if attempt == 0 {
        fnv1a(&[name.as_bytes(), anime.as_bytes(), salt.as_bytes()])
    } else {
        let attempt = attempt.to_string();
        fnv1a(&[
            name.as_bytes(),
            anime.as_bytes(),
            salt.as_bytes(),
            b"#",
            attempt.as_bytes(),
        ])
    };
    hash & 0x7fff_ffff
}

/// Merges provider output, already concatenated in priority order.
///
/// Incomplete records are dropped, the first record seen for a dedup key
/// wins, and every survivor is classified and given an id that is unique
/// in the result. Source ids are kept when still free; otherwise an id is
/// derived with [`synthetic_id`] salted by `salt`.
pub fn merge<I>(characters: I, salt: i64) -> MergeOutcome
where
    I: IntoIterator<Item = RawCharacter>,
{
    let mut outcome = MergeOutcome::default();
    let mut seen_keys = HashSet::new();
    let mut used_ids = HashSet::new();

    for raw in characters {
        if !raw.is_complete() {
            outcome.incomplete += 1;
            continue;
        }

        if !seen_keys.insert(raw.dedup_key()) {
            outcome.duplicates += 1;
            continue;
        }

        let id = match raw.id {
            Some(id) if used_ids.insert(id) => id,
            _ => {
                let name = raw.name.trim();
                let anime = raw.anime.trim();
                let mut attempt = 0;
                loop {
                    let candidate = synthetic_id(name, anime, salt, attempt);
                    if used_ids.insert(candidate) {
                        break candidate;
                    }
                    attempt += 1;
                }
            }
        };

        let rarity = classify(raw.favorites, raw.anime_popularity);
        outcome
            .records
            .push(CharacterRecord::from_raw(raw, CharacterId::new(id), rarity));
    }

    outcome
}
