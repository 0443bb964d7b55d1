use serde::{Deserialize, Serialize};

use crate::domain::{CharacterId, Rarity};

pub const UNKNOWN: &str = "Unknown";

/// A character as emitted by a provider, already projected onto the common
/// field set but not yet classified or assigned a generation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCharacter {
    pub id: Option<u32>,
    pub name: String,
    pub anime: String,
    pub anime_popularity: u64,
    pub image_url: String,
    pub favorites: u64,
    pub gender: String,
    pub description: String,
    pub role: String,
    pub api_source: String,
}

impl RawCharacter {
    /// Creates a record carrying only the required fields, with every
    /// optional field at its default.
    #[must_use]
    pub fn new(
        api_source: &str,
        name: impl Into<String>,
        anime: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            anime: anime.into(),
            anime_popularity: 0,
            image_url: image_url.into(),
            favorites: 0,
            gender: UNKNOWN.to_string(),
            description: String::new(),
            role: UNKNOWN.to_string(),
            api_source: api_source.to_string(),
        }
    }

    /// Whether the record has every field required to enter the cache.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.anime.trim().is_empty()
            && !self.image_url.trim().is_empty()
    }

    /// Canonical identity used to detect the same character across sources.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}-{}",
            self.name.trim().to_lowercase(),
            self.anime.trim().to_lowercase()
        )
    }
}

/// A classified character, immutable once published in a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    pub anime: String,
    pub anime_popularity: u64,
    pub image_url: String,
    pub favorites: u64,
    pub gender: String,
    pub description: String,
    pub role: String,
    pub api_source: String,
    pub rarity: Rarity,
}

impl CharacterRecord {
    #[must_use]
    pub fn from_raw(raw: RawCharacter, id: CharacterId, rarity: Rarity) -> Self {
        Self {
            id,
            name: raw.name.trim().to_string(),
            anime: raw.anime.trim().to_string(),
            anime_popularity: raw.anime_popularity,
            image_url: raw.image_url.trim().to_string(),
            favorites: raw.favorites,
            gender: non_empty_or(raw.gender, UNKNOWN),
            description: raw.description,
            role: non_empty_or(raw.role, UNKNOWN),
            api_source: raw.api_source,
            rarity,
        }
    }
}

/// Returns `value` unless it is blank, in which case `fallback` is used.
pub fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
