use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::{CharacterProvider, collect_pages, first_non_blank, get_json};
use crate::config::ProvidersConfig;
use crate::models::RawCharacter;

pub const JIKAN_API: &str = "https://api.jikan.moe/v4";
const SOURCE: &str = "jikan";

const TOP_ANIME_PAGES: u32 = 10;
const TOP_CHARACTER_PAGES: u32 = 20;
const PAGE_LIMIT: u32 = 25;
const CHARACTERS_PER_ANIME: usize = 15;

#[derive(Debug, Deserialize)]
struct JikanResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MalAnime {
    mal_id: u32,
    title: Option<String>,
    title_english: Option<String>,
    members: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MalImages {
    jpg: Option<MalImage>,
    webp: Option<MalImage>,
}

#[derive(Debug, Deserialize)]
struct MalImage {
    image_url: Option<String>,
    large_image_url: Option<String>,
}

impl MalImages {
    fn best_url(&self) -> Option<String> {
        let jpg = self.jpg.as_ref();
        let webp = self.webp.as_ref();
        first_non_blank([
            jpg.and_then(|i| i.large_image_url.as_deref()),
            jpg.and_then(|i| i.image_url.as_deref()),
            webp.and_then(|i| i.large_image_url.as_deref()),
            webp.and_then(|i| i.image_url.as_deref()),
        ])
        .filter(|url| !is_placeholder(url))
    }
}

/// MAL serves a generic silhouette for characters without artwork.
fn is_placeholder(url: &str) -> bool {
    url.contains("questionmark")
}

#[derive(Debug, Deserialize)]
struct MalCharacterRef {
    mal_id: u32,
    name: Option<String>,
    images: Option<MalImages>,
}

#[derive(Debug, Deserialize)]
struct MalAnimeCharacter {
    character: MalCharacterRef,
    role: Option<String>,
    favorites: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MalTopCharacter {
    mal_id: u32,
    name: Option<String>,
    images: Option<MalImages>,
    favorites: Option<u64>,
    about: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MalCharacterFull {
    #[serde(default)]
    anime: Vec<MalAnimeography>,
}

#[derive(Debug, Deserialize)]
struct MalAnimeography {
    role: Option<String>,
    anime: MalAnimeRef,
}

#[derive(Debug, Deserialize)]
struct MalAnimeRef {
    title: Option<String>,
}

/// Provider backed by the Jikan `MyAnimeList` API.
///
/// Two sourcing strategies run concurrently: characters of the top anime,
/// and the top characters list with each character's work resolved
/// individually. Output keeps the top-anime records first.
///
/// A full fetch is several hundred requests against a limit of roughly 60
/// per minute, and pages answered with 429 are skipped. Each strategy sends
/// one request at a time unless `jikan_max_concurrent_requests` is raised.
#[derive(Clone)]
pub struct JikanProvider {
    client: Client,
    base_url: String,
    max_concurrent_requests: usize,
}

impl JikanProvider {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &ProvidersConfig) -> Self {
        Self {
            client,
            base_url: config.jikan_url.trim_end_matches('/').to_string(),
            max_concurrent_requests: config.jikan_max_concurrent_requests,
        }
    }

    async fn top_anime_page(&self, page: u32) -> Result<Vec<MalAnime>> {
        let url = format!(
            "{}/top/anime?page={}&limit={}",
            self.base_url, page, PAGE_LIMIT
        );
        let response: JikanResponse<Vec<MalAnime>> = get_json(&self.client, &url).await?;
        Ok(response.data)
    }

    async fn anime_characters(&self, anime: &MalAnime) -> Result<Vec<RawCharacter>> {
        let url = format!("{}/anime/{}/characters", self.base_url, anime.mal_id);
        let response: JikanResponse<Vec<MalAnimeCharacter>> =
            get_json(&self.client, &url).await?;
        Ok(normalize_anime_characters(anime, response.data))
    }

    async fn top_characters_page(&self, page: u32) -> Result<Vec<MalTopCharacter>> {
        let url = format!(
            "{}/top/characters?page={}&limit={}",
            self.base_url, page, PAGE_LIMIT
        );
        let response: JikanResponse<Vec<MalTopCharacter>> = get_json(&self.client, &url).await?;
        Ok(response.data)
    }

    async fn resolve_top_character(&self, character: MalTopCharacter) -> Result<Vec<RawCharacter>> {
        let url = format!("{}/characters/{}/full", self.base_url, character.mal_id);
        let response: JikanResponse<MalCharacterFull> = get_json(&self.client, &url).await?;
        Ok(normalize_top_character(character, &response.data)
            .into_iter()
            .collect())
    }

    async fn from_top_anime(&self) -> Vec<RawCharacter> {
        let pages = (1..=TOP_ANIME_PAGES)
            .map(|page| (format!("top anime page {page}"), self.top_anime_page(page)));
        let anime = collect_pages(SOURCE, self.max_concurrent_requests, pages).await;

        let lookups = anime.iter().map(|a| {
            (
                format!("anime {} characters", a.mal_id),
                self.anime_characters(a),
            )
        });
        collect_pages(SOURCE, self.max_concurrent_requests, lookups).await
    }

    async fn from_top_characters(&self) -> Vec<RawCharacter> {
        let pages = (1..=TOP_CHARACTER_PAGES).map(|page| {
            (
                format!("top characters page {page}"),
                self.top_characters_page(page),
            )
        });
        let characters = collect_pages(SOURCE, self.max_concurrent_requests, pages).await;

        let lookups = characters.into_iter().map(|c| {
            (
                format!("character {} full", c.mal_id),
                self.resolve_top_character(c),
            )
        });
        collect_pages(SOURCE, self.max_concurrent_requests, lookups).await
    }
}

#[async_trait::async_trait]
impl CharacterProvider for JikanProvider {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        let (mut characters, top) = futures::join!(self.from_top_anime(), self.from_top_characters());
        characters.extend(top);

        info!(
            event = "provider_fetch_finished",
            provider = SOURCE,
            count = characters.len(),
            "Jikan fetch finished"
        );
        characters
    }
}

fn normalize_anime_characters(
    anime: &MalAnime,
    entries: Vec<MalAnimeCharacter>,
) -> Vec<RawCharacter> {
    let Some(title) = first_non_blank([anime.title.as_deref(), anime.title_english.as_deref()])
    else {
        return Vec::new();
    };
    let popularity = anime.members.unwrap_or(0);

    entries
        .into_iter()
        .take(CHARACTERS_PER_ANIME)
        .filter_map(|entry| {
            let image_url = entry.character.images.as_ref()?.best_url()?;
            let name = first_non_blank([entry.character.name.as_deref()])?;

            let mut character = RawCharacter::new(SOURCE, name, title.clone(), image_url);
            character.id = Some(entry.character.mal_id);
            character.anime_popularity = popularity;
            character.favorites = entry.favorites.unwrap_or(0);
            if let Some(role) = entry.role {
                character.role = role;
            }
            Some(character)
        })
        .collect()
}

/// The top characters endpoint carries no work popularity, so it stays 0.
fn normalize_top_character(
    top: MalTopCharacter,
    full: &MalCharacterFull,
) -> Option<RawCharacter> {
    let appearance = full
        .anime
        .iter()
        .find(|a| a.role.as_deref() == Some("Main"))
        .or_else(|| full.anime.first())?;
    let anime = first_non_blank([appearance.anime.title.as_deref()])?;
    let image_url = top.images.as_ref()?.best_url()?;
    let name = first_non_blank([top.name.as_deref()])?;

    let mut character = RawCharacter::new(SOURCE, name, anime, image_url);
    character.id = Some(top.mal_id);
    character.favorites = top.favorites.unwrap_or(0);
    character.description = top.about.unwrap_or_default().trim().to_string();
    if let Some(role) = &appearance.role {
        character.role.clone_from(role);
    }
    Some(character)
}
