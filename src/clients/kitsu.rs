use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

use super::{CharacterProvider, collect_pages, first_non_blank, get_json, title_case};
use crate::config::ProvidersConfig;
use crate::models::RawCharacter;

pub const KITSU_API: &str = "https://kitsu.io/api/edge";
const SOURCE: &str = "kitsu";

const ANIME_PAGE_LIMIT: usize = 20;
const MAX_ANIME: usize = 400;
const CHARACTERS_PER_ANIME: usize = 15;

#[derive(Debug, Deserialize)]
struct KitsuResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    included: Vec<KitsuIncluded>,
}

#[derive(Debug, Deserialize)]
struct KitsuAnime {
    id: String,
    attributes: KitsuAnimeAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KitsuAnimeAttributes {
    canonical_title: Option<String>,
    titles: Option<HashMap<String, Option<String>>>,
    user_count: Option<u64>,
}

impl KitsuAnime {
    fn title(&self) -> Option<String> {
        let titles = self.attributes.titles.as_ref();
        let lookup = |key: &str| titles.and_then(|t| t.get(key)).and_then(Option::as_deref);
        first_non_blank([
            self.attributes.canonical_title.as_deref(),
            lookup("en_jp"),
            lookup("en"),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct KitsuMediaCharacter {
    attributes: Option<KitsuMediaCharacterAttributes>,
    relationships: Option<KitsuMediaCharacterRelationships>,
}

#[derive(Debug, Deserialize)]
struct KitsuMediaCharacterAttributes {
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KitsuMediaCharacterRelationships {
    character: Option<KitsuRelationship>,
}

#[derive(Debug, Deserialize)]
struct KitsuRelationship {
    data: Option<KitsuResourceId>,
}

#[derive(Debug, Deserialize)]
struct KitsuResourceId {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct KitsuIncluded {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default)]
    attributes: KitsuCharacterAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KitsuCharacterAttributes {
    canonical_name: Option<String>,
    name: Option<String>,
    description: Option<String>,
    image: Option<KitsuImage>,
    favorites_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct KitsuImage {
    original: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
}

/// Provider backed by the Kitsu JSON:API.
#[derive(Clone)]
pub struct KitsuProvider {
    client: Client,
    base_url: String,
    max_concurrent_requests: usize,
}

impl KitsuProvider {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &ProvidersConfig) -> Self {
        Self {
            client,
            base_url: config.kitsu_url.trim_end_matches('/').to_string(),
            max_concurrent_requests: config.max_concurrent_requests,
        }
    }

    async fn top_anime_page(&self, offset: usize) -> Result<Vec<KitsuAnime>> {
        let url = format!(
            "{}/anime?sort=-userCount&page[limit]={}&page[offset]={}",
            self.base_url, ANIME_PAGE_LIMIT, offset
        );
        let response: KitsuResponse<KitsuAnime> = get_json(&self.client, &url).await?;
        Ok(response.data)
    }

    async fn anime_characters(&self, anime: &KitsuAnime) -> Result<Vec<RawCharacter>> {
        let url = format!(
            "{}/anime/{}/characters?include=character&page[limit]={}",
            self.base_url, anime.id, CHARACTERS_PER_ANIME
        );
        let response: KitsuResponse<KitsuMediaCharacter> = get_json(&self.client, &url).await?;
        Ok(normalize_characters(anime, response))
    }
}

#[async_trait::async_trait]
impl CharacterProvider for KitsuProvider {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        let pages = (0..MAX_ANIME)
            .step_by(ANIME_PAGE_LIMIT)
            .map(|offset| (format!("anime offset {offset}"), self.top_anime_page(offset)));
        let anime = collect_pages(SOURCE, self.max_concurrent_requests, pages).await;

        let lookups = anime
            .iter()
            .map(|a| (format!("anime {} characters", a.id), self.anime_characters(a)));
        let characters = collect_pages(SOURCE, self.max_concurrent_requests, lookups).await;

        info!(
            event = "provider_fetch_finished",
            provider = SOURCE,
            count = characters.len(),
            "Kitsu fetch finished"
        );
        characters
    }
}

/// Joins media-character links with the `included` character resources.
fn normalize_characters(
    anime: &KitsuAnime,
    response: KitsuResponse<KitsuMediaCharacter>,
) -> Vec<RawCharacter> {
    let Some(title) = anime.title() else {
        return Vec::new();
    };
    let popularity = anime.attributes.user_count.unwrap_or(0);

    let included: HashMap<&str, &KitsuCharacterAttributes> = response
        .included
        .iter()
        .filter(|i| i.kind == "characters")
        .map(|i| (i.id.as_str(), &i.attributes))
        .collect();

    response
        .data
        .iter()
        .take(CHARACTERS_PER_ANIME)
        .filter_map(|link| {
            let target = link
                .relationships
                .as_ref()?
                .character
                .as_ref()?
                .data
                .as_ref()
                .filter(|r| r.kind == "characters")?;
            let attrs = included.get(target.id.as_str())?;

            let image_url = attrs.image.as_ref().and_then(|i| {
                first_non_blank([
                    i.original.as_deref(),
                    i.large.as_deref(),
                    i.medium.as_deref(),
                    i.small.as_deref(),
                ])
            })?;
            let name = first_non_blank([attrs.canonical_name.as_deref(), attrs.name.as_deref()])?;

            let mut character = RawCharacter::new(SOURCE, name, title.clone(), image_url);
            character.id = target.id.parse().ok();
            character.anime_popularity = popularity;
            character.favorites = attrs.favorites_count.unwrap_or(0);
            character.description = attrs
                .description
                .as_deref()
                .map(|d| html_escape::decode_html_entities(d).trim().to_string())
                .unwrap_or_default();
            if let Some(role) = link.attributes.as_ref().and_then(|a| a.role.as_deref()) {
                character.role = title_case(role);
            }
            Some(character)
        })
        .collect()
}
