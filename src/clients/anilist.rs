use anyhow::Result;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};

use super::{CharacterProvider, collect_pages, first_non_blank, title_case};
use crate::config::ProvidersConfig;
use crate::models::RawCharacter;

pub const ANILIST_API: &str = "https://graphql.anilist.co";
const SOURCE: &str = "anilist";

/// Media popularity bands as `(popularity_greater, popularity_lesser)`.
///
/// The bands only spread the fetch across the catalogue; rarity is still
/// computed by the classifier.
const POPULARITY_BANDS: [(Option<u64>, Option<u64>); 5] = [
    (Some(200_000), None),
    (Some(100_000), Some(200_000)),
    (Some(50_000), Some(100_000)),
    (Some(10_000), Some(50_000)),
    (None, Some(10_000)),
];
const PAGES_PER_BAND: u32 = 5;
const MEDIA_PER_PAGE: u32 = 50;

const CHARACTERS_QUERY: &str = r"
    query ($page: Int, $perPage: Int, $popularityGreater: Int, $popularityLesser: Int) {
        Page(page: $page, perPage: $perPage) {
            media(
                type: ANIME,
                sort: POPULARITY_DESC,
                popularity_greater: $popularityGreater,
                popularity_lesser: $popularityLesser
            ) {
                id
                popularity
                title { romaji english }
                characters(perPage: 25, sort: FAVOURITES_DESC) {
                    edges {
                        role
                        node {
                            id
                            name { full native }
                            image { large medium }
                            favourites
                            gender
                            description(asHtml: false)
                        }
                    }
                }
            }
        }
    }
";

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: Variables,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Variables {
    page: u32,
    per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    popularity_greater: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    popularity_lesser: Option<u64>,
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<Data>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    popularity: Option<u64>,
    title: Title,
    characters: Option<CharacterConnection>,
}

#[derive(Deserialize)]
struct Title {
    romaji: Option<String>,
    english: Option<String>,
}

#[derive(Deserialize)]
struct CharacterConnection {
    #[serde(default)]
    edges: Vec<CharacterEdge>,
}

#[derive(Deserialize)]
struct CharacterEdge {
    role: Option<String>,
    node: Option<CharacterNode>,
}

#[derive(Deserialize)]
struct CharacterNode {
    id: u32,
    name: Option<CharacterName>,
    image: Option<CharacterImage>,
    favourites: Option<u64>,
    gender: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CharacterName {
    full: Option<String>,
    native: Option<String>,
}

#[derive(Deserialize)]
struct CharacterImage {
    large: Option<String>,
    medium: Option<String>,
}

#[derive(Clone)]
pub struct AnilistProvider {
    client: Client,
    base_url: String,
    max_concurrent_requests: usize,
}

impl AnilistProvider {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &ProvidersConfig) -> Self {
        Self {
            client,
            base_url: config.anilist_url.clone(),
            max_concurrent_requests: config.max_concurrent_requests,
        }
    }

    async fn fetch_page(
        &self,
        page: u32,
        popularity_greater: Option<u64>,
        popularity_lesser: Option<u64>,
    ) -> Result<Vec<RawCharacter>> {
        let request_body = GraphQLRequest {
            query: CHARACTERS_QUERY,
            variables: Variables {
                page,
                per_page: MEDIA_PER_PAGE,
                popularity_greater,
                popularity_lesser,
            },
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("AniList API error: {status}");
        }

        let response: GraphQLResponse = response.json().await?;
        normalize_response(response)
    }
}

#[async_trait::async_trait]
impl CharacterProvider for AnilistProvider {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_characters(&self) -> Vec<RawCharacter> {
        let pages = POPULARITY_BANDS
            .iter()
            .flat_map(|&(greater, lesser)| {
                (1..=PAGES_PER_BAND).map(move |page| (greater, lesser, page))
            })
            .map(|(greater, lesser, page)| {
                let label = format!("band {greater:?}..{lesser:?} page {page}");
                (label, self.fetch_page(page, greater, lesser))
            });

        let characters = collect_pages(SOURCE, self.max_concurrent_requests, pages).await;
        info!(
            event = "provider_fetch_finished",
            provider = SOURCE,
            count = characters.len(),
            "AniList fetch finished"
        );
        characters
    }
}

fn normalize_response(response: GraphQLResponse) -> Result<Vec<RawCharacter>> {
    let Some(data) = response.data else {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        anyhow::bail!("AniList returned no data: {}", messages.join("; "));
    };

    if !response.errors.is_empty() {
        debug!(errors = response.errors.len(), "AniList returned partial data");
    }

    Ok(data.page.media.into_iter().flat_map(normalize_media).collect())
}

fn normalize_media(media: Media) -> Vec<RawCharacter> {
    let Some(anime) =
        first_non_blank([media.title.romaji.as_deref(), media.title.english.as_deref()])
    else {
        return Vec::new();
    };
    let popularity = media.popularity.unwrap_or(0);

    media
        .characters
        .map(|c| c.edges)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|edge| {
            let node = edge.node?;
            let image_url = node
                .image
                .as_ref()
                .and_then(|i| first_non_blank([i.large.as_deref(), i.medium.as_deref()]))?;
            let name = node
                .name
                .as_ref()
                .and_then(|n| first_non_blank([n.full.as_deref(), n.native.as_deref()]))?;

            let mut character = RawCharacter::new(SOURCE, name, anime.clone(), image_url);
            character.id = Some(node.id);
            character.anime_popularity = popularity;
            character.favorites = node.favourites.unwrap_or(0);
            if let Some(gender) = node.gender {
                character.gender = gender;
            }
            if let Some(role) = edge.role {
                character.role = title_case(&role);
            }
            character.description = node
                .description
                .as_deref()
                .map(clean_description)
                .unwrap_or_default();
            Some(character)
        })
        .collect()
}

fn spoiler_regex() -> Option<&'static Regex> {
    static INSTANCE: OnceLock<Option<Regex>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| Regex::new(r"(?s)~!.*?!~").ok())
        .as_ref()
}

/// Strips AniList spoiler blocks and decodes HTML entities.
fn clean_description(raw: &str) -> String {
    let without_spoilers = spoiler_regex().map_or_else(
        || raw.to_string(),
        |re| re.replace_all(raw, "").into_owned(),
    );
    html_escape::decode_html_entities(&without_spoilers)
        .trim()
        .to_string()
}
