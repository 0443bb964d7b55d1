//! Upstream character providers.
//!
//! Each provider owns the raw payload shapes of one upstream API and
//! projects them onto [`RawCharacter`]. Nothing outside a provider module
//! may depend on those shapes.

pub mod anilist;
pub mod jikan;
pub mod kitsu;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::warn;

use crate::models::RawCharacter;

pub use anilist::AnilistProvider;
pub use jikan::JikanProvider;
pub use kitsu::KitsuProvider;

/// A source of character records.
///
/// `fetch_characters` never fails: a page that cannot be fetched or parsed
/// contributes an empty list and the rest of the fetch carries on.
#[async_trait::async_trait]
pub trait CharacterProvider: Send + Sync {
    /// Stable provider name, recorded as `api_source` on every record.
    fn name(&self) -> &'static str;

    async fn fetch_characters(&self) -> Vec<RawCharacter>;
}

/// Sends a GET request and decodes a JSON body, treating any non-2xx
/// status as an error.
pub(crate) async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("HTTP {status}: {}", truncate(&body, 200));
    }

    Ok(response.json().await?)
}

/// Runs page fetches with at most `limit` in flight, keeping page order.
///
/// Failed pages are logged and counted, then contribute nothing. The page
/// iterator is drained before the returned future is first polled, so only
/// the boxed page futures live across awaits.
pub(crate) fn collect_pages<'a, I, F, T>(
    provider: &'static str,
    limit: usize,
    pages: I,
) -> BoxFuture<'a, Vec<T>>
where
    I: IntoIterator<Item = (String, F)>,
    F: Future<Output = Result<Vec<T>>> + Send + 'a,
    T: Send + 'a,
{
    let pages: Vec<BoxFuture<'a, Vec<T>>> = pages
        .into_iter()
        .map(|(label, fut)| {
            async move {
                match fut.await {
                    Ok(items) => items,
                    Err(e) => {
                        metrics::counter!("provider_page_failures_total", "provider" => provider)
                            .increment(1);
                        warn!(
                            event = "provider_page_failed",
                            provider = provider,
                            page = %label,
                            error = %e,
                            "Upstream page failed, skipping"
                        );
                        Vec::new()
                    }
                }
            }
            .boxed()
        })
        .collect();

    async move {
        stream::iter(pages)
            .buffered(limit.max(1))
            .flat_map(stream::iter)
            .collect::<Vec<T>>()
            .await
    }
    .boxed()
}

/// `SUPPORTING` -> `Supporting`, `main` -> `Main`
pub(crate) fn title_case(role: &str) -> String {
    let lower = role.trim().to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// First non-blank string among the candidates.
pub(crate) fn first_non_blank<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}
