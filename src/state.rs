use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::CharacterCache;
use crate::clients::{AnilistProvider, CharacterProvider, JikanProvider, KitsuProvider};
use crate::config::{Config, ProvidersConfig};

/// Build a shared HTTP client with reasonable defaults for upstream calls.
/// Every provider reuses this client so connections are pooled.
fn build_shared_http_client(config: &ProvidersConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Enabled providers in dedup priority order: AniList, Jikan, Kitsu.
fn build_providers(config: &ProvidersConfig) -> anyhow::Result<Vec<Arc<dyn CharacterProvider>>> {
    let http_client = build_shared_http_client(config)?;
    let mut providers: Vec<Arc<dyn CharacterProvider>> = Vec::new();

    if config.anilist_enabled {
        providers.push(Arc::new(AnilistProvider::with_shared_client(
            http_client.clone(),
            config,
        )));
    }
    if config.jikan_enabled {
        providers.push(Arc::new(JikanProvider::with_shared_client(
            http_client.clone(),
            config,
        )));
    }
    if config.kitsu_enabled {
        providers.push(Arc::new(KitsuProvider::with_shared_client(http_client, config)));
    }

    Ok(providers)
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub cache: Arc<CharacterCache>,
}

impl SharedState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let providers = build_providers(&config.providers)?;
        Ok(Self::with_providers(config, providers))
    }

    /// Builds the state around an explicit provider list.
    #[must_use]
    pub fn with_providers(config: Config, providers: Vec<Arc<dyn CharacterProvider>>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            cache: Arc::new(CharacterCache::new(providers)),
        }
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_follow_priority_order() {
        let state = SharedState::new(Config::default()).unwrap();
        assert_eq!(
            state.cache.provider_names(),
            vec!["anilist", "jikan", "kitsu"]
        );
    }

    #[test]
    fn disabled_providers_are_skipped() {
        let mut config = Config::default();
        config.providers.jikan_enabled = false;
        let state = SharedState::new(config).unwrap();
        assert_eq!(state.cache.provider_names(), vec!["anilist", "kitsu"]);
    }
}
