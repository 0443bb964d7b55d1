mod draw;
mod search;
mod stats;

pub use draw::cmd_draw;
pub use search::cmd_search;
pub use stats::cmd_stats;

use std::sync::Arc;

use crate::cache::CharacterCache;
use crate::config::Config;
use crate::models::CharacterRecord;
use crate::state::SharedState;

/// One-shot commands build a single generation and work from it.
async fn load_cache(config: &Config) -> anyhow::Result<Arc<CharacterCache>> {
    let shared = SharedState::new(config.clone())?;
    println!(
        "Fetching characters from: {}",
        shared.cache.provider_names().join(", ")
    );
    shared.cache.initialize().await;
    Ok(shared.cache)
}

fn print_character(character: &CharacterRecord) {
    println!(
        "[{}] {} ({})",
        character.rarity.as_str().to_uppercase(),
        character.name,
        character.anime
    );
    println!(
        "  ID: {} | Favorites: {} | Role: {} | Source: {}",
        character.id, character.favorites, character.role, character.api_source
    );
    println!("  Image: {}", character.image_url);
}
