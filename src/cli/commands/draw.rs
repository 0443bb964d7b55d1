//! Draw command handler

use crate::config::Config;
use crate::domain::Rarity;

pub async fn cmd_draw(config: &Config, rarity: &str, count: usize) -> anyhow::Result<()> {
    let tier: Rarity = rarity.parse()?;
    let cache = super::load_cache(config).await?;

    println!();
    for _ in 0..count.max(1) {
        match cache.get_random_character(tier)? {
            Some(character) => {
                if character.rarity != tier {
                    println!("(no {tier} characters cached, fell back to {})", character.rarity);
                }
                super::print_character(&character);
                println!();
            }
            None => {
                println!("No characters available. Check provider connectivity.");
                break;
            }
        }
    }

    Ok(())
}
