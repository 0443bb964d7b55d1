//! Cache statistics command handler

use crate::config::Config;
use crate::domain::Rarity;

pub async fn cmd_stats(config: &Config) -> anyhow::Result<()> {
    let cache = super::load_cache(config).await?;
    let stats = cache.get_stats()?;

    println!();
    println!("Character Cache (generation {})", stats.generation);
    println!("{:-<40}", "");

    for tier in Rarity::FALLBACK_ORDER.iter().rev() {
        println!("{:<12} {:>8}", tier.as_str(), stats.count(*tier));
    }

    println!("{:-<40}", "");
    println!("{:<12} {:>8}", "total", stats.total);
    println!("Refreshed at: {}", stats.last_refresh.to_rfc3339());

    Ok(())
}
