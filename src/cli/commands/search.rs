use crate::config::Config;

pub async fn cmd_search(config: &Config, query: &str, limit: usize) -> anyhow::Result<()> {
    let cache = super::load_cache(config).await?;
    let results = cache.search_characters(query, limit)?;

    if results.is_empty() {
        println!("No characters found matching '{query}'");
        return Ok(());
    }

    println!();
    println!("Search Results ({}):", results.len());
    println!("{:-<60}", "");

    for character in &results {
        super::print_character(character);
        println!();
    }

    Ok(())
}
