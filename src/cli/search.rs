use anyhow::Result;

use crate::config::VesperConfig;
use crate::memory::types::SearchHit;

const PREVIEW_CHARS: usize = 160;

/// Run a memory lookup from the terminal.
pub async fn search(config: &VesperConfig, query: &str, k: Option<usize>) -> Result<()> {
    let hits = lookup(config, query, k).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("  {}. (score: {:.4}, distance: {:.4})", i + 1, hit.score, hit.distance);
        println!("     {}", preview(&hit.text));
        println!();
    }
    Ok(())
}

/// Load the store and return the top hits for `query`.
pub(crate) async fn lookup(
    config: &VesperConfig,
    query: &str,
    k: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let config = config.clone();
    let query = query.to_string();
    let k = k.unwrap_or(config.retrieval.default_k);
    let hits = tokio::task::spawn_blocking(move || -> Result<Vec<SearchHit>> {
        let store = crate::server::open_store(&config)?;
        Ok(store.search(&query, k)?)
    })
    .await??;
    Ok(hits)
}

/// First line-ish of a hit, cut on a char boundary.
fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_on_char_boundary() {
        let text = "é".repeat(200);
        let p = preview(&text);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn short_text_is_flattened() {
        assert_eq!(preview("a\nb"), "a b");
    }
}
