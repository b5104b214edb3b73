pub mod ask;
pub mod build;
pub mod context;
pub mod reset;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::config::EmbeddingConfig;

const HF_BASE: &str = "https://huggingface.co";

fn model_url(model: &str) -> String {
    format!("{HF_BASE}/{model}/resolve/main/onnx/model.onnx")
}

fn tokenizer_url(model: &str) -> String {
    format!("{HF_BASE}/{model}/resolve/main/tokenizer.json")
}

/// Download the ONNX embedding model and tokenizer into the model cache.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let dir = crate::embedding::model_dir(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;

    let model_path = dir.join("model.onnx");
    let tokenizer_path = dir.join("tokenizer.json");

    if model_path.exists() {
        println!("Model already exists at {}", model_path.display());
    } else {
        println!("Downloading {} model.onnx...", config.model);
        download_file(&model_url(&config.model), &model_path).await?;
        println!("Model saved to {}", model_path.display());
    }

    if tokenizer_path.exists() {
        println!("Tokenizer already exists at {}", tokenizer_path.display());
    } else {
        println!("Downloading tokenizer.json...");
        download_file(&tokenizer_url(&config.model), &tokenizer_path).await?;
        println!("Tokenizer saved to {}", tokenizer_path.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Download a file with a progress bar, streaming into `<dest>.tmp` and
/// renaming on success.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download of {url} failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            let style = ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                .context("invalid progress template")?
                .progress_chars("##-");
            pb.set_style(style);
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_point_at_the_configured_repo() {
        assert_eq!(
            model_url("BAAI/bge-large-en-v1.5"),
            "https://huggingface.co/BAAI/bge-large-en-v1.5/resolve/main/onnx/model.onnx"
        );
        assert_eq!(
            tokenizer_url("BAAI/bge-large-en-v1.5"),
            "https://huggingface.co/BAAI/bge-large-en-v1.5/resolve/main/tokenizer.json"
        );
    }
}
