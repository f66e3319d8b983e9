//! Resolve a model identifier to a local model directory.
//!
//! An identifier is either a directory path or a hub name such as
//! `Wvolf/ViT_Deepfake_Detection`, looked up under the models directory. With
//! the `hub` feature, missing files can be downloaded from the HuggingFace hub.

use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "model.onnx";
pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub const IMAGE_MODEL_FILES: &[&str] = &[MODEL_FILE, CONFIG_FILE, PREPROCESSOR_FILE];
pub const TEXT_MODEL_FILES: &[&str] = &[MODEL_FILE, CONFIG_FILE, TOKENIZER_FILE];

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Required files not present in `dir`.
pub fn missing_files<'a>(dir: &Path, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|file| !dir.join(file).is_file())
        .collect()
}

/// Find (and optionally fetch) the directory holding a model's files.
pub async fn resolve_model_dir(
    identifier: &str,
    models_dir: &Path,
    required: &[&str],
    fetch: bool,
) -> anyhow::Result<PathBuf> {
    let direct = Path::new(identifier);
    if direct.is_dir() {
        let missing = missing_files(direct, required);
        anyhow::ensure!(
            missing.is_empty(),
            "model directory {} is missing {missing:?}",
            direct.display()
        );
        return Ok(direct.to_path_buf());
    }

    let dir = models_dir.join(identifier);
    let missing = missing_files(&dir, required);
    if missing.is_empty() {
        return Ok(dir);
    }

    anyhow::ensure!(
        fetch,
        "model {identifier} not found: {} is missing {missing:?} (export it to ONNX there or enable fetching)",
        dir.display()
    );
    fetch_files(identifier, &dir, &missing).await?;
    Ok(dir)
}

/// Repository paths to try for a local file, most specific first.
///
/// Hub repos usually keep ONNX exports under `onnx/`.
pub fn remote_candidates(file: &str) -> Vec<String> {
    if file == MODEL_FILE {
        vec![format!("onnx/{MODEL_FILE}"), MODEL_FILE.to_string()]
    } else {
        vec![file.to_string()]
    }
}

#[cfg(feature = "hub")]
async fn fetch_files(identifier: &str, dir: &Path, files: &[&str]) -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing::info;

    let endpoint = std::env::var("HF_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
    let endpoint = endpoint.trim_end_matches('/');
    let token = std::env::var("HF_TOKEN").ok();
    let client = reqwest::Client::new();

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    for file in files {
        let mut fetched = false;
        for remote in remote_candidates(file) {
            let url = format!("{endpoint}/{identifier}/resolve/main/{remote}");
            info!(url = %url, "fetching model file");

            let mut request = client.get(&url);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }
            let resp = request.send().await.with_context(|| format!("GET {url}"))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            let bytes = resp
                .error_for_status()
                .with_context(|| format!("GET {url}"))?
                .bytes()
                .await?;

            tokio::fs::write(dir.join(file), &bytes)
                .await
                .with_context(|| format!("writing {file} to {}", dir.display()))?;
            info!(file, bytes = bytes.len(), "fetched model file");
            fetched = true;
            break;
        }
        anyhow::ensure!(fetched, "{file} not found in hub repository {identifier}");
    }
    Ok(())
}

#[cfg(not(feature = "hub"))]
async fn fetch_files(identifier: &str, _dir: &Path, _files: &[&str]) -> anyhow::Result<()> {
    anyhow::bail!("cannot fetch {identifier}: built without the `hub` feature")
}
