use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use base64::Engine as _;

use crate::error::RejectedContent;
use crate::store::Paths;

/// Stores a base64 payload under the upload directory and returns its public path.
pub async fn store_asset(paths: &Paths, name: &str, content_b64: &str) -> anyhow::Result<String> {
    let relative = safe_relative(name)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(strip_data_url(content_b64).trim())
        .map_err(|err| RejectedContent(format!("content is not valid base64: {err}")))?;

    let target = paths.upload_images.join(&relative);
    let parent = target
        .parent()
        .ok_or_else(|| anyhow::anyhow!("upload path has no parent: {}", target.display()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create upload dir: {}", parent.display()))?;
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("write upload: {}", target.display()))?;
    tracing::info!(path = %target.display(), bytes = bytes.len(), "asset uploaded");

    let public = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Ok(format!("/images/{public}"))
}

fn safe_relative(name: &str) -> Result<PathBuf, RejectedContent> {
    let trimmed = name.trim().trim_start_matches('/');
    let path = Path::new(trimmed);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(RejectedContent(format!("invalid upload path: {name}"))),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(RejectedContent(format!("invalid upload path: {name}")));
    }
    Ok(out)
}

fn strip_data_url(content: &str) -> &str {
    match content.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => content,
    }
}
