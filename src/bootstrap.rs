use std::path::PathBuf;

use anyhow::Context as _;

use crate::store::{Paths, write_atomic};

#[derive(Debug, Default)]
pub struct BootstrapReport {
    pub missing: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
}

/// Runs once before serving. Missing content files are reported, not created:
/// they come from a build step. The submission queue is created empty.
pub async fn run(paths: &Paths) -> anyhow::Result<BootstrapReport> {
    let mut report = BootstrapReport::default();

    for path in [
        &paths.entries,
        &paths.settings,
        &paths.tags,
        &paths.search,
        &paths.template,
        &paths.components,
    ] {
        if tokio::fs::metadata(path).await.is_err() {
            tracing::warn!(path = %path.display(), "required file is missing");
            report.missing.push(path.clone());
            continue;
        }
        if let Err(err) = make_permissive(path).await {
            tracing::warn!(path = %path.display(), ?err, "chmod failed");
        }
    }

    if tokio::fs::metadata(&paths.collect).await.is_err() {
        let parent = paths
            .collect
            .parent()
            .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", paths.collect.display()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create data dir: {}", parent.display()))?;
        write_atomic(&paths.collect, b"[]")
            .await
            .context("create collect queue")?;
        tracing::info!(path = %paths.collect.display(), "created empty collect queue");
        report.created.push(paths.collect.clone());
    }

    Ok(report)
}

#[cfg(unix)]
async fn make_permissive(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
        .await
        .with_context(|| format!("chmod: {}", path.display()))
}

#[cfg(not(unix))]
async fn make_permissive(_path: &std::path::Path) -> anyhow::Result<()> {
    Ok(())
}
