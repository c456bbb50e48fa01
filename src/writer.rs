use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::RootArgs;
use crate::error::RejectedContent;
use crate::seo;
use crate::store::{FileStore, Paths, write_atomic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Settings changed and the entry page was regenerated.
    WrittenWithTemplate,
}

/// Writes `content` verbatim to `path` (resolved against the root).
///
/// A settings write is followed by a template rebuild. The two steps are not
/// atomic together: if the rebuild fails, settings stay written and the page
/// keeps its previous SEO block until the next settings write succeeds.
pub async fn update_content(
    store: &FileStore,
    path: &str,
    content: &str,
) -> anyhow::Result<WriteOutcome> {
    let paths = store.paths();
    let resolved = paths.resolve(path);

    if let Some(kind) = paths.critical_file(&resolved) {
        if let Err(err) = kind.validate(content) {
            return Err(anyhow::Error::new(RejectedContent(format!(
                "content for {path} is not a valid {kind} file: {err}"
            ))));
        }
    }

    write_atomic(&resolved, content.as_bytes())
        .await
        .with_context(|| format!("write content: {}", resolved.display()))?;
    tracing::info!(path = %resolved.display(), bytes = content.len(), "content written");

    if !paths.is_settings(&resolved) {
        return Ok(WriteOutcome::Written);
    }
    if tokio::fs::metadata(&paths.template).await.is_err() {
        tracing::debug!(template = %paths.template.display(), "no template; skipping seo rebuild");
        return Ok(WriteOutcome::Written);
    }

    rebuild_template(store)
        .await
        .context("settings written but template rebuild failed")?;
    Ok(WriteOutcome::WrittenWithTemplate)
}

/// Regenerates the entry page's SEO block from the current entries and settings.
pub async fn rebuild_template(store: &FileStore) -> anyhow::Result<PathBuf> {
    let template_path = &store.paths().template;
    let html = tokio::fs::read_to_string(template_path)
        .await
        .with_context(|| format!("read template: {}", template_path.display()))?;
    let entries = store.read_entries().await.context("load entries")?;
    let settings = store.read_settings().await.context("load settings")?;

    let fragment = seo::render_fragment(&entries, &settings);
    let html = seo::splice_template(&html, &settings, &fragment);
    write_atomic(template_path, html.as_bytes())
        .await
        .context("write template")?;
    tracing::info!(template = %template_path.display(), "template regenerated");
    Ok(template_path.clone())
}

/// `seo` command: rebuilds the template under `--root` from the current files.
pub async fn run_seo(args: RootArgs) -> anyhow::Result<PathBuf> {
    rebuild_template(&FileStore::new(Paths::new(&args.root))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> anyhow::Result<(tempfile::TempDir, FileStore)> {
        let dir = tempfile::tempdir()?;
        let paths = Paths::new(dir.path());
        std::fs::create_dir_all(dir.path().join("data"))?;
        std::fs::create_dir_all(&paths.web_dir)?;
        std::fs::write(
            &paths.entries,
            r#"[{"id":1,"title":"A","nav":[{"id":2,"title":"B","nav":[{"id":3,"title":"C",
            "nav":[{"name":"Docs","url":"https://docs.example"}]}]}]}]"#,
        )?;
        std::fs::write(&paths.settings, r#"{"title":"Before"}"#)?;
        std::fs::write(&paths.tags, "[]")?;
        std::fs::write(&paths.search, "[]")?;
        std::fs::write(
            &paths.template,
            "<html><head><title>Before</title></head><body></body></html>",
        )?;
        Ok((dir, FileStore::new(paths)))
    }

    #[tokio::test]
    async fn plain_write_round_trips_bytes() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        let content = "{ \"weird\" :\n  [1, 2] }";
        let outcome = update_content(&store, "data/component.json", content).await?;
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(std::fs::read_to_string(&store.paths().components)?, content);
        Ok(())
    }

    #[tokio::test]
    async fn settings_write_regenerates_template() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        let outcome =
            update_content(&store, "./data/settings.json", r#"{"title":"After"}"#).await?;
        assert_eq!(outcome, WriteOutcome::WrittenWithTemplate);

        let html = std::fs::read_to_string(&store.paths().template)?;
        assert!(html.contains("<title>After</title>"));
        assert!(html.contains("https://docs.example"));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_json_for_critical_file_is_rejected_before_write() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        let err = update_content(&store, "data/settings.json", "{\"title\":")
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<RejectedContent>().is_some());
        let settings = std::fs::read_to_string(&store.paths().settings)?;
        assert_eq!(settings, r#"{"title":"Before"}"#);
        Ok(())
    }

    #[tokio::test]
    async fn mistyped_settings_are_rejected_and_fetch_keeps_working() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        for content in [r#"{"spiderQty":"20"}"#, r#"{"checkUrl":"yes"}"#, "[]"] {
            let err = update_content(&store, "data/settings.json", content)
                .await
                .unwrap_err();
            assert!(err.downcast_ref::<RejectedContent>().is_some(), "{content}");
        }
        assert!(crate::aggregate::load_contents(&store).await.is_ok());

        let outcome = update_content(&store, "data/settings.json", r#"{"title":null}"#).await?;
        assert_eq!(outcome, WriteOutcome::WrittenWithTemplate);
        Ok(())
    }

    #[tokio::test]
    async fn template_failure_leaves_settings_written() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        std::fs::write(&store.paths().entries, "not json")?;
        let err = update_content(&store, "data/settings.json", r#"{"title":"X"}"#)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("template rebuild failed"));
        assert_eq!(
            std::fs::read_to_string(&store.paths().settings)?,
            r#"{"title":"X"}"#
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_parent_dir_is_an_error() -> anyhow::Result<()> {
        let (_dir, store) = seeded()?;
        assert!(update_content(&store, "nope/file.txt", "x").await.is_err());
        Ok(())
    }
}
