use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::fs;

use crate::formats::{Category, SearchEngine, Settings, Tag};

/// On-disk layout, relative to the server root.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    pub entries: PathBuf,
    pub settings: PathBuf,
    pub tags: PathBuf,
    pub search: PathBuf,
    pub collect: PathBuf,
    pub components: PathBuf,
    pub web_dir: PathBuf,
    pub template: PathBuf,
    pub upload_root: PathBuf,
    pub upload_images: PathBuf,
}

impl Paths {
    /// A relative root is made absolute against the working directory so that
    /// client paths given either way resolve to the same file.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).map(|p| normalize(&p)).unwrap_or(root);
        let data = root.join("data");
        let web_dir = root.join("dist").join("browser");
        let upload_root = root.join("_upload");
        Self {
            entries: data.join("db.json"),
            settings: data.join("settings.json"),
            tags: data.join("tag.json"),
            search: data.join("search.json"),
            collect: data.join("collect.json"),
            components: data.join("component.json"),
            template: web_dir.join("index.html"),
            upload_images: upload_root.join("images"),
            web_dir,
            upload_root,
            root,
        }
    }

    /// Resolves a client-supplied path against the root without touching the
    /// filesystem. `..` segments are folded lexically.
    pub fn resolve(&self, path: &str) -> PathBuf {
        normalize(&self.root.join(path))
    }

    pub fn is_settings(&self, resolved: &Path) -> bool {
        normalize(resolved) == normalize(&self.settings)
    }

    /// Files the public fetch cannot do without.
    pub fn critical_file(&self, resolved: &Path) -> Option<CriticalFile> {
        let resolved = normalize(resolved);
        [
            (&self.entries, CriticalFile::Entries),
            (&self.settings, CriticalFile::Settings),
            (&self.tags, CriticalFile::Tags),
            (&self.search, CriticalFile::Search),
        ]
        .into_iter()
        .find(|(p, _)| normalize(p) == resolved)
        .map(|(_, kind)| kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalFile {
    Entries,
    Settings,
    Tags,
    Search,
}

impl CriticalFile {
    /// Checks `content` with the same types the readers use.
    pub fn validate(self, content: &str) -> serde_json::Result<()> {
        match self {
            CriticalFile::Entries => serde_json::from_str::<Vec<Category>>(content).map(drop),
            CriticalFile::Settings => serde_json::from_str::<Settings>(content).map(drop),
            CriticalFile::Tags => serde_json::from_str::<Vec<Tag>>(content).map(drop),
            CriticalFile::Search => serde_json::from_str::<Vec<SearchEngine>>(content).map(drop),
        }
    }
}

impl std::fmt::Display for CriticalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CriticalFile::Entries => "entries",
            CriticalFile::Settings => "settings",
            CriticalFile::Tags => "tags",
            CriticalFile::Search => "search engines",
        })
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Typed access to the JSON files. Every call goes to disk; nothing is cached.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: Paths,
}

impl FileStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub async fn read_entries(&self) -> anyhow::Result<Vec<Category>> {
        read_json(&self.paths.entries).await
    }

    pub async fn read_settings(&self) -> anyhow::Result<Settings> {
        read_json(&self.paths.settings).await
    }

    pub async fn read_tags(&self) -> anyhow::Result<Vec<Tag>> {
        read_json(&self.paths.tags).await
    }

    pub async fn read_search(&self) -> anyhow::Result<Vec<SearchEngine>> {
        read_json(&self.paths.search).await
    }

    pub async fn read_components(&self) -> Vec<Value> {
        read_json_list_or_empty(&self.paths.components).await
    }

    /// Lenient view of the submission queue, for display only.
    pub async fn read_collects(&self) -> Vec<Value> {
        read_json_list_or_empty(&self.paths.collect).await
    }

    /// Queue contents for a read-modify-write. A missing file is an empty
    /// queue; a file that does not parse is an error so it is never overwritten.
    pub async fn read_collects_for_update(&self) -> anyhow::Result<Vec<Value>> {
        let path = &self.paths.collect;
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("read: {}", path.display())));
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("collect queue is not a json array: {}", path.display()))
    }

    pub async fn write_entries(&self, entries: &[Category]) -> anyhow::Result<()> {
        write_json_atomic(&self.paths.entries, &entries).await
    }

    pub async fn write_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        write_json_atomic(&self.paths.settings, settings).await
    }

    pub async fn write_collects(&self, collects: &[Value]) -> anyhow::Result<()> {
        write_json_atomic(&self.paths.collect, &collects).await
    }
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("read: {}", path.display()))?;
    let value =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json: {}", path.display()))?;
    Ok(value)
}

/// Reads a JSON array, treating a missing, unreadable or malformed file as empty.
async fn read_json_list_or_empty<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "read failed; using empty list");
            return Vec::new();
        }
    };
    match serde_json::from_slice::<Vec<T>>(&bytes) {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "malformed json; using empty list");
            Vec::new()
        }
    }
}

pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let data = serde_json::to_vec(value).context("serialize json")?;
    write_atomic(path, &data).await
}

/// Writes to a sibling temp file, then renames over `path`. Readers see either
/// the old or the new content. The parent directory must already exist, and an
/// existing file keeps its permissions.
pub async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(".tmp.{}", uuid::Uuid::new_v4().simple()));
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;

    if let Ok(meta) = fs::metadata(path).await {
        if let Err(err) = fs::set_permissions(&tmp_path, meta.permissions()).await {
            tracing::debug!(path = %tmp_path.display(), %err, "could not copy permissions");
        }
    }

    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(anyhow::Error::new(err)
            .context(format!("rename tmp to final: {}", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_folds_parent_segments() {
        let paths = Paths::new("/srv/nav");
        assert_eq!(
            paths.resolve("data/../data/./settings.json"),
            PathBuf::from("/srv/nav/data/settings.json")
        );
        assert!(paths.is_settings(&paths.resolve("./data/settings.json")));
        assert!(!paths.is_settings(&paths.resolve("data/settings.json.bak")));
        assert_eq!(
            paths.critical_file(&paths.resolve("data/db.json")),
            Some(CriticalFile::Entries)
        );
        assert_eq!(paths.critical_file(&paths.resolve("data/component.json")), None);
    }

    #[test]
    fn relative_root_matches_absolute_client_paths() -> anyhow::Result<()> {
        let paths = Paths::new(".");
        assert!(paths.root.is_absolute());
        let absolute = std::env::current_dir()?.join("data/settings.json");
        let absolute = absolute.to_str().ok_or_else(|| anyhow::anyhow!("non-utf8 cwd"))?;
        assert!(paths.is_settings(&paths.resolve(absolute)));
        assert!(paths.is_settings(&paths.resolve("data/settings.json")));
        Ok(())
    }

    #[test]
    fn critical_validation_uses_reader_types() {
        assert!(CriticalFile::Settings.validate(r#"{"title":null}"#).is_ok());
        assert!(CriticalFile::Settings.validate(r#"{"spiderQty":"20"}"#).is_err());
        assert!(CriticalFile::Entries.validate(r#"{"not":"a list"}"#).is_err());
        assert!(CriticalFile::Tags.validate("[]").is_ok());
    }

    #[tokio::test]
    async fn write_atomic_replaces_content_and_leaves_no_tmp() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.json");
        write_atomic(&path, b"[1]").await?;
        write_atomic(&path, b"[1,2]").await?;
        assert_eq!(std::fs::read(&path)?, b"[1,2]");

        let names = std::fs::read_dir(dir.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(names.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn write_atomic_requires_parent_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = write_atomic(&dir.path().join("missing/x.json"), b"{}")
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("write tmp"));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_atomic_keeps_permissions() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{}")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640))?;
        write_atomic(&path, b"{\"a\":1}").await?;
        let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_lists_degrade_to_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("data"))?;
        let store = FileStore::new(Paths::new(dir.path()));
        std::fs::write(&store.paths().collect, "[{\"name\":")?;
        assert!(store.read_collects().await.is_empty());
        assert!(store.read_collects_for_update().await.is_err());
        assert!(store.read_components().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn critical_reads_fail_loudly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("data"))?;
        let store = FileStore::new(Paths::new(dir.path()));
        std::fs::write(&store.paths().settings, "{")?;
        let err = store.read_settings().await.unwrap_err();
        assert!(format!("{err:#}").contains("parse json"));
        assert!(store.read_entries().await.is_err());
        Ok(())
    }
}
