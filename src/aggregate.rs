use std::collections::HashSet;

use anyhow::Context as _;
use serde::Serialize;
use serde_json::Value;

use crate::formats::{Category, Id, InternalStats, SearchEngine, Settings, Tag, for_each_web};
use crate::store::FileStore;

#[derive(Debug, Clone, Serialize)]
pub struct Contents {
    pub entries: Vec<Category>,
    pub settings: Settings,
    pub tags: Vec<Tag>,
    pub search: Vec<SearchEngine>,
    pub internal: InternalStats,
    pub components: Vec<Value>,
}

/// Reads every file once and assembles the public composite document.
pub async fn load_contents(store: &FileStore) -> anyhow::Result<Contents> {
    let entries = store.read_entries().await.context("load entries")?;
    let settings = store.read_settings().await.context("load settings")?;
    let tags = store.read_tags().await.context("load tags")?;
    let search = store.read_search().await.context("load search engines")?;
    let components = store.read_components().await;

    let internal = view_stats(&entries);
    let entries = transform_entries(entries, &settings, &tags);

    Ok(Contents {
        entries,
        settings,
        tags,
        search,
        internal,
        components,
    })
}

pub fn view_stats(entries: &[Category]) -> InternalStats {
    let mut stats = InternalStats::default();
    for_each_web(entries, |_, needs_login| {
        if needs_login {
            stats.login_view_count += 1;
        } else {
            stats.user_view_count += 1;
        }
    });
    stats
}

/// Display rules applied to the raw tree before it leaves the server.
pub fn transform_entries(
    mut entries: Vec<Category>,
    settings: &Settings,
    tags: &[Tag],
) -> Vec<Category> {
    let known_tags: HashSet<&Id> = tags.iter().filter_map(|t| t.id.as_ref()).collect();

    sort_by_optional_key(&mut entries, |c| c.sort);
    for category in &mut entries {
        for sub in &mut category.nav {
            for group in &mut sub.nav {
                sort_by_optional_key(&mut group.nav, |w| w.index);
                let breadcrumb = vec![category.title.clone(), sub.title.clone(), group.title.clone()];
                for web in &mut group.nav {
                    web.tags
                        .retain(|tag| tag.id.as_ref().is_some_and(|id| known_tags.contains(id)));
                    web.breadcrumb = breadcrumb.clone();
                    if !settings.check_url {
                        web.ok = None;
                    }
                }
            }
        }
    }
    entries
}

/// Stable: keyed items first in key order, unkeyed items keep file order after them.
fn sort_by_optional_key<T>(items: &mut [T], key: impl Fn(&T) -> Option<i64>) {
    items.sort_by_key(|item| match key(item) {
        Some(k) => (0, k),
        None => (1, 0),
    });
}
