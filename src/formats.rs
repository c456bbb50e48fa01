use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Identifier as it appears in the persisted files. Older files use numbers,
/// newer ones sometimes strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Num(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub own_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub nav: Vec<Subcategory>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub own_visible: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub nav: Vec<Group>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub own_visible: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub nav: Vec<Web>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One bookmark: the leaf of the entry tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Web {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_default")]
    pub desc: String,
    #[serde(default, deserialize_with = "null_default")]
    pub icon: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<WebTag>,
    #[serde(default, deserialize_with = "null_default")]
    pub own_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    /// Health from the last spider pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub breadcrumb: Vec<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEngine {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// How the spider treats a field it could fill from the fetched page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillPolicy {
    #[default]
    No,
    Empty,
    Can,
}

impl FillPolicy {
    pub fn apply(self, field: &mut String, fetched: Option<&str>) {
        let Some(fetched) = fetched.map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        match self {
            FillPolicy::No => {}
            FillPolicy::Empty if field.trim().is_empty() => *field = fetched.to_string(),
            FillPolicy::Empty => {}
            FillPolicy::Can => *field = fetched.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "null_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub keywords: String,
    #[serde(default, deserialize_with = "null_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_default")]
    pub check_url: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spider_qty: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spider_timeout: Option<u64>,
    #[serde(default, deserialize_with = "null_default")]
    pub spider_title: FillPolicy,
    #[serde(default, deserialize_with = "null_default")]
    pub spider_description: FillPolicy,
    #[serde(default, deserialize_with = "null_default")]
    pub spider_icon: FillPolicy,
    #[serde(default, deserialize_with = "null_default")]
    pub error_url_count: usize,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalStats {
    pub user_view_count: usize,
    pub login_view_count: usize,
}

/// Hand-edited files carry `null` where a value is absent; read it as the default.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Visits every web with the visibility it inherits from its ancestors.
pub fn for_each_web<'a>(entries: &'a [Category], mut f: impl FnMut(&'a Web, bool)) {
    for category in entries {
        for sub in &category.nav {
            for group in &sub.nav {
                let hidden = category.own_visible || sub.own_visible || group.own_visible;
                for web in &group.nav {
                    f(web, hidden || web.own_visible);
                }
            }
        }
    }
}

pub fn webs_mut(entries: &mut [Category]) -> impl Iterator<Item = &mut Web> {
    entries
        .iter_mut()
        .flat_map(|c| c.nav.iter_mut())
        .flat_map(|s| s.nav.iter_mut())
        .flat_map(|g| g.nav.iter_mut())
}

pub fn web_count(entries: &[Category]) -> usize {
    let mut count = 0;
    for_each_web(entries, |_, _| count += 1);
    count
}
