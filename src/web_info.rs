use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Serialize;
use url::Url;

pub const USER_AGENT_VALUE: &str = concat!("nav-server/", env!("CARGO_PKG_VERSION"));
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Accepts the `!`-prefixed same-tab form used in entry URLs.
pub fn parse_entry_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('!').unwrap_or(raw);
    let url = Url::parse(raw).with_context(|| format!("invalid url: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    Ok(url)
}

pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("build http client")
}

pub async fn fetch_page_meta(client: &reqwest::Client, url: &Url) -> anyhow::Result<PageMeta> {
    let resp = client
        .get(url.clone())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !resp.status().is_success() {
        anyhow::bail!("GET {url} failed ({})", resp.status());
    }
    let final_url = resp.url().clone();
    let html = read_text_limited(resp, MAX_BODY_BYTES).await?;
    Ok(extract_page_meta(&html, &final_url))
}

pub async fn read_text_limited(mut resp: reqwest::Response, limit: usize) -> anyhow::Result<String> {
    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("read response chunk")? {
        if out.len() + chunk.len() > limit {
            let remaining = limit.saturating_sub(out.len());
            out.extend_from_slice(&chunk[..remaining]);
            break;
        }
        out.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn extract_page_meta(html: &str, base: &Url) -> PageMeta {
    let lower = html.to_ascii_lowercase();

    let title = lower.find("<title").and_then(|start| {
        let open_end = start + lower[start..].find('>')? + 1;
        let close = open_end + lower[open_end..].find("</title>")?;
        non_empty(decode_entities(html[open_end..close].trim()))
    });

    let mut description = None;
    let mut icon = None;
    for tag in tags_named(&lower, "meta") {
        let attrs = &html[tag.clone()];
        let name = attr(attrs, "name").or_else(|| attr(attrs, "property"));
        let is_description = name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case("description") || n.eq_ignore_ascii_case("og:description"));
        if is_description && description.is_none() {
            description = attr(attrs, "content").and_then(|c| non_empty(decode_entities(c.trim())));
        }
    }
    for tag in tags_named(&lower, "link") {
        let attrs = &html[tag.clone()];
        let is_icon = attr(attrs, "rel")
            .is_some_and(|rel| rel.to_ascii_lowercase().split_whitespace().any(|r| r == "icon"));
        if is_icon {
            icon = attr(attrs, "href").and_then(|href| base.join(href.trim()).ok());
            break;
        }
    }
    let icon = icon.or_else(|| base.join("/favicon.ico").ok());

    PageMeta {
        title,
        description,
        icon: icon.map(|u| u.to_string()),
    }
}

fn tags_named(lower: &str, name: &str) -> Vec<std::ops::Range<usize>> {
    let open = format!("<{name}");
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        let Some(end_rel) = lower[start..].find('>') else {
            break;
        };
        let end = start + end_rel + 1;
        let boundary = lower.as_bytes().get(start + open.len()).copied();
        if matches!(boundary, Some(b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>')) {
            out.push(start..end);
        }
        pos = end;
    }
    out
}

fn attr(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find(name) {
        let start = pos + rel;
        pos = start + name.len();
        let preceded_ok = start > 0
            && matches!(lower.as_bytes()[start - 1], b' ' | b'\t' | b'\n' | b'\r');
        if !preceded_ok {
            continue;
        }
        let rest = lower[pos..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            continue;
        };
        let value_start = tag.len() - after_eq.trim_start().len();
        let quote = tag.as_bytes().get(value_start).copied();
        return match quote {
            Some(q @ (b'"' | b'\'')) => {
                let body = &tag[value_start + 1..];
                let end = body.find(q as char)?;
                Some(body[..end].to_string())
            }
            Some(_) => {
                let body = &tag[value_start..];
                let end = body
                    .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                    .unwrap_or(body.len());
                Some(body[..end].to_string())
            }
            None => None,
        };
    }
    None
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
