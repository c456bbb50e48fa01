use crate::formats::{Category, Settings, for_each_web};

pub const SEO_START: &str = "<!-- nav:seo:start -->";
pub const SEO_END: &str = "<!-- nav:seo:end -->";

/// Hidden link list for crawlers. Webs behind login are left out.
pub fn render_fragment(entries: &[Category], settings: &Settings) -> String {
    let mut out = String::new();
    out.push_str(SEO_START);
    out.push_str("\n<div id=\"nav-seo\" style=\"display:none\">\n");
    if !settings.title.is_empty() {
        out.push_str(&format!("<h1>{}</h1>\n", html_escape(&settings.title)));
    }
    if !settings.description.is_empty() {
        out.push_str(&format!("<p>{}</p>\n", html_escape(&settings.description)));
    }
    for_each_web(entries, |web, needs_login| {
        if needs_login || web.url.is_empty() {
            return;
        }
        let url = web.url.strip_prefix('!').unwrap_or(&web.url);
        out.push_str(&format!(
            "<a href=\"{}\" title=\"{}\">{}</a>\n",
            html_escape(url),
            html_escape(&web.desc),
            html_escape(&web.name)
        ));
    });
    out.push_str("</div>\n");
    out.push_str(SEO_END);
    out
}

/// Rewrites the page's SEO surface: title, description/keywords meta and the
/// marked fragment. A template without markers gets the fragment before `</body>`.
pub fn splice_template(html: &str, settings: &Settings, fragment: &str) -> String {
    let mut html = html.to_string();

    if !settings.title.is_empty() {
        let title = format!("<title>{}</title>", html_escape(&settings.title));
        html = replace_element(&html, "<title", "</title>", &title);
    }
    if !settings.description.is_empty() {
        html = replace_meta(&html, "description", &settings.description);
    }
    if !settings.keywords.is_empty() {
        html = replace_meta(&html, "keywords", &settings.keywords);
    }

    if let Some(start) = html.find(SEO_START) {
        if let Some(end_rel) = html[start..].find(SEO_END) {
            let end = start + end_rel + SEO_END.len();
            html.replace_range(start..end, fragment);
            return html;
        }
    }
    // Unpaired or out-of-order markers would leave a block that can never be
    // replaced again.
    html = html.replace(SEO_START, "").replace(SEO_END, "");

    match html.rfind("</body>") {
        Some(pos) => html.insert_str(pos, &format!("{fragment}\n")),
        None => {
            html.push_str(fragment);
            html.push('\n');
        }
    }
    html
}

fn replace_element(html: &str, open: &str, close: &str, replacement: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let Some(start) = lower.find(open) else {
        return html.to_string();
    };
    let Some(end_rel) = lower[start..].find(close) else {
        return html.to_string();
    };
    let end = start + end_rel + close.len();
    format!("{}{}{}", &html[..start], replacement, &html[end..])
}

fn replace_meta(html: &str, name: &str, content: &str) -> String {
    let tag = format!(
        "<meta name=\"{name}\" content=\"{}\" />",
        html_escape(content)
    );
    let lower = html.to_ascii_lowercase();
    let needle = format!("name=\"{name}\"");

    let mut pos = 0usize;
    while let Some(rel) = lower[pos..].find("<meta") {
        let start = pos + rel;
        let Some(end_rel) = lower[start..].find('>') else {
            break;
        };
        let end = start + end_rel + 1;
        if lower[start..end].contains(&needle) {
            return format!("{}{}{}", &html[..start], tag, &html[end..]);
        }
        pos = end;
    }

    match lower.find("</head>") {
        Some(head_end) => format!("{}{}\n{}", &html[..head_end], tag, &html[head_end..]),
        None => html.to_string(),
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
