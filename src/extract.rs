use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::models::{ListItem, MetaInfo, TagGroup};

const DETAIL_URL_PREFIX: &str = "https://eleduck.com/posts";
const TALENT_POOL_URL_PREFIX: &str = "https://eleduck.com/tposts";

/// Category 人才库 uses a different detail-URL template than everything else.
const TALENT_POOL_CATEGORY_ID: i64 = 22;

/// Parse one listing payload into list items, preserving payload order.
/// Posts without an id are discarded.
pub fn parse_list(data: &Value) -> Vec<ListItem> {
    let posts = match data.get("posts").and_then(Value::as_array) {
        Some(posts) => posts,
        None => return Vec::new(),
    };

    let mut items = Vec::new();
    for post in posts {
        let id = json_str(post, "id");
        if id.is_empty() {
            continue;
        }

        let category = post.get("category");
        let category_id = category
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let url_prefix = if category_id == TALENT_POOL_CATEGORY_ID {
            TALENT_POOL_URL_PREFIX
        } else {
            DETAIL_URL_PREFIX
        };

        items.push(ListItem {
            url: format!("{}/{}", url_prefix, id),
            id,
            created_at: json_str(post, "published_at"),
            title: json_str(post, "title"),
            full_title: json_str(post, "full_title"),
            summary: json_str(post, "summary"),
            views_count: json_i64(post, "views_count"),
            comments_count: json_i64(post, "comments_count"),
            upvotes_count: json_i64(post, "upvotes_count"),
            downvotes_count: json_i64(post, "downvotes_count"),
            category: category
                .and_then(|c| c.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            user_nickname: post
                .get("user")
                .and_then(|u| u.get("nickname"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            pinned: post.get("pinned").and_then(Value::as_bool).unwrap_or(false),
            featured: post.get("featured").and_then(Value::as_bool).unwrap_or(false),
        });
    }

    items
}

fn json_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn json_i64(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Detail page content as extracted from HTML. Missing structural elements
/// leave the corresponding field empty rather than failing.
#[derive(Debug, Clone, Default)]
pub struct ParsedDetail {
    pub title: String,
    pub content: String,
    pub meta_info: MetaInfo,
    pub tags: Vec<TagGroup>,
}

/// Parse one detail page. Title comes from the page-title heading with any
/// leading 【...】 status marker stripped; body text walks headings,
/// paragraphs, and list items of the rich-content container in document
/// order; tags come from labeled field blocks.
pub fn parse_detail(html: &str) -> ParsedDetail {
    let document = Html::parse_document(html);
    let mut result = ParsedDetail::default();

    if let Some(selector) = Selector::parse("h1.page-title").ok() {
        if let Some(heading) = document.select(&selector).next() {
            result.title = strip_status_marker(&element_text(heading));
        }
    }

    result.content = extract_body_text(&document);
    result.meta_info = extract_meta_info(&document);
    result.tags = extract_tags(&document);

    result
}

/// Remove a leading bracketed status marker such as 【已结束】.
fn strip_status_marker(title: &str) -> String {
    match Regex::new(r"^[^】]*】") {
        Ok(re) => re.replace(title, "").trim().to_string(),
        Err(_) => title.trim().to_string(),
    }
}

fn extract_body_text(document: &Html) -> String {
    let container = Selector::parse("div.post-contents div.rich-content").ok();
    let blocks = Selector::parse("h1, h2, h3, h4, h5, h6, p, li").ok();
    let (Some(container), Some(blocks)) = (container, blocks) else {
        return String::new();
    };

    let Some(rich) = document.select(&container).next() else {
        return String::new();
    };

    let mut parts = Vec::new();
    for element in rich.select(&blocks) {
        let name = element.value().name();
        let text = element_text(element);
        if name.starts_with('h') {
            // Headings become standalone lines wrapped in blank lines.
            parts.push(format!("\n{}\n", text));
        } else if name == "p" {
            parts.push(text);
        } else if name == "li" {
            parts.push(format!("• {}", text));
        }
    }

    parts.join("\n").trim().to_string()
}

fn extract_meta_info(document: &Html) -> MetaInfo {
    let mut meta = MetaInfo::default();
    let Some(selector) = Selector::parse("div.meta-info").ok() else {
        return meta;
    };
    let Some(block) = document.select(&selector).next() else {
        return meta;
    };

    let text = element_text(block);
    meta.reads = capture_count(&text, r"(\d+)阅读");
    meta.comments = capture_count(&text, r"(\d+)评论");
    meta
}

fn capture_count(text: &str, pattern: &str) -> Option<i64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn extract_tags(document: &Html) -> Vec<TagGroup> {
    let field = Selector::parse("div.field-item").ok();
    let label = Selector::parse("div.field-label").ok();
    let body = Selector::parse("div.field-body").ok();
    let link = Selector::parse("a").ok();
    let (Some(field), Some(label), Some(body), Some(link)) = (field, label, body, link) else {
        return Vec::new();
    };

    let mut tags = Vec::new();
    for item in document.select(&field) {
        let label_el = item.select(&label).next();
        let body_el = item.select(&body).next();
        let (Some(label_el), Some(body_el)) = (label_el, body_el) else {
            continue;
        };

        let category = element_text(label_el).trim_end_matches([':', '：']).to_string();
        let values: Vec<String> = body_el
            .select(&link)
            .map(element_text)
            .filter(|v| !v.is_empty())
            .collect();

        // Blocks without any values are skipped.
        if !values.is_empty() {
            tags.push(TagGroup { category, values });
        }
    }

    tags
}

/// Collect an element's text with whitespace collapsed, the way the site
/// renders it.
fn element_text(element: ElementRef) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
