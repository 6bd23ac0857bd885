//! Lightweight HTML helpers for pulling "about us" copy out of jeweller sites.
//!
//! Not a full parser. Start tags are located with regexes and the matching
//! end tag is found by counting nested tags of the same name.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use url::Url;

const ABOUT_KEYWORDS: [&str; 5] = ["about", "about us", "about-us", "our story", "who we are"];
const CONTENT_SELECTORS: [&str; 6] = [
    "main",
    "article",
    ".content",
    "#content",
    ".about-content",
    "#about-content",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").expect("valid anchor regex"))
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid href regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"))
}

// 依標籤或選擇器產生的 pattern 只編譯一次
fn regex_cache() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn cached_regex(pattern: String) -> Option<Regex> {
    let mut cache = regex_cache().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = cache.get(&pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(&pattern).ok()?;
    cache.insert(pattern, re.clone());
    Some(re)
}

fn start_tag_re(tag: &str) -> Option<Regex> {
    cached_regex(format!(r"(?is)<{}\b[^>]*>", regex::escape(tag)))
}

fn open_or_close_re(tag: &str) -> Option<Regex> {
    cached_regex(format!(r"(?is)<(/?){}\b[^>]*>", regex::escape(tag)))
}

/// All `<a href>` links in document order.
pub fn extract_links(html: &str) -> Vec<Link> {
    anchor_re()
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let href_caps = href_re().captures(attrs)?;
            let href = href_caps
                .get(1)
                .or_else(|| href_caps.get(2))
                .or_else(|| href_caps.get(3))?
                .as_str();
            Some(Link {
                href: decode_entities(href),
                text: html_to_text(caps.get(2).map(|m| m.as_str()).unwrap_or_default()),
            })
        })
        .collect()
}

/// First link whose text or href mentions an about-page keyword, resolved
/// against `base_url`.
pub fn find_about_page_url(html: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    extract_links(html).into_iter().find_map(|link| {
        let text = link.text.to_lowercase();
        let href = link.href.to_lowercase();
        let matched = ABOUT_KEYWORDS
            .iter()
            .any(|keyword| text.contains(keyword) || href.contains(keyword));
        if !matched {
            return None;
        }
        base.join(link.href.trim()).ok().map(|url| url.to_string())
    })
}

/// Inner HTML of the first element matching a simple selector
/// (`tag`, `.class` or `#id`).
pub fn select_first(html: &str, selector: &str) -> Option<String> {
    let start = match selector.chars().next()? {
        '.' => {
            let class = regex::escape(&selector[1..]);
            cached_regex(format!(
                r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["'][^>]*>"#,
                class
            ))?
        }
        '#' => {
            let id = regex::escape(&selector[1..]);
            cached_regex(format!(
                r#"(?is)<([a-z][a-z0-9]*)\b[^>]*\bid\s*=\s*["']{}["'][^>]*>"#,
                id
            ))?
        }
        _ => cached_regex(format!(r"(?is)<({})\b[^>]*>", regex::escape(selector)))?,
    };

    let caps = start.captures(html)?;
    let whole = caps.get(0)?;
    let tag = caps.get(1)?.as_str().to_lowercase();
    let body_start = whole.end();
    let body_end = matching_close(html, &tag, body_start).unwrap_or(html.len());
    Some(html[body_start..body_end].to_string())
}

// 從 start 往後找與之配對的結束標籤
fn matching_close(html: &str, tag: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for caps in open_or_close_re(tag)?.captures_iter(&html[start..]) {
        let m = caps.get(0)?;
        let closing = caps.get(1).is_some_and(|c| !c.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some(start + m.start());
            }
        } else if !m.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    None
}

/// Remove whole elements (with content) of the given tag names.
pub fn strip_elements(html: &str, tags: &[&str]) -> String {
    let mut out = html.to_string();
    for tag in tags {
        let Some(start) = start_tag_re(tag) else {
            continue;
        };
        while let Some((from, body_start)) = start.find(&out).map(|m| (m.start(), m.end())) {
            let end = match matching_close(&out, tag, body_start) {
                Some(close_start) => {
                    let close_len = out[close_start..].find('>').map(|i| i + 1).unwrap_or(0);
                    close_start + close_len
                }
                None => out.len(),
            };
            out.replace_range(from..end, " ");
        }
    }
    out
}

/// Tags removed, entities decoded, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let without_comments = comment_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_comments, " ");
    collapse_whitespace(&decode_entities(&without_tags))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&rsquo;", "'")
        .replace("&amp;", "&")
}

/// Main readable copy of a page: the first content container, otherwise all
/// paragraph text.
pub fn extract_about_content(html: &str) -> String {
    for selector in CONTENT_SELECTORS {
        if let Some(inner) = select_first(html, selector) {
            let cleaned = strip_elements(&inner, &["script", "style", "nav"]);
            return html_to_text(&cleaned);
        }
    }

    // 找不到容器時退回段落文字
    let mut paragraphs = Vec::new();
    let mut rest = html;
    let Some(p_start) = start_tag_re("p") else {
        return String::new();
    };
    while let Some(m) = p_start.find(rest) {
        let end = matching_close(rest, "p", m.end()).unwrap_or(rest.len());
        let text = html_to_text(&rest[m.end()..end]);
        if !text.is_empty() {
            paragraphs.push(text);
        }
        rest = &rest[end.max(m.end())..];
    }
    paragraphs.join(" ")
}
