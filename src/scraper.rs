use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use once_cell::sync::Lazy;
use chrono::Utc;
use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::models::{Headings, PageLink, ScrapeResult};
use crate::error::{AppError, Result};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_EN: &str = "en-US,en;q=0.9";

/// Elements whose text never shows up on the rendered page.
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

// Create static selectors to avoid recompiling them each time
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to parse link selector")
});
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("img[src]").expect("Failed to parse image selector")
});
static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6").expect("Failed to parse heading selector")
});
static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"]"#).expect("Failed to parse meta description selector")
});
static OG_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("Failed to parse og:description selector")
});

/// What came back from the single GET, before any parsing.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_EN));

    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Accepts absolute http(s) URLs with a host.
pub fn parse_target(raw: &str) -> Result<Url> {
    let invalid = || AppError::FetchFailed(format!("invalid URL '{}' (include http:// or https://)", raw));

    let url = Url::parse(raw).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(invalid()),
    }
}

pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?;
    let body = decode_body(&bytes, content_type.as_deref());

    debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());
    Ok(FetchedPage {
        status,
        final_url,
        content_type,
        body,
    })
}

/// Keeps valid UTF-8 (BOM included) untouched; anything else goes through the declared charset.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let encoding = content_type
                .and_then(charset_label)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
                .unwrap_or(WINDOWS_1252);
            let (text, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                warn!("Body is not valid {}; replaced malformed sequences", encoding.name());
            }
            text.into_owned()
        }
    }
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Missing `Content-Type` is treated as HTML.
pub fn is_html_content(content_type: Option<&str>) -> bool {
    content_type.is_none_or(|ct| {
        let mime = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        mime == "text/html" || mime == "application/xhtml+xml"
    })
}

/// One scrape action: validate, fetch once, analyze.
pub async fn scrape(client: &Client, raw_url: &str, preview_chars: usize) -> Result<ScrapeResult> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() {
        return Err(AppError::MissingUrl);
    }

    let target = parse_target(raw_url)?;
    info!("Fetching {}", target);
    let page = fetch_page(client, &target).await?;
    Ok(analyze_page(raw_url, page, preview_chars))
}

pub fn analyze_page(url: &str, page: FetchedPage, preview_chars: usize) -> ScrapeResult {
    let document = Html::parse_document(&page.body);

    let links = collect_links(&document, &page.final_url);
    let images = collect_images(&document, &page.final_url);
    let visible = visible_text(&document);

    ScrapeResult {
        url: url.to_string(),
        final_url: page.final_url.to_string(),
        status_code: page.status,
        is_html: is_html_content(page.content_type.as_deref()),
        content_type: page.content_type,
        title: extract_title(&document),
        meta_description: extract_meta_description(&document),
        link_count: links.len(),
        links,
        image_count: images.len(),
        images,
        headings: extract_headings(&document),
        text_preview: truncate_chars(&visible, preview_chars),
        text_length: visible.chars().count(),
        raw_html: page.body,
        scraped_at: Utc::now(),
    }
}

pub fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|title| clean_text(&title.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

pub fn extract_meta_description(document: &Html) -> Option<String> {
    document
        .select(&META_DESCRIPTION_SELECTOR)
        .next()
        .or_else(|| document.select(&OG_DESCRIPTION_SELECTOR).next())
        .and_then(|meta| meta.value().attr("content"))
        .map(clean_text)
        .filter(|content| !content.is_empty())
}

pub fn extract_headings(document: &Html) -> Headings {
    let mut headings = Headings::default();
    for heading in document.select(&HEADING_SELECTOR) {
        let text = element_text(heading);
        if text.is_empty() {
            continue;
        }
        let level = heading.value().name()[1..].parse::<u8>().unwrap_or(0);
        if let Some(bucket) = headings.level_mut(level) {
            bucket.push(text);
        }
    }
    headings
}

pub fn collect_links(document: &Html, base: &Url) -> Vec<PageLink> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let resolved = base.join(href.trim()).ok();
            let is_internal = resolved
                .as_ref()
                .and_then(|u| u.host_str())
                .is_some_and(|host| Some(host) == base.host_str());

            Some(PageLink {
                url: resolved.map(String::from).unwrap_or_else(|| href.to_string()),
                text: element_text(anchor),
                is_internal,
            })
        })
        .collect()
}

pub fn collect_images(document: &Html, base: &Url) -> Vec<String> {
    document
        .select(&IMAGE_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| base.join(src).map(String::from).unwrap_or_else(|_| src.to_string()))
        .collect()
}

/// Text a reader would see: body text minus scripts and styles, whitespace collapsed.
pub fn visible_text(document: &Html) -> String {
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            status: 200,
            final_url: Url::parse("https://example.com/blog/").unwrap(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn title_is_trimmed_and_collapsed() {
        let html = doc("<html><head><title>\n  Hello\n   World </title></head></html>");
        assert_eq!(extract_title(&html), Some("Hello World".to_string()));
    }

    #[test]
    fn missing_or_blank_title_is_none() {
        assert_eq!(extract_title(&doc("<html><body><p>hi</p></body></html>")), None);
        assert_eq!(extract_title(&doc("<title>   </title>")), None);
    }

    #[test]
    fn counts_only_anchors_with_href() {
        let html = doc(r#"<body><a href="/a">A</a><a name="top">anchor</a><a href="https://other.org/x">X</a></body>"#);
        let base = Url::parse("https://example.com/").unwrap();
        let links = collect_links(&html, &base);

        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0],
            PageLink {
                url: "https://example.com/a".to_string(),
                text: "A".to_string(),
                is_internal: true,
            }
        );
        assert!(!links[1].is_internal);
    }

    #[test]
    fn relative_links_resolve_against_page_url() {
        let html = doc(r#"<a href="post-1.html">first</a><a href="mailto:me@example.com">mail</a>"#);
        let base = Url::parse("https://example.com/blog/").unwrap();
        let links = collect_links(&html, &base);

        assert_eq!(links[0].url, "https://example.com/blog/post-1.html");
        assert_eq!(links[1].url, "mailto:me@example.com");
        assert!(!links[1].is_internal);
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let html = doc(
            "<html><head><title>T</title><style>p{color:red}</style></head>\
             <body><p>Hello   there</p><script>var x = 1;</script><noscript>enable js</noscript><div>world</div></body></html>",
        );
        assert_eq!(visible_text(&html), "Hello there world");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly", 7), "exactly");
    }

    #[test]
    fn meta_description_falls_back_to_open_graph() {
        let named = doc(r#"<head><meta name="description" content=" A  page "></head>"#);
        assert_eq!(extract_meta_description(&named), Some("A page".to_string()));

        let og = doc(r#"<head><meta property="og:description" content="OG text"></head>"#);
        assert_eq!(extract_meta_description(&og), Some("OG text".to_string()));

        assert_eq!(extract_meta_description(&doc("<p>none</p>")), None);
    }

    #[test]
    fn headings_are_grouped_by_level() {
        let html = doc("<h1>Main</h1><h2>Sub A</h2><h3></h3><h2> Sub\n B </h2><h6>Tiny</h6>");
        let headings = extract_headings(&html);

        assert_eq!(headings.h1, vec!["Main"]);
        assert_eq!(headings.h2, vec!["Sub A", "Sub B"]);
        assert!(headings.h3.is_empty());
        assert_eq!(headings.h6, vec!["Tiny"]);
    }

    #[test]
    fn analyze_page_keeps_raw_body_verbatim() {
        let body = "<html><head><title>Example</title></head>\n<body><a href=/one>1</a> <a href=/two>2</a><img src=x.png><p>Text</p></body></html>";
        let result = analyze_page("https://example.com/blog/", page(body), 500);

        assert_eq!(result.raw_html, body);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.title.as_deref(), Some("Example"));
        assert_eq!(result.link_count, 2);
        assert_eq!(result.link_count, result.links.len());
        assert_eq!(result.image_count, 1);
        assert_eq!(result.images, vec!["https://example.com/blog/x.png"]);
        assert!(result.is_html);
        assert_eq!(result.text_preview, "1 2 Text");
        assert_eq!(result.text_length, 8);
    }

    #[test]
    fn analyze_page_tolerates_broken_markup() {
        let result = analyze_page("https://example.com/", page("<title>Oops</title><body><a href='/x'>x<div><p>unclosed"), 3);

        assert_eq!(result.title.as_deref(), Some("Oops"));
        assert_eq!(result.link_count, 1);
        assert_eq!(result.text_preview, "x u...");
    }

    #[test]
    fn image_sources_resolve_against_page_url() {
        let html = doc(r#"<body><img src="logo.png"><img src="/static/a.jpg"><img alt="no source"><img src=" "><img src="https://cdn.example.net/b.gif"></body>"#);
        let base = Url::parse("https://example.com/blog/").unwrap();

        assert_eq!(
            collect_images(&html, &base),
            vec![
                "https://example.com/blog/logo.png",
                "https://example.com/static/a.jpg",
                "https://cdn.example.net/b.gif",
            ]
        );
    }

    #[test]
    fn utf8_body_keeps_its_bom() {
        let bytes = b"\xEF\xBB\xBF<html><title>BOM</title></html>";
        let body = decode_body(bytes, Some("text/html; charset=utf-8"));
        assert_eq!(body.as_bytes(), &bytes[..]);
    }

    #[test]
    fn non_utf8_body_uses_declared_charset() {
        let body = decode_body(b"<p>caf\xE9</p>", Some("text/html; charset=\"ISO-8859-1\""));
        assert_eq!(body, "<p>café</p>");

        let guessed = decode_body(b"<p>caf\xE9</p>", None);
        assert_eq!(guessed, "<p>café</p>");
    }

    #[test]
    fn html_content_types() {
        assert!(is_html_content(None));
        assert!(is_html_content(Some("text/html")));
        assert!(is_html_content(Some("Text/HTML; charset=UTF-8")));
        assert!(is_html_content(Some("application/xhtml+xml")));
        assert!(!is_html_content(Some("application/json")));
        assert!(!is_html_content(Some("text/plain; charset=utf-8")));
    }

    #[test]
    fn parse_target_requires_http_scheme_and_host() {
        assert!(parse_target("https://example.com/path?q=1").is_ok());
        assert!(parse_target("http://127.0.0.1:8080/").is_ok());

        for bad in ["example.com", "ftp://example.com/file", "not a url", "file:///etc/passwd"] {
            let err = parse_target(bad).unwrap_err();
            assert!(matches!(err, AppError::FetchFailed(_)), "{} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn empty_input_never_reaches_the_network() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let err = scrape(&client, "   ", 100).await.unwrap_err();
        assert!(matches!(err, AppError::MissingUrl));
    }
}
