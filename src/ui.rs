//! The single page served at `/`. It posts to `/api/scrape` and renders the result.

pub const INDEX_HTML: &str = include_str!("../assets/index.html");
