//! Redgifs watch pages, which describe the video in JSON-LD.

use std::path::PathBuf;

use scraper::Html;
use serde_json::Value;

use super::{fetch_page, save_media, selector, DownloadError};
use crate::fetch::Fetch;
use crate::models::SavedItem;

pub(super) async fn download(item: &SavedItem, fetch: &dyn Fetch) -> Result<PathBuf, DownloadError> {
    let html = fetch_page(fetch, item.media_url()).await?;
    let content_url = content_url(&html)?;
    save_media(fetch, &content_url, &item.base_path(), None).await
}

/// `video.contentUrl` from the page's `application/ld+json` script.
fn content_url(html: &str) -> Result<String, DownloadError> {
    let document = Html::parse_document(html);
    let script_sel = selector(r#"script[type="application/ld+json"]"#)?;

    let script = document
        .select(&script_sel)
        .next()
        .ok_or_else(|| DownloadError::Parse("redgifs failed to find script element".to_string()))?;
    let text: String = script.text().collect();

    let json: Value = serde_json::from_str(&text)
        .map_err(|e| DownloadError::Parse(format!("redgifs failed to parse json: {}", e)))?;
    let video = json
        .get("video")
        .ok_or_else(|| DownloadError::Parse("redgifs json had no 'video' element".to_string()))?;
    let url = video
        .get("contentUrl")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            DownloadError::Parse("redgifs json had no 'contentUrl' element".to_string())
        })?;

    Ok(unescape_html(url))
}

/// Decode HTML character references (named, decimal and hex) in one pass.
///
/// The text is run through the HTML tokenizer as a fragment; raw `<` is
/// escaped first so it stays text.
fn unescape_html(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    Html::parse_fragment(&s.replace('<', "&lt;"))
        .root_element()
        .text()
        .collect()
}
