//! Gfycat video pages.
//!
//! The page embeds a `<video id="video-{name}">` whose mp4 `<source>`s are
//! the files we want; thumbnail renditions are skipped.

use std::ffi::OsString;
use std::path::PathBuf;

use scraper::Html;
use url::Url;

use super::{absolute_url, fetch_page, save_media, selector, DownloadError};
use crate::fetch::Fetch;
use crate::models::SavedItem;

pub(super) async fn download(item: &SavedItem, fetch: &dyn Fetch) -> Result<PathBuf, DownloadError> {
    let page_url = item.media_url();
    let tag = video_tag(page_url)?;
    let html = fetch_page(fetch, page_url).await?;
    let sources = video_sources(&html, &tag)?;

    let mut saved = None;
    for (n, src) in sources.iter().enumerate() {
        let mut base = OsString::from(item.base_path().as_os_str());
        base.push(format!("_{}", n + 1));
        let url = absolute_url(page_url, src);
        saved = Some(save_media(fetch, &url, PathBuf::from(base).as_path(), None).await?);
    }

    saved.ok_or_else(|| DownloadError::Parse(format!("gfycat.com: no mp4 sources in '{}'", tag)))
}

/// `video-` plus the lowercased name from the last path segment, with any
/// `-suffix` dropped: `/BigFluffyCat-size_restricted` -> `video-bigfluffycat`.
fn video_tag(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url)
        .map_err(|e| DownloadError::Parse(format!("gfycat.com: bad url '{}': {}", url, e)))?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .and_then(|last| last.split('-').next())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DownloadError::Parse(format!("gfycat.com: no video name in '{}'", url)))?;
    Ok(format!("video-{}", name.to_lowercase()))
}

fn video_sources(html: &str, tag: &str) -> Result<Vec<String>, DownloadError> {
    let document = Html::parse_document(html);
    let video_sel = selector("video")?;
    let source_sel = selector(r#"source[type="video/mp4"]"#)?;

    let videos: Vec<_> = document
        .select(&video_sel)
        .filter(|v| v.value().id() == Some(tag))
        .collect();

    match videos.as_slice() {
        [] => Err(DownloadError::Parse(format!(
            "gfycat.com: failed to find 'video' node with tag '{}'",
            tag
        ))),
        [video] => Ok(video
            .select(&source_sel)
            .filter_map(|s| s.value().attr("src"))
            .filter(|src| !src.contains("thumbs"))
            .map(str::to_string)
            .collect()),
        many => Err(DownloadError::Parse(format!(
            "gfycat.com: found {} 'video' nodes with tag '{}'",
            many.len(),
            tag
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedFetch;
    use crate::models::post::test_post;
    use crate::models::StatusCode;
    use crate::strategy::Strategy;
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><body>
        <video id="video-bigfluffycat">
            <source src="https://thumbs.gfycat.com/BigFluffyCat-mobile.mp4" type="video/mp4">
            <source src="https://giant.gfycat.com/BigFluffyCat.mp4" type="video/mp4">
            <source src="https://giant.gfycat.com/BigFluffyCat.webm" type="video/webm">
        </video>
    </body></html>"#;

    fn item(dir: &TempDir, url: &str) -> SavedItem {
        let post = test_post("Big cat", "cats", url, "gfycat.com");
        SavedItem::new(post, dir.path(), "r_cats_Big-cat".to_string())
    }

    #[test]
    fn test_video_tag() {
        assert_eq!(
            video_tag("https://gfycat.com/BigFluffyCat-size_restricted").unwrap(),
            "video-bigfluffycat"
        );
        assert_eq!(
            video_tag("https://gfycat.com/gifs/detail/BigFluffyCat/").unwrap(),
            "video-bigfluffycat"
        );
        assert!(video_tag("https://gfycat.com/").is_err());
    }

    #[test]
    fn test_video_sources_skip_thumbs_and_other_types() {
        let sources = video_sources(PAGE, "video-bigfluffycat").unwrap();
        assert_eq!(sources, vec!["https://giant.gfycat.com/BigFluffyCat.mp4".to_string()]);
    }

    #[test]
    fn test_duplicate_video_nodes() {
        let html = r#"<video id="video-a"></video><video id="video-a"></video>"#;
        let err = video_sources(html, "video-a").unwrap_err();
        assert_eq!(err.to_string(), "gfycat.com: found 2 'video' nodes with tag 'video-a'");
    }

    #[tokio::test]
    async fn test_download_saves_numbered_file() {
        let dir = TempDir::new().unwrap();
        let item = item(&dir, "https://gfycat.com/BigFluffyCat");
        let fetch = ScriptedFetch::new()
            .with("https://gfycat.com/BigFluffyCat", 200, PAGE)
            .with("https://giant.gfycat.com/BigFluffyCat.mp4", 200, b"mp4".to_vec());

        let path = download(&item, &fetch).await.unwrap();

        assert_eq!(path, dir.path().join("r_cats_Big-cat_1.mp4"));
    }

    #[tokio::test]
    async fn test_missing_video_element_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut item = item(&dir, "https://gfycat.com/BigFluffyCat");
        let fetch = ScriptedFetch::new().with(
            "https://gfycat.com/BigFluffyCat",
            200,
            "<html><body><p>gone</p></body></html>",
        );

        Strategy::Gfycat.download(&mut item, &fetch).await;

        assert_eq!(item.status(), StatusCode::ErrorReported);
        assert_eq!(
            item.error_message(),
            Some("gfycat.com: failed to find 'video' node with tag 'video-bigfluffycat'")
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(fetch.requests().len(), 1);
    }
}
