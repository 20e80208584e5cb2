//! Imgur single links and albums.

use std::path::PathBuf;

use url::Url;

use super::{absolute_url, fetch_page, save_media, select_attrs, DownloadError};
use crate::fetch::Fetch;
use crate::models::SavedItem;
use crate::naming::{clean_name, TRAILING_CHARS};

const ALBUM_DIR: &str = "albums";
const ALBUM_NAME_LEN: usize = 50;

/// `.gifv` links are HTML pages wrapping an mp4.
pub(super) async fn download_link(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    let page_url = item.media_url();
    if !page_url.ends_with("gifv") {
        return Err(DownloadError::Parse("Unknown Imgur link type".to_string()));
    }

    let html = fetch_page(fetch, page_url).await?;
    let src = select_attrs(&html, "div.video-elements source", "src")?
        .into_iter()
        .next()
        .ok_or_else(|| DownloadError::Parse("Failed to find Imgur video link".to_string()))?;

    let media_url = absolute_url(page_url, &src);
    save_media(fetch, &media_url, &item.base_path(), None).await
}

/// Albums are read from the blog layout, one file per image, into
/// `save_dir/albums/<title>/`.
pub(super) async fn download_album(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    let album_id = album_id(item.media_url())?;
    let layout_url = format!("https://imgur.com/a/{}/layout/blog", album_id);

    let html = fetch_page(fetch, &layout_url).await?;
    let links = select_attrs(&html, "#image-container a.zoom", "href")?;
    if links.is_empty() {
        return Err(DownloadError::Parse(format!(
            "Imgur album '{}' has no images",
            album_id
        )));
    }

    let album_path = item.save_dir.join(ALBUM_DIR).join(album_dir_name(item, &album_id));
    tokio::fs::create_dir_all(&album_path).await?;

    for (counter, link) in links.iter().enumerate() {
        let url = absolute_url(&layout_url, link);
        save_media(fetch, &url, &album_path.join(counter.to_string()), None).await?;
    }

    Ok(album_path)
}

fn album_id(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url)
        .map_err(|e| DownloadError::Parse(format!("Bad Imgur album url '{}': {}", url, e)))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::Parse(format!("No Imgur album id in '{}'", url)))
}

fn album_dir_name(item: &SavedItem, album_id: &str) -> String {
    let name: String = clean_name(&item.post.title, "_")
        .chars()
        .take(ALBUM_NAME_LEN)
        .collect();
    let name = name.trim_end_matches(TRAILING_CHARS).to_string();
    if name.is_empty() {
        album_id.to_string()
    } else {
        name
    }
}
