//! Image hosts where the media URL is an `<img>` on the linked page.

use std::path::PathBuf;

use super::{absolute_url, fetch_page, save_media, select_attrs, DownloadError};
use crate::fetch::Fetch;
use crate::models::SavedItem;

const TUMBLR_MEDIA: &str = "media.tumblr.com/tumblr_";

/// Every tumblr-hosted image on the post page; files share the base name
/// and take numbered suffixes.
pub(super) async fn download_tumblr(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    let page_url = item.media_url();
    let html = fetch_page(fetch, page_url).await?;
    let images: Vec<String> = select_attrs(&html, "img", "src")?
        .into_iter()
        .filter(|src| src.contains(TUMBLR_MEDIA))
        .collect();

    let mut saved = None;
    for src in &images {
        let url = absolute_url(page_url, src);
        saved = Some(save_media(fetch, &url, &item.base_path(), None).await?);
    }
    saved.ok_or_else(|| DownloadError::Parse("tumblr: no media images found".to_string()))
}

pub(super) async fn download_flickr(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    download_first_image(item, fetch, "div.photo-div img", "flickr").await
}

pub(super) async fn download_picasaurus(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    download_first_image(item, fetch, "img.photoQcontent", "picasaurus").await
}

async fn download_first_image(
    item: &SavedItem,
    fetch: &dyn Fetch,
    css: &str,
    host: &str,
) -> Result<PathBuf, DownloadError> {
    let page_url = item.media_url();
    let html = fetch_page(fetch, page_url).await?;
    let src = select_attrs(&html, css, "src")?
        .into_iter()
        .next()
        .ok_or_else(|| DownloadError::Parse(format!("{}: failed to find '{}'", host, css)))?;

    let url = absolute_url(page_url, &src);
    save_media(fetch, &url, &item.base_path(), None).await
}
