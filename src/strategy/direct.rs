//! Links that point straight at the media file.

use std::path::PathBuf;

use super::{save_media, DownloadError};
use crate::fetch::Fetch;
use crate::models::SavedItem;

pub(super) async fn download(item: &SavedItem, fetch: &dyn Fetch) -> Result<PathBuf, DownloadError> {
    save_media(fetch, item.media_url(), &item.base_path(), None).await
}

/// Picsarus pages serve their image at the page URL plus `.jpg`.
pub(super) async fn download_picsarus(
    item: &SavedItem,
    fetch: &dyn Fetch,
) -> Result<PathBuf, DownloadError> {
    let url = format!("{}.jpg", item.media_url());
    save_media(fetch, &url, &item.base_path(), Some("jpg")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedFetch;
    use crate::models::post::test_post;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_direct_uses_url_extension() {
        let dir = TempDir::new().unwrap();
        let post = test_post("Sunset", "nature", "https://i.example.com/x/abc.png", "i.example.com");
        let item = SavedItem::new(post, dir.path(), "r_nature_Sunset".to_string());
        let fetch = ScriptedFetch::new().with("https://i.example.com/x/abc.png", 200, b"png".to_vec());

        let path = download(&item, &fetch).await.unwrap();

        assert_eq!(path, dir.path().join("r_nature_Sunset.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_direct_never_overwrites() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("name.jpg"), b"old").unwrap();
        let post = test_post("t", "c", "https://i.example.com/abc.jpg", "i.example.com");
        let item = SavedItem::new(post, dir.path(), "name".to_string());
        let fetch = ScriptedFetch::new().with("https://i.example.com/abc.jpg", 200, b"new".to_vec());

        let path = download(&item, &fetch).await.unwrap();

        assert_eq!(path, dir.path().join("name_01.jpg"));
        assert_eq!(std::fs::read(dir.path().join("name.jpg")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_picsarus_appends_jpg() {
        let dir = TempDir::new().unwrap();
        let post = test_post("t", "c", "https://picsarus.com/abc/", "picsarus.com");
        let item = SavedItem::new(post, dir.path(), "pic".to_string());
        let fetch = ScriptedFetch::new().with("https://picsarus.com/abc.jpg", 200, b"jpg".to_vec());

        let path = download_picsarus(&item, &fetch).await.unwrap();

        assert_eq!(path, dir.path().join("pic.jpg"));
        assert_eq!(fetch.requests(), vec!["https://picsarus.com/abc.jpg".to_string()]);
    }
}
