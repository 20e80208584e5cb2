//! Sources of saved posts.
//!
//! The aggregation-site client lives outside this crate; it plugs in by
//! implementing [`PostSource`]. [`JsonFileSource`] works from an exported
//! list of posts instead.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::models::Post;

/// Errors from a post source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies saved posts and marks them handled once downloaded.
///
/// `mark_handled` has side effects on the originating service, which rate
/// limits it; callers space calls out (see `UnsaveConfig`).
#[async_trait]
pub trait PostSource: Send {
    /// Identifier for logging.
    fn name(&self) -> &str;

    /// All currently saved posts, in the order they should be processed.
    async fn saved_posts(&mut self) -> Result<Vec<Post>, SourceError>;

    /// Remove a post from the saved list.
    async fn mark_handled(&mut self, post: &Post) -> Result<(), SourceError>;
}

/// Posts read from a JSON array on disk. Marking a post handled removes it
/// from the file.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<Post>, SourceError> {
        let contents = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl PostSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn saved_posts(&mut self) -> Result<Vec<Post>, SourceError> {
        let posts = self.read().await?;
        info!("Read {} posts from {}", posts.len(), self.path.display());
        Ok(posts)
    }

    async fn mark_handled(&mut self, post: &Post) -> Result<(), SourceError> {
        let mut posts = self.read().await?;
        let before = posts.len();
        posts.retain(|p| p.id != post.id);
        if posts.len() == before {
            return Err(SourceError::NotFound(post.id.clone()));
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&posts)?).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("Removed {} from {}", post.id, self.path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::test_post;
    use tempfile::TempDir;

    fn write_posts(dir: &TempDir, posts: &[Post]) -> PathBuf {
        let path = dir.path().join("saved.json");
        std::fs::write(&path, serde_json::to_string(posts).unwrap()).unwrap();
        path
    }

    fn posts() -> Vec<Post> {
        let mut a = test_post("One", "pics", "https://i.example.com/1.jpg", "i.example.com");
        a.id = "a".to_string();
        let mut b = test_post("Two", "pics", "https://i.example.com/2.jpg", "i.example.com");
        b.id = "b".to_string();
        vec![a, b]
    }

    #[tokio::test]
    async fn test_json_source_reads_posts() {
        let dir = TempDir::new().unwrap();
        let mut source = JsonFileSource::new(write_posts(&dir, &posts()));

        let read = source.saved_posts().await.unwrap();

        assert_eq!(read, posts());
    }

    #[tokio::test]
    async fn test_json_source_mark_handled_removes_post() {
        let dir = TempDir::new().unwrap();
        let all = posts();
        let mut source = JsonFileSource::new(write_posts(&dir, &all));

        source.mark_handled(&all[0]).await.unwrap();

        let remaining = source.saved_posts().await.unwrap();
        assert_eq!(remaining, vec![all[1].clone()]);
        assert!(!dir.path().join("saved.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_source_mark_unknown_post() {
        let dir = TempDir::new().unwrap();
        let all = posts();
        let mut source = JsonFileSource::new(write_posts(&dir, &all[..1]));

        let result = source.mark_handled(&all[1]).await;

        assert!(matches!(result, Err(SourceError::NotFound(id)) if id == "b"));
    }

    #[tokio::test]
    async fn test_json_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut source = JsonFileSource::new(dir.path().join("nope.json"));

        assert!(matches!(source.saved_posts().await, Err(SourceError::Io(_))));
    }
}
