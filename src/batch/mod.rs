//! The batch runner: one sequential pass over the saved posts.
//!
//! Each post becomes a [`SavedItem`], is routed by the [`Dispatcher`] and
//! downloaded by its strategy. Failures stay on their item. After the pass,
//! saved posts can be marked handled on the source, paced to respect the
//! source's rate limit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::fetch::Fetch;
use crate::models::{Post, SavedItem, StatusCode};
use crate::naming::FileNamer;
use crate::source::{PostSource, SourceError};
use crate::strategy::{Dispatcher, Strategy};

/// Errors that abort a whole batch before any post is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Save directory '{0}' does not exist")]
    MissingSaveDir(PathBuf),

    #[error("Failed to list saved posts: {0}")]
    Source(#[from] SourceError),
}

/// Outcome of a batch.
#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<SavedItem>,

    /// Items a strategy ran on
    pub processed: usize,

    /// Items marked handled on the source
    pub unsaved: usize,
}

impl BatchReport {
    pub fn new(items: Vec<SavedItem>, unsaved: usize) -> Self {
        let processed = items
            .iter()
            .filter(|i| i.status() != StatusCode::NotDone)
            .count();
        Self {
            items,
            processed,
            unsaved,
        }
    }

    pub fn saved_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_saved()).count()
    }

    /// Every item that was not saved.
    pub fn failures(&self) -> impl Iterator<Item = &SavedItem> {
        self.items.iter().filter(|i| !i.is_saved())
    }

    /// One line per failure: `status: message - title`.
    pub fn summary_lines(&self) -> Vec<String> {
        self.failures()
            .map(|i| {
                format!(
                    "{}: {} - {}",
                    i.status(),
                    i.error_message().unwrap_or(""),
                    i.post.title
                )
            })
            .collect()
    }
}

/// What a batch would do with a post.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub post: Post,
    pub base_name: String,
    pub strategy: Option<Strategy>,
}

/// Runs batches with a fixed namer, dispatcher and fetcher.
pub struct BatchRunner {
    namer: FileNamer,
    dispatcher: Dispatcher,
    fetch: Arc<dyn Fetch>,
    unsave: bool,
    unsave_pause: Duration,
}

impl BatchRunner {
    pub fn new(config: &AppConfig, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            namer: FileNamer::new(&config.naming),
            dispatcher: Dispatcher::with_defaults(config.experimental),
            fetch,
            unsave: config.unsave.enabled,
            unsave_pause: config.unsave.pause(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_unsave(mut self, enabled: bool, pause: Duration) -> Self {
        self.unsave = enabled;
        self.unsave_pause = pause;
        self
    }

    /// Base name and strategy per post, without downloading anything.
    pub fn plan(&self, posts: &[Post]) -> Vec<PlannedItem> {
        posts
            .iter()
            .map(|post| PlannedItem {
                post: post.clone(),
                base_name: self.namer.name_for(post),
                strategy: self.dispatcher.select_strategy(post),
            })
            .collect()
    }

    /// Download the posts in order.
    ///
    /// Posts without a strategy are recorded as `NotDone` and do not count
    /// toward `limit`. Once `limit` downloads have run, the remaining posts
    /// are left alone: no item is created for them.
    pub async fn run_batch(
        &self,
        posts: Vec<Post>,
        save_dir: &Path,
        limit: Option<usize>,
    ) -> Vec<SavedItem> {
        let limit = limit.filter(|l| *l > 0);
        let mut items = Vec::new();
        let mut count = 0usize;

        for post in posts {
            if limit.is_some_and(|l| count >= l) {
                info!("Reached limit of {} downloads", count);
                break;
            }

            let base_name = self.namer.name_for(&post);
            let mut item = SavedItem::new(post, save_dir, base_name);

            match self.dispatcher.select_strategy(&item.post) {
                Some(strategy) => {
                    strategy.download(&mut item, self.fetch.as_ref()).await;
                    count += 1;
                }
                None => {
                    let message = format!("Domain '{}' not supported", item.post.domain);
                    info!("Skipping {}: {}", item.media_url(), message);
                    item.set_notdone(message);
                }
            }

            items.push(item);
        }

        info!("{} processed.", count);
        items
    }

    /// Full run against a source: list, download, then mark saved posts
    /// handled if enabled.
    pub async fn run(
        &self,
        source: &mut dyn PostSource,
        save_dir: &Path,
        limit: Option<usize>,
    ) -> Result<BatchReport, BatchError> {
        if !save_dir.is_dir() {
            return Err(BatchError::MissingSaveDir(save_dir.to_path_buf()));
        }

        let posts = source.saved_posts().await?;
        info!("{} posts found in {}", posts.len(), source.name());

        let items = self.run_batch(posts, save_dir, limit).await;

        let unsaved = if self.unsave {
            self.mark_saved_handled(source, &items).await
        } else {
            0
        };

        Ok(BatchReport::new(items, unsaved))
    }

    async fn mark_saved_handled(&self, source: &mut dyn PostSource, items: &[SavedItem]) -> usize {
        let mut unsaved = 0;
        let mut first = true;

        for item in items.iter().filter(|i| i.is_saved()) {
            if !first {
                tokio::time::sleep(self.unsave_pause).await;
            }
            first = false;

            info!("Unsaving {}", item.post.title);
            match source.mark_handled(&item.post).await {
                Ok(()) => unsaved += 1,
                Err(e) => warn!("Failed to unsave '{}': {}", item.post.title, e),
            }
        }

        unsaved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedFetch;
    use crate::models::post::test_post;
    use crate::source::memory::MemorySource;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn image_post(id: &str, title: &str) -> Post {
        let mut post = test_post(
            title,
            "nature",
            &format!("https://i.example.com/{}.jpg", id),
            "i.example.com",
        );
        post.id = id.to_string();
        post
    }

    fn unsupported_post(id: &str) -> Post {
        let mut post = test_post("Article", "news", "https://news.example.org/story", "news.example.org");
        post.id = id.to_string();
        post
    }

    fn fetch_for(posts: &[Post]) -> ScriptedFetch {
        posts.iter().fold(ScriptedFetch::new(), |f, p| {
            f.with(&p.url, 200, format!("bytes of {}", p.id))
        })
    }

    fn runner(fetch: ScriptedFetch) -> BatchRunner {
        BatchRunner::new(&AppConfig::default(), Arc::new(fetch))
            .with_unsave(true, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_direct_post_end_to_end() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("abc", "Sunset Over Water")];
        let runner = runner(fetch_for(&posts));

        let items = runner.run_batch(posts, dir.path(), None).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].base_name, "r_nature_Sunset-Over-Water");
        assert_eq!(items[0].status(), StatusCode::Saved);
        assert_eq!(
            items[0].saved_path(),
            Some(dir.path().join("r_nature_Sunset-Over-Water.jpg").as_path())
        );
    }

    #[tokio::test]
    async fn test_limit_stops_before_creating_items() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), image_post("b", "Two"), image_post("c", "Three")];
        let fetch = fetch_for(&posts);
        let runner = runner(fetch);

        let items = runner.run_batch(posts, dir.path(), Some(1)).await;
        let report = BatchReport::new(items, 0);

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.failures().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_is_unlimited() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), image_post("b", "Two")];
        let runner = runner(fetch_for(&posts));

        let items = runner.run_batch(posts, dir.path(), Some(0)).await;

        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_posts_do_not_count_toward_limit() {
        let dir = TempDir::new().unwrap();
        let posts = vec![unsupported_post("x"), image_post("a", "One"), image_post("b", "Two")];
        let runner = runner(fetch_for(&posts));

        let items = runner.run_batch(posts, dir.path(), Some(1)).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].status(), StatusCode::NotDone);
        assert_eq!(
            items[0].error_message(),
            Some("Domain 'news.example.org' not supported")
        );
        assert_eq!(items[1].status(), StatusCode::Saved);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), image_post("b", "Two")];
        // Only the second post is reachable.
        let fetch = fetch_for(&posts[1..]);
        let runner = runner(fetch);

        let items = runner.run_batch(posts, dir.path(), None).await;

        assert_eq!(items[0].status(), StatusCode::ExceptionRaised);
        assert_eq!(items[1].status(), StatusCode::Saved);
        for item in &items {
            assert_eq!(item.saved_path().is_some(), item.is_saved());
        }
    }

    #[tokio::test]
    async fn test_run_marks_only_saved_posts() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), unsupported_post("x"), image_post("b", "Two")];
        let runner = runner(fetch_for(&posts));
        let mut source = MemorySource::new(posts);

        let report = runner.run(&mut source, dir.path(), None).await.unwrap();

        assert_eq!(source.handled, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.unsaved, 2);
        assert_eq!(report.saved_count(), 2);
        assert_eq!(report.processed, 2);
        assert_eq!(
            report.summary_lines(),
            vec!["not-done: Domain 'news.example.org' not supported - Article".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_without_unsave() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One")];
        let runner = runner(fetch_for(&posts)).with_unsave(false, Duration::ZERO);
        let mut source = MemorySource::new(posts);

        let report = runner.run(&mut source, dir.path(), None).await.unwrap();

        assert!(source.handled.is_empty());
        assert_eq!(report.unsaved, 0);
    }

    #[tokio::test]
    async fn test_failed_marks_are_skipped() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), image_post("b", "Two")];
        let runner = runner(fetch_for(&posts));
        let mut source = MemorySource::new(posts);
        source.fail_marks = true;

        let report = runner.run(&mut source, dir.path(), None).await.unwrap();

        assert_eq!(report.unsaved, 0);
        assert_eq!(report.saved_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsave_pauses_between_calls() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One"), image_post("b", "Two"), image_post("c", "Three")];
        let runner = runner(fetch_for(&posts)).with_unsave(true, Duration::from_secs(2));
        let mut source = MemorySource::new(posts);

        let started = tokio::time::Instant::now();
        runner.run(&mut source, dir.path(), None).await.unwrap();

        // Two pauses for three posts, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "{:?}", elapsed);
        assert_eq!(source.handled.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_save_dir_aborts() {
        let dir = TempDir::new().unwrap();
        let posts = vec![image_post("a", "One")];
        let runner = runner(fetch_for(&posts));
        let mut source = MemorySource::new(posts);

        let result = runner.run(&mut source, &dir.path().join("missing"), None).await;

        assert!(matches!(result, Err(BatchError::MissingSaveDir(_))));
    }

    #[test]
    fn test_plan() {
        let runner = runner(ScriptedFetch::new());
        let plan = runner.plan(&[image_post("a", "One"), unsupported_post("x")]);

        assert_eq!(plan[0].strategy, Some(Strategy::Direct));
        assert_eq!(plan[0].base_name, "r_nature_One");
        assert_eq!(plan[1].strategy, None);
    }
}
