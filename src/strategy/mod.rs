//! Download strategy selection and the per-host strategies.
//!
//! A post is routed to a [`Strategy`] by the [`Dispatcher`]: direct media
//! links first, then an ordered table of [`HostRule`]s matched against the
//! post's domain. Every strategy finishes by setting exactly one terminal
//! status on its [`SavedItem`]; failures never propagate to the caller.

mod direct;
mod gfycat;
mod imgur;
mod pages;
mod redgifs;

use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::fetch::{unique_path, url_extension, Fetch, FetchError, SaveOutcome};
use crate::models::{Post, SavedItem};

/// Errors raised inside a strategy. Converted to a status, never returned.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request to {url} returned code {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{0}")]
    Parse(String),

    #[error("File was zero size - not downloaded: {0}")]
    EmptyFile(PathBuf),
}

impl DownloadError {
    /// Transport and filesystem failures, as opposed to problems the
    /// strategy detected in what the host sent back.
    pub fn is_exception(&self) -> bool {
        matches!(self, DownloadError::Fetch(_) | DownloadError::Io(_))
    }
}

/// Image formats saved straight from the link.
pub const IMAGE_FORMATS: &[&str] = &[
    "bmp", "dib", "eps", "ps", "gif", "im", "jpg", "jpe", "jpeg", "pcd", "pcx", "png", "pbm",
    "pgm", "ppm", "psd", "tif", "tiff", "xbm", "xpm", "rgb", "rast", "svg", "webp",
];

/// Video formats saved straight from the link.
pub const VIDEO_FORMATS: &[&str] = &["mp4", "webm", "mov"];

/// Whether the URL path ends in a known image or video extension.
pub fn is_media_link(url: &str) -> bool {
    let Some(ext) = url_extension(url) else {
        return false;
    };
    let ext = ext.trim_start_matches('.').to_lowercase();
    IMAGE_FORMATS.contains(&ext.as_str()) || VIDEO_FORMATS.contains(&ext.as_str())
}

/// How media is retrieved for a class of links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The link is the media file
    Direct,
    Gfycat,
    ImgurAlbum,
    ImgurLink,
    Redgifs,
    Tumblr,
    Flickr,
    /// Image pages whose media lives at the same URL plus `.jpg`
    Picsarus,
    Picasaurus,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Gfycat => "gfycat",
            Strategy::ImgurAlbum => "imgur-album",
            Strategy::ImgurLink => "imgur-link",
            Strategy::Redgifs => "redgifs",
            Strategy::Tumblr => "tumblr",
            Strategy::Flickr => "flickr",
            Strategy::Picsarus => "picsarus",
            Strategy::Picasaurus => "picasaurus",
        }
    }

    /// Download the item's media and record the outcome on it.
    pub async fn download(self, item: &mut SavedItem, fetch: &dyn Fetch) {
        info!(
            "Downloading {} - {} ({}) via {}",
            item.post.category,
            item.post.title,
            item.media_url(),
            self
        );

        match self.fetch_media(item, fetch).await {
            Ok(path) => {
                info!("Saved to {}", path.display());
                item.set_saved(path);
            }
            Err(e) if e.is_exception() => {
                warn!("{} failed for {}: {}", self, item.media_url(), e);
                item.set_exception(e.to_string());
            }
            Err(e) => {
                warn!("{} reported an error for {}: {}", self, item.media_url(), e);
                item.set_error(e.to_string());
            }
        }
    }

    async fn fetch_media(
        self,
        item: &SavedItem,
        fetch: &dyn Fetch,
    ) -> Result<PathBuf, DownloadError> {
        match self {
            Strategy::Direct => direct::download(item, fetch).await,
            Strategy::Picsarus => direct::download_picsarus(item, fetch).await,
            Strategy::Gfycat => gfycat::download(item, fetch).await,
            Strategy::ImgurLink => imgur::download_link(item, fetch).await,
            Strategy::ImgurAlbum => imgur::download_album(item, fetch).await,
            Strategy::Redgifs => redgifs::download(item, fetch).await,
            Strategy::Tumblr => pages::download_tumblr(item, fetch).await,
            Strategy::Flickr => pages::download_flickr(item, fetch).await,
            Strategy::Picasaurus => pages::download_picasaurus(item, fetch).await,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One row of the host table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRule {
    /// Substring of the post domain
    pub domain: Cow<'static, str>,

    /// Substring the URL must also contain
    pub url_contains: Option<Cow<'static, str>>,

    /// Only considered when experimental hosts are enabled
    pub experimental: bool,

    pub strategy: Strategy,
}

impl HostRule {
    /// Rule for a domain substring; the needle is lowercased to match
    /// the lowercased post domain.
    pub fn new(domain: impl Into<Cow<'static, str>>, strategy: Strategy) -> Self {
        let domain = domain.into();
        let domain = if domain.chars().any(char::is_uppercase) {
            Cow::Owned(domain.to_lowercase())
        } else {
            domain
        };
        Self {
            domain,
            url_contains: None,
            experimental: false,
            strategy,
        }
    }

    pub fn when_url_contains(mut self, needle: impl Into<Cow<'static, str>>) -> Self {
        self.url_contains = Some(needle.into());
        self
    }

    pub fn experimental(mut self) -> Self {
        self.experimental = true;
        self
    }

    fn matches(&self, domain: &str, url: &str, experimental: bool) -> bool {
        if self.experimental && !experimental {
            return false;
        }
        if !domain.contains(self.domain.as_ref()) {
            return false;
        }
        match &self.url_contains {
            Some(needle) => url.contains(needle.as_ref()),
            None => true,
        }
    }
}

const fn rule(
    domain: &'static str,
    url_contains: Option<&'static str>,
    experimental: bool,
    strategy: Strategy,
) -> HostRule {
    HostRule {
        domain: Cow::Borrowed(domain),
        url_contains: match url_contains {
            Some(needle) => Some(Cow::Borrowed(needle)),
            None => None,
        },
        experimental,
        strategy,
    }
}

/// Known hosts in match order. Imgur albums must precede plain imgur links.
pub const DEFAULT_HOST_RULES: &[HostRule] = &[
    rule("gfycat", None, false, Strategy::Gfycat),
    rule("imgur", Some("/a/"), false, Strategy::ImgurAlbum),
    rule("imgur", None, false, Strategy::ImgurLink),
    rule("redgifs", None, true, Strategy::Redgifs),
    rule("tumblr", None, true, Strategy::Tumblr),
    rule("flickr", None, true, Strategy::Flickr),
    rule("picsarus", None, true, Strategy::Picsarus),
    rule("picasaurus", None, true, Strategy::Picasaurus),
];

/// Picks a strategy per post from a fixed, ordered rule table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    rules: Vec<HostRule>,
    experimental: bool,
}

impl Dispatcher {
    pub fn new(rules: Vec<HostRule>, experimental: bool) -> Self {
        Self {
            rules,
            experimental,
        }
    }

    pub fn with_defaults(experimental: bool) -> Self {
        Self::new(DEFAULT_HOST_RULES.to_vec(), experimental)
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: HostRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[HostRule] {
        &self.rules
    }

    /// Strategy for a post, or `None` when no rule applies.
    pub fn select_strategy(&self, post: &Post) -> Option<Strategy> {
        let url = post.media_url();
        if is_media_link(url) {
            return Some(Strategy::Direct);
        }

        let domain = post.domain.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches(&domain, url, self.experimental))
            .map(|r| r.strategy)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_defaults(false)
    }
}

/// Fetch an HTML page, treating any non-200 status as an error.
async fn fetch_page(fetch: &dyn Fetch, url: &str) -> Result<String, DownloadError> {
    let response = fetch.get(url).await?;
    if !response.is_ok() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(response.text())
}

/// Save `url` to `base_path` plus an extension, picking a free file name.
///
/// The extension is taken from the URL path unless one is given. Empty
/// downloads are deleted and reported.
async fn save_media(
    fetch: &dyn Fetch,
    url: &str,
    base_path: &Path,
    extension: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    let extension = match extension {
        Some(ext) if ext.starts_with('.') => ext.to_string(),
        Some(ext) => format!(".{}", ext),
        None => url_extension(url).unwrap_or_default(),
    };
    let mut target = OsString::from(base_path.as_os_str());
    target.push(&extension);
    let path = unique_path(Path::new(&target));

    match fetch.save_to(url, &path).await? {
        SaveOutcome::Written { bytes: 0 } => {
            tokio::fs::remove_file(&path).await?;
            Err(DownloadError::EmptyFile(path))
        }
        SaveOutcome::Written { .. } => Ok(path),
        SaveOutcome::Status(status) => Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status,
        }),
    }
}

fn selector(css: &str) -> Result<Selector, DownloadError> {
    Selector::parse(css).map_err(|e| DownloadError::Parse(format!("bad selector '{}': {:?}", css, e)))
}

/// Values of `attr` on every element matching `css`, in document order.
fn select_attrs(html: &str, css: &str, attr: &str) -> Result<Vec<String>, DownloadError> {
    let document = Html::parse_document(html);
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::to_string)
        .collect())
}

/// Resolve an `src`/`href` found on `page_url`, including `//host/...` links.
fn absolute_url(page_url: &str, link: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| {
            if let Some(rest) = link.strip_prefix("//") {
                format!("https://{}", rest)
            } else {
                link.to_string()
            }
        })
}
