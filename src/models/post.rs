//! Saved post model.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

/// A post saved by the user, as supplied by a post source.
///
/// This crate never mutates a post; strategies read the link through
/// [`Post::media_url`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Identifier on the originating site
    pub id: String,

    /// Post title
    pub title: String,

    /// Posting user, absent for deleted accounts
    #[serde(default)]
    pub author: Option<String>,

    /// Community the post was made in (e.g. "pics", "u_someone")
    pub category: String,

    /// Link target
    pub url: String,

    /// Domain of the link target as reported by the site
    pub domain: String,

    /// Creation time as a unix timestamp in seconds
    #[serde(default)]
    pub created: Option<f64>,
}

impl Post {
    /// Author name, or an empty string when there is none.
    pub fn author_name(&self) -> &str {
        self.author.as_deref().unwrap_or("")
    }

    /// Link target with a single trailing slash removed.
    pub fn media_url(&self) -> &str {
        self.url.strip_suffix('/').unwrap_or(self.url.as_str())
    }

    /// Local creation time, if the timestamp is present and in range.
    pub fn created_local(&self) -> Option<DateTime<Local>> {
        let created = self.created?;
        if !created.is_finite() {
            return None;
        }
        let secs = created.trunc() as i64;
        Local.timestamp_opt(secs, 0).single()
    }
}

#[cfg(test)]
pub(crate) fn test_post(title: &str, category: &str, url: &str, domain: &str) -> Post {
    Post {
        id: format!("t3_{}", title.len()),
        title: title.to_string(),
        author: None,
        category: category.to_string(),
        url: url.to_string(),
        domain: domain.to_string(),
        created: None,
    }
}
