//! File naming for saved posts.
//!
//! Turns post metadata into a base name that is safe on any filesystem:
//! ASCII only, no path separators or quoting characters, and no trailing
//! separator characters.

use chrono::Local;

use crate::config::NamingConfig;
use crate::models::Post;

/// Characters removed from every name.
pub const FORBIDDEN_CHARS: &[char] = &[
    '/', '\\', '[', ']', '"', '\'', ';', ',', '.', '@', '#', '$', '%', '^', '&', '*', '(', ')',
    '{', '}', '|', '!', '?',
];

/// Characters trimmed from the end of every name.
pub(crate) const TRAILING_CHARS: &[char] = &['_', '~', '-'];

/// Keeps names well under the 255 byte limit most filesystems impose,
/// leaving room for uniqueness suffixes and extensions.
const MAX_NAME_LEN: usize = 200;

/// Minimum title length for a title to stand in as a name.
const MIN_NAME_TITLE_LEN: usize = 2;

/// Clean a candidate name.
///
/// Spaces become `space_replacement`, non-ASCII and control characters are
/// dropped (mostly emoji in titles), [`FORBIDDEN_CHARS`] are removed and
/// trailing `_`, `~` and `-` are trimmed.
pub fn clean_name(name: &str, space_replacement: &str) -> String {
    let replaced = name.replace(' ', space_replacement);
    let cleaned: String = replaced
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    cleaned.trim_end_matches(TRAILING_CHARS).to_string()
}

/// Lowercase with spaces, hyphens and underscores removed.
fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Builds file base names from post metadata.
#[derive(Debug, Clone)]
pub struct FileNamer {
    names: Vec<String>,
    names_lower: Vec<String>,
    names_compact: Vec<String>,
    following: Vec<String>,
    title_is_name: Vec<String>,
}

impl FileNamer {
    pub fn new(config: &NamingConfig) -> Self {
        let names: Vec<String> = config
            .names
            .iter()
            .filter(|n| !compact(n).is_empty())
            .cloned()
            .collect();
        Self {
            names_lower: names.iter().map(|n| n.to_lowercase()).collect(),
            names_compact: names.iter().map(|n| compact(n)).collect(),
            names,
            following: config.following.iter().map(|f| f.to_lowercase()).collect(),
            title_is_name: config.title_is_name.clone(),
        }
    }

    /// First configured name found in the title, author or category.
    pub fn recognize_name(&self, title: &str, author: &str, category: &str) -> Option<&str> {
        let fields = [title, author, category];
        let lowered: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();
        let compacted: Vec<String> = fields.iter().map(|f| compact(f)).collect();

        self.names
            .iter()
            .zip(self.names_lower.iter().zip(&self.names_compact))
            .find(|(_, (lower, compact))| {
                lowered.iter().any(|f| f.contains(lower.as_str()))
                    || compacted.iter().any(|f| f.contains(compact.as_str()))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Base name (no directory, no extension) for a post.
    pub fn name_for(&self, post: &Post) -> String {
        let author = post.author_name();
        let category = post.category.as_str();
        let title = post.title.as_str();

        let name = if let Some(person) = self.recognize_name(title, author, category) {
            let token = person.replace(' ', "");
            clean_name(&format!("{}_r_{}_{}", token, category, title), "_")
        } else if self.title_is_name.iter().any(|c| c == category)
            && title.chars().count() > MIN_NAME_TITLE_LEN
        {
            let date = post
                .created_local()
                .unwrap_or_else(Local::now)
                .format("%Y%m%d");
            clean_name(
                &format!("{}_r_{}_{}", clean_name(title, ""), category, date),
                "_",
            )
        } else if !author.is_empty() && self.following.contains(&author.to_lowercase()) {
            if category == format!("u_{}", author) {
                // Own profile; the category only repeats the author.
                clean_name(&format!("u_{}_{}", author, title), "-")
            } else {
                clean_name(&format!("u_{}_{}_{}", author, category, title), "-")
            }
        } else {
            let author_part = if author.is_empty() {
                String::new()
            } else {
                format!("_{}", author)
            };
            clean_name(
                &format!("r_{}{}_{}", category, author_part, clean_name(title, "-")),
                "-",
            )
        };

        truncate(name)
    }
}

fn truncate(mut name: String) -> String {
    if name.len() > MAX_NAME_LEN {
        // ASCII only at this point, so any byte index is a char boundary.
        name.truncate(MAX_NAME_LEN);
        name = name.trim_end_matches(TRAILING_CHARS).to_string();
    }
    name
}
