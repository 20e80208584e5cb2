//! Bulk download from link lists.
//!
//! Two input formats:
//! - a plain list, one URL per line, saved as `{base}_{i:04}.mp4`
//! - a CSV with `person,description,ext,url` columns, saved as
//!   `{person}_{description}.{ext}` with short codes expanded from config

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::config::LinksConfig;
use crate::fetch::{Fetch, SaveOutcome};
use crate::naming::clean_name;

/// Errors that stop a link list run.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("{count} links starting at {start} overflow the file number")]
    Numbering { start: u32, count: usize },
}

/// Files written and links that failed.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

/// Extension used for plain link lists.
const LIST_EXTENSION: &str = "mp4";

/// Extension code used when a CSV row leaves `ext` blank.
const DEFAULT_EXT_CODE: &str = "j";

const CSV_COLUMNS: [&str; 4] = ["person", "description", "ext", "url"];

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub person: String,
    pub description: String,
    pub ext: String,
    pub url: String,
}

impl LinkRow {
    /// Target file name with person and extension codes expanded.
    pub fn file_name(&self, links: &LinksConfig) -> String {
        let person = links.names.get(&self.person).unwrap_or(&self.person);
        let code = if self.ext.is_empty() {
            DEFAULT_EXT_CODE
        } else {
            self.ext.as_str()
        };
        let ext = links
            .extensions
            .get(code)
            .map(String::as_str)
            .unwrap_or(code);
        format!(
            "{}_{}.{}",
            clean_name(person, "_"),
            clean_name(&self.description, "_"),
            clean_name(ext, "_")
        )
    }
}

/// Download every URL in a plain list file.
pub async fn download_list(
    fetch: &dyn Fetch,
    list_file: &Path,
    base: &str,
    start: u32,
    target_dir: &Path,
) -> Result<LinkReport, LinkError> {
    let contents = fs::read_to_string(list_file).await?;
    let urls: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let last = u32::try_from(urls.len().saturating_sub(1))
        .ok()
        .and_then(|n| start.checked_add(n))
        .ok_or(LinkError::Numbering {
            start,
            count: urls.len(),
        })?;

    let mut report = LinkReport::default();
    for (i, url) in (start..=last).zip(urls) {
        let name = format!("{}_{:04}.{}", base, i, LIST_EXTENSION);
        save_link(fetch, url, &target_dir.join(name), &mut report).await;
    }
    Ok(report)
}

/// Download every row of a `person,description,ext,url` CSV file.
pub async fn download_csv(
    fetch: &dyn Fetch,
    csv_file: &Path,
    links: &LinksConfig,
    target_dir: &Path,
) -> Result<LinkReport, LinkError> {
    let contents = fs::read_to_string(csv_file).await?;
    let rows = parse_csv(&contents)?;

    let mut report = LinkReport::default();
    for row in &rows {
        let path = target_dir.join(row.file_name(links));
        save_link(fetch, &row.url, &path, &mut report).await;
    }
    Ok(report)
}

async fn save_link(fetch: &dyn Fetch, url: &str, path: &Path, report: &mut LinkReport) {
    info!("Downloading file: {}", path.display());
    let message = match fetch.save_to(url, path).await {
        Ok(SaveOutcome::Written { .. }) => {
            report.saved.push(path.to_path_buf());
            return;
        }
        Ok(SaveOutcome::Status(status)) => format!("returned code {}", status),
        Err(e) => e.to_string(),
    };
    warn!("Failed to download {}: {}", url, message);
    report.failed.push((url.to_string(), message));
}

/// Parse CSV text with a header row naming the link columns.
pub fn parse_csv(text: &str) -> Result<Vec<LinkRow>, LinkError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(n, l)| (n + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    let header = split_csv_line(header, header_line)?;
    let index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();

    let mut columns = [0usize; 4];
    for (slot, name) in columns.iter_mut().zip(CSV_COLUMNS) {
        *slot = *index.get(name).ok_or_else(|| LinkError::Csv {
            line: header_line,
            message: format!("missing column '{}'", name),
        })?;
    }

    let mut rows = Vec::new();
    for (line, raw) in lines {
        let fields = split_csv_line(raw, line)?;
        if fields.len() != header.len() {
            return Err(LinkError::Csv {
                line,
                message: format!("expected {} fields, found {}", header.len(), fields.len()),
            });
        }
        let field = |i: usize| fields[columns[i]].clone();
        rows.push(LinkRow {
            person: field(0),
            description: field(1),
            ext: field(2),
            url: field(3).trim().to_string(),
        });
    }
    Ok(rows)
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>, LinkError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err(LinkError::Csv {
            line: line_no,
            message: "unterminated quoted field".to_string(),
        });
    }
    fields.push(field);
    Ok(fields)
}
