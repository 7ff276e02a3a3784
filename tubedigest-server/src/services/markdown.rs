//! Markdown rendering of summaries
//!
//! Notes start with YAML front matter so vault tools can index them, then
//! the summary body. Section timestamps link into the video at that offset.

use std::collections::HashSet;
use std::fmt::Write;

use crate::models::Summary;
use crate::utils::duration::parse_clock_timestamp;

/// Longest file stem, in characters
const MAX_FILE_STEM_CHARS: usize = 120;

/// One exportable note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNote {
    /// Per-channel folder
    pub folder: String,
    pub file_name: String,
    pub markdown: String,
}

impl ExportNote {
    pub fn for_summary(summary: &Summary, channel_name: &str) -> Self {
        Self {
            folder: sanitize_file_name(channel_name),
            file_name: note_file_name(summary),
            markdown: render_summary(summary, channel_name),
        }
    }

    /// `folder/file_name`
    pub fn relative_path(&self) -> String {
        if self.folder.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.folder, self.file_name)
        }
    }
}

/// Path unique within `used`, suffixing ` (2)`, ` (3)`... before the extension
pub fn unique_path(path: String, used: &mut HashSet<String>) -> String {
    if used.insert(path.clone()) {
        return path;
    }
    let (stem, ext) = match path.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{}", ext)),
        None => (path.clone(), String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Replace characters invalid on common filesystems and cap the length
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
    trimmed.chars().take(MAX_FILE_STEM_CHARS).collect::<String>().trim_end().to_string()
}

/// `<published-date> <title>.md`
pub fn note_file_name(summary: &Summary) -> String {
    let date = summary
        .video_published_at
        .unwrap_or(summary.created_at)
        .format("%Y-%m-%d");
    let title = sanitize_file_name(&summary.title);
    if title.is_empty() {
        format!("{} {}.md", date, summary.video_external_id)
    } else {
        format!("{} {}.md", date, title)
    }
}

fn yaml_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ");
    format!("\"{}\"", escaped)
}

fn tag_slug(tag: &str) -> String {
    tag.trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Full note text for a summary
pub fn render_summary(summary: &Summary, channel_name: &str) -> String {
    let video_url = summary.video_url();
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "---");
    let _ = writeln!(out, "title: {}", yaml_string(&summary.title));
    let _ = writeln!(out, "channel: {}", yaml_string(channel_name));
    let _ = writeln!(out, "video: {}", yaml_string(&summary.video_title));
    let _ = writeln!(out, "url: {}", video_url);
    if let Some(published) = summary.video_published_at {
        let _ = writeln!(out, "published: {}", published.format("%Y-%m-%d"));
    }
    let tags: Vec<String> = summary
        .tags
        .iter()
        .map(|t| tag_slug(t))
        .filter(|t| !t.is_empty())
        .collect();
    if tags.is_empty() {
        let _ = writeln!(out, "tags: []");
    } else {
        let _ = writeln!(out, "tags:");
        for tag in &tags {
            let _ = writeln!(out, "  - {}", yaml_string(tag));
        }
    }
    if !summary.model.is_empty() {
        let _ = writeln!(out, "model: {}", yaml_string(&summary.model));
    }
    let _ = writeln!(out, "created: {}", summary.created_at.to_rfc3339());
    let _ = writeln!(out, "---");
    let _ = writeln!(out);

    let _ = writeln!(out, "# {}", summary.title);
    let _ = writeln!(out);
    let _ = writeln!(out, "[{}]({})", summary.video_title, video_url);
    let _ = writeln!(out);

    if !summary.core_theme.trim().is_empty() {
        let _ = writeln!(out, "> {}", summary.core_theme.trim());
        let _ = writeln!(out);
    }

    if !summary.content.trim().is_empty() {
        let _ = writeln!(out, "{}", summary.content.trim());
        let _ = writeln!(out);
    }

    if !summary.sections.is_empty() {
        let _ = writeln!(out, "## Sections");
        let _ = writeln!(out);
        for section in &summary.sections {
            let stamp = section.timestamp.as_deref().and_then(|t| {
                parse_clock_timestamp(t).map(|secs| (t.trim(), secs))
            });
            match stamp {
                Some((label, secs)) => {
                    let _ = writeln!(
                        out,
                        "### [{}]({}&t={}s) {}",
                        label.trim_start_matches('[').trim_end_matches(']'),
                        video_url,
                        secs,
                        section.title
                    );
                }
                None => {
                    let _ = writeln!(out, "### {}", section.title);
                }
            }
            let _ = writeln!(out);
            if !section.content.trim().is_empty() {
                let _ = writeln!(out, "{}", section.content.trim());
                let _ = writeln!(out);
            }
            if !section.key_words.is_empty() {
                let _ = writeln!(out, "*Key words:* {}", section.key_words.join(", "));
                let _ = writeln!(out);
            }
        }
    }

    write_list(&mut out, "Key Points", &summary.key_points);
    write_list(&mut out, "Insights", &summary.insights);

    out.trim_end().to_string() + "\n"
}

fn write_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}", heading);
    let _ = writeln!(out);
    for item in items {
        let _ = writeln!(out, "- {}", item.trim());
    }
    let _ = writeln!(out);
}
