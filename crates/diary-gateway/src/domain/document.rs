//! The diary document format stored in the content store.
//!
//! One markdown file per day at `diaries/{yyyy}/{mm}/{date}.md`: a quoted,
//! escaped YAML frontmatter block (title, date, tags, image prompt)
//! followed by the rendered entry. The posting handlers parse the same
//! format back out, so renderer and parser live together here.

use chrono::NaiveDate;

use crate::domain::types::FormattedDiary;

/// Heading marker for the summary section; the parser matches any `###`
/// heading containing it.
const SUMMARY_MARKER: &str = "Summary";

/// Storage path for a day's diary document.
pub fn diary_path(date: NaiveDate) -> String {
    format!("diaries/{}/{}.md", date.format("%Y/%m"), date.format("%Y-%m-%d"))
}

/// Storage path for a day's generated image.
pub fn image_path(date: NaiveDate) -> String {
    format!("docs/images/{}.png", date.format("%Y-%m-%d"))
}

/// Escape a string for a double-quoted YAML scalar.
fn escape_yaml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_yaml`].
fn unescape_yaml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Prefix tags with `#` where the formatter left it off.
pub fn hashtags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| {
            if t.starts_with('#') {
                t.clone()
            } else {
                format!("#{t}")
            }
        })
        .collect()
}

/// Render a formatted diary into the stored markdown document.
pub fn render(diary: &FormattedDiary, date: NaiveDate) -> String {
    let iso = date.format("%Y-%m-%d");
    let tags = hashtags(&diary.tags);
    let quoted_tags = tags
        .iter()
        .map(|t| format!("\"{}\"", escape_yaml(t)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "---\n\
         title: \"{title}\"\n\
         date: {iso}\n\
         tags: [{quoted_tags}]\n\
         image_prompt: \"{image_prompt}\"\n\
         ---\n\
         \n\
         # {raw_title}\n\
         \n\
         ## {iso}\n\
         \n\
         ### {SUMMARY_MARKER}\n\
         \n\
         {summary}\n\
         \n\
         ---\n\
         \n\
         {body}\n\
         \n\
         ---\n\
         \n\
         **Tags:** {joined_tags}\n",
        title = escape_yaml(&diary.title),
        image_prompt = escape_yaml(&diary.image_prompt),
        raw_title = diary.title,
        summary = diary.summary,
        body = diary.body,
        joined_tags = tags.join(" "),
    )
}

/// Fields the posting handlers read back out of a stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDiary {
    pub title: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub image_prompt: Option<String>,
}

/// Parse a stored diary document. `None` when the frontmatter block is
/// missing entirely (a malformed document).
pub fn parse(content: &str) -> Option<ParsedDiary> {
    let front = front_matter(content)?;
    Some(ParsedDiary {
        title: quoted_field(front, "title").unwrap_or_default(),
        tags: list_field(front, "tags"),
        summary: summary_section(content).unwrap_or_default(),
        image_prompt: quoted_field(front, "image_prompt"),
    })
}

/// The lines between the opening and closing `---` fences.
fn front_matter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Extract a double-quoted scalar field, honoring escapes.
fn quoted_field(front: &str, name: &str) -> Option<String> {
    for line in front.lines() {
        let Some(value) = line.strip_prefix(name).and_then(|r| r.strip_prefix(':')) else {
            continue;
        };
        let value = value.trim_start();
        let inner = parse_quoted(value)?;
        return Some(unescape_yaml(inner));
    }
    None
}

/// The raw contents of a double-quoted scalar, stopping at the first
/// unescaped closing quote.
fn parse_quoted(value: &str) -> Option<&str> {
    let rest = value.strip_prefix('"')?;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(&rest[..i]);
        }
    }
    None
}

/// Extract a `[ ... ]` list of quoted strings.
fn list_field(front: &str, name: &str) -> Vec<String> {
    for line in front.lines() {
        let Some(value) = line.strip_prefix(name).and_then(|r| r.strip_prefix(':')) else {
            continue;
        };
        let value = value.trim();
        let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) else {
            continue;
        };
        return inner
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| match parse_quoted(item) {
                Some(quoted) => unescape_yaml(quoted),
                None => item.to_string(),
            })
            .collect();
    }
    Vec::new()
}

/// Text of the summary section: everything after a `###` heading that
/// contains the summary marker, up to the next `---` or `###` line.
fn summary_section(content: &str) -> Option<String> {
    let mut lines = content.lines();
    for line in lines.by_ref() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("###") && trimmed.contains(SUMMARY_MARKER) {
            break;
        }
    }
    let mut collected = Vec::new();
    for line in lines {
        let trimmed = line.trim_start();
        if trimmed.starts_with("---") || trimmed.starts_with("###") {
            break;
        }
        collected.push(line);
    }
    let text = collected.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}
