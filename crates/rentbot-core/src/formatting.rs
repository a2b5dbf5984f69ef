//! Formatting utilities (model replies → Telegram HTML, message splitting, headers).

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::UserId;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fenced_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*\n?(.*?)```").expect("valid regex"))
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("valid regex"))
}

/// Render a model reply (loose markdown) into Telegram HTML.
///
/// Only the constructs models actually emit are converted: fenced code,
/// inline code and `**bold**`. Everything else is escaped verbatim, so an
/// unbalanced `*` or `_` can never make Telegram reject the message.
pub fn render_reply(markdown: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let text = fenced_code_re().replace_all(markdown, |caps: &regex::Captures<'_>| {
        blocks.push(format!("<pre>{}</pre>", escape_html(caps[1].trim_end_matches('\n'))));
        format!("\0B{}\0", blocks.len() - 1)
    });
    let text = inline_code_re().replace_all(&text, |caps: &regex::Captures<'_>| {
        blocks.push(format!("<code>{}</code>", escape_html(&caps[1])));
        format!("\0B{}\0", blocks.len() - 1)
    });

    let escaped = escape_html(&text);
    let mut html = bold_re().replace_all(&escaped, "<b>$1</b>").into_owned();

    for (i, block) in blocks.iter().enumerate() {
        html = html.replace(&format!("\0B{i}\0"), block);
    }
    html
}

/// Telegram counts message length in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

const FENCE: &str = "```";

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// Split `text` into pieces of at most `limit` UTF-16 units.
///
/// Splits happen on line boundaries where possible; overlong lines are cut on
/// char boundaries. A code fence that is open at a split point is closed at
/// the end of the piece and reopened at the start of the next one.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(16);
    if utf16_len(text) <= limit {
        return vec![text.to_string()];
    }

    // Room for the "\n```" that closes a fence at a split point.
    let mut sp = Splitter {
        out: Vec::new(),
        chunk: String::new(),
        len: 0,
        prefix_len: 0,
        in_fence: false,
        budget: limit - (FENCE.len() + 1),
    };

    for line in text.split_inclusive('\n') {
        let line_len = utf16_len(line);
        if sp.len + line_len > sp.budget && sp.has_content() {
            sp.flush();
        }

        if sp.len + line_len <= sp.budget {
            sp.push(line, line_len);
        } else {
            let mut rest = line;
            while !rest.is_empty() {
                let room = sp.budget.saturating_sub(sp.len);
                let (head, tail) = split_utf16_prefix(rest, room);
                sp.push(head, utf16_len(head));
                rest = tail;
                if !rest.is_empty() {
                    sp.flush();
                }
            }
        }

        if is_fence_line(line) {
            sp.in_fence = !sp.in_fence;
        }
    }

    sp.finish()
}

struct Splitter {
    out: Vec<String>,
    chunk: String,
    len: usize,
    prefix_len: usize,
    in_fence: bool,
    budget: usize,
}

impl Splitter {
    fn has_content(&self) -> bool {
        self.len > self.prefix_len
    }

    fn push(&mut self, s: &str, len: usize) {
        self.chunk.push_str(s);
        self.len += len;
    }

    fn flush(&mut self) {
        let mut piece = std::mem::take(&mut self.chunk);
        if self.in_fence {
            if !piece.ends_with('\n') {
                piece.push('\n');
            }
            piece.push_str(FENCE);
        }
        let trimmed = piece.trim_end_matches('\n');
        if !trimmed.trim().is_empty() {
            self.out.push(trimmed.to_string());
        }

        self.len = 0;
        self.prefix_len = 0;
        if self.in_fence {
            self.chunk.push_str(FENCE);
            self.chunk.push('\n');
            self.len = FENCE.len() + 1;
            self.prefix_len = self.len;
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_content() {
            // An unterminated fence stays unterminated, as in the source text.
            self.in_fence = false;
            self.flush();
        }
        self.out
    }
}

/// Split off the longest prefix of at most `max_units` UTF-16 units (at least one char).
fn split_utf16_prefix(s: &str, max_units: usize) -> (&str, &str) {
    let mut used = 0usize;
    let mut end = 0usize;
    for (i, ch) in s.char_indices() {
        let w = ch.len_utf16();
        if used + w > max_units {
            break;
        }
        used += w;
        end = i + ch.len_utf8();
    }
    if end == 0 {
        let first = s.chars().next().map(char::len_utf8).unwrap_or(s.len());
        return s.split_at(first);
    }
    s.split_at(end)
}

/// Header identifying who sent a forwarded message.
///
/// `title_html` is trusted markup; the username is escaped.
pub fn sender_header(title_html: &str, username: Option<&str>, user_id: UserId) -> String {
    let from = match username {
        Some(name) => format!("👤 From: @{}", escape_html(name)),
        None => "👤 From: (no username)".to_string(),
    };
    [title_html.to_string(), from, format!("🆔 User ID: {}", user_id.0)].join("\n")
}

pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}
