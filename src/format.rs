//! Markdown-subset to Telegram HTML conversion.
//!
//! LLM output uses a small markdown dialect (`###` headings, `**bold**`,
//! `_italic_`, `-` bullets). Telegram's HTML parse mode understands none of
//! it, so it is rewritten here. The input is escaped first so that literal
//! `<`, `>` and `&` in the summary cannot be read as tags.

use std::sync::LazyLock;

use regex::Regex;

static H3_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^### (.+)$").unwrap());
static H4_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#### (.+)$").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.+?)_").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^- (.+)$").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Convert a summary to Telegram HTML.
///
/// Applied in order: escape, `###` → bold, `####` → italic, `**x**` → bold,
/// `_x_` → italic, `- x` → `• x`, 3+ newlines → one blank line, trim.
pub fn to_telegram_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = escape_html(text);
    let text = H3_HEADING.replace_all(&text, "<b>${1}</b>");
    let text = H4_HEADING.replace_all(&text, "<i>${1}</i>");
    let text = BOLD.replace_all(&text, "<b>${1}</b>");
    let text = ITALIC.replace_all(&text, "<i>${1}</i>");
    let text = BULLET.replace_all(&text, "• ${1}");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Escape the characters Telegram HTML treats specially, plus quotes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
