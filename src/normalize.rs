//! Deterministic text-cleanup pipeline applied before chunking.
//!
//! [`normalize`] composes an ordered list of independent transforms; each
//! receives the output of the previous one. Order matters: markup conversion
//! runs before whitespace collapsing, and URL stripping runs before
//! hashtag/cashtag stripping so URL fragments that resemble tags are not
//! mangled.
//!
//! Every transform is total: no input string (empty, emoji-only,
//! non-Latin scripts) may cause a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

type Transform = fn(&str) -> String;

/// The composition applied by [`normalize`], in order.
const TRANSFORMS: &[Transform] = &[
    markup_to_text,
    strip_emoji,
    strip_mentions,
    strip_urls,
    strip_hashtags,
    strip_cashtags,
    collapse_whitespace,
];

/// Clean up raw message text for chunking and embedding.
pub fn normalize(text: &str) -> String {
    TRANSFORMS
        .iter()
        .fold(text.to_string(), |acc, transform| transform(&acc))
}

static BREAK_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").expect("valid regex"));

/// Convert HTML markup to plain text, preserving line breaks.
///
/// Inputs without markup pass through unchanged.
fn markup_to_text(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    let with_breaks = BREAK_TAGS.replace_all(text, "\n");
    let fragment = Html::parse_fragment(&with_breaks);
    fragment.root_element().text().collect()
}

/// Emoji and emoji-adjacent code points (pictographs, dingbats, variation
/// selectors, joiners). An approximation of the full Unicode emoji set that
/// covers what shows up in chat exports.
fn is_emoji(c: char) -> bool {
    matches!(c,
        '\u{1F000}'..='\u{1FAFF}'
            | '\u{2600}'..='\u{27BF}'
            | '\u{2B00}'..='\u{2BFF}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{200D}'
            | '\u{20E3}')
}

fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s?@[\w_]+").expect("valid regex"));

/// Remove `@username` mentions together with one preceding space.
fn strip_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").into_owned()
}

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

/// Strip URLs: `[label](url)` keeps its label, bare URLs are removed.
fn strip_urls(text: &str) -> String {
    let without_links = MARKDOWN_LINK.replace_all(text, "$1");
    URL.replace_all(&without_links, "").into_owned()
}

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\S+").expect("valid regex"));

fn strip_hashtags(text: &str) -> String {
    HASHTAG.replace_all(text, "").into_owned()
}

static CASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(?:st|w)?[A-Z]+").expect("valid regex"));

/// Remove `$TAG` style cashtags, including wrapped/staked prefixes
/// (`$wETH`, `$stTON`).
fn strip_cashtags(text: &str) -> String {
    CASHTAG.replace_all(text, "").into_owned()
}

static INTRA_LINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

/// Trim every line, collapse runs of spaces/tabs within lines, and strip
/// leading/trailing blank lines. Interior blank lines survive so paragraph
/// boundaries remain visible to the chunker.
fn collapse_whitespace(text: &str) -> String {
    let cleaned: Vec<String> = text
        .lines()
        .map(|line| INTRA_LINE_WS.replace_all(line.trim(), " ").into_owned())
        .collect();
    cleaned.join("\n").trim_matches('\n').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mentions_urls_tags_and_collapses() {
        let text = "Hello @bob check https://x.com #tag $BTC";
        assert_eq!(normalize(text), "Hello check");
    }

    #[test]
    fn markdown_link_keeps_label() {
        assert_eq!(normalize("see [the docs](https://example.com/a#b)"), "see the docs");
    }

    #[test]
    fn html_markup_becomes_plain_text() {
        let html = "<div class=\"text\">Hello <b>world</b><br>next line</div>";
        assert_eq!(normalize(html), "Hello world\nnext line");
    }

    #[test]
    fn strips_emoji_glyphs() {
        assert_eq!(normalize("🚀 Bitcoin update 🚀"), "Bitcoin update");
        assert_eq!(normalize("good ✨ news ⭐"), "good news");
    }

    #[test]
    fn idempotent_on_representative_inputs() {
        let samples = [
            "✨ Hello @username! Check out   https://example.com my site",
            "Привет мир! 123 #hashtag",
            "multi\n\n\nline   text\twith\ttabs",
            "",
            "   \n \n ",
            "$BTC $ETH and [link](http://a.b) 👋",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn empty_and_whitespace_only_yield_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \n\t \n"), "");
    }

    #[test]
    fn interior_blank_lines_survive() {
        let text = "first   paragraph\n\nsecond  paragraph";
        assert_eq!(normalize(text), "first paragraph\n\nsecond paragraph");
    }

    #[test]
    fn non_latin_scripts_pass_through() {
        assert_eq!(normalize("Привет мир! 123"), "Привет мир! 123");
        assert_eq!(normalize("こんにちは 世界"), "こんにちは 世界");
    }

    #[test]
    fn url_stripping_runs_before_hashtags() {
        // The fragment would otherwise be left behind as a dangling tag.
        assert_eq!(normalize("read https://x.com/page#section now"), "read now");
    }
}
