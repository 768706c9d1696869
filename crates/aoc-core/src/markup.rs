//! Minimal helpers over puzzle statement markup.
//!
//! Statements are small, well-formed HTML fragments. A handful of regular
//! expressions is enough; nothing here builds a DOM.

use std::sync::OnceLock;

use regex::Regex;

/// A piece of a statement, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Text between blocks and answers, tags stripped.
    Prose(String),
    /// Contents of a `<pre><code>` block, tags stripped and entities decoded.
    Block(String),
    /// An emphasized code span (`<code><em>..</em></code>` or the reverse).
    Answer(String),
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern is valid"))
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(
        &RE,
        r"(?s)<pre><code>(?P<block>.*?)</code></pre>|<code><em>(?P<a1>.*?)</em></code>|<em><code>(?P<a2>.*?)</code></em>",
    )
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"<[^>]*>")
}

fn article_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r#"(?s)<article class="day-desc">(.*?)</article>"#)
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"<h2[^>]*>--- Day \d+: (.*?) ---</h2>")
}

/// Split a statement into prose, blocks and answers.
#[must_use]
pub fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in token_re().captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };

        let prose = strip_tags(&html[last..whole.start()]);
        if !prose.trim().is_empty() {
            tokens.push(Token::Prose(prose));
        }

        if let Some(block) = caps.name("block") {
            tokens.push(Token::Block(strip_tags(block.as_str())));
        } else if let Some(answer) = caps.name("a1").or_else(|| caps.name("a2")) {
            tokens.push(Token::Answer(strip_tags(answer.as_str()).trim().to_string()));
        }

        last = whole.end();
    }

    let tail = strip_tags(&html[last..]);
    if !tail.trim().is_empty() {
        tokens.push(Token::Prose(tail));
    }

    tokens
}

/// Bodies of the `<article class="day-desc">` elements, in order.
#[must_use]
pub fn articles(html: &str) -> Vec<String> {
    article_re()
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Title from the `--- Day N: Title ---` heading.
#[must_use]
pub fn title(html: &str) -> Option<String> {
    title_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str()))
}

/// Remove tags and decode entities.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    decode_entities(&tag_re().replace_all(html, ""))
}

/// Readable text: paragraph and list-item ends become line breaks.
#[must_use]
pub fn plain_text(html: &str) -> String {
    strip_tags(&html.replace("</p>", "</p>\n").replace("</li>", "</li>\n"))
}

/// Decode the entities puzzle pages actually use.
#[must_use]
pub fn decode_entities(s: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;".
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Split prose into sentences.
///
/// A sentence ends at `.`, `?`, `!` or `:` followed by whitespace or the end
/// of the text, so decimals like `1.5` stay intact. Line breaks are spaces.
#[must_use]
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if matches!(ch, '.' | '?' | '!' | ':') && at_boundary {
            push_sentence(&mut out, &mut current);
        }
    }
    push_sentence(&mut out, &mut current);
    out
}

fn push_sentence(out: &mut Vec<String>, current: &mut String) {
    let s = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !s.is_empty() {
        out.push(s);
    }
    current.clear();
}
