//! The text normalization pipeline.
//!
//! Scraped article text arrives with the site's typesetting quirks intact:
//! full-width Latin characters, ideographic padding spaces, katakana middle
//! dots doing duty as decimal points, and `<br>` tokens instead of real line
//! breaks. [`normalize_article`] runs a fixed, ordered pipeline of pure text
//! transformations that turns this into portable, markdown-flavoured text.
//!
//! Order is load-bearing: later steps assume earlier ones have already run
//! (e.g. heading detection counts on digits already being half-width, and the
//! paragraph-break step counts on quote markers already being in place).
//! Every step is a total function — empty input and pattern-free input pass
//! through untouched.

use crate::models::Article;
use once_cell::sync::Lazy;
use regex::Regex;

/// The site's internal line-break token, as it appears in scraped body HTML.
pub const LINE_BREAK: &str = "<br>";

/// Map full-width Latin letters, digits, and punctuation to their half-width
/// equivalents.
///
/// Covers U+FF01..=U+FF5D. The full-width wave dash `～` (U+FF5E) is just past
/// the range and stays as-is; it marks ranges like `１０～２０` and has no
/// half-width equivalent worth the ambiguity.
pub fn to_half_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{ff01}'..='\u{ff5d}' => char::from_u32(c as u32 - 0xfee0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

fn is_wide_or_ascii_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// Replace a katakana middle dot strictly between two digits with a period.
///
/// Disambiguates numeric ranges like `3・4倍` (→ `3.4倍`) from Japanese list
/// markers, which keep their dots.
pub fn fix_numeric_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c == '・'
                && i > 0
                && is_wide_or_ascii_digit(chars[i - 1])
                && chars.get(i + 1).is_some_and(|&n| is_wide_or_ascii_digit(n))
            {
                '.'
            } else {
                c
            }
        })
        .collect()
}

/// Replace an ideographic space strictly between two ASCII letters with a
/// plain space, so Latin phrases read naturally after width normalization.
pub fn narrow_latin_spacing(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c == '　'
                && i > 0
                && chars[i - 1].is_ascii_alphabetic()
                && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic())
            {
                ' '
            } else {
                c
            }
        })
        .collect()
}

static TRAILING_PAD: Lazy<Regex> = Lazy::new(|| Regex::new("　(<br>|$)").unwrap());

/// Remove an ideographic space at the end of a body line (a line being a run
/// of text terminated by the `<br>` token or the end of the body).
pub fn strip_trailing_pad(text: &str) -> String {
    TRAILING_PAD.replace_all(text, "$1").into_owned()
}

/// Prefix every line from the first `【`-opening line onwards with a
/// blockquote marker.
///
/// A single forward pass with a boolean accumulator: lines before the first
/// `【` line stay untouched; that line and everything after it — whether or
/// not it opens with `【` itself — gets `> ` prepended.
pub fn mark_quote_lines(text: &str) -> String {
    text.split(LINE_BREAK)
        .scan(false, |quoted, line| {
            *quoted = *quoted || line.starts_with('【');
            Some(if *quoted {
                format!("> {line}")
            } else {
                line.to_owned()
            })
        })
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

static HEADING_EXEMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[>　【（(〈・]|^[0-9]+[ 　]").unwrap());

/// Prefix short, plain lines with a markdown heading marker.
///
/// A line is marked with `## ` when it is at most 15 characters long and does
/// not already start with a quote marker, an ideographic space, an opening
/// bracket, a middle dot, or digits followed by a space. Runs after
/// [`mark_quote_lines`], so quoted lines are exempt via their `> ` prefix.
pub fn mark_headings(text: &str) -> String {
    text.split(LINE_BREAK)
        .map(|line| {
            if HEADING_EXEMPT.is_match(line) || line.chars().count() > 15 {
                line.to_owned()
            } else {
                format!("## {line}")
            }
        })
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}

static LEADING_PAD: Lazy<Regex> = Lazy::new(|| Regex::new("^　|(<br>)　").unwrap());

/// Remove an ideographic space at the start of the body or immediately after
/// a `<br>` token.
pub fn strip_leading_pad(text: &str) -> String {
    LEADING_PAD.replace_all(text, "$1").into_owned()
}

static FIRST_QUOTED_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new("(> [^\n]+?)\n").unwrap());

/// Convert `<br>` tokens into paragraph breaks.
///
/// Every token becomes a blank line (`\n\n`); afterwards the first quoted
/// line's paragraph break is collapsed back to a single newline so the quote
/// block stays visually attached. The fix-up intentionally applies to the
/// first occurrence only — archives have always been written this way, and
/// consumers of existing files depend on it.
pub fn breaks_to_paragraphs(text: &str) -> String {
    let text = text.replace(LINE_BREAK, "\n\n");
    FIRST_QUOTED_BREAK.replace(&text, "$1").into_owned()
}

/// Run the full normalization pipeline over one article.
///
/// Width, separator, and spacing fixes apply to the title and body (and the
/// width fix to the genre label); the line-oriented steps apply to the body
/// only.
pub fn normalize_article(mut article: Article) -> Article {
    article.genre = article.genre.map(|g| to_half_width(&g));

    article.title = narrow_latin_spacing(&fix_numeric_separators(&to_half_width(&article.title)));

    let mut text = narrow_latin_spacing(&fix_numeric_separators(&to_half_width(&article.text)));
    text = strip_trailing_pad(&text);
    text = mark_quote_lines(&text);
    text = mark_headings(&text);
    text = strip_leading_pad(&text);
    article.text = breaks_to_paragraphs(&text);

    article
}
