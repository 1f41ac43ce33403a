//! Free-text helpers: titles, slugs, padded storage names

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Titles longer than this are shortened
pub const TITLE_LIMIT: usize = 256;
/// Shortened titles are cut at the first space from this position
pub const TITLE_CUT: usize = 140;

static UNIT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(unit|album) (\d+)").expect("valid unit pattern"));
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits pattern"));
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid slug pattern"));
static SLUG_GAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid gap pattern"));

/// Shorten an over-long title. Returns `(title, full_title)`; the full title
/// is empty when no shortening was needed.
pub fn shorten_title(text: &str) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= TITLE_LIMIT {
        return (text.to_string(), String::new());
    }
    let cut = chars[TITLE_CUT..]
        .iter()
        .position(|c| *c == ' ')
        .map(|offset| TITLE_CUT + offset)
        .unwrap_or(TITLE_CUT);
    let short: String = chars[..cut].iter().collect();
    (format!("{}...", short), text.to_string())
}

/// ASCII, lowercase, dash-separated form of a value for file names
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();
    let cleaned = NON_SLUG.replace_all(&ascii.to_lowercase(), "").into_owned();
    SLUG_GAPS
        .replace_all(&cleaned, "-")
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

/// Join the non-empty values, or `None` if there are none
pub fn concat_fields(fields: &[Option<&str>], sep: &str) -> Option<String> {
    let parts: Vec<&str> = fields
        .iter()
        .flatten()
        .copied()
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(sep))
    }
}

/// Zero-pad unit and album numbers to four digits (`Unit 12` -> `Unit 0012`)
pub fn pad_unit_name(name: &str) -> String {
    UNIT_NUMBER
        .replace_all(name, |c: &Captures| format!("{} {:0>4}", &c[1], &c[2]))
        .into_owned()
}

/// Zero-pad every number in a location code to two digits
pub fn pad_location_code(code: &str) -> String {
    DIGITS
        .replace_all(code, |c: &Captures| format!("{:0>2}", &c[0]))
        .into_owned()
}
