use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("pattern is a valid regex"));

/// Replaces every maximal run of characters outside `[A-Za-z0-9]` with a
/// single space. Punctuation and non-ASCII text are discarded, not interpreted.
pub fn preprocess(text: &str) -> String {
    NON_ALPHANUMERIC.replace_all(text, " ").into_owned()
}
