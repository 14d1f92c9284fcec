//! Answer normalization and comparison.
//!
//! Two deliberately distinct operations live here: [`normalize`] (used to
//! deduplicate the autocomplete corpus while keeping one original spelling
//! per form) and [`compare`] (used to judge guesses). `compare` is looser:
//! it throws away everything that is not ASCII alphanumeric, so punctuation
//! and whitespace never count against a guess.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// NFKD-decompose, strip combining diacritics, lowercase.
pub fn normalize(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn alnum_fold(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Case-, punctuation- and whitespace-insensitive equality.
pub fn compare(a: &str, b: &str) -> bool {
    alnum_fold(a) == alnum_fold(b)
}

/// True iff any item in `items` compares equal to `value`.
pub fn array_almost_has<S: AsRef<str>>(items: &[S], value: &str) -> bool {
    items.iter().any(|item| compare(item.as_ref(), value))
}
