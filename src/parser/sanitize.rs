//! Text sanitization for fields read out of listing blocks
//!
//! Titles and bylines on the listing page carry layout whitespace and the
//! occasional invisible character; these helpers reduce them to a single
//! clean line.

use crate::utils::normalize_whitespace;

/// Clean a text field down to a single normalized line
///
/// # Examples
///
/// ```
/// use ann_news::parser::sanitize::clean_line;
///
/// let dirty = "\n   One Piece\u{200B}  Anime \t Announced  ";
/// assert_eq!(clean_line(dirty), "One Piece Anime Announced");
/// ```
pub fn clean_line(text: &str) -> String {
    let visible = remove_control_chars(&remove_zero_width(text));
    normalize_whitespace(&visible)
}

/// Remove zero-width spaces and similar invisible characters
///
/// # Examples
///
/// ```
/// use ann_news::parser::sanitize::remove_zero_width;
///
/// let text = "a\u{200B}b\u{FEFF}c";
/// assert_eq!(remove_zero_width(text), "abc");
/// ```
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c, '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}'))
        .collect()
}

/// Remove control characters, keeping whitespace that normalization folds
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect()
}
