//! Small text helpers shared by the handlers and the generation gateway.

use teloxide::types::User;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use balbes_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// How the bot addresses a user in replies: `@username` when set, otherwise
/// the numeric id.
#[must_use]
pub fn user_label(user: Option<&User>) -> String {
    match user {
        Some(u) => u
            .username
            .as_ref()
            .map_or_else(|| u.id.to_string(), |name| format!("@{name}")),
        None => "0".to_string(),
    }
}

/// Strips a case-insensitive command prefix from a message text.
///
/// Returns the trimmed remainder when `text` starts with `prefix`
/// (ignoring case, which matters for the Cyrillic triggers), `None` otherwise.
///
/// # Examples
///
/// ```
/// use balbes_bot::utils::strip_prefix_ci;
/// assert_eq!(strip_prefix_ci("!Пиши привет", "!пиши"), Some("привет".to_string()));
/// assert_eq!(strip_prefix_ci("привет", "!пиши"), None);
/// ```
#[must_use]
pub fn strip_prefix_ci(text: &str, prefix: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    if !lowered.starts_with(&prefix.to_lowercase()) {
        return None;
    }
    // The prefixes used here keep their char count under to_lowercase(),
    // so the remainder starts at the prefix's char count in the original.
    let chars = prefix.chars().count();
    let rest = text
        .char_indices()
        .nth(chars)
        .map_or("", |(pos, _)| &text[pos..]);
    Some(rest.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_truncate_str_exact_boundary() {
        assert_eq!(truncate_str("abc", 3), "abc");
        assert_eq!(truncate_str("abcd", 3), "abc");
        assert_eq!(truncate_str("", 5), "");
    }

    #[test]
    fn test_strip_prefix_ci_basic() {
        assert_eq!(
            strip_prefix_ci("!пиши тест", "!пиши"),
            Some("тест".to_string())
        );
        assert_eq!(
            strip_prefix_ci("!ПИШИ тест", "!пиши"),
            Some("тест".to_string())
        );
        assert_eq!(strip_prefix_ci("!пиши", "!пиши"), Some(String::new()));
        assert_eq!(strip_prefix_ci("пиши тест", "!пиши"), None);
    }

    #[test]
    fn test_strip_prefix_ci_keeps_remainder_case() {
        assert_eq!(
            strip_prefix_ci("!Права @Alice", "!права"),
            Some("@Alice".to_string())
        );
    }
}
