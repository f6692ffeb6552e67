//! Title extraction from raw HTML bytes.
//!
//! No DOM parsing: a single case-insensitive pattern over the body, which is
//! enough for server-rendered pages and never fails on malformed markup.
//! The pattern works on bytes, so bodies that are not valid UTF-8 still match.

use regex::bytes::Regex;
use std::sync::OnceLock;

fn title_regex() -> &'static Regex {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    TITLE_RE.get_or_init(|| {
        Regex::new(r"(?is-u)<title(?:\s[^>]*)?>(.*?)</title\s*>").expect("title regex is valid")
    })
}

/// Return the trimmed inner text of the first `<title>` element, if any.
///
/// Tag names match case-insensitively and the text may span lines. Bytes that
/// are not valid UTF-8 are replaced rather than rejected. A missing title is
/// `None`, not an error.
pub fn extract_title(body: &[u8]) -> Option<String> {
    let caps = title_regex().captures(body)?;
    let inner = caps.get(1)?;
    Some(String::from_utf8_lossy(inner.as_bytes()).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_title() {
        let html = b"<html><head><title>Hello</title></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_extract_is_case_insensitive_and_trimmed() {
        let html = b"<HTML><HEAD><TITLE> Redirected </TITLE></HEAD></HTML>";
        assert_eq!(extract_title(html).as_deref(), Some("Redirected"));

        let mixed = b"<Title>\n  Mixed Case\n</tItLe>";
        assert_eq!(extract_title(mixed).as_deref(), Some("Mixed Case"));
    }

    #[test]
    fn test_extract_with_attributes_and_multiline() {
        let html = b"<title data-rh=\"true\" lang=\"es\">Wikipedia,\nla enciclopedia libre</title>";
        assert_eq!(
            extract_title(html).as_deref(),
            Some("Wikipedia,\nla enciclopedia libre")
        );
    }

    #[test]
    fn test_extract_first_occurrence_wins() {
        let html = b"<title>First</title><svg><title>Second</title></svg>";
        assert_eq!(extract_title(html).as_deref(), Some("First"));
    }

    #[test]
    fn test_extract_absent() {
        assert_eq!(extract_title(b""), None);
        assert_eq!(extract_title(b"<html><body>no title</body></html>"), None);
        // Opening tag without a close is not a title region
        assert_eq!(extract_title(b"<title>unterminated"), None);
    }

    #[test]
    fn test_extract_ignores_lookalike_tags() {
        let html = b"<titles>nope</titles><title>yes</title>";
        assert_eq!(extract_title(html).as_deref(), Some("yes"));
    }

    #[test]
    fn test_extract_empty_title() {
        assert_eq!(extract_title(b"<title>   </title>").as_deref(), Some(""));
    }

    #[test]
    fn test_extract_invalid_utf8_is_lossy() {
        let html = b"<title>caf\xe9</title>";
        let title = extract_title(html).unwrap();
        assert!(title.starts_with("caf"));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let html = b"<head><title>  Portada  </title></head>";
        assert_eq!(extract_title(html), extract_title(html));
    }
}
