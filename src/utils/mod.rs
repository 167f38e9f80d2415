//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Join path segments onto a base URL, keeping any path prefix the base has.
///
/// A trailing empty segment produces a trailing slash.
pub fn join_segments(base: &Url, segments: &[&str]) -> Option<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().ok()?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments() {
        let base = Url::parse("https://example.com").unwrap();
        assert_eq!(
            join_segments(&base, &["api", "v1", "feeds", "topics"])
                .unwrap()
                .as_str(),
            "https://example.com/api/v1/feeds/topics"
        );
        assert_eq!(
            join_segments(&base, &["api", "v1", "feeds", ""])
                .unwrap()
                .as_str(),
            "https://example.com/api/v1/feeds/"
        );
    }

    #[test]
    fn test_join_segments_keeps_prefix_and_escapes() {
        let base = Url::parse("https://example.com/proxy/").unwrap();
        assert_eq!(
            join_segments(&base, &["topics", "a b"]).unwrap().as_str(),
            "https://example.com/proxy/topics/a%20b"
        );
    }

    #[test]
    fn test_join_segments_rejects_cannot_be_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(join_segments(&base, &["x"]).is_none());
    }
}
