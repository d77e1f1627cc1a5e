//! Video ID extraction for `source_type=youtube` submissions (§6 Source URL
//! parsing). Recognizes the four URL shapes the boundary accepts; anything
//! else is rejected at submission time.

use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"youtu\.be/([A-Za-z0-9_-]{6,})").unwrap(),
            Regex::new(r"(?:m\.|www\.)?youtube\.com/.*[?&]v=([A-Za-z0-9_-]{6,})").unwrap(),
        ]
    })
}

/// Extract the video ID from a `youtu.be/<id>` or `{,m.,www.}youtube.com/?v=<id>`
/// URL. Returns `None` if the URL does not match any recognized shape.
pub fn extract_video_id(url: &str) -> Option<String> {
    for re in patterns() {
        if let Some(caps) = re.captures(url) {
            return Some(caps[1].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn extracts_from_watch_url_variants() {
        for host in ["youtube.com", "www.youtube.com", "m.youtube.com"] {
            let url = format!("https://{host}/watch?v=dQw4w9WgXcQ&list=xyz");
            assert_eq!(extract_video_id(&url), Some("dQw4w9WgXcQ".to_string()));
        }
    }

    #[test]
    fn rejects_unrecognized_urls() {
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
        assert_eq!(extract_video_id("not a url at all"), None);
    }
}
