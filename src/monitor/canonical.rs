// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Canonical content hashing for change detection.
//!
//! A raw hash of fetched HTML would flag a page as "changed" on every
//! request merely because it embeds a render timestamp, producing
//! invalidation storms. High-entropy presentation noise (scripts, styles,
//! comments, timestamps, whitespace) is stripped before hashing; this is
//! required for correctness, not an optimization.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

fn script_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap())
}

fn style_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap())
}

fn html_comments() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

fn iso8601_timestamps() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
            .unwrap()
    })
}

fn epoch_timestamps() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 13-digit millis first so the 10-digit pattern can't split them
    RE.get_or_init(|| Regex::new(r"\b(?:\d{13}|\d{10})\b").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Reduce a fetched body to its meaningful content.
#[must_use]
pub fn canonicalize(body: &str) -> String {
    let stripped = script_blocks().replace_all(body, " ");
    let stripped = style_blocks().replace_all(&stripped, " ");
    let stripped = html_comments().replace_all(&stripped, " ");
    let stripped = iso8601_timestamps().replace_all(&stripped, " ");
    let stripped = epoch_timestamps().replace_all(&stripped, " ");
    whitespace_runs()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Canonicalize and hash a fetched body (SHA-256 hex).
///
/// Two fetches differing only in presentation noise hash identically.
#[must_use]
pub fn content_hash(body: &str) -> String {
    let canonical = canonicalize(body);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_bodies_hash_identically() {
        let body = "<html><body>Hello</body></html>";
        assert_eq!(content_hash(body), content_hash(body));
    }

    #[test]
    fn test_meaningful_change_changes_hash() {
        assert_ne!(
            content_hash("<p>Price: $10</p>"),
            content_hash("<p>Price: $12</p>")
        );
    }

    #[test]
    fn test_iso_timestamp_noise_ignored() {
        let a = "<p>Content</p><span>Rendered at 2026-01-15T10:30:00Z</span>";
        let b = "<p>Content</p><span>Rendered at 2026-01-15T11:45:12Z</span>";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_iso_timestamp_with_offset_and_fraction() {
        let a = "<p>x</p> 2026-01-15 10:30:00.123+02:00";
        let b = "<p>x</p> 2026-02-20 23:59:59-0700";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_epoch_timestamp_noise_ignored() {
        let a = r#"<div data-ts="1767084657">body</div>"#;
        let b = r#"<div data-ts="1767099999">body</div>"#;
        assert_eq!(content_hash(a), content_hash(b));

        let a_ms = r#"<div data-ts="1767084657058">body</div>"#;
        let b_ms = r#"<div data-ts="1767099999999">body</div>"#;
        assert_eq!(content_hash(a_ms), content_hash(b_ms));
    }

    #[test]
    fn test_short_numbers_are_content() {
        // A 4-digit number is content, not an epoch stamp
        assert_ne!(content_hash("<p>Year 2025</p>"), content_hash("<p>Year 2026</p>"));
    }

    #[test]
    fn test_script_and_style_stripped() {
        let a = "<script>var nonce = 'abc123';</script><p>Body</p><style>.x{color:red}</style>";
        let b = "<script>var nonce = 'zzz999';</script><p>Body</p><style>.x{color:blue}</style>";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_script_with_attributes_stripped() {
        let a = r#"<SCRIPT type="text/javascript">cacheBust(42)</SCRIPT><p>x</p>"#;
        let b = r#"<script type="text/javascript">cacheBust(77)</script><p>x</p>"#;
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_html_comments_stripped() {
        let a = "<!-- build 1021 --><p>Body</p>";
        let b = "<!-- build 1022 --><p>Body</p>";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_whitespace_collapsed() {
        let a = "<p>Hello   world</p>";
        let b = "<p>Hello world</p>\n\n";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn test_canonicalize_output() {
        let body = "<script>x()</script>  Hello\n\n  world  <!-- note -->";
        assert_eq!(canonicalize(body), "Hello world");
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash("anything");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
