//! Filename extraction and sanitization.
//!
//! Used for service-provided binary filenames and for validating config keys
//! that become directory names.

use std::path::{Component, Path};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tracing::debug;
use url::Url;

/// Parses Content-Disposition header to extract filename.
///
/// Handles both:
/// - `attachment; filename="example.deb"`
/// - `attachment; filename=example.deb`
/// - `attachment; filename*=UTF-8''example.deb` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();

        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Returns true when `name` can be used verbatim as one directory level.
#[must_use]
pub fn is_safe_path_segment(name: &str) -> bool {
    !name.is_empty() && name.trim() == name && sanitize_filename(name) == name
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Picks the filename for a response: Content-Disposition first, then the
/// last path segment of the (post-redirect) URL.
pub(crate) fn filename_from_response(headers: &HeaderMap, url: &Url) -> Option<String> {
    if let Some(cd) = headers.get(CONTENT_DISPOSITION)
        && let Ok(cd_str) = cd.to_str()
        && let Some(filename) = parse_content_disposition(cd_str)
    {
        return Some(sanitize_filename(&filename));
    }
    filename_from_url(url)
}

/// Last non-empty path segment of `url`, percent-decoded and sanitized.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    Some(sanitize_filename(&decoded))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file/name.deb"), "file_name.deb");
        assert_eq!(sanitize_filename("file\\name.deb"), "file_name.deb");
        assert_eq!(sanitize_filename("file:name.deb"), "file_name.deb");
        assert_eq!(sanitize_filename("file<name>.deb"), "file_name_.deb");
        assert_eq!(sanitize_filename("file|name.deb"), "file_name.deb");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_is_safe_path_segment() {
        assert!(is_safe_path_segment("python"));
        assert!(is_safe_path_segment("ms-python.python"));
        assert!(is_safe_path_segment("Web Dev"));
        assert!(!is_safe_path_segment(""));
        assert!(!is_safe_path_segment(".."));
        assert!(!is_safe_path_segment("a/b"));
        assert!(!is_safe_path_segment(" padded "));
    }

    #[test]
    fn test_parse_content_disposition_variants() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="code_1.85.1_amd64.deb""#),
            Some("code_1.85.1_amd64.deb".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=VSCode.zip; size=12"),
            Some("VSCode.zip".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''Code%20Setup.exe"),
            Some("Code Setup.exe".to_string())
        );
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_filename_from_response_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static(r#"attachment; filename="VSCodeSetup-x64-1.85.1.exe""#),
        );
        let url = Url::parse("https://cdn.example/stable/abc/other.exe").unwrap();
        assert_eq!(
            filename_from_response(&headers, &url).as_deref(),
            Some("VSCodeSetup-x64-1.85.1.exe")
        );
    }

    #[test]
    fn test_filename_from_url_falls_back_to_last_segment() {
        let url = Url::parse("https://cdn.example/stable/abc/code%201.85.tar.gz").unwrap();
        assert_eq!(
            filename_from_response(&HeaderMap::new(), &url).as_deref(),
            Some("code 1.85.tar.gz")
        );
        let root = Url::parse("https://cdn.example/").unwrap();
        assert_eq!(filename_from_url(&root), None);
    }
}
