//! URL scoping rules shared by the crawler and the sitemap reader.

use url::Url;

/// File extensions that never point at an HTML page.
const ASSET_EXTENSIONS: &[&str] = &[
    // images
    "gif", "jpg", "jpeg", "png", "bmp", "svg", "webp", "avif", "ico", "tif", "tiff",
    // video and audio
    "mp4", "webm", "mov", "avi", "mkv", "m4v", "mp3", "wav", "ogg", "flac",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "rtf", "csv",
    // archives
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "dmg", "exe",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
];

/// Returns true for absolute URLs using one of the crawlable schemes.
pub fn is_valid_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// Parse a string and check it with [`is_valid_url`].
pub fn parse_valid_url(s: &str) -> Option<Url> {
    Url::parse(s.trim()).ok().filter(is_valid_url)
}

/// Scheme, host and port must all match.
pub fn is_same_origin(url: &Url, base: &Url) -> bool {
    url.origin() == base.origin()
}

pub fn is_asset_url(url: &Url) -> bool {
    let Some(last_segment) = url.path_segments().and_then(|mut segments| segments.next_back())
    else {
        return false;
    };

    match last_segment.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            let extension = extension.to_ascii_lowercase();
            ASSET_EXTENSIONS.contains(&extension.as_str())
        }
        _ => false,
    }
}

pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
        .unwrap_or(false)
}

pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Resolve an anchor `href` against the page it was found on.
///
/// Returns `None` for empty, fragment-only and non-navigational hrefs, and for
/// anything that does not resolve to an http(s) URL.
pub fn resolve_link(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let resolved = page_url.join(href).ok()?;
    if !is_valid_url(&resolved) {
        return None;
    }
    Some(strip_fragment(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_asset_extensions() {
        assert!(is_asset_url(&url("https://example.com/files/report.pdf")));
        assert!(is_asset_url(&url("https://example.com/img/Logo.PNG")));
        assert!(is_asset_url(&url("https://example.com/a.tar.gz?download=1")));
        assert!(!is_asset_url(&url("https://example.com/about")));
        assert!(!is_asset_url(&url("https://example.com/")));
        assert!(!is_asset_url(&url("https://example.com/page.html")));
        assert!(!is_asset_url(&url("https://example.com/.png")));
    }

    #[test]
    fn test_same_origin_requires_scheme_host_and_port() {
        let base = url("https://example.com/");
        assert!(is_same_origin(&url("https://example.com/about"), &base));
        assert!(is_same_origin(&url("https://EXAMPLE.com:443/x"), &base));
        assert!(!is_same_origin(&url("http://example.com/about"), &base));
        assert!(!is_same_origin(&url("https://example.com:8443/"), &base));
        assert!(!is_same_origin(&url("https://blog.example.com/"), &base));
    }

    #[test]
    fn test_html_content_type() {
        assert!(is_html_content_type(Some("text/html")));
        assert!(is_html_content_type(Some("text/html; charset=utf-8")));
        assert!(is_html_content_type(Some("TEXT/HTML")));
        assert!(!is_html_content_type(Some("application/json")));
        assert!(!is_html_content_type(Some("text/htmlx")));
        assert!(!is_html_content_type(None));
    }

    #[test]
    fn test_resolve_link_against_page_url() {
        let page = url("https://example.com/blog/post/");
        assert_eq!(
            resolve_link(&page, "../other/#comments").map(String::from),
            Some("https://example.com/blog/other/".to_string())
        );
        assert_eq!(
            resolve_link(&page, "  /about  ").map(String::from),
            Some("https://example.com/about".to_string())
        );
        assert!(resolve_link(&page, "#top").is_none());
        assert!(resolve_link(&page, "mailto:hi@example.com").is_none());
        assert!(resolve_link(&page, "ftp://example.com/file").is_none());
    }

    #[test]
    fn test_parse_valid_url() {
        assert!(parse_valid_url("https://example.com").is_some());
        assert!(parse_valid_url("example.com").is_none());
        assert!(parse_valid_url("file:///tmp/index.html").is_none());
    }
}
