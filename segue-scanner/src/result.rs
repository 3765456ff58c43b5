use url::Url;

/// Outcome of fetching a single page during a crawl.
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// The URL that was requested (the frontier entry).
    pub url: Url,
    /// The URL the response was served from, after redirects.
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    /// Resolved, fragment-stripped http(s) links in document order.
    pub links: Vec<Url>,
}

impl PageFetch {
    pub fn new(url: Url) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status_code: 0,
            content_type: None,
            links: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }

    pub fn is_html(&self) -> bool {
        crate::scope::is_html_content_type(self.content_type.as_deref())
    }

    /// Whether the page belongs in the discovered set.
    pub fn is_crawlable(&self) -> bool {
        self.is_success() && self.is_html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch(status: u16, content_type: Option<&str>) -> PageFetch {
        let mut fetch = PageFetch::new(Url::parse("https://example.com/").unwrap());
        fetch.status_code = status;
        fetch.content_type = content_type.map(str::to_string);
        fetch
    }

    #[test]
    fn test_crawlable_requires_status_and_html() {
        assert!(fetch(200, Some("text/html; charset=utf-8")).is_crawlable());
        assert!(fetch(304, Some("text/html")).is_crawlable());
        assert!(!fetch(404, Some("text/html")).is_crawlable());
        assert!(!fetch(199, Some("text/html")).is_crawlable());
        assert!(!fetch(200, Some("application/pdf")).is_crawlable());
        assert!(!fetch(200, None).is_crawlable());
    }
}
