use crate::config::ValidateConfig;
use crate::error::{Result, SegueError};
use segue_scanner::{Crawler, ProgressCallback, SitemapReader, build_client, scope};
use std::collections::HashSet;
use tracing::info;

/// Request timeout for crawling and sitemap downloads, in seconds.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// The pages selected for a run and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    pub urls: Vec<String>,
    pub source: String,
}

/// Decide which pages to validate.
///
/// An explicit URL wins (crawled from when `crawl` is set), then the sitemap. The
/// result is deduplicated in encounter order and truncated to `limit` when it is
/// non-zero.
pub async fn resolve_pages(
    config: &ValidateConfig,
    progress: Option<ProgressCallback>,
) -> Result<PageSet> {
    let url = config.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let sitemap = config.sitemap.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let (urls, source) = match (url, sitemap) {
        (Some(url), _) => {
            let parsed =
                scope::parse_valid_url(url).ok_or_else(|| SegueError::InvalidUrl(url.to_string()))?;

            if config.crawl {
                info!("Crawling {} for pages", parsed);
                let mut crawler = Crawler::with_timeout(FETCH_TIMEOUT_SECS)?
                    .with_max_connections(config.max_connections);
                if let Some(callback) = progress {
                    crawler = crawler.with_progress_callback(callback);
                }
                let urls = crawler.crawl(parsed.as_str()).await?;
                (urls, format!("crawled site from {}", parsed))
            } else {
                (vec![parsed.to_string()], "single url argument".to_string())
            }
        }
        (None, Some(location)) => {
            info!("Reading sitemap {}", location);
            let reader = SitemapReader::new(build_client(FETCH_TIMEOUT_SECS)?);
            let urls = reader.load(location).await?;
            (urls, format!("parsed sitemap {}", location))
        }
        (None, None) => return Err(SegueError::NoPageSource),
    };

    let mut urls = dedup_preserving_order(urls);
    if config.limit > 0 {
        urls.truncate(config.limit);
    }

    info!("Selected {} pages ({})", urls.len(), source);
    Ok(PageSet { urls, source })
}

pub fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let urls = vec![
            "https://a.test/".to_string(),
            "https://a.test/b".to_string(),
            "https://a.test/".to_string(),
            "https://a.test/c".to_string(),
            "https://a.test/b".to_string(),
        ];
        assert_eq!(
            dedup_preserving_order(urls),
            vec!["https://a.test/", "https://a.test/b", "https://a.test/c"]
        );
    }

    #[tokio::test]
    async fn test_no_source_is_an_error() {
        let config = ValidateConfig::default();
        let result = resolve_pages(&config, None).await;
        assert!(matches!(result, Err(SegueError::NoPageSource)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let config = ValidateConfig {
            url: Some("ftp://example.com/".to_string()),
            ..ValidateConfig::default()
        };
        let result = resolve_pages(&config, None).await;
        assert!(matches!(result, Err(SegueError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_single_url_is_normalized() {
        let config = ValidateConfig {
            url: Some(" https://Example.com ".to_string()),
            ..ValidateConfig::default()
        };
        let pages = resolve_pages(&config, None).await.unwrap();
        assert_eq!(pages.urls, vec!["https://example.com/"]);
        assert_eq!(pages.source, "single url argument");
    }
}
