use crate::error::{Result, ScanError};
use crate::result::PageFetch;
use crate::scope;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Anchors that navigate to another page. Download links are never pages.
const LINK_SELECTOR: &str = "a[href]:not([download])";

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// HTTP client shared by the crawler and the sitemap reader.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("Segue/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
        .pool_max_idle_per_host(DEFAULT_MAX_CONNECTIONS)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

pub struct Crawler {
    client: Client,
    max_connections: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout_secs)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            progress_callback: None,
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Discover every same-origin HTML page reachable from `seed`.
    ///
    /// Resolves once the frontier is empty and no fetch is in flight. Pages are
    /// returned in the order they were first discovered.
    pub async fn crawl(&self, seed: &str) -> Result<Vec<String>> {
        let base = scope::parse_valid_url(seed)
            .map(scope::strip_fragment)
            .ok_or_else(|| ScanError::InvalidUrl(seed.to_string()))?;

        info!(
            "Starting crawl of {} with {} connections",
            base, self.max_connections
        );

        let mut state = CrawlState::new(base.clone());
        let mut pending = FuturesUnordered::new();

        loop {
            while state.in_flight < self.max_connections {
                let Some(url) = state.frontier.pop_front() else {
                    break;
                };
                state.in_flight += 1;

                if let Some(ref callback) = self.progress_callback {
                    callback(url.to_string());
                }

                pending.push(async move {
                    let outcome = self.fetch_page(url.clone()).await;
                    (url, outcome)
                });
            }

            if state.is_drained() {
                break;
            }

            let Some((url, outcome)) = pending.next().await else {
                break;
            };
            state.in_flight -= 1;

            match outcome {
                Ok(fetch) if fetch.is_crawlable() => state.record(fetch),
                Ok(fetch) => {
                    debug!(
                        "Dropping {} (status: {}, content-type: {:?})",
                        url, fetch.status_code, fetch.content_type
                    );
                }
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                }
            }
        }

        info!("Crawl complete. Discovered {} pages", state.discovered.len());
        Ok(state.discovered)
    }

    /// Fetch one page and extract its links.
    ///
    /// Links are only extracted from successful HTML responses; the returned record
    /// still carries status and content type for everything else.
    pub async fn fetch_page(&self, url: Url) -> Result<PageFetch> {
        debug!("Fetching {}", url);

        let response = self.client.get(url.clone()).send().await?;

        let mut fetch = PageFetch::new(url);
        fetch.final_url = response.url().clone();
        fetch.status_code = response.status().as_u16();
        fetch.content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !fetch.is_crawlable() {
            return Ok(fetch);
        }

        let body = response.text().await?;
        fetch.links = extract_links(&body, &fetch.final_url)?;

        Ok(fetch)
    }
}

/// Pull every navigable link out of an HTML document, resolved against `page_url`.
pub fn extract_links(html: &str, page_url: &Url) -> Result<Vec<Url>> {
    let selector = Selector::parse(LINK_SELECTOR)
        .map_err(|e| ScanError::Other(format!("Invalid link selector: {:?}", e)))?;
    let document = Html::parse_document(html);

    let links = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| scope::resolve_link(page_url, href))
        .collect();

    Ok(links)
}

/// Frontier plus in-flight bookkeeping for a single crawl.
///
/// Owned by the task driving the crawl, so seen-set membership checks and inserts
/// never straddle an await point.
struct CrawlState {
    base: Url,
    frontier: VecDeque<Url>,
    seen: HashSet<String>,
    discovered: Vec<String>,
    in_flight: usize,
}

impl CrawlState {
    fn new(base: Url) -> Self {
        let mut state = Self {
            base: base.clone(),
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            discovered: Vec::new(),
            in_flight: 0,
        };
        state.enqueue(base);
        state
    }

    fn enqueue(&mut self, url: Url) -> bool {
        if self.seen.insert(url.to_string()) {
            self.frontier.push_back(url);
            true
        } else {
            false
        }
    }

    fn is_drained(&self) -> bool {
        self.frontier.is_empty() && self.in_flight == 0
    }

    fn record(&mut self, fetch: PageFetch) {
        debug!("Discovered {} ({} links)", fetch.url, fetch.links.len());
        self.discovered.push(fetch.url.to_string());

        for link in fetch.links {
            if !scope::is_same_origin(&link, &self.base) {
                debug!("  -> {} is cross-origin, skipping", link);
                continue;
            }
            if scope::is_asset_url(&link) {
                debug!("  -> {} is an asset, skipping", link);
                continue;
            }
            if self.enqueue(link.clone()) {
                debug!("  -> Queued {}", link);
            }
        }
    }
}
