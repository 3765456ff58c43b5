//! Sitemap loading and `<loc>` extraction.

use crate::error::{Result, ScanError};
use crate::scope;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Nested sitemap indexes deeper than this are ignored.
const MAX_INDEX_DEPTH: usize = 3;

/// Entries of one sitemap document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sitemap {
    /// `<url><loc>` entries of a urlset.
    pub urls: Vec<String>,
    /// `<sitemap><loc>` entries of a sitemap index.
    pub sitemaps: Vec<String>,
}

/// Whether a sitemap location should be fetched rather than read from disk.
pub fn is_remote(location: &str) -> bool {
    let location = location.trim_start();
    location.starts_with("http://") || location.starts_with("https://")
}

/// Extract `<loc>` entries from a urlset or sitemap index.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sitemap = Sitemap::default();
    let mut stack: Vec<String> = Vec::new();
    let mut loc = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&reader, e.local_name().as_ref())?;
                if name == "loc" {
                    loc.clear();
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                if name != "loc" {
                    continue;
                }
                let entry = loc.trim().to_string();
                if entry.is_empty() {
                    continue;
                }
                match stack.last().map(String::as_str) {
                    Some("url") => sitemap.urls.push(entry),
                    Some("sitemap") => sitemap.sitemaps.push(entry),
                    _ => debug!("Ignoring <loc> outside <url>/<sitemap>: {}", entry),
                }
            }
            Ok(Event::Text(e)) if in_loc(&stack) => {
                let text = e
                    .decode()
                    .map_err(|err| ScanError::SitemapError(format!("Decode error: {}", err)))?;
                loc.push_str(&text);
            }
            Ok(Event::CData(e)) if in_loc(&stack) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|err| ScanError::SitemapError(format!("Decode error: {}", err)))?;
                loc.push_str(&text);
            }
            Ok(Event::GeneralRef(e)) if in_loc(&stack) => {
                let entity = e
                    .decode()
                    .map_err(|err| ScanError::SitemapError(format!("Decode error: {}", err)))?;
                let raw = format!("&{};", entity);
                let resolved = quick_xml::escape::unescape(&raw)
                    .map_err(|err| ScanError::SitemapError(format!("Unescape error: {}", err)))?;
                loc.push_str(&resolved);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ScanError::SitemapError(format!(
                    "XML error at position {}: {}",
                    reader.error_position(),
                    err
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(ScanError::SitemapError(format!(
            "Unclosed <{}> element",
            stack.join("> <")
        )));
    }

    Ok(sitemap)
}

fn in_loc(stack: &[String]) -> bool {
    stack.last().is_some_and(|name| name == "loc")
}

fn local_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String> {
    let decoded = reader
        .decoder()
        .decode(raw)
        .map_err(|err| ScanError::SitemapError(format!("Decode error: {}", err)))?;
    Ok(decoded.to_ascii_lowercase())
}

/// Reads sitemaps from disk or over HTTP and flattens sitemap indexes.
pub struct SitemapReader {
    client: Client,
}

impl SitemapReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Load the sitemap at `location` and return its page URLs in document order.
    ///
    /// Index children are followed depth first. Entries that are not absolute
    /// http(s) URLs are dropped.
    pub async fn load(&self, location: &str) -> Result<Vec<String>> {
        info!("Loading sitemap {}", location);

        let mut urls = Vec::new();
        let mut visited = HashSet::new();
        let mut pending: Vec<(String, usize)> = vec![(location.trim().to_string(), 0)];

        while let Some((location, depth)) = pending.pop() {
            if !visited.insert(location.clone()) {
                continue;
            }

            let xml = self.read(&location).await?;
            let sitemap = parse_sitemap(&xml)?;
            let parent = Url::parse(&location).ok();

            for entry in sitemap.urls {
                match absolutize(&entry, parent.as_ref()) {
                    Some(url) => urls.push(url.to_string()),
                    None => warn!("Skipping invalid sitemap entry '{}'", entry),
                }
            }

            if depth >= MAX_INDEX_DEPTH {
                if !sitemap.sitemaps.is_empty() {
                    warn!("Sitemap index nesting too deep at {}, ignoring children", location);
                }
                continue;
            }

            // Reversed so that children are processed in document order.
            for child in sitemap.sitemaps.iter().rev() {
                match absolutize(child, parent.as_ref()) {
                    Some(url) => pending.push((url.to_string(), depth + 1)),
                    None => warn!("Skipping invalid child sitemap '{}'", child),
                }
            }
        }

        info!("Sitemap lists {} pages", urls.len());
        Ok(urls)
    }

    async fn read(&self, location: &str) -> Result<String> {
        if is_remote(location) {
            debug!("Fetching sitemap {}", location);
            let response = self.client.get(location).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ScanError::BadStatus {
                    url: location.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response.text().await?)
        } else {
            let expanded = shellexpand::tilde(location);
            let path = Path::new(expanded.as_ref());
            debug!("Reading sitemap file {}", path.display());
            tokio::fs::read_to_string(path).await.map_err(|e| {
                ScanError::SitemapError(format!("Failed to read {}: {}", path.display(), e))
            })
        }
    }
}

fn absolutize(entry: &str, parent: Option<&Url>) -> Option<Url> {
    let url = match parent {
        Some(parent) => parent.join(entry.trim()).ok()?,
        None => Url::parse(entry.trim()).ok()?,
    };
    scope::is_valid_url(&url).then_some(url)
}
