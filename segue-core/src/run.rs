//! A complete validation run: browser launch, expected container count, per-page
//! validation and teardown.

use crate::config::Config;
use crate::error::Result;
use crate::pages::PageSet;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use segue_browser::{
    BrowserSession, PageOpener, StyleInspector, ValidationError, ValidatorOptions,
    validate_page,
};
use segue_scanner::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Outcome of validating a page set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pages: Vec<String>,
    pub errors: Vec<ValidationError>,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of distinct pages with at least one error.
    pub fn failed_pages(&self) -> usize {
        self.errors
            .iter()
            .map(|error| error.page.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Launch a browser, validate every page and tear the browser down.
///
/// The browser is closed before any error is returned.
pub async fn run_validation(
    config: &Config,
    pages: PageSet,
    progress: Option<ProgressCallback>,
) -> Result<RunReport> {
    // Reject bad test names before paying for a browser launch.
    config.test_kinds()?;

    let session = BrowserSession::launch().await?;
    let result = validate_with(&session, config, pages, progress).await;
    session.close().await;
    result
}

/// Validate a page set using pages from `opener`.
pub async fn validate_with<O: PageOpener>(
    opener: &O,
    config: &Config,
    pages: PageSet,
    progress: Option<ProgressCallback>,
) -> Result<RunReport> {
    let started_at = Utc::now();

    let expected = expected_container_count(opener, config).await?;
    let options = config.validator_options(expected)?;
    info!(
        "Validating {} pages (expecting {} container(s), tests: {:?})",
        pages.urls.len(),
        expected,
        options.tests
    );

    let concurrency = if config.validate.parallel {
        config.validate.concurrency.max(1)
    } else {
        1
    };
    let errors = validate_pages(opener, &pages.urls, &options, concurrency, progress).await;

    Ok(RunReport {
        pages: pages.urls,
        errors,
        source: pages.source,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Number of containers every page must have.
///
/// Without a reference page this is the number of configured container selectors;
/// with `validate.against` it is the count measured on that page.
pub async fn expected_container_count<O: PageOpener>(opener: &O, config: &Config) -> Result<usize> {
    let Some(reference) = config.validate.against.as_deref() else {
        return Ok(config.swup.containers.len());
    };

    let page = opener.open_page(reference).await?;
    let count = page.count_elements(&config.swup.containers.join(", ")).await;
    opener.close_page(page).await;

    let count = count?;
    info!("Reference page {} has {} container(s)", reference, count);
    Ok(count)
}

/// Validate `urls` with at most `concurrency` pages open at once. Errors are
/// returned in page order regardless of completion order.
pub async fn validate_pages<O: PageOpener>(
    opener: &O,
    urls: &[String],
    options: &ValidatorOptions,
    concurrency: usize,
    progress: Option<ProgressCallback>,
) -> Vec<ValidationError> {
    let per_page: Vec<Vec<ValidationError>> = stream::iter(urls)
        .map(|url| {
            if let Some(callback) = &progress {
                callback(url.clone());
            }
            validate_url(opener, url, options)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    per_page.into_iter().flatten().collect()
}

async fn validate_url<O: PageOpener>(
    opener: &O,
    url: &str,
    options: &ValidatorOptions,
) -> Vec<ValidationError> {
    let page = match opener.open_page(url).await {
        Ok(page) => page,
        Err(e) => {
            debug!("{} failed to load: {}", url, e);
            return vec![ValidationError::page_load_failed(url, e.to_string())];
        }
    };

    let errors = validate_page(&page, url, options).await;
    opener.close_page(page).await;
    errors
}
