pub mod crawler;
pub mod error;
pub mod result;
pub mod scope;
pub mod sitemap;

pub use crawler::{Crawler, ProgressCallback, build_client};
pub use error::ScanError;
pub use result::PageFetch;
pub use sitemap::{Sitemap, SitemapReader, parse_sitemap};
