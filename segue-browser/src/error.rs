//! Browser automation error types
//!
//! Messages carry the operation that failed and, where there is one, the URL or
//! selector involved. The protocol client reports failures as opaque errors, so they
//! are flattened into strings at the boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open tab: {0}")]
    Tab(String),

    #[error("Failed to navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Unexpected script result: {0}")]
    UnexpectedResult(String),

    #[error("Browser task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
