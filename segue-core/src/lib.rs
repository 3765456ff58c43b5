pub mod config;
pub mod error;
pub mod pages;
pub mod report;
pub mod run;

pub use config::{Config, SwupConfig, ValidateConfig, load_config, load_config_in};
pub use error::{Result, SegueError};
pub use pages::{PageSet, resolve_pages};
pub use report::{ReportFormat, format_json_report, format_report, save_report};
pub use run::{RunReport, run_validation, validate_with};
