pub mod browser;
pub mod error;
pub mod inspector;
pub mod validator;

pub use browser::{BrowserConfig, BrowserSession, PageHandle, PageOpener};
pub use error::{BrowserError, Result};
pub use inspector::{ClassMutation, StyleInspector, StyleSnapshot, parse_css_time};
pub use validator::{TestKind, ValidationError, ValidatorOptions, validate_page};
