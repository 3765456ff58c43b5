//! Layered configuration
//!
//! Defaults, then command-line overrides, then a config file. Layers are merged as
//! `serde_json::Value` trees before being decoded into [`Config`]: objects merge key
//! by key, every other value (arrays included) is replaced wholesale.

use crate::error::{Result, SegueError};
use segue_browser::{TestKind, ValidatorOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Files searched in the working directory when no config path is given.
pub const CONFIG_FILE_NAMES: &[&str] = &["segue.config.json", ".seguerc", ".seguerc.json"];

/// Key holding the config inside `package.json`.
pub const PACKAGE_JSON_KEY: &str = "segue";

const ALL_TESTS: &str = "all";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub swup: SwupConfig,
    pub validate: ValidateConfig,
}

/// How the site under test is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwupConfig {
    pub animation_selector: String,
    pub containers: Vec<String>,
}

impl Default for SwupConfig {
    fn default() -> Self {
        Self {
            animation_selector: r#"[class*="transition-"]"#.to_string(),
            containers: vec!["#swup".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub crawl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<String>,
    /// Maximum number of pages to validate; 0 means no limit.
    pub limit: usize,
    pub tests: Vec<String>,
    pub parallel: bool,
    pub concurrency: usize,
    pub styles: Vec<String>,
    /// Reference page whose container count is the expected count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub against: Option<String>,
    pub marker_class: String,
    pub trigger_class: String,
    /// Milliseconds added to the measured duration before the second snapshot.
    pub wait_margin: u64,
    pub max_connections: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            url: None,
            crawl: false,
            sitemap: None,
            limit: 0,
            tests: vec![ALL_TESTS.to_string()],
            parallel: false,
            concurrency: 5,
            styles: vec!["opacity".to_string(), "transform".to_string()],
            against: None,
            marker_class: "is-changing".to_string(),
            trigger_class: "is-animating".to_string(),
            wait_margin: 100,
            max_connections: segue_scanner::crawler::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Config {
    /// Merge an override layer and then a config file layer on top of the defaults.
    /// Values from the file win over overrides.
    pub fn from_layers(file: Option<Value>, overrides: Value) -> Result<Self> {
        let mut merged = serde_json::to_value(Config::default())
            .map_err(|e| SegueError::InvalidConfig(e.to_string()))?;

        for mut layer in std::iter::once(overrides).chain(file) {
            if !layer.is_object() && !layer.is_null() {
                return Err(SegueError::InvalidConfig(
                    "configuration must be a JSON object".to_string(),
                ));
            }
            normalize_aliases(&mut layer);
            merge_values(&mut merged, layer);
        }

        let config: Config = serde_json::from_value(merged)
            .map_err(|e| SegueError::InvalidConfig(e.to_string()))?;
        config.test_kinds()?;
        Ok(config)
    }

    /// Expand the configured test names, `all` standing for every test.
    pub fn test_kinds(&self) -> Result<Vec<TestKind>> {
        let mut kinds = Vec::new();
        for name in &self.validate.tests {
            let name = name.trim();
            let expanded: Vec<TestKind> = if name == ALL_TESTS {
                TestKind::ALL.to_vec()
            } else {
                let kind = TestKind::from_name(name).ok_or_else(|| SegueError::UnknownTest {
                    name: name.to_string(),
                    accepted: accepted_test_names(),
                })?;
                vec![kind]
            };
            for kind in expanded {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        Ok(kinds)
    }

    /// Build validator options for a run whose expected container count is known.
    pub fn validator_options(&self, expected_containers: usize) -> Result<ValidatorOptions> {
        Ok(ValidatorOptions {
            tests: self.test_kinds()?,
            containers: self.swup.containers.clone(),
            expected_containers,
            animation_selector: self.swup.animation_selector.clone(),
            styles: self.validate.styles.clone(),
            marker_class: self.validate.marker_class.clone(),
            trigger_class: self.validate.trigger_class.clone(),
            wait_margin: Duration::from_millis(self.validate.wait_margin),
        })
    }
}

fn accepted_test_names() -> String {
    std::iter::once(ALL_TESTS)
        .chain(TestKind::ALL.iter().map(|kind| kind.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; anything else in
/// the overlay, arrays included, replaces the base value. A null overlay is a no-op.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Rewrite legacy key names in the `validate` section to their current names.
/// When both spellings are present the current one wins.
pub fn normalize_aliases(value: &mut Value) {
    const ALIASES: &[(&str, &str)] = &[
        ("stylesExpectedToChange", "styles"),
        ("asynchronous", "parallel"),
    ];

    let Some(validate) = value.get_mut("validate").and_then(Value::as_object_mut) else {
        return;
    };

    for (alias, name) in ALIASES {
        if let Some(aliased) = validate.remove(*alias)
            && !validate.contains_key(*name)
        {
            validate.insert(name.to_string(), aliased);
        }
    }
}

/// Locate a config file in `dir`. `package.json` counts only when it has a
/// `segue` key.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    for name in CONFIG_FILE_NAMES {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let package_json = dir.join("package.json");
    let contents = std::fs::read_to_string(&package_json).ok()?;
    let value: Value = serde_json::from_str(&contents).ok()?;
    value.get(PACKAGE_JSON_KEY).map(|_| package_json)
}

/// Read one config file into a JSON tree. For `package.json` only the `segue`
/// key is returned.
pub fn read_config_file(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).map_err(|source| SegueError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|source| SegueError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    if path.file_name().is_some_and(|name| name == "package.json") {
        return Ok(value
            .get(PACKAGE_JSON_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())));
    }
    Ok(value)
}

/// Load the configuration for a run started in `dir`.
///
/// An explicit `path` must be readable; without one the directory is searched and
/// a missing file means defaults.
pub fn load_config_in(dir: &Path, path: Option<&str>, overrides: Value) -> Result<Config> {
    let file = match path {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            let path = dir.join(&*expanded);
            Some(read_config_file(&path)?)
        }
        None => match find_config_file(dir) {
            Some(found) => {
                debug!("Using config file {}", found.display());
                Some(read_config_file(&found)?)
            }
            None => {
                debug!("No config file found in {}", dir.display());
                None
            }
        },
    };

    Config::from_layers(file, overrides)
}

/// Load the configuration for a run started in the current directory.
pub fn load_config(path: Option<&str>, overrides: Value) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    load_config_in(&cwd, path, overrides)
}
