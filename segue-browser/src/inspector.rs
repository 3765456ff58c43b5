//! Computed-style inspection of live pages
//!
//! Every read runs a small script inside the page. Selectors and property names are
//! embedded as JSON string literals, and results come back as primitives; snapshots
//! cross the boundary as a JSON-encoded string.

use crate::browser::PageHandle;
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Whether a class is added to or removed from the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassMutation {
    Add,
    Remove,
}

impl ClassMutation {
    fn method(self) -> &'static str {
        match self {
            ClassMutation::Add => "add",
            ClassMutation::Remove => "remove",
        }
    }
}

/// Computed values of a set of CSS properties on one element at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSnapshot {
    values: BTreeMap<String, String>,
}

impl StyleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.values.insert(property.into(), value.into());
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Decode the JSON object produced by the in-page snapshot script.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, Value> = serde_json::from_str(raw)
            .map_err(|e| BrowserError::UnexpectedResult(format!("style snapshot: {}", e)))?;

        let values = parsed
            .into_iter()
            .filter_map(|(property, value)| match value {
                Value::String(s) if !s.is_empty() => Some((property, s)),
                _ => None,
            })
            .collect();

        Ok(Self { values })
    }

    /// Render as `prop: value` pairs for error reports.
    pub fn describe(&self) -> String {
        if self.values.is_empty() {
            return "none".to_string();
        }
        self.iter()
            .map(|(property, value)| format!("{}: {}", property, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl FromIterator<(String, String)> for StyleSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Reads computed styles from a live page and toggles classes on its root element.
///
/// Each call is one round trip into the page's rendering context.
#[async_trait]
pub trait StyleInspector: Send + Sync {
    /// Number of elements matching `selector`.
    async fn count_elements(&self, selector: &str) -> Result<usize>;

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        Ok(self.count_elements(selector).await? > 0)
    }

    /// Computed value of `property` on the first match, or an empty string when
    /// nothing matches.
    async fn read_property(&self, selector: &str, property: &str) -> Result<String>;

    /// Computed values of `properties` on the first match. Properties with an empty
    /// computed value are omitted.
    async fn read_properties(&self, selector: &str, properties: &[String]) -> Result<StyleSnapshot>;

    /// Add or remove `class_name` on `document.documentElement`. A class name the DOM
    /// rejects, such as one containing whitespace, is an error.
    async fn mutate_class(&self, class_name: &str, mutation: ClassMutation) -> Result<()>;
}

fn js_string(value: &str) -> String {
    Value::from(value).to_string()
}

fn js_string_array(values: &[String]) -> String {
    Value::from(values.to_vec()).to_string()
}

pub(crate) fn count_script(selector: &str) -> String {
    format!(
        "(() => document.querySelectorAll({}).length)()",
        js_string(selector)
    )
}

pub(crate) fn property_script(selector: &str, property: &str) -> String {
    format!(
        "(() => {{ \
            const el = document.querySelector({sel}); \
            if (!el) return ''; \
            return window.getComputedStyle(el).getPropertyValue({prop}); \
        }})()",
        sel = js_string(selector),
        prop = js_string(property),
    )
}

pub(crate) fn snapshot_script(selector: &str, properties: &[String]) -> String {
    format!(
        "(() => {{ \
            const el = document.querySelector({sel}); \
            const out = {{}}; \
            if (el) {{ \
                const style = window.getComputedStyle(el); \
                for (const prop of {props}) {{ \
                    const value = style.getPropertyValue(prop); \
                    if (value) out[prop] = value; \
                }} \
            }} \
            return JSON.stringify(out); \
        }})()",
        sel = js_string(selector),
        props = js_string_array(properties),
    )
}

pub(crate) fn class_script(class_name: &str, mutation: ClassMutation) -> String {
    format!(
        "(() => {{ document.documentElement.classList.{}({}); return true; }})()",
        mutation.method(),
        js_string(class_name)
    )
}

/// Parse a computed time list such as `0.3s`, `300ms` or `0s, 0.5s` and return the
/// longest entry. Unparsable entries count as zero.
pub fn parse_css_time(value: &str) -> Duration {
    value
        .split(',')
        .map(|entry| parse_single_time(entry.trim()))
        .max()
        .unwrap_or(Duration::ZERO)
}

fn parse_single_time(entry: &str) -> Duration {
    let seconds = if let Some(ms) = entry.strip_suffix("ms") {
        ms.trim().parse::<f64>().map(|v| v / 1000.0)
    } else if let Some(s) = entry.strip_suffix('s') {
        s.trim().parse::<f64>()
    } else {
        return Duration::ZERO;
    };

    match seconds {
        Ok(secs) if secs.is_finite() && secs > 0.0 => {
            Duration::from_micros((secs * 1_000_000.0).round() as u64)
        }
        _ => Duration::ZERO,
    }
}

#[async_trait]
impl StyleInspector for PageHandle {
    async fn count_elements(&self, selector: &str) -> Result<usize> {
        let value = self.evaluate(count_script(selector)).await?;
        let count = value
            .as_u64()
            .ok_or_else(|| BrowserError::UnexpectedResult(format!("count of {}: {}", selector, value)))?;
        debug!("{} matches {} element(s) on {}", selector, count, self.url());
        Ok(count as usize)
    }

    async fn read_property(&self, selector: &str, property: &str) -> Result<String> {
        match self.evaluate(property_script(selector, property)).await? {
            Value::String(s) => Ok(s),
            other => Err(BrowserError::UnexpectedResult(format!(
                "{} of {}: {}",
                property, selector, other
            ))),
        }
    }

    async fn read_properties(&self, selector: &str, properties: &[String]) -> Result<StyleSnapshot> {
        match self.evaluate(snapshot_script(selector, properties)).await? {
            Value::String(raw) => StyleSnapshot::from_json(&raw),
            other => Err(BrowserError::UnexpectedResult(format!(
                "snapshot of {}: {}",
                selector, other
            ))),
        }
    }

    async fn mutate_class(&self, class_name: &str, mutation: ClassMutation) -> Result<()> {
        debug!("{:?} class {} on {}", mutation, class_name, self.url());
        match self.evaluate(class_script(class_name, mutation)).await? {
            Value::Bool(true) => Ok(()),
            other => Err(BrowserError::UnexpectedResult(format!(
                "{:?} class {}: {}",
                mutation, class_name, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_css_time_units() {
        assert_eq!(parse_css_time("0.3s"), Duration::from_millis(300));
        assert_eq!(parse_css_time("300ms"), Duration::from_millis(300));
        assert_eq!(parse_css_time("0s"), Duration::ZERO);
        assert_eq!(parse_css_time(""), Duration::ZERO);
    }

    #[test]
    fn test_parse_css_time_takes_longest_entry() {
        assert_eq!(parse_css_time("0s, 0.5s"), Duration::from_millis(500));
        assert_eq!(parse_css_time("200ms, 0.1s, garbage"), Duration::from_millis(200));
    }

    #[test]
    fn test_parse_css_time_rejects_nonsense() {
        assert_eq!(parse_css_time("auto"), Duration::ZERO);
        assert_eq!(parse_css_time("-1s"), Duration::ZERO);
        assert_eq!(parse_css_time("NaNs"), Duration::ZERO);
    }

    #[test]
    fn test_scripts_embed_quoted_literals() {
        let script = count_script(r#"a[href="x"], .it's"#);
        assert!(script.contains(r#""a[href=\"x\"], .it's""#));

        let script = snapshot_script("#swup", &["opacity".to_string(), "transform".to_string()]);
        assert!(script.contains(r#"["opacity","transform"]"#));
        assert!(script.contains("JSON.stringify(out)"));

        let script = class_script("is-animating", ClassMutation::Remove);
        assert!(script.contains(r#"classList.remove("is-animating")"#));
    }

    #[test]
    fn test_snapshot_from_json_drops_empty_values() {
        let snapshot = StyleSnapshot::from_json(r#"{"opacity":"1","transform":"","color":null}"#).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("opacity"), Some("1"));
        assert_eq!(snapshot.get("transform"), None);
    }

    #[test]
    fn test_snapshot_from_json_rejects_garbage() {
        assert!(matches!(
            StyleSnapshot::from_json("not json"),
            Err(BrowserError::UnexpectedResult(_))
        ));
    }

    #[test]
    fn test_snapshot_describe() {
        let mut snapshot = StyleSnapshot::new();
        assert_eq!(snapshot.describe(), "none");
        snapshot.insert("transform", "none");
        snapshot.insert("opacity", "0");
        assert_eq!(snapshot.describe(), "opacity: 0; transform: none");
    }
}
