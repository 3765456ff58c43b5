//! Per-page transition validation
//!
//! A page goes through up to three checks: the container count, the animation
//! duration probe and the style-change probe. Each failing check produces one
//! [`ValidationError`]; checks never abort validation of other pages.

use crate::error::BrowserError;
use crate::inspector::{ClassMutation, StyleInspector, StyleSnapshot, parse_css_time};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const INCORRECT_CONTAINERS: &str = "Incorrect number of containers";
pub const ELEMENT_NOT_FOUND: &str = "Element not found";
pub const MISSING_DURATION: &str = "Missing animation duration";
pub const STYLES_NOT_FOUND: &str = "Styles not found";
pub const STYLES_NOT_CHANGED: &str = "Styles not changed";
pub const INSPECTION_FAILED: &str = "Page inspection failed";
pub const LOAD_FAILED: &str = "Page failed to load";

/// One failed check on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub text: String,
    pub expected: String,
    pub received: String,
    pub page: String,
}

impl ValidationError {
    pub fn new(
        text: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
        page: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            expected: expected.into(),
            received: received.into(),
            page: page.into(),
        }
    }

    pub fn page_load_failed(page: &str, reason: impl Into<String>) -> Self {
        Self::new(LOAD_FAILED, "page to load", reason, page)
    }

    fn inspection_failed(page: &str, error: &BrowserError) -> Self {
        Self::new(INSPECTION_FAILED, "readable computed styles", error.to_string(), page)
    }
}

/// The checks a validation run can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    Containers,
    TransitionDuration,
    TransitionStyles,
}

impl TestKind {
    pub const ALL: [TestKind; 3] = [
        TestKind::Containers,
        TestKind::TransitionDuration,
        TestKind::TransitionStyles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestKind::Containers => "containers",
            TestKind::TransitionDuration => "transition-duration",
            TestKind::TransitionStyles => "transition-styles",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the validator needs to know about the site under test.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    pub tests: Vec<TestKind>,
    pub containers: Vec<String>,
    pub expected_containers: usize,
    pub animation_selector: String,
    pub styles: Vec<String>,
    pub marker_class: String,
    pub trigger_class: String,
    pub wait_margin: Duration,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            tests: TestKind::ALL.to_vec(),
            containers: vec!["#swup".to_string()],
            expected_containers: 1,
            animation_selector: r#"[class*="transition-"]"#.to_string(),
            styles: vec!["opacity".to_string(), "transform".to_string()],
            marker_class: "is-changing".to_string(),
            trigger_class: "is-animating".to_string(),
            wait_margin: Duration::from_millis(100),
        }
    }
}

impl ValidatorOptions {
    pub fn runs(&self, kind: TestKind) -> bool {
        self.tests.contains(&kind)
    }
}

/// Measured animation timing of the animated element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationProbe {
    pub transition: String,
    pub animation: String,
    pub longest: Duration,
}

impl DurationProbe {
    fn describe(&self) -> String {
        let show = |v: &str| if v.is_empty() { "none".to_string() } else { v.to_string() };
        format!(
            "transition-duration: {}; animation-duration: {}",
            show(&self.transition),
            show(&self.animation)
        )
    }
}

/// Run every configured check against an open page.
pub async fn validate_page<P>(page: &P, url: &str, options: &ValidatorOptions) -> Vec<ValidationError>
where
    P: StyleInspector + ?Sized,
{
    let mut errors = Vec::new();

    if options.runs(TestKind::Containers) {
        match check_containers(page, url, options).await {
            Ok(Some(error)) => errors.push(error),
            Ok(None) => {}
            Err(e) => errors.push(ValidationError::inspection_failed(url, &e)),
        }
    }

    if options.runs(TestKind::TransitionDuration) || options.runs(TestKind::TransitionStyles) {
        if let Err(e) = check_animation(page, url, options, &mut errors).await {
            errors.push(ValidationError::inspection_failed(url, &e));
        }
    }

    debug!("{} finished with {} error(s)", url, errors.len());
    errors
}

/// Compare the number of container matches against the expected count.
pub async fn check_containers<P>(
    page: &P,
    url: &str,
    options: &ValidatorOptions,
) -> Result<Option<ValidationError>, BrowserError>
where
    P: StyleInspector + ?Sized,
{
    if options.containers.is_empty() {
        return Ok(None);
    }

    let received = page.count_elements(&options.containers.join(", ")).await?;
    if received == options.expected_containers {
        return Ok(None);
    }

    Ok(Some(ValidationError::new(
        INCORRECT_CONTAINERS,
        options.expected_containers.to_string(),
        received.to_string(),
        url,
    )))
}

async fn check_animation<P>(
    page: &P,
    url: &str,
    options: &ValidatorOptions,
    errors: &mut Vec<ValidationError>,
) -> Result<(), BrowserError>
where
    P: StyleInspector + ?Sized,
{
    let selector = &options.animation_selector;
    if !page.element_exists(selector).await? {
        errors.push(ValidationError::new(
            ELEMENT_NOT_FOUND,
            format!("element matching {}", selector),
            "no matching element",
            url,
        ));
        return Ok(());
    }

    let probe = measure_duration(page, options).await?;
    debug!("{} animation duration {:?}", url, probe.longest);

    if options.runs(TestKind::TransitionDuration) && probe.longest.is_zero() {
        errors.push(ValidationError::new(
            MISSING_DURATION,
            "duration greater than 0s",
            probe.describe(),
            url,
        ));
    }

    if options.runs(TestKind::TransitionStyles)
        && let Some(error) = check_style_change(page, url, options, probe.longest).await?
    {
        errors.push(error);
    }

    Ok(())
}

/// Read both duration properties with the marker class applied.
///
/// Only the first element matching the animation selector is read; further matches
/// with a zero duration go unnoticed.
pub async fn measure_duration<P>(page: &P, options: &ValidatorOptions) -> Result<DurationProbe, BrowserError>
where
    P: StyleInspector + ?Sized,
{
    let selector = &options.animation_selector;

    page.mutate_class(&options.marker_class, ClassMutation::Add).await?;
    let transition = page.read_property(selector, "transition-duration").await?;
    let animation = page.read_property(selector, "animation-duration").await?;
    page.mutate_class(&options.marker_class, ClassMutation::Remove).await?;

    let longest = parse_css_time(&transition).max(parse_css_time(&animation));
    Ok(DurationProbe {
        transition,
        animation,
        longest,
    })
}

/// Toggle the trigger class and check that at least one configured property changed.
///
/// Waits `duration` plus the configured margin between the two snapshots. As with
/// [`measure_duration`], only the first element matching the animation selector is
/// compared.
pub async fn check_style_change<P>(
    page: &P,
    url: &str,
    options: &ValidatorOptions,
    duration: Duration,
) -> Result<Option<ValidationError>, BrowserError>
where
    P: StyleInspector + ?Sized,
{
    let selector = &options.animation_selector;

    page.mutate_class(&options.marker_class, ClassMutation::Add).await?;
    let before = page.read_properties(selector, &options.styles).await?;
    page.mutate_class(&options.trigger_class, ClassMutation::Add).await?;

    tokio::time::sleep(duration + options.wait_margin).await;

    let after = page.read_properties(selector, &options.styles).await?;
    page.mutate_class(&options.trigger_class, ClassMutation::Remove).await?;
    page.mutate_class(&options.marker_class, ClassMutation::Remove).await?;

    Ok(compare_snapshots(url, &options.styles, &before, &after))
}

/// Decide the outcome of a style-change probe from its two snapshots.
pub fn compare_snapshots(
    url: &str,
    styles: &[String],
    before: &StyleSnapshot,
    after: &StyleSnapshot,
) -> Option<ValidationError> {
    if before.is_empty() && after.is_empty() {
        return Some(ValidationError::new(
            STYLES_NOT_FOUND,
            format!("computed values for {}", styles.join(", ")),
            "none",
            url,
        ));
    }

    let changed = styles
        .iter()
        .any(|property| before.get(property) != after.get(property));
    if changed {
        return None;
    }

    let unchanged: StyleSnapshot = styles
        .iter()
        .filter_map(|property| {
            before
                .get(property)
                .map(|value| (property.clone(), value.to_string()))
        })
        .collect();

    Some(ValidationError::new(
        STYLES_NOT_CHANGED,
        format!("change in at least one of {}", styles.join(", ")),
        format!("unchanged {}", unchanged.describe()),
        url,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> StyleSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn styles() -> Vec<String> {
        vec!["opacity".to_string(), "transform".to_string()]
    }

    #[test]
    fn test_identical_snapshots_fail() {
        let before = snapshot(&[("opacity", "1"), ("transform", "none")]);
        let error = compare_snapshots("https://a.test/", &styles(), &before, &before.clone()).unwrap();
        assert_eq!(error.text, STYLES_NOT_CHANGED);
        assert!(error.received.contains("opacity: 1"));
        assert!(error.received.contains("transform: none"));
    }

    #[test]
    fn test_one_changed_property_passes() {
        let before = snapshot(&[("opacity", "1"), ("transform", "none")]);
        let after = snapshot(&[("opacity", "0"), ("transform", "none")]);
        assert!(compare_snapshots("https://a.test/", &styles(), &before, &after).is_none());
    }

    #[test]
    fn test_empty_snapshots_report_missing_styles() {
        let empty = StyleSnapshot::new();
        let error = compare_snapshots("https://a.test/", &styles(), &empty, &empty).unwrap();
        assert_eq!(error.text, STYLES_NOT_FOUND);
        assert_eq!(error.page, "https://a.test/");
    }

    #[test]
    fn test_property_appearing_counts_as_change() {
        let before = StyleSnapshot::new();
        let after = snapshot(&[("opacity", "0")]);
        assert!(compare_snapshots("https://a.test/", &styles(), &before, &after).is_none());
    }

    #[test]
    fn test_test_kind_names() {
        for kind in TestKind::ALL {
            assert_eq!(TestKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(TestKind::from_name("all"), None);
        assert_eq!(TestKind::TransitionStyles.to_string(), "transition-styles");
    }

    #[test]
    fn test_validation_error_serializes_all_fields() {
        let error = ValidationError::new(INCORRECT_CONTAINERS, "1", "2", "https://a.test/");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["text"], "Incorrect number of containers");
        assert_eq!(json["expected"], "1");
        assert_eq!(json["received"], "2");
        assert_eq!(json["page"], "https://a.test/");
    }
}
