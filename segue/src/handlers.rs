use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use segue_core::config::ValidateConfig;
use segue_core::report::{ReportFormat, render, save_report};
use segue_core::{Config, PageSet, load_config, resolve_pages, run_validation};
use segue_scanner::ProgressCallback;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Split a comma-separated argument into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Config layer built from the `validate` arguments that were actually given.
pub fn validate_overrides(args: &ArgMatches) -> Value {
    let mut swup = Map::new();
    let mut validate = Map::new();

    if let Some(selectors) = args.get_one::<String>("containers") {
        swup.insert("containers".into(), json!(split_list(selectors)));
    }
    if let Some(selector) = args.get_one::<String>("animation-selector") {
        swup.insert("animationSelector".into(), json!(selector));
    }

    if let Some(url) = args.get_one::<String>("url") {
        validate.insert("url".into(), json!(url));
    }
    if args.get_flag("crawl") {
        validate.insert("crawl".into(), json!(true));
    }
    if let Some(sitemap) = args.get_one::<String>("sitemap") {
        validate.insert("sitemap".into(), json!(sitemap));
    }
    if let Some(limit) = args.get_one::<usize>("limit") {
        validate.insert("limit".into(), json!(limit));
    }
    if let Some(tests) = args.get_one::<String>("tests") {
        validate.insert("tests".into(), json!(split_list(tests)));
    }
    if let Some(styles) = args.get_one::<String>("styles") {
        validate.insert("styles".into(), json!(split_list(styles)));
    }
    if args.get_flag("parallel") {
        validate.insert("parallel".into(), json!(true));
    }
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        validate.insert("concurrency".into(), json!(concurrency));
    }
    if let Some(against) = args.get_one::<String>("against") {
        validate.insert("against".into(), json!(against));
    }
    if let Some(margin) = args.get_one::<u64>("wait-margin") {
        validate.insert("waitMargin".into(), json!(margin));
    }

    json!({ "swup": swup, "validate": validate })
}

/// Load the layered config for a `validate` invocation.
pub fn load_validate_config(args: &ArgMatches) -> Result<Config> {
    let path = args.get_one::<String>("config").map(String::as_str);
    let config = load_config(path, validate_overrides(args)).context("Failed to load configuration")?;
    Ok(config)
}

fn spinner(quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

fn progress_callback(pb: &Option<ProgressBar>, verb: &'static str) -> Option<ProgressCallback> {
    let pb = pb.clone()?;
    let callback: ProgressCallback = Arc::new(move |url: String| {
        pb.set_message(format!("{} {}", verb, url));
    });
    Some(callback)
}

pub async fn handle_validate(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let config = load_validate_config(args)?;
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_name(f))
        .unwrap_or(ReportFormat::Text);

    let pb = spinner(quiet)?;
    if let Some(pb) = &pb {
        pb.set_message("Collecting pages...");
    }

    let pages = resolve_pages(&config.validate, progress_callback(&pb, "Discovering"))
        .await
        .context("Failed to collect pages")?;

    if !quiet {
        eprintln!(
            "{} {} pages from {}",
            "→".bright_cyan(),
            pages.urls.len(),
            pages.source
        );
    }

    if let Some(pb) = &pb {
        pb.set_message("Launching browser...");
    }
    let report = run_validation(&config, pages, progress_callback(&pb, "Validating")).await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let report = report.context("Validation run failed")?;

    let rendered = render(&report, format).context("Failed to render report")?;
    match args.get_one::<String>("output") {
        Some(output) => {
            let expanded = shellexpand::tilde(output);
            let path = Path::new(&*expanded);
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!("{} Report saved to {}", "✓".green(), path.display());
            }
        }
        None => print!("{}", rendered),
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Crawl the site named by the `crawl` arguments.
pub async fn crawl_pages(args: &ArgMatches, progress: Option<ProgressCallback>) -> Result<PageSet> {
    let url = args
        .get_one::<Url>("url")
        .context("--url is required")?;
    let config = ValidateConfig {
        url: Some(url.to_string()),
        crawl: true,
        limit: args.get_one::<usize>("limit").copied().unwrap_or(0),
        max_connections: args
            .get_one::<usize>("max-connections")
            .copied()
            .unwrap_or(segue_scanner::crawler::DEFAULT_MAX_CONNECTIONS),
        ..ValidateConfig::default()
    };

    let pages = resolve_pages(&config, progress)
        .await
        .with_context(|| format!("Failed to crawl {}", url))?;
    Ok(pages)
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let pb = spinner(quiet)?;
    let pages = crawl_pages(args, progress_callback(&pb, "Crawling")).await;
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    let pages = pages?;

    for url in &pages.urls {
        println!("{}", url);
    }
    if !quiet {
        eprintln!("\n{} Crawl complete! {} pages found", "✓".green(), pages.urls.len());
    }

    Ok(ExitCode::SUCCESS)
}
