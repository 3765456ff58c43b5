use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("segue")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("segue")
        .about("Validate page transitions on swup-powered sites")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("validate")
                .about(
                    "Visit pages in a headless browser and check containers, animation \
                durations and style changes",
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Config file (default: segue.config.json, .seguerc, .seguerc.json or package.json)"),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Validate a single URL, or the crawl seed with --crawl"),
                )
                .arg(
                    arg!(--"crawl")
                        .required(false)
                        .help("Crawl the site from --url and validate every page found")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-m --"sitemap" <LOCATION>)
                        .required(false)
                        .help("Sitemap to read pages from (file path or URL)"),
                )
                .arg(
                    arg!(-l --"limit" <NUM_PAGES>)
                        .required(false)
                        .help("Validate at most this many pages (0 for no limit)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"tests" <TESTS>)
                        .required(false)
                        .help("Comma-separated tests: all, containers, transition-duration, transition-styles"),
                )
                .arg(
                    arg!(-o --"containers" <SELECTORS>)
                        .required(false)
                        .help("Comma-separated container selectors"),
                )
                .arg(
                    arg!(-s --"styles" <PROPERTIES>)
                        .required(false)
                        .help("Comma-separated CSS properties expected to change"),
                )
                .arg(
                    arg!(--"animation-selector" <SELECTOR>)
                        .required(false)
                        .help("Selector of the animated element"),
                )
                .arg(
                    arg!(-a --"parallel")
                        .required(false)
                        .help("Validate several pages at once")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"concurrency" <NUM_PAGES>)
                        .required(false)
                        .help("Pages open at once with --parallel (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"against" <URL>)
                        .required(false)
                        .help("Reference page whose container count every page must match"),
                )
                .arg(
                    arg!(--"wait-margin" <MS>)
                        .required(false)
                        .help("Milliseconds to wait beyond the measured animation duration (default: 100)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a site and list every internal HTML page")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The URL to start crawling from")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"max-connections" <NUM>)
                        .required(false)
                        .help("Maximum number of requests in flight")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(-l --"limit" <NUM_PAGES>)
                        .required(false)
                        .help("List at most this many pages (0 for no limit)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                ),
        )
}
