use segue::commands::command_argument_builder;
use segue::handlers::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn validate_args(args: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["segue", "validate"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .expect("arguments should parse");
    matches
        .subcommand_matches("validate")
        .expect("validate subcommand")
        .clone()
}

#[test]
fn test_split_list_trims_and_drops_empty_items() {
    assert_eq!(split_list("opacity, transform"), vec!["opacity", "transform"]);
    assert_eq!(split_list(" #swup ,, #nav,"), vec!["#swup", "#nav"]);
    assert!(split_list("").is_empty());
}

#[test]
fn test_overrides_only_include_given_arguments() {
    let args = validate_args(&[]);
    assert_eq!(validate_overrides(&args), json!({"swup": {}, "validate": {}}));
}

#[test]
fn test_overrides_map_arguments_to_config_keys() {
    let args = validate_args(&[
        "-u",
        "https://site.test/",
        "--crawl",
        "-l",
        "5",
        "-t",
        "containers,transition-styles",
        "-o",
        "#swup, #menu",
        "-s",
        "opacity",
        "--animation-selector",
        ".fade",
        "-a",
        "--concurrency",
        "3",
        "--against",
        "https://site.test/ref",
        "--wait-margin",
        "250",
    ]);

    assert_eq!(
        validate_overrides(&args),
        json!({
            "swup": {"containers": ["#swup", "#menu"], "animationSelector": ".fade"},
            "validate": {
                "url": "https://site.test/",
                "crawl": true,
                "limit": 5,
                "tests": ["containers", "transition-styles"],
                "styles": ["opacity"],
                "parallel": true,
                "concurrency": 3,
                "against": "https://site.test/ref",
                "waitMargin": 250
            }
        })
    );
}

#[test]
fn test_config_file_is_layered_over_arguments() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("site.json");
    std::fs::write(
        &path,
        r##"{"swup": {"containers": ["#a"]}, "validate": {"sitemap": "public/sitemap.xml", "limit": 9}}"##,
    )
    .unwrap();

    let args = validate_args(&["-c", path.to_str().unwrap(), "-l", "2", "--concurrency", "3"]);
    let config = load_validate_config(&args).unwrap();

    assert_eq!(config.swup.containers, vec!["#a"]);
    assert_eq!(config.validate.sitemap.as_deref(), Some("public/sitemap.xml"));
    assert_eq!(config.validate.limit, 9);
    assert_eq!(config.validate.concurrency, 3);
}

#[test]
fn test_unknown_format_is_rejected() {
    let result = command_argument_builder().try_get_matches_from(["segue", "validate", "-f", "xml"]);
    assert!(result.is_err());
}

#[test]
fn test_crawl_requires_url() {
    let result = command_argument_builder().try_get_matches_from(["segue", "crawl"]);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_validate_rejects_unknown_test_before_launch() {
    let args = validate_args(&["-u", "https://site.test/", "-t", "colours"]);
    let err = handle_validate(&args, true).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown test 'colours'"));
}

#[tokio::test]
async fn test_validate_rejects_invalid_url_before_launch() {
    let args = validate_args(&["-u", "not a url"]);
    let err = handle_validate(&args, true).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid URL"));
}

#[tokio::test]
async fn test_crawl_pages_lists_internal_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                r#"<a href="/a">A</a><a href="/b">B</a><a href="/logo.png">Logo</a>"#,
                "text/html",
            ),
        )
        .mount(&server)
        .await;
    for route in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<p>page</p>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;
    }

    let matches = command_argument_builder()
        .try_get_matches_from(["segue", "crawl", "-u", &server.uri(), "-l", "2"])
        .unwrap();
    let args = matches.subcommand_matches("crawl").unwrap();

    let pages = crawl_pages(args, None).await.unwrap();
    assert_eq!(pages.urls.len(), 2);
    assert_eq!(pages.urls[0], format!("{}/", server.uri()));
}
