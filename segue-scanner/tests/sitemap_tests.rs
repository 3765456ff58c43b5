// Tests for sitemap loading from files and URLs

use segue_scanner::{ScanError, SitemapReader, build_client};
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn reader() -> SitemapReader {
    SitemapReader::new(build_client(5).unwrap())
}

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "application/xml"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_load_sitemap_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"<urlset>
             <url><loc>https://example.com/</loc></url>
             <url><loc>https://example.com/about</loc></url>
             <url><loc>not a url</loc></url>
           </urlset>"#
    )?;

    let location = file.path().to_string_lossy().to_string();
    let urls = reader().load(&location).await?;

    assert_eq!(urls, vec!["https://example.com/", "https://example.com/about"]);
    Ok(())
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let result = reader().load("/definitely/not/here/sitemap.xml").await;
    assert!(matches!(result, Err(ScanError::SitemapError(_))));
}

#[tokio::test]
async fn test_load_remote_sitemap_index() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/sitemap.xml",
        format!(
            r#"<sitemapindex>
                 <sitemap><loc>{base}/pages.xml</loc></sitemap>
                 <sitemap><loc>posts.xml</loc></sitemap>
               </sitemapindex>"#
        ),
    )
    .await;
    mount_xml(
        &server,
        "/pages.xml",
        format!(r#"<urlset><url><loc>{base}/</loc></url><url><loc>{base}/about</loc></url></urlset>"#),
    )
    .await;
    mount_xml(
        &server,
        "/posts.xml",
        format!(r#"<urlset><url><loc>{base}/posts/first</loc></url></urlset>"#),
    )
    .await;

    let urls = reader()
        .load(&format!("{}/sitemap.xml", base))
        .await
        .unwrap();

    assert_eq!(
        urls,
        vec![
            format!("{}/", base),
            format!("{}/about", base),
            format!("{}/posts/first", base),
        ]
    );
}

#[tokio::test]
async fn test_load_remote_sitemap_bad_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = reader()
        .load(&format!("{}/sitemap.xml", server.uri()))
        .await;

    assert!(matches!(
        result,
        Err(ScanError::BadStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_self_referencing_index_terminates() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_xml(
        &server,
        "/sitemap.xml",
        format!(
            r#"<sitemapindex><sitemap><loc>{base}/sitemap.xml</loc></sitemap></sitemapindex>"#
        ),
    )
    .await;

    let urls = reader()
        .load(&format!("{}/sitemap.xml", base))
        .await
        .unwrap();

    assert!(urls.is_empty());
}
