// Resource collector tests.

use httptest::{matchers::*, responders::*, Expectation, Server};

use super::*;
use crate::initialization::{init_client, init_crypto_provider};

const CSS: &str = "body { color: red; }";
const JS: &str = "console.log('hello');";
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0, 0, 0, 0, 1, 2, 3];

fn client() -> Arc<reqwest::Client> {
    init_crypto_provider();
    init_client().expect("client should build")
}

/// Serves three resources; two more references point at a closed port.
fn serve_resources(server: &Server) {
    server.expect(
        Expectation::matching(request::method_path("GET", "/style.css")).respond_with(
            status_code(200)
                .append_header("Content-Type", "text/css")
                .body(CSS),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/app.js")).respond_with(
            status_code(200)
                .append_header("Content-Type", "application/javascript")
                .body(JS),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/logo.png")).respond_with(
            status_code(200)
                .append_header("Content-Type", "image/png")
                .body(PNG),
        ),
    );
}

fn page_html() -> &'static str {
    r#"<html><head>
         <link rel="stylesheet" href="/style.css">
         <script src="app.js"></script>
         <script src="http://127.0.0.1:1/gone.js"></script>
       </head><body>
         <img src="/logo.png">
         <img src="http://127.0.0.1:1/gone.png">
         <img src="/logo.png">
       </body></html>"#
}

fn page(server: &Server) -> Page {
    Page {
        url: Url::parse(&format!("http://{}/index.html", server.addr())).expect("url"),
        content_type: "text/html; charset=utf-8".to_string(),
        body: Bytes::from_static(page_html().as_bytes()),
    }
}

#[tokio::test]
async fn test_failed_resources_are_warnings_not_errors() {
    let server = Server::run();
    serve_resources(&server);

    let report = calculate_size(client(), &page(&server), 4).await;

    // three resources plus the page; the two unreachable ones are warnings
    assert_eq!(report.resources.len(), 4);
    assert_eq!(report.warnings.len(), 2);
    assert!(report
        .warnings
        .iter()
        .all(|w| matches!(w, ResourceFetchError::Fetch { .. })));

    assert_eq!(report.resources.type_total("text/css"), CSS.len() as u64);
    assert_eq!(
        report.resources.type_total("application/javascript"),
        JS.len() as u64
    );
    assert_eq!(report.resources.type_total("image/png"), PNG.len() as u64);
    assert_eq!(
        report.resources.type_total("text/html; charset=utf-8"),
        page_html().len() as u64
    );
    assert_eq!(
        report.resources.total_size(),
        (CSS.len() + JS.len() + PNG.len() + page_html().len()) as u64
    );
}

#[tokio::test]
async fn test_bucket_sums_match_individual_sizes() {
    let server = Server::run();
    serve_resources(&server);

    let report = calculate_size(client(), &page(&server), 8).await;

    for (content_type, resources) in report.resources.iter() {
        let sum: u64 = resources.iter().map(|r| r.size).sum();
        assert_eq!(report.resources.type_total(content_type), sum);
        assert!(resources.iter().all(|r| r.content_type == content_type));
    }
}

#[tokio::test]
async fn test_concurrency_limit_does_not_change_results() {
    let mut results = Vec::new();
    for concurrency in [1, 8] {
        let server = Server::run();
        serve_resources(&server);
        let report = calculate_size(client(), &page(&server), concurrency).await;

        // the server address differs per run, compare by path
        let mut measured: Vec<(String, u64, String)> = report
            .resources
            .iter()
            .flat_map(|(_, resources)| resources.iter())
            .map(|r| {
                let path = Url::parse(&r.url).expect("url").path().to_string();
                (path, r.size, r.content_type.clone())
            })
            .collect();
        measured.sort();
        results.push((measured, report.warnings.len()));
    }
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_zero_concurrency_still_completes() {
    let server = Server::run();
    serve_resources(&server);

    let report = calculate_size(client(), &page(&server), 0).await;
    assert_eq!(report.resources.len(), 4);
}

#[tokio::test]
async fn test_error_status_bodies_are_measured() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/missing.css"))
            .respond_with(status_code(404).body("not here")),
    );
    let page = Page {
        url: Url::parse(&format!("http://{}/", server.addr())).expect("url"),
        content_type: String::new(),
        body: Bytes::from_static(br#"<link href="/missing.css">"#),
    };

    let report = calculate_size(client(), &page, 2).await;
    assert!(report.warnings.is_empty());
    // neither response declared a content type, both land in the "" bucket
    let untyped = report.resources.get("").expect("untyped bucket");
    assert_eq!(untyped.len(), 2);
    assert_eq!(report.resources.type_total(""), ("not here".len() + page.body.len()) as u64);
}

#[tokio::test]
async fn test_perform_get_size_uses_final_url_as_base() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/start")).respond_with(
            status_code(302).append_header("Location", "/site/index.html"),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/site/index.html")).respond_with(
            status_code(200)
                .append_header("Content-Type", "text/html")
                .body(r#"<img src="pic.png">"#),
        ),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/site/pic.png")).respond_with(
            status_code(200)
                .append_header("Content-Type", "image/png")
                .body(PNG),
        ),
    );

    let url = format!("http://{}/start", server.addr());
    let report = perform_get_size(client(), &url, 2)
        .await
        .expect("size mode should succeed");

    assert_eq!(report.base_url.path(), "/site/index.html");
    assert_eq!(report.resources.len(), 2);
    assert_eq!(report.resources.type_total("image/png"), PNG.len() as u64);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_perform_get_size_page_failure_is_fatal() {
    let err = perform_get_size(client(), "http://127.0.0.1:1/", 2)
        .await
        .expect_err("unreachable page should fail");
    assert!(matches!(err, SizeError::RequestFailed { .. }));

    let err = perform_get_size(client(), "::not a url::", 2)
        .await
        .expect_err("malformed URL should fail");
    assert!(matches!(err, SizeError::RequestCreationFailed { .. }));
}

#[test]
fn test_resource_map_helpers() {
    let mut map = ResourceMap::default();
    assert!(map.is_empty());
    for (url, size, content_type) in [
        ("https://e.com/a.css", 10, "text/css"),
        ("https://e.com/b.css", 5, "text/css"),
        ("https://e.com/c.js", 7, "application/javascript"),
    ] {
        map.insert(Resource {
            url: url.to_string(),
            size,
            content_type: content_type.to_string(),
        });
    }
    assert_eq!(map.len(), 3);
    assert_eq!(map.type_total("text/css"), 15);
    assert_eq!(map.type_total("image/gif"), 0);
    assert_eq!(map.total_size(), 22);
    let types: Vec<&str> = map.iter().map(|(t, _)| t).collect();
    assert_eq!(types, ["application/javascript", "text/css"]);
}
