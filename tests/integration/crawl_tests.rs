//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use scoutline::config::{ScopeConfig, UserAgentConfig};
use scoutline::crawler::{CrawlDriver, CrawlDriverBuilder, CrawlReport, DriverOptions};
use scoutline::dispatcher::{
    build_http_client, DispatcherConfig, ExchangeRequest, HttpTransport, RequestBody,
    StaticSequence,
};
use scoutline::frontier::{Frontier, FrontierLimits};
use scoutline::scope::{ScopeFilter, SharedScope};
use scoutline::storage::{SqliteStorage, Storage};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn mount_page(server: &MockServer, at: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .expect(expected)
        .mount(server)
        .await;
}

fn default_scope() -> SharedScope {
    SharedScope::new(ScopeFilter::from_config(&ScopeConfig::default()))
}

/// Creates a frontier over in-memory storage seeded with `seed` on the mock server
fn seeded_frontier(server: &MockServer, seed: &str, max_link_depth: u32, scope: &SharedScope) -> Arc<Frontier> {
    let mut storage = SqliteStorage::new_in_memory().expect("in-memory storage");
    let run_id = storage.create_run("test").expect("create run");

    let limits = FrontierLimits {
        max_links: 0,
        max_link_depth,
        max_children: 0,
        max_unique_parameters: 0,
    };
    let frontier = Arc::new(Frontier::new(storage, scope.clone(), limits, run_id));

    let seed = Url::parse(&format!("{}{}", server.uri(), seed)).expect("seed URL");
    frontier.seed(&[seed]).expect("seed");
    frontier
}

/// Builds a driver over `frontier` that talks HTTP through a real client
fn driver_for(
    frontier: Arc<Frontier>,
    scope: SharedScope,
    max_concurrent: usize,
    customize: impl FnOnce(CrawlDriverBuilder) -> CrawlDriverBuilder,
) -> CrawlDriver {
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
    };
    let client = build_http_client(
        &user_agent,
        Arc::new(reqwest::cookie::Jar::default()),
        Duration::from_secs(5),
    )
    .expect("client");

    let options = DriverOptions {
        dispatcher: DispatcherConfig {
            max_concurrent,
            request_timeout: Duration::from_secs(5),
        },
        ..DriverOptions::default()
    };

    let builder = CrawlDriver::builder(frontier, Arc::new(HttpTransport::new(client)), scope)
        .options(options);
    customize(builder).build()
}

/// Runs a crawl from `seed` against the mock server and returns the report
/// and the frontier it left behind
async fn run(
    server: &MockServer,
    seed: &str,
    max_link_depth: u32,
    max_concurrent: usize,
    customize: impl FnOnce(CrawlDriverBuilder) -> CrawlDriverBuilder,
) -> (CrawlReport, Arc<Frontier>) {
    let scope = default_scope();
    let frontier = seeded_frontier(server, seed, max_link_depth, &scope);
    let driver = driver_for(frontier.clone(), scope, max_concurrent, customize);

    let report = tokio::time::timeout(Duration::from_secs(30), driver.run())
        .await
        .expect("crawl finished in time")
        .expect("crawl succeeded");

    (report, frontier)
}

#[tokio::test]
async fn test_depth_bound_stops_discovery() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">a</a>"#, 1).await;
    mount_page(&server, "/a", r#"<a href="/b">b</a>"#, 1).await;
    mount_page(&server, "/b", r#"<a href="/c">c</a>"#, 1).await;
    mount_page(&server, "/c", "<p>too deep</p>", 0).await;

    let (report, frontier) = run(&server, "/", 2, 4, |b| b).await;

    assert_eq!(report.fetched, 3);
    assert!(!report.stopped);
    assert_eq!(frontier.stats().unwrap().total_queue_items, 3);
}

#[tokio::test]
async fn test_duplicate_links_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/dup">1</a><a href="/dup#frag">2</a><a href="./dup">3</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/dup", r#"<a href="/">home</a><a href="/dup">self</a>"#, 1).await;

    let (report, frontier) = run(&server, "/", 5, 4, |b| b).await;

    assert_eq!(report.fetched, 2);
    assert_eq!(report.discovered, 1);
    assert_eq!(frontier.stats().unwrap().total_queue_items, 2);
}

#[tokio::test]
async fn test_form_is_submitted() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<form action="/submit" method="post">
             <label for="a">A</label><input id="a" name="a" value="1">
             <input type="submit" name="go" value="Go">
           </form>"#,
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_string("a=1&go=Go"))
        .respond_with(html("<p>thanks</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let (report, _) = run(&server, "/", 3, 4, |b| b).await;
    assert!(report.fetched >= 2);
}

#[tokio::test]
async fn test_script_literals_are_followed() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<script>
             var api = "/api/data";
             // legacy endpoint: {}/from-comment
           </script>"#,
        server.uri()
    );
    mount_page(&server, "/", &page, 1).await;
    mount_page(&server, "/api/data", "<p>data</p>", 1).await;
    mount_page(&server, "/from-comment", "<p>old</p>", 1).await;

    let (report, _) = run(&server, "/", 3, 4, |b| b).await;
    assert_eq!(report.fetched, 3);
}

#[tokio::test]
async fn test_dispatcher_respects_concurrency_cap() {
    let server = MockServer::start().await;
    let links: String = (0..6)
        .map(|i| format!(r#"<a href="/slow/{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links, 1).await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/slow/\d$"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_millis(150)))
        .expect(6)
        .mount(&server)
        .await;

    let (report, _) = run(&server, "/", 3, 2, |b| b).await;

    assert_eq!(report.fetched, 7);
    assert!(report.peak_in_flight <= 2);
    assert!(report.peak_in_flight >= 1);
}

#[tokio::test]
async fn test_sequence_without_session_detection_single_steps() {
    let server = MockServer::start().await;
    let links: String = (0..4)
        .map(|i| format!(r#"<a href="/p/{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links, 1).await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/p/\d$"))
        .respond_with(html("<p>page</p>").set_delay(Duration::from_millis(50)))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string("user=admin&pass=secret"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/"))
        .expect(1)
        .mount(&server)
        .await;

    let login_url = Url::parse(&format!("{}/login", server.uri())).unwrap();
    let login = ExchangeRequest {
        method: "POST".to_string(),
        url: login_url,
        headers: Vec::new(),
        body: Some(RequestBody::UrlEncoded("user=admin&pass=secret".to_string())),
        referer: None,
    };
    let sequence = Arc::new(StaticSequence::new(vec![login]));

    let (report, _) = run(&server, "/", 3, 5, |b| b.sequence(sequence)).await;

    assert_eq!(report.fetched, 5);
    assert_eq!(report.peak_in_flight, 1);
}

#[tokio::test]
async fn test_scope_keeps_crawl_on_seed_host() {
    let server = MockServer::start().await;
    let port = Url::parse(&server.uri()).unwrap().port().unwrap();
    let page = format!(
        r#"<a href="http://localhost:{}/elsewhere">other host</a>
           <a href="/account/delete">danger</a>
           <a href="/photo.jpg">media</a>
           <a href="/ok">ok</a>"#,
        port
    );
    mount_page(&server, "/", &page, 1).await;
    mount_page(&server, "/elsewhere", "<p>x</p>", 0).await;
    mount_page(&server, "/account/delete", "<p>x</p>", 0).await;
    mount_page(&server, "/photo.jpg", "<p>x</p>", 0).await;
    mount_page(&server, "/ok", "<p>ok</p>", 1).await;

    let (report, _) = run(&server, "/", 3, 4, |b| b).await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.discovered, 1);
}

#[tokio::test]
async fn test_redirect_location_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landing"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/landing", "<p>here</p>", 1).await;

    let (report, frontier) = run(&server, "/", 3, 4, |b| b).await;
    assert_eq!(report.fetched, 2);
    assert_eq!(frontier.stats().unwrap().total_responses, 2);
}

#[tokio::test]
async fn test_failed_exchange_completes_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let (report, frontier) = run(&server, "/", 3, 4, |b| {
        b.options(DriverOptions {
            dispatcher: DispatcherConfig {
                max_concurrent: 4,
                request_timeout: Duration::from_millis(200),
            },
            ..DriverOptions::default()
        })
    })
    .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.fetched, 0);
    assert!(!frontier.has_outstanding_work().unwrap());
}

#[tokio::test]
async fn test_stop_during_login_ends_crawl_and_resumes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html("<p>welcome</p>").set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>home</p>", 1).await;

    let login = ExchangeRequest::get(Url::parse(&format!("{}/login", server.uri())).unwrap());
    let sequence = Arc::new(StaticSequence::new(vec![login]));

    let scope = default_scope();
    let frontier = seeded_frontier(&server, "/", 3, &scope);
    let driver = driver_for(frontier.clone(), scope.clone(), 5, |b| b.sequence(sequence));
    let handle = driver.handle();

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.stop());
    };
    let (report, _) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(5), driver.run()),
        stopper
    );
    let report = report.expect("driver ended after stop").expect("crawl succeeded");

    // The seed waited behind the login and goes back to the queue unsent
    assert!(report.stopped);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.cancelled, 1);
    assert!(frontier.has_outstanding_work().unwrap());

    assert_eq!(frontier.reset_interrupted().unwrap(), 0);
    let driver = driver_for(frontier.clone(), scope, 5, |b| b);
    let report = tokio::time::timeout(Duration::from_secs(30), driver.run())
        .await
        .expect("resumed crawl finished in time")
        .expect("resumed crawl succeeded");

    assert!(!report.stopped);
    assert_eq!(report.fetched, 1);
    assert!(!frontier.has_outstanding_work().unwrap());
}
