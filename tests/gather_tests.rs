/// Integration tests for fetching metrics from a live HTTP endpoint
use flate2::read::GzDecoder;
use http_input::{
    body::{BodyFactory, BodyResource, ContentEncoding},
    config::HttpInputConfig,
    error::FetchError,
    fetcher::HttpInput,
    metric::MemoryAccumulator,
};
use httpmock::prelude::*;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const METRICS_BODY: &str = r#"# HELP node_load1 1m load average.
# TYPE node_load1 gauge
node_load1 0.42
# HELP http_requests_total Total requests.
# TYPE http_requests_total counter
http_requests_total{code="200",url="http://upstream"} 12
"#;

struct CountingBody {
    inner: Cursor<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl Read for CountingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BodyResource for CountingBody {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn counting_factory() -> (BodyFactory, Arc<AtomicUsize>) {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let factory: BodyFactory = Arc::new(move |_encoding: ContentEncoding, content: &str| {
        if content.is_empty() {
            return None;
        }
        Some(Box::new(CountingBody {
            inner: Cursor::new(content.as_bytes().to_vec()),
            closes: counter.clone(),
        }) as Box<dyn BodyResource>)
    });
    (factory, closes)
}

#[tokio::test]
async fn test_gather_parses_metrics_and_tags_url() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(METRICS_BODY))
        .mount(&server)
        .await;

    let url = format!("{}/metrics", server.uri());
    let input = HttpInput::new(HttpInputConfig::new(vec![url.clone()])).unwrap();
    let acc = MemoryAccumulator::new();

    assert_eq!(input.gather(&acc).await, 0);

    let metrics = acc.take_metrics();
    assert_eq!(metrics.len(), 2);

    let load = metrics.iter().find(|m| m.name == "node_load1").unwrap();
    assert_eq!(load.tags.get("url"), Some(&url));
    assert_eq!(load.fields.get("gauge"), Some(&0.42));

    // An existing url tag is kept
    let requests = metrics
        .iter()
        .find(|m| m.name == "http_requests_total")
        .unwrap();
    assert_eq!(requests.tags.get("url").unwrap(), "http://upstream");
    assert!(acc.take_errors().is_empty());
}

#[tokio::test]
async fn test_gzip_body_is_sent_compressed() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/query"))
        .and(matchers::header("content-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200).set_body_string(METRICS_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = HttpInputConfig::new(vec![format!("{}/query", server.uri())]);
    config.method = "POST".to_string();
    config.body = "payload".to_string();
    config.content_encoding = ContentEncoding::Gzip;
    let input = HttpInput::new(config).unwrap();
    let acc = MemoryAccumulator::new();

    assert_eq!(input.gather(&acc).await, 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let mut decoded = String::new();
    GzDecoder::new(received[0].body.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "payload");
}

#[tokio::test]
async fn test_identity_body_and_headers() {
    let server = httpmock::MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/metrics")
                .header("authorization", "Bearer inline-token")
                .header("x-scope", "team-a")
                .body("query=up");
            then.status(200).body(METRICS_BODY);
        })
        .await;

    let mut config = HttpInputConfig::new(vec![server.url("/metrics")]);
    config.method = "POST".to_string();
    config.body = "query=up".to_string();
    config.token = Some("inline-token".to_string());
    config
        .headers
        .insert("X-Scope".to_string(), "team-a".to_string());
    let input = HttpInput::new(config).unwrap();
    let acc = MemoryAccumulator::new();

    assert_eq!(input.gather(&acc).await, 0);
    mock.assert_async().await;
    assert_eq!(acc.take_metrics().len(), 2);
}

#[tokio::test]
async fn test_unexpected_status_is_reported() {
    let server = httpmock::MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/metrics");
            then.status(503).body("unavailable");
        })
        .await;

    let url = server.url("/metrics");
    let input = HttpInput::new(HttpInputConfig::new(vec![url.clone()])).unwrap();
    let acc = MemoryAccumulator::new();

    let err = input.gather_url(&acc, &url).await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::UnexpectedStatus { status: 503, .. }
    ));
    assert!(acc.take_metrics().is_empty());
}

#[tokio::test]
async fn test_custom_success_status_codes() {
    let server = httpmock::MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/metrics");
            then.status(202).body(METRICS_BODY);
        })
        .await;

    let mut config = HttpInputConfig::new(vec![server.url("/metrics")]);
    config.success_status_codes = vec![200, 202];
    let input = HttpInput::new(config).unwrap();
    let acc = MemoryAccumulator::new();

    assert_eq!(input.gather(&acc).await, 0);
    assert_eq!(acc.take_metrics().len(), 2);
}

#[tokio::test]
async fn test_sent_body_is_closed_once() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(METRICS_BODY))
        .mount(&server)
        .await;

    let (factory, closes) = counting_factory();
    let mut config = HttpInputConfig::new(vec![server.uri()]);
    config.method = "POST".to_string();
    config.body = "payload".to_string();
    let input = HttpInput::new(config).unwrap().with_body_factory(factory);
    let acc = MemoryAccumulator::new();

    assert_eq!(input.gather(&acc).await, 0);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, b"payload");
}

#[tokio::test]
async fn test_transport_failure_closes_body_once() {
    // Bind then drop a listener so the port is known to be closed
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/metrics", listener.local_addr().unwrap());
    drop(listener);

    let (factory, closes) = counting_factory();
    let mut config = HttpInputConfig::new(vec![url.clone()]);
    config.method = "POST".to_string();
    config.body = "payload".to_string();
    let input = HttpInput::new(config).unwrap().with_body_factory(factory);
    let acc = MemoryAccumulator::new();

    let err = input.gather_url(&acc, &url).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert_eq!(err.stage(), "transport");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_fetch_closes_body_once() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(METRICS_BODY)
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let (factory, closes) = counting_factory();
    let mut config = HttpInputConfig::new(vec![server.uri()]);
    config.method = "POST".to_string();
    config.body = "payload".to_string();
    config.timeout_seconds = 30;
    let input = HttpInput::new(config).unwrap().with_body_factory(factory);
    let acc = MemoryAccumulator::new();

    let result = tokio::time::timeout(
        Duration::from_millis(500),
        input.gather_url(&acc, &server.uri()),
    )
    .await;

    assert!(result.is_err(), "fetch should have been cancelled");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(acc.take_metrics().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let server = httpmock::MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/metrics");
            then.status(200)
                .body("up 1\nbroken{a=\"b 2\nnode_load1 0.5\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/html");
            then.status(200)
                .body("<html><body>502 Bad Gateway</body></html>");
        })
        .await;

    let input = HttpInput::new(HttpInputConfig::new(vec![
        server.url("/metrics"),
        server.url("/html"),
    ]))
    .unwrap();
    let acc = MemoryAccumulator::new();

    let err = input
        .gather_url(&acc, &server.url("/metrics"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
    assert_eq!(err.stage(), "parse");
    assert!(acc.take_metrics().is_empty());

    assert_eq!(input.gather(&acc).await, 2);
    assert!(acc.take_metrics().is_empty());
    assert_eq!(acc.take_errors().len(), 2);
}
