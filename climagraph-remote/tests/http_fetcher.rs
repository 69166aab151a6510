//! HttpRemoteFetcher against a local one-shot HTTP server.

use chrono::{TimeZone, Utc};
use climagraph_core::{ClimagraphError, DateRange, RemoteError, SeriesKind};
use climagraph_remote::{HttpRemoteFetcher, RemoteConfig, RemoteFetcher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const FEED: &str = r#"[
    {"t": "2006-12-28", "v": 5},
    {"t": "2006-12-29", "v": 7},
    {"t": "2006-12-30", "v": 3}
]"#;

/// Serve `connections` requests with the same canned response and return the
/// base URL plus the request lines that were received.
async fn serve(
    status: &'static str,
    body: &'static str,
    connections: usize,
) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let mut request_lines = Vec::new();
        for _ in 0..connections {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.expect("read request");
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf[..read]).to_string();
            request_lines.push(request.lines().next().unwrap_or_default().to_string());

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.ok();
        }
        request_lines
    });

    (format!("http://{}", addr), handle)
}

fn fetcher(base_url: &str) -> HttpRemoteFetcher {
    HttpRemoteFetcher::new(RemoteConfig::new(base_url).with_timeout_ms(5_000))
        .expect("client should build")
}

#[tokio::test]
async fn test_fetch_full_decodes_feed() {
    let (base_url, server) = serve("200 OK", FEED, 1).await;

    let series = fetcher(&base_url)
        .fetch_full(SeriesKind::Temperature)
        .await
        .expect("fetch should succeed");

    let values: Vec<f64> = series.iter().map(|s| s.v).collect();
    assert_eq!(values, vec![5.0, 7.0, 3.0]);
    assert_eq!(
        series[0].t,
        Utc.with_ymd_and_hms(2006, 12, 28, 0, 0, 0).unwrap()
    );

    let requests = server.await.expect("server task");
    assert_eq!(requests, vec!["GET /data/temperature.json HTTP/1.1".to_string()]);
}

#[tokio::test]
async fn test_each_kind_has_its_own_endpoint() {
    let (base_url, server) = serve("200 OK", "[]", 1).await;

    let series = fetcher(&base_url)
        .fetch_full(SeriesKind::Precipitation)
        .await
        .expect("fetch should succeed");
    assert!(series.is_empty());

    let requests = server.await.expect("server task");
    assert!(requests[0].starts_with("GET /data/precipitation.json"));
}

#[tokio::test]
async fn test_fetch_with_range_filters_after_full_fetch() {
    let (base_url, server) = serve("200 OK", FEED, 1).await;

    let range = DateRange::since(Utc.with_ymd_and_hms(2006, 12, 29, 0, 0, 0).unwrap());
    let series = fetcher(&base_url)
        .fetch(SeriesKind::Temperature, &range)
        .await
        .expect("fetch should succeed");

    let values: Vec<f64> = series.iter().map(|s| s.v).collect();
    assert_eq!(values, vec![7.0, 3.0]);
    server.await.expect("server task");
}

#[tokio::test]
async fn test_error_status_is_bad_status() {
    let (base_url, server) = serve("404 Not Found", "no such feed", 1).await;

    let err = fetcher(&base_url)
        .fetch_full(SeriesKind::Temperature)
        .await
        .unwrap_err();
    match err {
        ClimagraphError::Remote(RemoteError::BadStatus { status, body, url }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such feed");
            assert!(url.ends_with("/data/temperature.json"));
        }
        other => panic!("expected BadStatus, got {other:?}"),
    }
    server.await.expect("server task");
}

#[tokio::test]
async fn test_malformed_record_fails_whole_fetch() {
    let (base_url, server) = serve(
        "200 OK",
        r#"[{"t":"2006-12-28","v":5},{"t":"28/12/2006","v":7}]"#,
        1,
    )
    .await;

    let err = fetcher(&base_url)
        .fetch_full(SeriesKind::Temperature)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClimagraphError::Remote(RemoteError::MalformedRecord { index: 1, .. })
    ));
    server.await.expect("server task");
}

#[tokio::test]
async fn test_connection_refused_is_request_failed() {
    // Grab a free port, then close it.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = fetcher(&format!("http://{}", addr))
        .fetch_full(SeriesKind::Precipitation)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClimagraphError::Remote(RemoteError::RequestFailed {
            kind: SeriesKind::Precipitation,
            ..
        })
    ));
}
