//! End-to-end tests against a local HTTP/1.1 listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fetchcache::http::{FetchOptions, FetchRequest, Headers};
use fetchcache::{CacheKey, Entry, Operation, Query, Response, Store, parse_response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serves `respond(path)` for every connection; returns the base URL and a hit counter.
async fn serve<F>(respond: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let head = String::from_utf8_lossy(&buf).into_owned();
                // Drain the request body so closing the socket does not reset the connection.
                let head_len = head.find("\r\n\r\n").unwrap() + 4;
                let body_len = head
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_owned()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < head_len + body_len {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_owned();
                stream.write_all(respond(&path).as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            });
        }
    });

    (format!("http://{addr}"), hits)
}

fn ok(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test]
async fn settles_with_status_body_and_no_headers() {
    init_tracing();
    let (base, _) = serve(|_| "HTTP/1.1 200 OK\r\n\r\nTest".to_owned()).await;
    let store = Store::default();
    let request = FetchRequest::new(format!("{base}/repos"));
    let key = CacheKey::from(format!("GET {base}/repos"));

    store.dispatch(Operation::fetch(request), key.clone()).await.unwrap();

    let entry = store.entry(&key).unwrap();
    assert_eq!(entry, Entry::settled(Response::new(200, "Test", Headers::new())));
}

#[tokio::test]
async fn observers_never_see_another_keys_data() {
    init_tracing();
    let (base, _) = serve(|path| {
        let id = path.rsplit('/').next().unwrap_or_default();
        ok(&format!(r#"{{"id":"{id}"}}"#))
    })
    .await;
    let store = Store::default();

    let mut seen = Vec::new();
    let mut handles = Vec::new();
    for id in ["1", "2"] {
        let key = CacheKey::from(format!("GET /p/{id}"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        store.subscribe(key.clone(), move |e: &Entry| {
            let parsed = parse_response(e.response()).and_then(|p| p.data);
            sink.lock().unwrap().push(parsed);
        });
        seen.push((id, log));
        handles.push(store.dispatch(Operation::fetch(format!("{base}/p/{id}")), key));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for (id, log) in seen {
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2, "loading then settled for key {id}");
        assert!(log[0].is_none());
        assert_eq!(log[1].as_ref().unwrap()["id"], id);
    }
}

#[tokio::test]
async fn headers_keep_wire_order() {
    init_tracing();
    let (base, _) = serve(|_| {
        "HTTP/1.1 201 Created\r\nX-B: 2\r\nContent-Type: application/json\r\nX-A: 1\r\nContent-Length: 2\r\n\r\n{}"
            .to_owned()
    })
    .await;
    let store = Store::default();
    store
        .dispatch(
            Operation::fetch(FetchRequest::with_options(
                format!("{base}/items"),
                FetchOptions::new().method("POST").body("{}"),
            )),
            "create",
        )
        .await
        .unwrap();

    let entry = store.entry(&"create".into()).unwrap();
    let response = entry.response().unwrap();
    assert_eq!(response.status(), 201);
    let names: Vec<_> = response.headers().iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["X-B", "Content-Type", "X-A", "Content-Length"]);
}

#[tokio::test]
async fn queries_share_one_request_per_key() {
    init_tracing();
    let (base, hits) = serve(|_| ok(r#"{"id":"1"}"#)).await;
    let store = Store::default();

    let mut first = Query::new(store.clone(), FetchRequest::new(format!("{base}/p/1")));
    let mut second = Query::new(store.clone(), FetchRequest::new(format!("{base}/p/1")));
    first.start();
    second.start();

    let a = first.settled().await.unwrap();
    let b = second.settled().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let mut third = Query::new(store, FetchRequest::new(format!("{base}/p/1")));
    assert!(third.start().is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connection_refused_settles_as_failed() {
    init_tracing();
    // Bind then drop to obtain a port with nothing listening.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let store = Store::default();
    let mut query = Query::new(store, FetchRequest::new(format!("http://{addr}/down")));
    query.start();

    let entry = query.settled().await.unwrap();
    assert!(!entry.is_loading);
    assert!(entry.response().is_none());
    assert!(entry.error().is_some());
}
