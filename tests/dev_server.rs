// tests/dev_server.rs

use std::net::SocketAddr;

use assetpipe::errors::PipelineError;
use assetpipe::reload::ChangeNotifier;
use assetpipe::server;
use assetpipe::types::ReloadKind;
use assetpipe_test_utils::builders::write_file;
use assetpipe_test_utils::{init_tracing, with_timeout};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn get(addr: SocketAddr, path: &str) -> std::io::Result<(String, String)> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let text = String::from_utf8_lossy(&raw).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((&text, ""));
    Ok((head.to_string(), body.to_string()))
}

/// Read from `stream` until `needle` shows up in everything read so far.
async fn read_until(stream: &mut TcpStream, seen: &mut String, needle: &str) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    while !seen.contains(needle) {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream closed before {needle:?}"),
            ));
        }
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    Ok(())
}

#[tokio::test]
async fn serves_build_tree_with_injected_client() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "index.html", "<html><body><h1>hi</h1></body></html>");
    write_file(dir.path(), "css/app.css", "body{color:red}");
    write_file(dir.path(), "css/my theme.css", "a{color:blue}");

    let handle = server::start("127.0.0.1", 0, dir.path(), ChangeNotifier::default()).await?;
    let addr = handle.local_addr();

    let (head, body) = get(addr, "/").await?;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("content-type: text/html"), "{head}");
    assert!(
        body.contains(r#"<h1>hi</h1><script src="/__assetpipe/client.js"></script></body>"#),
        "{body}"
    );

    let (head, body) = get(addr, "/css/app.css").await?;
    assert!(head.to_ascii_lowercase().contains("content-type: text/css"), "{head}");
    assert!(head.to_ascii_lowercase().contains("cache-control: no-cache"), "{head}");
    assert_eq!(body, "body{color:red}");

    let (head, body) = get(addr, "/__assetpipe/client.js").await?;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(body.contains("/__assetpipe/events"), "{body}");

    let (head, body) = get(addr, "/css/my%20theme.css").await?;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert_eq!(body, "a{color:blue}");

    let (head, _) = get(addr, "/%2e%2e/Cargo.toml").await?;
    assert!(head.starts_with("HTTP/1.1 404"), "{head}");

    let (head, _) = get(addr, "/missing.png").await?;
    assert!(head.starts_with("HTTP/1.1 404"), "{head}");

    let (head, _) = get(addr, "/../Cargo.toml").await?;
    assert!(head.starts_with("HTTP/1.1 404"), "{head}");

    with_timeout(handle.shutdown()).await?;
    Ok(())
}

#[tokio::test]
async fn event_stream_relays_signals_and_ends_on_shutdown() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let notifier = ChangeNotifier::default();
    let handle = server::start("127.0.0.1", 0, dir.path(), notifier.clone()).await?;

    let mut stream = TcpStream::connect(handle.local_addr()).await?;
    stream
        .write_all(b"GET /__assetpipe/events HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await?;

    let mut seen = String::new();
    with_timeout(read_until(&mut stream, &mut seen, "connected")).await?;
    assert!(seen.to_ascii_lowercase().contains("content-type: text/event-stream"), "{seen}");

    notifier.notify(ReloadKind::Stylesheet);
    with_timeout(read_until(&mut stream, &mut seen, "event: css")).await?;

    notifier.notify(ReloadKind::Other);
    with_timeout(read_until(&mut stream, &mut seen, "event: reload")).await?;

    // Graceful shutdown must not hang on the open stream.
    with_timeout(handle.shutdown()).await?;
    Ok(())
}

#[tokio::test]
async fn port_in_use_is_a_dev_server_error() -> TestResult {
    init_tracing();
    let taken = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = taken.local_addr()?.port();
    let dir = tempfile::tempdir()?;

    match server::start("127.0.0.1", port, dir.path(), ChangeNotifier::default()).await {
        Err(PipelineError::DevServer(msg)) => assert!(msg.contains(&port.to_string()), "{msg}"),
        other => panic!("expected DevServer error, got {other:?}"),
    }
    Ok(())
}
