//! Metrics and health endpoints
//!
//! Minimal HTTP/1.1 on a tokio listener. Every connection serves exactly one
//! request and is closed afterwards.

use std::net::SocketAddr;

use gitsync_git::SyncMetrics;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Content type of the Prometheus text exposition format
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// What the endpoints report on
#[derive(Debug, Clone)]
pub struct ServerState {
    pub metrics: SyncMetrics,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    fn empty(status: u16) -> Self {
        Self::new(status, "text/plain; charset=utf-8", "")
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Unknown",
        }
    }

    pub fn to_bytes(&self, include_body: bool) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        if include_body {
            out.extend_from_slice(self.body.as_bytes());
        }
        out
    }
}

/// Bind `0.0.0.0:<port>`.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    tracing::info!(port, "http server listening");
    Ok(listener)
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &state).await {
                tracing::debug!(peer = %peer, error = %err, "http client error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, state: &ServerState) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let Some(request_line) = lines.next_line().await? else {
        return Ok(());
    };
    // Headers are not used; read up to the blank line so the client sees a
    // complete exchange.
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            break;
        }
    }

    let (method, response) = match parse_request_line(&request_line) {
        Some((method, path)) => (method, route(method, path, state)),
        None => ("", Response::empty(400)),
    };
    tracing::trace!(request = %request_line, status = response.status, "http request");

    writer.write_all(&response.to_bytes(method != "HEAD")).await?;
    writer.shutdown().await
}

/// Split `GET /path?query HTTP/1.1` into method and path.
fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let path = target.split_once('?').map_or(target, |(path, _)| path);
    Some((method, path))
}

pub fn route(method: &str, path: &str, state: &ServerState) -> Response {
    let known = matches!(
        path,
        "/metrics" | "/ping" | "/health" | "/health/live" | "/health/ready"
    );
    if !known {
        return Response::empty(404);
    }
    if method != "GET" && method != "HEAD" {
        return Response::empty(405);
    }

    match path {
        "/metrics" => Response::new(
            200,
            METRICS_CONTENT_TYPE,
            state.metrics.export_prometheus(state.tasks),
        ),
        "/ping" => Response::new(200, "text/plain; charset=utf-8", "PONG"),
        // Readiness does not wait for a first successful sync.
        _ => Response::empty(200),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tokio::io::AsyncReadExt;

    fn state() -> ServerState {
        ServerState {
            metrics: SyncMetrics::new(),
            tasks: 2,
        }
    }

    #[test]
    fn test_ping() {
        let response = route("GET", "/ping", &state());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "PONG");
    }

    #[rstest]
    #[case("/health")]
    #[case("/health/live")]
    #[case("/health/ready")]
    fn test_health_endpoints_are_ok_and_empty(#[case] path: &str) {
        let response = route("GET", path, &state());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "");
    }

    #[test]
    fn test_metrics_body() {
        let response = route("GET", "/metrics", &state());
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, METRICS_CONTENT_TYPE);
        assert!(response.body.contains("gitsync_tasks 2"));
    }

    #[test]
    fn test_unknown_path_and_method() {
        assert_eq!(route("GET", "/nope", &state()).status, 404);
        assert_eq!(route("POST", "/ping", &state()).status, 405);
    }

    #[test]
    fn test_request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /metrics?x=1 HTTP/1.1"),
            Some(("GET", "/metrics"))
        );
        assert_eq!(parse_request_line("garbage"), None);
    }

    #[test]
    fn test_head_has_no_body() {
        let bytes = route("HEAD", "/ping", &state()).to_bytes(false);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();

        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("\r\n\r\nPONG"));
    }
}
