//! Shared utilities for integration testing.
//!
//! A programmable mock backend speaking raw HTTP/1.1 over a `TcpListener`. It
//! records every request it sees and answers with whatever the test's handler
//! returns: fixed bodies, delayed bodies, or chunked bodies trickled over time.

#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    /// Lowercased names, in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// How the backend answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Full {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Delayed {
        delay: Duration,
        reply: Box<Reply>,
    },
    /// Chunked body: each chunk after `interval`, then `stall`, then the terminator.
    Trickle {
        status: u16,
        chunks: Vec<Vec<u8>>,
        interval: Duration,
        stall: Duration,
    },
}

impl Reply {
    pub fn bytes(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Reply::Full {
            status,
            headers: vec![("Content-Type".into(), content_type.into())],
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::bytes(status, "text/plain", body)
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::bytes(status, "application/json", value.to_string())
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Reply::Delayed {
            delay,
            reply: Box::new(self),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Reply::Full { headers, .. } = &mut self {
            headers.push((name.into(), value.into()));
        }
        self
    }
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a backend that always gives the same reply.
pub async fn start_mock_backend(reply: Reply) -> MockBackend {
    start_programmable_backend(move |_| {
        let reply = reply.clone();
        async move { reply }
    })
    .await
}

/// Start a backend that answers each request with `f(request)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(Captured) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockBackend {
        addr: listener.local_addr().unwrap(),
        calls: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let f = Arc::new(f);
    let state = backend.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let state = state.clone();
                    tokio::spawn(async move {
                        let _ = serve(socket, f, state).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    backend
}

/// Start a backend that echoes the request body back with the request's content type.
pub async fn start_echo_backend() -> MockBackend {
    start_programmable_backend(|request| async move {
        let content_type = request
            .header("content-type")
            .unwrap_or("application/octet-stream")
            .to_string();
        Reply::bytes(200, &content_type, request.body)
    })
    .await
}

async fn serve<F, Fut>(mut socket: TcpStream, f: Arc<F>, state: MockBackend) -> io::Result<()>
where
    F: Fn(Captured) -> Fut,
    Fut: Future<Output = Reply>,
{
    let Some(request) = read_request(&mut socket).await? else {
        return Ok(());
    };
    state.calls.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(request.clone());

    let reply = f(request).await;
    write_reply(&mut socket, reply).await?;
    socket.shutdown().await
}

async fn read_request(socket: &mut TcpStream) -> io::Result<Option<Captured>> {
    let mut reader = BufReader::new(socket);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let mut request_line = line.trim_end().splitn(3, ' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        reader.read_line(&mut line).await?;
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let find = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    let mut body = Vec::new();
    if let Some(length) = find("content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(length, 0);
        reader.read_exact(&mut body).await?;
    } else if find("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        loop {
            line.clear();
            reader.read_line(&mut line).await?;
            let size_field = line.trim_end().split(';').next().unwrap_or_default();
            let size = usize::from_str_radix(size_field, 16)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if size == 0 {
                line.clear();
                reader.read_line(&mut line).await?;
                break;
            }
            let start = body.len();
            body.resize(start + size, 0);
            reader.read_exact(&mut body[start..]).await?;
            line.clear();
            reader.read_line(&mut line).await?;
        }
    }

    Ok(Some(Captured {
        method,
        path,
        headers,
        body,
    }))
}

fn status_line(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    format!("HTTP/1.1 {status} {reason}\r\n")
}

async fn write_reply(socket: &mut TcpStream, reply: Reply) -> io::Result<()> {
    match reply {
        Reply::Full {
            status,
            headers,
            body,
        } => {
            let mut head = status_line(status);
            for (name, value) in headers {
                head.push_str(&format!("{name}: {value}\r\n"));
            }
            head.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            ));
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(&body).await?;
        }
        Reply::Delayed { delay, reply } => {
            tokio::time::sleep(delay).await;
            Box::pin(write_reply(socket, *reply)).await?;
        }
        Reply::Trickle {
            status,
            chunks,
            interval,
            stall,
        } => {
            let mut head = status_line(status);
            head.push_str("Content-Type: application/octet-stream\r\n");
            head.push_str("Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n");
            socket.write_all(head.as_bytes()).await?;
            socket.flush().await?;

            for chunk in chunks {
                tokio::time::sleep(interval).await;
                socket
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .await?;
                socket.write_all(&chunk).await?;
                socket.write_all(b"\r\n").await?;
                socket.flush().await?;
            }

            tokio::time::sleep(stall).await;
            socket.write_all(b"0\r\n\r\n").await?;
        }
    }
    socket.flush().await
}
