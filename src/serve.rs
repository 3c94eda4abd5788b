// src/serve.rs
// =============================================================================
// Serves a local directory over HTTP so it can be crawled like a live site.
//
// - Binds 127.0.0.1 on a free port; the crawl starts at url()
// - Files are mounted under `web_path` (default "/"), so root/docs/a.html
//   answers at http://127.0.0.1:<port><web_path>docs/a.html
// - A directory answers with its index.html; asked for without a trailing
//   slash it redirects to the slash form first
// - GET and HEAD only, one request per connection
//
// The server keeps running until the LocalServer is dropped.
// =============================================================================

use crate::error::CrawlError;
use crate::scope::DEFAULT_INDEX_DOCUMENT;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// Request line plus headers; anything longer is cut off
const MAX_REQUEST_HEAD: usize = 8192;

/// A directory served on localhost for the duration of a crawl.
pub struct LocalServer {
    addr: SocketAddr,
    web_path: String,
    shutdown: CancellationToken,
}

impl LocalServer {
    /// Serves `root` under `web_path` on a free localhost port.
    ///
    /// Must be called from inside a tokio runtime.
    pub async fn start(root: impl AsRef<Path>, web_path: Option<&str>) -> Result<Self, CrawlError> {
        let requested = root.as_ref();
        let fail = |reason: String| CrawlError::LocalServer {
            root: requested.display().to_string(),
            reason,
        };

        let root = tokio::fs::canonicalize(requested)
            .await
            .map_err(|e| fail(e.to_string()))?;
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(fail("not a directory".to_string()));
        }

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| fail(e.to_string()))?;
        let addr = listener.local_addr().map_err(|e| fail(e.to_string()))?;

        let web_path = mount_point(web_path);
        let site = Arc::new(Site {
            root,
            web_path: web_path.clone(),
        });
        let shutdown = CancellationToken::new();

        info!(root = %site.root.display(), %addr, web_path = %web_path, "serving local directory");
        tokio::spawn(accept_loop(listener, site, shutdown.clone()));

        Ok(Self {
            addr,
            web_path,
            shutdown,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Where the served directory starts, e.g. `http://127.0.0.1:41873/docs/`
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, self.web_path)
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// "docs" and "/docs" both mount at "/docs/"; nothing mounts at "/"
fn mount_point(web_path: Option<&str>) -> String {
    let trimmed = web_path.unwrap_or("").trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

// What a request path maps to
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Redirect(String),
    NotFound,
}

struct Site {
    root: PathBuf,
    web_path: String,
}

impl Site {
    async fn resolve(&self, target: &str) -> Resolved {
        let raw = target.split(['?', '#']).next().unwrap_or("/");
        let path = match urlencoding::decode(raw) {
            Ok(path) => path.into_owned(),
            Err(_) => return Resolved::NotFound,
        };

        if self.web_path != "/" && path == self.web_path.trim_end_matches('/') {
            return Resolved::Redirect(self.web_path.clone());
        }
        let rest = match path.strip_prefix(self.web_path.as_str()) {
            Some(rest) => rest,
            None => return Resolved::NotFound,
        };

        let mut file = self.root.clone();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            // no "..", no absolute parts: requests stay inside the root
            let plain = Path::new(segment)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return Resolved::NotFound;
            }
            file.push(segment);
        }

        let metadata = match tokio::fs::metadata(&file).await {
            Ok(metadata) => metadata,
            Err(_) => return Resolved::NotFound,
        };

        if metadata.is_dir() {
            if !path.ends_with('/') {
                return Resolved::Redirect(format!("{}/", raw));
            }
            file.push(DEFAULT_INDEX_DOCUMENT);
            let has_index = tokio::fs::metadata(&file)
                .await
                .map_or(false, |m| m.is_file());
            return if has_index { Resolved::File(file) } else { Resolved::NotFound };
        }

        if metadata.is_file() {
            Resolved::File(file)
        } else {
            Resolved::NotFound
        }
    }
}

async fn accept_loop(listener: TcpListener, site: Arc<Site>, shutdown: CancellationToken) {
    loop {
        let (socket, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let site = site.clone();
        tokio::spawn(async move {
            if let Err(e) = handle(socket, &site).await {
                debug!(%peer, error = %e, "connection dropped");
            }
        });
    }
    debug!("local server stopped");
}

async fn handle(mut socket: TcpStream, site: &Site) -> std::io::Result<()> {
    let head = read_head(&mut socket).await?;
    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or("");
    let target = request_line.next().unwrap_or("/");

    let response = match method {
        "GET" | "HEAD" => match site.resolve(target).await {
            Resolved::File(file) => match tokio::fs::read(&file).await {
                Ok(body) => Response::ok(content_type(&file), body),
                Err(_) => Response::not_found(),
            },
            Resolved::Redirect(location) => Response::redirect(location),
            Resolved::NotFound => Response::not_found(),
        },
        _ => Response::status(405, "Method Not Allowed"),
    };

    debug!(method, target, status = response.status, "served");
    response.write(&mut socket, method != "HEAD").await
}

async fn read_head(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = vec![0u8; MAX_REQUEST_HEAD];
    let mut read = 0;
    while read < buf.len() {
        let n = socket.read(&mut buf[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf[..read]).into_owned())
}

struct Response {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    location: Option<String>,
    body: Vec<u8>,
}

impl Response {
    fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type,
            location: None,
            body,
        }
    }

    fn status(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            location: None,
            body: reason.as_bytes().to_vec(),
        }
    }

    fn not_found() -> Self {
        Self::status(404, "Not Found")
    }

    fn redirect(location: String) -> Self {
        Self {
            location: Some(location),
            ..Self::status(301, "Moved Permanently")
        }
    }

    async fn write(self, socket: &mut TcpStream, with_body: bool) -> std::io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        );
        if let Some(location) = &self.location {
            head.push_str(&format!("Location: {}\r\n", location));
        }
        head.push_str("\r\n");

        socket.write_all(head.as_bytes()).await?;
        if with_body {
            socket.write_all(&self.body).await?;
        }
        socket.shutdown().await
    }
}

fn content_type(file: &Path) -> &'static str {
    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") | Some("md") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
