//! Static file server built on a tokio TCP listener.
//!
//! Each connection carries one request. `/` lists the content directory, any
//! other path names a file inside it. File bodies go through the
//! [`FileCache`]; every response produces one line on the [`RequestLogger`].
//! A client that does not finish its request head within the read timeout
//! gets `408` and loses the connection.

use bytes::{Bytes, BytesMut};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::cache::FileCache;
use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::error::{ServerError, ServerResult};
use crate::http::{self, Method, ParseError, Request, Response, MAX_HEAD_LEN};
use crate::listing::{files_in_directory, format_file_size, render_listing};
use crate::logger::RequestLogger;

/// Request paths are written to the request log with these escaped, so one
/// request is always one log line with space-separated fields.
const LOG_PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'%');

/// Serves files from one directory.
#[derive(Debug)]
pub struct Server {
    content_dir: PathBuf,
    cache: FileCache,
    logger: Arc<RequestLogger>,
    read_timeout: Duration,
}

impl Server {
    pub fn new(content_dir: impl Into<PathBuf>, cache: FileCache, logger: Arc<RequestLogger>) -> Self {
        Self {
            content_dir: content_dir.into(),
            cache,
            logger,
            read_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// How long a client may take to send its request head.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn logger(&self) -> &Arc<RequestLogger> {
        &self.logger
    }

    /// Bind a listener on all interfaces.
    pub async fn bind(port: u16) -> ServerResult<TcpListener> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Accept connections until `shutdown` completes.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        let local = listener.local_addr()?;
        info!(%local, content_dir = %self.content_dir.display(), "server listening");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("server stopping");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, remote)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(err) = server.handle_connection(socket, remote).await {
                                debug!(%remote, %err, "connection error");
                            }
                        });
                    }
                    Err(err) => warn!(%err, "failed to accept connection"),
                }
            }
        }
        Ok(())
    }

    async fn handle_connection(&self, mut socket: TcpStream, remote: SocketAddr) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(1024);
        let read = tokio::time::timeout(self.read_timeout, read_head(&mut socket, &mut buf)).await;

        let (path, response) = match read {
            Ok(Ok(Ok(request))) => {
                let response = self.respond(&request).await;
                (request.path, response)
            }
            // Connected and went away, or stayed idle, without sending anything.
            Ok(Ok(Err(_))) | Err(_) if buf.is_empty() => return Ok(()),
            Ok(Ok(Err(err))) => {
                debug!(%remote, ?err, "rejecting request");
                (String::from("-"), Response::error(400))
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                debug!(%remote, timeout = ?self.read_timeout, "request head timed out");
                (String::from("-"), Response::error(408))
            }
        };

        self.log_request(remote, &path, &response);
        socket.write_all(&response.encode()).await?;
        socket.shutdown().await
    }

    /// Produce the response for a parsed request.
    pub async fn respond(&self, request: &Request) -> Response {
        let response = match request.method {
            Method::Get | Method::Head => {
                if request.path == "/" {
                    self.listing().await
                } else {
                    self.serve_file(&request.path).await
                }
            }
            Method::Other(_) => return Response::error(405).header("Allow", "GET, HEAD"),
        };

        match request.method {
            Method::Head => response.without_body(),
            _ => response,
        }
    }

    async fn listing(&self) -> Response {
        let dir = self.content_dir.clone();
        let files = tokio::task::spawn_blocking(move || files_in_directory(&dir)).await;
        match files {
            Ok(Ok(files)) => Response::new(200)
                .content(render_listing(&self.content_dir, &files), "text/html"),
            Ok(Err(err)) => {
                error!(dir = %self.content_dir.display(), %err, "failed to list content directory");
                Response::error(500)
            }
            Err(err) => {
                error!(%err, "listing task failed");
                Response::error(500)
            }
        }
    }

    async fn serve_file(&self, request_path: &str) -> Response {
        let Some(path) = self.resolve(request_path) else {
            debug!(request_path, "rejected path outside content directory");
            return Response::error(404);
        };

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                debug!(path = %path.display(), "file not found");
                return Response::error(404);
            }
        }

        let content = match self.cache.lookup(&path) {
            Some(content) => {
                debug!(path = %path.display(), "served from cache");
                content
            }
            None => match tokio::fs::read(&path).await {
                Ok(data) => {
                    let data = Bytes::from(data);
                    if !self.cache.insert(&path, data.clone()) {
                        debug!(path = %path.display(), "file was cached concurrently");
                    }
                    data
                }
                Err(err) => {
                    error!(path = %path.display(), %err, "failed to read file");
                    return Response::error(500);
                }
            },
        };

        let size = format_file_size(content.len() as u64);
        Response::new(200)
            .content(content, "application/octet-stream")
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", attachment_name(&path)),
            )
            .header("File-Size", size)
    }

    /// Map a request path onto the content directory.
    ///
    /// Anything other than plain name segments (`..`, roots, prefixes) is
    /// refused so requests cannot leave the directory.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        let mut path = self.content_dir.clone();
        let mut segments = 0;
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    path.push(segment);
                    segments += 1;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        (segments > 0).then_some(path)
    }

    fn log_request(&self, remote: SocketAddr, path: &str, response: &Response) {
        let mut line = format!("{} {}", remote.ip(), loggable_path(path));
        if let Some(size) = response.header_value("File-Size") {
            line.push(' ');
            line.push_str(size);
        }
        self.logger.enqueue(line);
    }
}

/// Read until the request head parses, fails to parse, the peer stops
/// sending, or the head reaches `MAX_HEAD_LEN` bytes.
async fn read_head(
    socket: &mut TcpStream,
    buf: &mut BytesMut,
) -> io::Result<Result<Request, ParseError>> {
    loop {
        let n = socket.read_buf(buf).await?;
        match http::parse_request(buf) {
            Err(ParseError::Incomplete) if n > 0 && buf.len() < MAX_HEAD_LEN => continue,
            parsed => return Ok(parsed),
        }
    }
}

fn loggable_path(path: &str) -> Cow<'_, str> {
    utf8_percent_encode(path, LOG_PATH).into()
}

/// File name safe to place inside a quoted header value.
fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::logger::LogSink;
    use crate::timer::ManualScheduler;
    use std::time::Duration;

    fn server_for(dir: &Path) -> (Server, Arc<ManualScheduler>) {
        let clock = Arc::new(ManualScheduler::new());
        let cache = FileCache::with_scheduler(
            CacheConfig::new().ttl(Duration::from_secs(60)).build(),
            clock.clone(),
        );
        let logger = Arc::new(RequestLogger::with_console(LogSink::Console, io::sink()));
        (Server::new(dir, cache, logger), clock)
    }

    fn get(path: &str) -> Request {
        Request {
            method: Method::Get,
            path: path.to_string(),
            version: "HTTP/1.1".to_string(),
        }
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let (server, _) = server_for(Path::new("/srv/content"));
        assert_eq!(
            server.resolve("/docs/a.txt"),
            Some(PathBuf::from("/srv/content/docs/a.txt"))
        );
        assert_eq!(server.resolve("/../etc/passwd"), None);
        assert_eq!(server.resolve("/docs/../../x"), None);
        assert_eq!(server.resolve("/"), None);
    }

    #[test]
    fn test_loggable_path_stays_on_one_line() {
        assert_eq!(loggable_path("/a.txt"), "/a.txt");
        assert_eq!(loggable_path("-"), "-");
        assert_eq!(
            loggable_path("/x\n10.0.0.9 /admin 999.00 GB"),
            "/x%0A10.0.0.9%20/admin%20999.00%20GB"
        );
        assert_eq!(loggable_path("/100%\r.txt"), "/100%25%0D.txt");
    }

    #[test]
    fn test_attachment_name_is_sanitized() {
        assert_eq!(attachment_name(Path::new("dir/a\"b\r\n.txt")), "a_b__.txt");
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let (server, _) = server_for(dir.path());

        let first = server.respond(&get("/a.txt")).await;
        assert_eq!(first.status, 200);
        assert_eq!(first.body(), &Bytes::from("hello"));
        assert_eq!(first.header_value("File-Size"), Some("5.00 B"));
        assert_eq!(
            first.header_value("Content-Disposition"),
            Some("attachment; filename=\"a.txt\"")
        );

        // The cached copy wins over the changed file until it expires.
        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();
        let second = server.respond(&get("/a.txt")).await;
        assert_eq!(second.body(), &Bytes::from("hello"));

        let stats = server.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "v1").unwrap();
        let (server, clock) = server_for(dir.path());

        server.respond(&get("/a.txt")).await;
        std::fs::write(dir.path().join("a.txt"), "v2").unwrap();
        clock.advance(Duration::from_secs(60));

        let response = server.respond(&get("/a.txt")).await;
        assert_eq!(response.body(), &Bytes::from("v2"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_for(dir.path());

        let response = server.respond(&get("/nope.txt")).await;
        assert_eq!(response.status, 404);
        assert!(server.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_for(&dir.path().join("missing"));

        let response = server.respond(&get("/")).await;
        assert_eq!(response.status, 200);
        let html = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(html.contains("<ul></ul>"));
    }

    #[tokio::test]
    async fn test_head_omits_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let (server, _) = server_for(dir.path());

        let mut request = get("/a.txt");
        request.method = Method::Head;
        let response = server.respond(&request).await;
        let text = String::from_utf8(response.encode().to_vec()).unwrap();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_directory_is_404() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let (server, _) = server_for(dir.path());

        assert_eq!(server.respond(&get("/sub")).await.status, 404);
    }

    #[tokio::test]
    async fn test_listing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let (server, _) = server_for(dir.path());

        let response = server.respond(&get("/")).await;
        assert_eq!(response.status, 200);
        let html = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(html.contains("<a href=\"a.txt\">a.txt</a> (5.00 B)"));
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_for(dir.path());

        let mut request = get("/a.txt");
        request.method = Method::Other("POST".to_string());
        let response = server.respond(&request).await;
        assert_eq!(response.status, 405);
        assert_eq!(response.header_value("Allow"), Some("GET, HEAD"));
    }
}
