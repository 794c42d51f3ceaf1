//! Minimal HTTP/1.x request parsing and response encoding.
//!
//! Only what a static file server needs: the request line, the end of the
//! header block, and a `Connection: close` response.

use bytes::{BufMut, Bytes, BytesMut};
use percent_encoding::percent_decode_str;
use std::fmt;

/// Largest request head accepted before answering 400.
pub const MAX_HEAD_LEN: usize = 8 * 1024;

/// Request methods the server distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Other(String),
}

impl Method {
    /// Parse a method token. Methods are case-sensitive.
    pub fn parse(s: &str) -> Method {
        match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Other(other) => other,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// The request target with any query string removed, percent-decoded.
    pub path: String,
    pub version: String,
}

/// Why a request head could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The head is not complete yet.
    Incomplete,
    /// The head is not a valid HTTP/1.x request.
    Malformed(String),
}

/// Offset just past the `\r\n\r\n` that ends the request head, if present.
pub fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Parse the request line at the start of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<Request, ParseError> {
    let end = head_end(buf).ok_or(ParseError::Incomplete)?;
    let head = std::str::from_utf8(&buf[..end])
        .map_err(|_| ParseError::Malformed("request head is not UTF-8".to_string()))?;
    let line = head.lines().next().unwrap_or_default();

    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::Malformed(format!("bad request line '{}'", line)));
    };

    if !version.starts_with("HTTP/1.") {
        return Err(ParseError::Malformed(format!(
            "unsupported version '{}'",
            version
        )));
    }
    if !target.starts_with('/') {
        return Err(ParseError::Malformed(format!("bad target '{}'", target)));
    }

    let raw_path = target.split(|c: char| c == '?' || c == '#').next().unwrap_or(target);
    let path = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| ParseError::Malformed("path is not UTF-8".to_string()))?
        .into_owned();

    Ok(Request {
        method: Method::parse(method),
        path,
        version: version.to_string(),
    })
}

/// Reason phrase for the status codes this server produces.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    omit_body: bool,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            omit_body: false,
        }
    }

    /// An HTML error page naming the status.
    pub fn error(status: u16) -> Self {
        let page = format!(
            "<p>Error Status: <span style='color:red;'>{}</span></p>",
            status
        );
        Self::new(status).content(page, "text/html")
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = body.into();
        self.header("Content-Type", content_type)
    }

    /// Keep the headers (including `Content-Length`) but send no body.
    pub fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize status line, headers and body.
    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(256 + self.body.len());
        out.put_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status)).as_bytes(),
        );
        for (name, value) in &self.headers {
            out.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        out.put_slice(b"Connection: close\r\n\r\n");
        if !self.omit_body {
            out.put_slice(&self.body);
        }
        out
    }
}
