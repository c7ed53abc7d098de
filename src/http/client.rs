//! Minimal async HTTP/1.1 client used as the default [`Transport`].
//!
//! One TCP connection per request (`Connection: close`). The response head is
//! parsed with [`httparse`]; the body is framed by `Content-Length`,
//! `Transfer-Encoding: chunked`, or connection close, in that order of
//! preference.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{BoxFuture, FetchRequest, Headers, RawResponse, Transport};
use crate::config::ClientConfig;
use crate::error::FetchError;

/// Maximum number of response headers we accept.
const MAX_HEADERS: usize = 64;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The default transport: plain `http://` over Tokio TCP.
///
/// # Examples
///
/// ```rust,no_run
/// use fetchcache::http::{FetchRequest, HttpTransport, Transport};
///
/// # async fn run() -> Result<(), fetchcache::error::FetchError> {
/// let transport = HttpTransport::default();
/// let resp = transport.fetch(FetchRequest::new("http://127.0.0.1:8080/health")).await?;
/// println!("{}", resp.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Performs one request/response exchange.
    ///
    /// # Errors
    ///
    /// - [`FetchError::UnsupportedScheme`] / [`FetchError::InvalidTarget`] — the target is not a plain `http://` URL.
    /// - [`FetchError::Connect`] — the TCP connection could not be established.
    /// - [`FetchError::Parse`] / [`FetchError::Incomplete`] — the peer sent a malformed or truncated head.
    /// - [`FetchError::BodyTooLarge`] — the body exceeded [`ClientConfig::max_body_bytes`].
    pub async fn send(&self, request: FetchRequest) -> Result<RawResponse, FetchError> {
        let target = Target::parse(&request.target)?;
        let addr = target.authority();

        debug!(method = %request.method(), target = %request.target, "sending request");

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| FetchError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let head = encode_request(&request, &target, &self.config);
        stream.write_all(&head).await?;
        if let Some(body) = &request.options.body {
            stream.write_all(body).await?;
        }
        stream.flush().await?;

        let response = read_response(
            &mut stream,
            request.method().is_bodiless(),
            self.config.max_body_bytes,
        )
        .await?;

        debug!(target = %request.target, status = response.status, bytes = response.body.len(), "response received");
        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<Result<RawResponse, FetchError>> {
        let this = self.clone();
        Box::pin(async move { this.send(request).await })
    }
}

// Components of a parsed `http://host[:port]/path?query` target.
#[derive(Debug, PartialEq, Eq)]
struct Target<'a> {
    host: &'a str,
    port: u16,
    path: &'a str,
}

impl<'a> Target<'a> {
    fn parse(raw: &'a str) -> Result<Self, FetchError> {
        let invalid = |reason| FetchError::InvalidTarget {
            target: raw.to_owned(),
            reason,
        };

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case("http") {
            return Err(FetchError::UnsupportedScheme {
                scheme: scheme.to_owned(),
            });
        }

        let (authority, path) = match rest.find(['/', '?']) {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, "/"),
        };

        // `[::1]` has colons but no port; `[::1]:8080` splits on the last one.
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) if !port.contains(']') => {
                let port = port.parse().map_err(|_| invalid("invalid port"))?;
                (host, port)
            }
            _ => (authority, 80),
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self { host, port, path })
    }

    fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Serializes the request line and headers. The body, if any, is written separately.
fn encode_request(request: &FetchRequest, target: &Target<'_>, config: &ClientConfig) -> BytesMut {
    let headers = &request.options.headers;
    let estimated_size = 128 + headers.len() * 64;
    let mut buf = BytesMut::with_capacity(estimated_size);

    // `http://host?q` still needs an origin-form path on the wire.
    let path = if target.path.starts_with('?') {
        format!("/{}", target.path)
    } else {
        target.path.to_owned()
    };
    buf.put(format!("{} {} HTTP/1.1\r\n", request.method(), path).as_bytes());

    if !headers.contains("host") {
        if target.port == 80 {
            buf.put(format!("Host: {}\r\n", target.host).as_bytes());
        } else {
            buf.put(format!("Host: {}:{}\r\n", target.host, target.port).as_bytes());
        }
    }
    if !headers.contains("user-agent") {
        buf.put(format!("User-Agent: {}\r\n", config.user_agent).as_bytes());
    }

    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("connection") || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }

    buf.put(&b"Connection: close\r\n"[..]);
    if let Some(body) = &request.options.body {
        buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    buf.put(&b"\r\n"[..]);
    buf
}

// Parsed response head plus the byte offset at which the body begins.
struct Head {
    status: u16,
    headers: Headers,
    body_offset: usize,
}

fn parse_head(buf: &[u8]) -> Result<Option<Head>, FetchError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Response::new(&mut headers);

    let body_offset = match raw.parse(buf)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Ok(None),
    };

    let status = raw.code.ok_or(FetchError::Incomplete)?;
    let mut header_list = Headers::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        header_list.insert(header.name, String::from_utf8_lossy(header.value));
    }

    Ok(Some(Head {
        status,
        headers: header_list,
        body_offset,
    }))
}

async fn read_response<S>(
    stream: &mut S,
    bodiless: bool,
    max_body_bytes: usize,
) -> Result<RawResponse, FetchError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let head = loop {
        if let Some(head) = parse_head(&buf)? {
            // 1xx interim responses carry no body; skip to the final response.
            if (100..200).contains(&head.status) {
                buf.advance(head.body_offset);
                continue;
            }
            break head;
        }
        if buf.len() > max_body_bytes {
            return Err(FetchError::BodyTooLarge {
                max_bytes: max_body_bytes,
            });
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(FetchError::Incomplete);
        }
    };

    buf.advance(head.body_offset);
    trace!(status = head.status, buffered = buf.len(), "response head parsed");

    let no_body = bodiless || head.status == 204 || head.status == 304;
    let body = if no_body {
        Bytes::new()
    } else if let Some(len) = content_length(&head.headers) {
        read_exact_body(stream, buf, len, max_body_bytes).await?
    } else if is_chunked(&head.headers) {
        read_chunked_body(stream, buf, max_body_bytes).await?
    } else {
        read_to_close(stream, buf, max_body_bytes).await?
    };

    Ok(RawResponse {
        status: head.status,
        headers: head.headers,
        body,
    })
}

fn content_length(headers: &Headers) -> Option<usize> {
    headers.get("content-length")?.trim().parse().ok()
}

fn is_chunked(headers: &Headers) -> bool {
    headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

async fn read_exact_body<S>(
    stream: &mut S,
    mut buf: BytesMut,
    len: usize,
    max_body_bytes: usize,
) -> Result<Bytes, FetchError>
where
    S: AsyncRead + Unpin,
{
    if len > max_body_bytes {
        return Err(FetchError::BodyTooLarge {
            max_bytes: max_body_bytes,
        });
    }
    while buf.len() < len {
        if stream.read_buf(&mut buf).await? == 0 {
            return Err(FetchError::Incomplete);
        }
    }
    buf.truncate(len);
    Ok(buf.freeze())
}

async fn read_to_close<S>(
    stream: &mut S,
    mut buf: BytesMut,
    max_body_bytes: usize,
) -> Result<Bytes, FetchError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if buf.len() > max_body_bytes {
            return Err(FetchError::BodyTooLarge {
                max_bytes: max_body_bytes,
            });
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(buf.freeze());
        }
    }
}

async fn read_chunked_body<S>(
    stream: &mut S,
    mut buf: BytesMut,
    max_body_bytes: usize,
) -> Result<Bytes, FetchError>
where
    S: AsyncRead + Unpin,
{
    let mut body = BytesMut::new();

    loop {
        let line_end = fill_until_crlf(stream, &mut buf).await?;
        let size_line = std::str::from_utf8(&buf[..line_end]).map_err(|_| FetchError::InvalidChunk)?;
        // Chunk extensions (`;name=value`) are ignored.
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| FetchError::InvalidChunk)?;
        buf.advance(line_end + 2);

        if size == 0 {
            // Discard trailers up to and including the terminating empty line.
            loop {
                let end = fill_until_crlf(stream, &mut buf).await?;
                buf.advance(end + 2);
                if end == 0 {
                    return Ok(body.freeze());
                }
            }
        }

        // The size is peer-controlled; reject it before any arithmetic can overflow.
        if body.len().checked_add(size).is_none_or(|total| total > max_body_bytes) {
            return Err(FetchError::BodyTooLarge {
                max_bytes: max_body_bytes,
            });
        }
        let framed = size.checked_add(2).ok_or(FetchError::InvalidChunk)?;

        while buf.len() < framed {
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(FetchError::Incomplete);
            }
        }
        body.put(&buf[..size]);
        if &buf[size..framed] != b"\r\n" {
            return Err(FetchError::InvalidChunk);
        }
        buf.advance(framed);
    }
}

// Reads until `buf` contains a CRLF and returns the index of the `\r`.
async fn fill_until_crlf<S>(stream: &mut S, buf: &mut BytesMut) -> Result<usize, FetchError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            return Ok(pos);
        }
        if stream.read_buf(buf).await? == 0 {
            return Err(FetchError::Incomplete);
        }
    }
}
