//! Request body construction
//!
//! Turns the configured body string into a closable byte stream, optionally
//! gzip-compressed. The stream is owned by a [`BodyGuard`] until it is attached
//! to an outbound request with [`BodyGuard::into_body`], after which the
//! transport owns it and releases it when the request is sent or dropped.

use bytes::Bytes;
use flate2::read::GzEncoder;
use flate2::Compression;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Cursor, Read};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::UnsupportedEncoding;

/// Chunk size used when streaming a body into the transport
const CHUNK_SIZE: usize = 8 * 1024;

/// Encoding applied to the request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentEncoding {
    /// Body is sent as-is
    #[default]
    Identity,
    /// Body is gzip-compressed
    Gzip,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
        }
    }

    /// Value for the `Content-Encoding` request header, if one is needed
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            Self::Identity => None,
            Self::Gzip => Some("gzip"),
        }
    }
}

impl FromStr for ContentEncoding {
    type Err = UnsupportedEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "identity" | "none" => Ok(Self::Identity),
            "gzip" => Ok(Self::Gzip),
            _ => Err(UnsupportedEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for ContentEncoding {
    type Error = UnsupportedEncoding;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentEncoding> for String {
    fn from(value: ContentEncoding) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A readable request payload that must be closed exactly once
pub trait BodyResource: Read + Send + Sync {
    /// Release the underlying buffer or compressor
    fn close(&mut self) -> io::Result<()>;
}

/// Constructs the body resource for a fetch
///
/// Injected into [`crate::fetcher::HttpInput`] so callers can substitute an
/// instrumented resource.
pub type BodyFactory =
    Arc<dyn Fn(ContentEncoding, &str) -> Option<Box<dyn BodyResource>> + Send + Sync>;

/// The factory used unless one is injected
pub fn default_body_factory() -> BodyFactory {
    Arc::new(make_body_reader)
}

/// Build the body resource for `content`
///
/// Returns `None` for an empty body regardless of encoding. Gzip output is
/// produced lazily while the resource is read.
pub fn make_body_reader(
    encoding: ContentEncoding,
    content: &str,
) -> Option<Box<dyn BodyResource>> {
    if content.is_empty() {
        return None;
    }

    let source = Cursor::new(content.as_bytes().to_vec());
    match encoding {
        ContentEncoding::Identity => Some(Box::new(PlainBody {
            inner: Some(source),
        })),
        ContentEncoding::Gzip => Some(Box::new(GzipBody {
            inner: Some(GzEncoder::new(source, Compression::default())),
        })),
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "read on closed request body")
}

struct PlainBody {
    inner: Option<Cursor<Vec<u8>>>,
}

impl Read for PlainBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Err(closed_error()),
        }
    }
}

impl BodyResource for PlainBody {
    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

struct GzipBody {
    inner: Option<GzEncoder<Cursor<Vec<u8>>>>,
}

impl Read for GzipBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Err(closed_error()),
        }
    }
}

impl BodyResource for GzipBody {
    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// Single owner of a [`BodyResource`]
///
/// `close` is idempotent and dropping an unclosed guard closes the resource,
/// so the resource is closed exactly once whichever path releases it.
pub struct BodyGuard {
    resource: Box<dyn BodyResource>,
    closed: bool,
}

impl BodyGuard {
    pub fn new(resource: Box<dyn BodyResource>) -> Self {
        Self {
            resource,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the resource; later calls are no-ops
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.resource.close()
    }

    /// Hand the resource over to a request body
    ///
    /// The returned body streams the resource and closes it at end of stream
    /// or when the body is dropped, whichever happens first.
    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(BodyStream {
            guard: self,
            buf: vec![0; CHUNK_SIZE].into_boxed_slice(),
        })
    }
}

impl Drop for BodyGuard {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "closing request body failed");
        }
    }
}

impl fmt::Debug for BodyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyGuard")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Adapts an attached body resource to the transport's chunk stream
struct BodyStream {
    guard: BodyGuard,
    buf: Box<[u8]>,
}

impl Stream for BodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.guard.is_closed() {
            return Poll::Ready(None);
        }

        loop {
            match this.guard.resource.read(&mut this.buf) {
                Ok(0) => {
                    return match this.guard.close() {
                        Ok(()) => Poll::Ready(None),
                        Err(e) => Poll::Ready(Some(Err(e))),
                    };
                }
                Ok(n) => return Poll::Ready(Some(Ok(Bytes::copy_from_slice(&this.buf[..n])))),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    if let Err(close_err) = this.guard.close() {
                        tracing::debug!(error = %close_err, "closing request body failed");
                    }
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
