use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a single URL fetch
///
/// Each variant belongs to exactly one stage of the fetch, see [`FetchError::stage`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured method is not a valid HTTP token
    #[error("invalid HTTP method {method:?}")]
    InvalidMethod { method: String },

    /// The target URL could not be parsed
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The bearer token file could not be read
    #[error("reading bearer token file {path:?} failed: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configured header is not valid HTTP
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The HTTP client could not be built
    #[error("building HTTP client failed: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Network or protocol failure while sending the request
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response status is not one of the accepted codes
    #[error("received status code {status}, expected any value out of {expected:?}")]
    UnexpectedStatus { status: u16, expected: Vec<u16> },

    /// The response body could not be read
    #[error("reading body failed: {0}")]
    ReadBody(#[source] reqwest::Error),

    /// The response body is not valid Prometheus text
    #[error("parsing metrics failed: {0}")]
    Parse(#[source] io::Error),
}

impl FetchError {
    /// Name of the stage the fetch failed in, used as a log field
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidMethod { .. } | Self::InvalidUrl { .. } => "construction",
            Self::TokenFile { .. } | Self::InvalidHeader { .. } => "augmentation",
            Self::ClientBuild(_) => "client",
            Self::Transport(_) => "transport",
            Self::UnexpectedStatus { .. } | Self::ReadBody(_) => "response",
            Self::Parse(_) => "parse",
        }
    }
}

/// A `content_encoding` value other than identity or gzip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported content encoding {0:?}, expected \"identity\" or \"gzip\"")]
pub struct UnsupportedEncoding(pub String);
