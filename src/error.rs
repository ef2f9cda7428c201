//! Error types for list fetching and bootstrap resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain the raw contents of one list source.
///
/// None of these abort a configuration pass; the caller logs the error and
/// moves on to the next source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot expand `~` in {0}: home directory unknown")]
    NoHomeDir(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("{url}: gave up after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    #[error("gzip decompression failed for {source_id}: {source}")]
    Gzip {
        source_id: String,
        #[source]
        source: io::Error,
    },
}

/// Failure to resolve a host name through the bootstrap resolvers.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("bootstrap socket error: {0}")]
    Io(#[from] io::Error),

    #[error("bootstrap server {0} timed out")]
    Timeout(std::net::SocketAddr),

    #[error("no bootstrap server returned an address for {0}")]
    NoAnswer(String),
}
