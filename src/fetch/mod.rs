//! List source retrieval.
//!
//! A source is either an `http(s)://` URL or a filesystem path (a leading
//! `~` means the home directory). Either may be gzip-compressed, signalled by
//! a `.gz` suffix.

pub mod bootstrap;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::GzDecoder;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;

pub use bootstrap::BootstrapResolver;

/// Fetches list sources. One instance is shared by every source of a pass.
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Build the HTTP client, routing host lookups through the bootstrap
    /// servers when any of them is usable.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure);

        match BootstrapResolver::from_endpoints(&config.bootstrap, config.bootstrap_timeout) {
            Some(resolver) => {
                debug!(servers = ?resolver.servers(), "list downloads use bootstrap resolvers");
                builder = builder.dns_resolver(Arc::new(resolver));
            }
            None => warn!("no usable bootstrap resolver, list downloads use the system resolver"),
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Fetch one source and decompress it if its name ends in `.gz`.
    pub async fn fetch(&self, source: &str) -> Result<Vec<u8>, FetchError> {
        let data = if is_remote(source) {
            info!(url = source, "fetching online list");
            self.fetch_remote(source).await?
        } else {
            let path = expand_home(source)?;
            info!(path = %path.display(), "fetching local list");
            tokio::fs::read(&path)
                .await
                .map_err(|source| FetchError::Io { path, source })?
        };

        if source.ends_with(".gz") {
            gunzip(source, &data)
        } else {
            Ok(data)
        }
    }

    /// Fetch every source concurrently. Results are in `sources` order.
    pub async fn fetch_all<S: AsRef<str>>(
        &self,
        sources: &[S],
    ) -> Vec<Result<Vec<u8>, FetchError>> {
        join_all(sources.iter().map(|source| self.fetch(source.as_ref()))).await
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= attempts => {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => debug!(url, attempt, error = %e, "list download failed, retrying"),
            }
            attempt += 1;
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(source: &str) -> Result<PathBuf, FetchError> {
    match source.strip_prefix('~') {
        Some(rest) => {
            let home =
                dirs::home_dir().ok_or_else(|| FetchError::NoHomeDir(source.to_string()))?;
            Ok(home.join(rest.trim_start_matches('/')))
        }
        None => Ok(PathBuf::from(source)),
    }
}

/// Decompress a gzip payload fetched from `source_id`.
pub fn gunzip(source_id: &str, data: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|source| FetchError::Gzip {
            source_id: source_id.to_string(),
            source,
        })?;
    Ok(out)
}
