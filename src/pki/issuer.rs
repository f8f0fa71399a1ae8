use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

use super::certificate::Certificate;
use crate::ocsp::{OcspResult, success_body};

pub const DEFAULT_ISSUER_CACHE_CAPACITY: usize = 1024;

/// Downloads issuer certificates from the CA issuers location of the AIA
/// extension, remembering them by URI.
///
/// Clones share one cache. Entries never expire; the least recently used one
/// is evicted once the capacity is reached.
#[derive(Debug, Clone)]
pub struct IssuerFetcher {
    client: Client,
    cache: Arc<Mutex<LruCache<String, Certificate>>>,
}

impl IssuerFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_capacity(client, DEFAULT_ISSUER_CACHE_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(client: Client, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Returns the issuer of `cert`.
    ///
    /// The cache lock is released while downloading, so concurrent misses for
    /// the same URI may each fetch it.
    #[instrument(skip_all)]
    pub async fn fetch(&self, cert: &Certificate) -> OcspResult<Certificate> {
        let uri = cert.ca_issuers_uri()?;

        if let Some(issuer) = self.cache.lock().await.get(&uri) {
            debug!("Issuer cache hit for {}", uri);
            return Ok(issuer.clone());
        }

        Url::parse(&uri)?;
        info!("Fetching issuer certificate from {}", uri);
        let response = self.client.get(&uri).send().await?;
        let body = success_body(response, &uri).await?;
        let issuer = Certificate::from_der(body)?;

        self.cache.lock().await.put(uri, issuer.clone());
        Ok(issuer)
    }

    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }
}
