use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ocsp::OcspChecker;
use crate::pki::IssuerFetcher;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ocsp: OcspConfig,
    pub target: TargetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcspConfig {
    pub clock_skew_ms: u64,
    pub issuer_cache_capacity: usize,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
}

impl OcspConfig {
    pub fn clock_skew(&self) -> Duration {
        Duration::from_millis(self.clock_skew_ms)
    }

    /// HTTP client shared by the responder queries and issuer downloads.
    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
    }

    pub fn checker(&self, client: Client) -> OcspChecker {
        OcspChecker::new(client).with_clock_skew(self.clock_skew())
    }

    pub fn issuer_fetcher(&self, client: Client) -> IssuerFetcher {
        IssuerFetcher::with_capacity(client, self.issuer_cache_capacity)
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("ocsp.clock_skew_ms", 60_000)?
            .set_default("ocsp.issuer_cache_capacity", 1024)?
            .set_default("ocsp.http_timeout_secs", 10)?
            .set_default("target.host", "localhost")?
            .set_default("target.port", 443)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_OCSP__CLOCK_SKEW_MS or APP_TARGET__HOST
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
