//! MX resolution for destination domains.
//!
//! [`DnsResolver`] performs MX lookups through hickory and keeps a lock-free
//! cache keyed by domain. Entries live for the smallest TTL in the answer,
//! clamped to the configured bounds, unless `cache_ttl_secs` overrides it.
//!
//! A domain without MX records is not deliverable: there is no fallback to
//! A/AAAA records.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::try_join_all;
use hickory_resolver::{
    ResolveError, TokioResolver,
    config::ResolverOpts,
    name_server::TokioConnectionProvider,
    proto::rr::Record,
};
use mxrelay_common::{DomainMap, MxRecord, tracing};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::RelayError;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("No mail servers found for domain: {0}")]
    NoMailServers(String),

    #[error("DNS lookup failed: {0}")]
    LookupFailed(#[from] ResolveError),

    /// NXDOMAIN.
    #[error("Domain does not exist: {0}")]
    DomainNotFound(String),

    #[error("DNS query timed out for domain: {0}")]
    Timeout(String),
}

/// Resolver and cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Per-query timeout (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed cache lifetime for every entry, ignoring record TTLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,

    /// Lower bound applied to record TTLs (default: 60)
    #[serde(default = "default_min_cache_ttl_secs")]
    pub min_cache_ttl_secs: u64,

    /// Upper bound applied to record TTLs (default: 3600)
    #[serde(default = "default_max_cache_ttl_secs")]
    pub max_cache_ttl_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    5
}

const fn default_min_cache_ttl_secs() -> u64 {
    60
}

const fn default_max_cache_ttl_secs() -> u64 {
    3600
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: None,
            min_cache_ttl_secs: default_min_cache_ttl_secs(),
            max_cache_ttl_secs: default_max_cache_ttl_secs(),
        }
    }
}

impl DnsConfig {
    /// How long an answer with the given record TTL stays cached.
    #[must_use]
    pub fn cache_ttl(&self, record_ttl: u32) -> Duration {
        let secs = self.cache_ttl_secs.unwrap_or_else(|| {
            u64::from(record_ttl).clamp(
                self.min_cache_ttl_secs,
                self.max_cache_ttl_secs.max(self.min_cache_ttl_secs),
            )
        });
        Duration::from_secs(secs)
    }
}

/// Looks up the mail exchangers of a domain.
///
/// The returned records are in whatever order the source produced them;
/// [`resolve_all`] takes care of ordering.
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`DnsError`] if the domain has no usable MX records or the
    /// lookup itself fails.
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError>;
}

#[derive(Debug, Clone)]
struct CachedResult {
    records: Vec<MxRecord>,
    expires_at: Instant,
}

/// hickory-backed [`MxResolver`] with a concurrent TTL cache.
#[derive(Debug)]
pub struct DnsResolver {
    resolver: TokioResolver,
    cache: DashMap<String, CachedResult>,
    config: DnsConfig,
}

impl DnsResolver {
    /// Uses the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system DNS configuration cannot be loaded.
    pub fn new(config: DnsConfig) -> Result<Self, DnsError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(config.timeout_secs);

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self {
            resolver,
            cache: DashMap::new(),
            config,
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached domains, expired entries included.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub const fn config(&self) -> &DnsConfig {
        &self.config
    }

    async fn lookup(&self, domain: &str) -> Result<(Vec<MxRecord>, u32), DnsError> {
        let lookup = self.resolver.mx_lookup(domain).await.map_err(|err| {
            if err.is_nx_domain() {
                DnsError::DomainNotFound(domain.to_string())
            } else if err.is_no_records_found() {
                DnsError::NoMailServers(domain.to_string())
            } else {
                warn!("MX lookup failed for {domain}: {err}");
                DnsError::LookupFailed(err)
            }
        })?;

        let ttl = lookup
            .as_lookup()
            .records()
            .iter()
            .map(Record::ttl)
            .min()
            .unwrap_or(300);

        let records: Vec<MxRecord> = lookup
            .iter()
            .map(|mx| {
                let exchange = mx.exchange().to_utf8();
                let exchange = exchange.trim_end_matches('.');
                debug!("Found MX record for {domain}: {exchange} ({})", mx.preference());
                MxRecord::new(exchange, mx.preference())
            })
            .collect();

        if records.is_empty() {
            return Err(DnsError::NoMailServers(domain.to_string()));
        }

        Ok((records, ttl))
    }
}

#[async_trait]
impl MxResolver for DnsResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<MxRecord>, DnsError> {
        if let Some(cached) = self.cache.get(domain) {
            if cached.expires_at > Instant::now() {
                debug!("Cache hit for {domain}, {} record(s)", cached.records.len());
                return Ok(cached.records.clone());
            }
            debug!("Cache entry expired for {domain}");
        }

        let (records, record_ttl) = self.lookup(domain).await?;
        let ttl = self.config.cache_ttl(record_ttl);

        self.cache.insert(
            domain.to_string(),
            CachedResult {
                records: records.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        debug!(
            "Cached {} record(s) for {domain}, record TTL: {record_ttl}s, cache TTL: {}s",
            records.len(),
            ttl.as_secs()
        );
        Ok(records)
    }
}

/// Attaches priority-ordered exchangers to every domain in `domains`.
///
/// All domains are looked up concurrently. The first failure aborts the whole
/// operation, so either every domain comes back resolved or none does.
/// Records with equal priority keep the order the resolver returned them in.
///
/// # Errors
///
/// Returns [`RelayError::Resolution`] naming the first domain whose lookup failed.
#[tracing::instrument(skip_all, fields(domains = domains.len()))]
pub async fn resolve_all(
    resolver: &dyn MxResolver,
    mut domains: DomainMap,
) -> Result<DomainMap, RelayError> {
    let lookups = domains.keys().cloned().map(|domain| async move {
        resolver
            .resolve_mx(domain.as_str())
            .await
            .map(|records| (domain.clone(), records))
            .map_err(|source| RelayError::Resolution {
                domain: domain.to_string(),
                source,
            })
    });

    for (domain, mut records) in try_join_all(lookups).await? {
        records.sort_by_key(|record| record.priority);
        if let Some(entry) = domains.get_mut(&domain) {
            entry.hosts = records;
        }
    }

    Ok(domains)
}
