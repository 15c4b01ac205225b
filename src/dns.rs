//! DNS resolver boundary: the only I/O surface of the crate.

use std::collections::HashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DnsError {
    #[error("NXDOMAIN: domain does not exist")]
    NxDomain,
    #[error("SERVFAIL: server failure")]
    ServFail,
    #[error("timeout")]
    Timeout,
    #[error("DNS error: {0}")]
    Other(String),
}

/// Name-resolution capability consumed by the evaluator.
///
/// Implementations may cache or retry transparently; the core issues each
/// query at most once per directive and never re-enters a call.
pub trait DnsResolver: Send + Sync + 'static {
    /// TXT record strings for a domain.
    fn query_txt(&self, domain: &str)
        -> impl Future<Output = Result<Vec<String>, DnsError>> + Send;

    /// Forward addresses (both families) for a hostname.
    fn query_host(&self, host: &str)
        -> impl Future<Output = Result<Vec<IpAddr>, DnsError>> + Send;

    /// Mail exchanger hostnames for a domain, in preference order.
    fn query_mx(&self, domain: &str)
        -> impl Future<Output = Result<Vec<String>, DnsError>> + Send;

    /// Reverse (PTR) hostnames for an address.
    fn query_ptr(&self, ip: IpAddr)
        -> impl Future<Output = Result<Vec<String>, DnsError>> + Send;
}

/// Hickory DNS resolver implementation.
#[derive(Clone)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Resolver with the default upstream configuration.
    pub fn new() -> Self {
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Self { resolver }
    }

    /// Resolver with explicit upstream configuration and options.
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Self { resolver }
    }

    fn classify_error(e: &hickory_resolver::ResolveError) -> DnsError {
        let msg = e.to_string().to_lowercase();
        if msg.contains("nxdomain") || msg.contains("no records") {
            DnsError::NxDomain
        } else if msg.contains("timeout") {
            DnsError::Timeout
        } else if msg.contains("servfail") {
            DnsError::ServFail
        } else {
            DnsError::Other(e.to_string())
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolver for HickoryResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => Ok(lookup.iter().map(|txt| txt.to_string()).collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => Ok(lookup.iter().collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => {
                let mut records: Vec<(u16, String)> = lookup
                    .iter()
                    .map(|mx| {
                        let host = mx.exchange().to_string();
                        (mx.preference(), host.trim_end_matches('.').to_string())
                    })
                    .collect();
                records.sort_by_key(|(preference, _)| *preference);
                Ok(records.into_iter().map(|(_, host)| host).collect())
            }
            Err(e) => Err(Self::classify_error(&e)),
        }
    }

    async fn query_ptr(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|name| name.to_string().trim_end_matches('.').to_string())
                .collect()),
            Err(e) => Err(Self::classify_error(&e)),
        }
    }
}

/// In-memory resolver for tests. Missing entries resolve to empty result
/// sets; use the `*_err` setters to simulate transport failures.
#[derive(Clone, Default)]
pub struct MockResolver {
    txt: Arc<Mutex<HashMap<String, Result<Vec<String>, DnsError>>>>,
    hosts: Arc<Mutex<HashMap<String, Result<Vec<IpAddr>, DnsError>>>>,
    mx: Arc<Mutex<HashMap<String, Vec<String>>>>,
    ptr: Arc<Mutex<HashMap<IpAddr, Vec<String>>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_txt(&self, domain: &str, records: Vec<String>) {
        self.txt
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), Ok(records));
    }

    pub fn add_txt_err(&self, domain: &str, err: DnsError) {
        self.txt
            .lock()
            .unwrap()
            .insert(domain.to_lowercase(), Err(err));
    }

    pub fn add_host(&self, host: &str, addrs: Vec<IpAddr>) {
        self.hosts
            .lock()
            .unwrap()
            .insert(host.to_lowercase(), Ok(addrs));
    }

    pub fn add_host_err(&self, host: &str, err: DnsError) {
        self.hosts
            .lock()
            .unwrap()
            .insert(host.to_lowercase(), Err(err));
    }

    pub fn add_mx(&self, domain: &str, hosts: Vec<String>) {
        self.mx.lock().unwrap().insert(domain.to_lowercase(), hosts);
    }

    pub fn add_ptr(&self, ip: IpAddr, names: Vec<String>) {
        self.ptr.lock().unwrap().insert(ip, names);
    }
}

impl DnsResolver for MockResolver {
    async fn query_txt(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.txt
            .lock()
            .unwrap()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn query_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.hosts
            .lock()
            .unwrap()
            .get(&host.to_lowercase())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn query_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        Ok(self
            .mx
            .lock()
            .unwrap()
            .get(&domain.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn query_ptr(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        Ok(self.ptr.lock().unwrap().get(&ip).cloned().unwrap_or_default())
    }
}
