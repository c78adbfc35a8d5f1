//! DNS resolvability probe.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::hostname::strip_www;

/// Resolves a hostname to addresses.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// All addresses for `host`; an empty list means it did not resolve.
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// The operating system's dual-stack resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Answers "does this host resolve?" with a timeout and a `www.` retry.
#[derive(Clone)]
pub struct DnsProber {
    resolver: Arc<dyn DnsResolver>,
    timeout: Duration,
}

impl DnsProber {
    pub fn new(resolver: Arc<dyn DnsResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// True when `host`, or `host` without a leading `www.`, resolves.
    pub async fn is_resolvable(&self, host: &str) -> bool {
        !self.addresses(host).await.is_empty()
    }

    /// First address for `host`, preferring IPv4.
    pub async fn resolve_ip(&self, host: &str) -> Option<IpAddr> {
        let addrs = self.addresses(host).await;
        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
    }

    async fn addresses(&self, host: &str) -> Vec<IpAddr> {
        if host.is_empty() {
            return Vec::new();
        }

        let addrs = self.lookup_once(host).await;
        if !addrs.is_empty() {
            return addrs;
        }

        let stripped = strip_www(host);
        if stripped != host && !stripped.is_empty() {
            debug!(host = %host, "retrying DNS without www");
            return self.lookup_once(stripped).await;
        }

        addrs
    }

    async fn lookup_once(&self, host: &str) -> Vec<IpAddr> {
        // Bracketed IPv6 literals resolve to themselves.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        match tokio::time::timeout(self.timeout, self.resolver.lookup(host)).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => {
                debug!(host = %host, error = %e, "DNS lookup failed");
                Vec::new()
            }
            Err(_) => {
                debug!(host = %host, timeout = ?self.timeout, "DNS lookup timed out");
                Vec::new()
            }
        }
    }
}
