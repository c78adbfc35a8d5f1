//! Popularity (F20) and static reputation (F22).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;

use super::dns::DnsProber;
use crate::types::config::PopularityPolicy;
use crate::types::feature::Signal;

static SUSPICIOUS_HOSTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"at\.ua|usa\.cc|baltazarpresentes\.com\.br|pe\.hu|esy\.es|hol\.es|sweddy\.com|myjino\.ru|96\.lt|ow\.ly",
    )
    .expect("valid host pattern")
});

const SUSPICIOUS_IP_LIST: &[&str] = &[
    "146.112.61.108", "213.174.157.151", "121.50.168.88", "192.185.217.116", "78.46.211.158",
    "181.174.165.13", "46.242.145.103", "121.50.168.40", "83.125.22.219", "46.242.145.98",
    "107.151.148.44", "107.151.148.107", "64.70.19.203", "199.184.144.27", "107.151.148.108",
    "107.151.148.109", "119.28.52.61", "54.83.43.69", "52.69.166.231", "216.58.192.225",
    "118.184.25.86", "67.208.74.71", "23.253.126.58", "104.239.157.210", "175.126.123.219",
    "141.8.224.221", "10.10.10.10", "43.229.108.32", "103.232.215.140", "69.172.201.153",
    "216.218.185.162", "54.225.104.146", "103.243.24.98", "199.59.243.120", "31.170.160.61",
    "213.19.128.77", "62.113.226.131", "208.100.26.234", "195.16.127.102", "195.16.127.157",
    "34.196.13.28", "103.224.212.222", "172.217.4.225", "54.72.9.51", "192.64.147.141",
    "198.200.56.183", "23.253.164.103", "52.48.191.26", "52.214.197.72", "87.98.255.18",
    "209.99.17.27", "216.38.62.18", "104.130.124.96", "47.89.58.141", "54.86.225.156",
    "54.82.156.19", "37.157.192.102", "204.11.56.48", "110.34.231.42",
];

static SUSPICIOUS_IPS: Lazy<HashSet<IpAddr>> = Lazy::new(|| {
    SUSPICIOUS_IP_LIST
        .iter()
        .filter_map(|ip| ip.parse().ok())
        .collect()
});

/// F20: popularity from an allowlist plus hostname shape.
pub fn web_traffic(hostname: &str, policy: &PopularityPolicy) -> Signal {
    let host = hostname.to_lowercase();

    if policy.allowlist.iter().any(|domain| host.contains(domain.as_str())) {
        return Signal::Benign;
    }

    let labels = host.split('.').count();
    let len = host.chars().count();

    if labels <= policy.benign_max_labels && len < policy.benign_max_len {
        Signal::Benign
    } else if len > policy.suspicious_min_len || labels > policy.suspicious_max_labels {
        Signal::Suspicious
    } else {
        Signal::Neutral
    }
}

/// Whether a resolved address is on the static blocklist.
pub fn is_suspicious_ip(ip: &IpAddr) -> bool {
    SUSPICIOUS_IPS.contains(ip)
}

/// F22: static reputation of the URL and the address its host resolves to.
#[derive(Clone)]
pub struct ReputationProbe {
    dns: DnsProber,
}

impl ReputationProbe {
    pub fn new(dns: DnsProber) -> Self {
        Self { dns }
    }

    /// 0 when the host does not resolve; -1 on a blocklisted host pattern or
    /// address; 1 otherwise. The address list is IPv4 only, so hosts without
    /// an A record are judged on the host pattern alone.
    pub async fn check(&self, url: &str, hostname: &str) -> Signal {
        let Some(ip) = self.dns.resolve_ip(hostname).await else {
            return Signal::Neutral;
        };

        let listed_ip = ip.is_ipv4() && is_suspicious_ip(&ip);
        let flagged = SUSPICIOUS_HOSTS.is_match(url) || listed_ip;
        if flagged {
            tracing::debug!(url = %url, ip = %ip, "reputation blocklist hit");
        }
        Signal::flag(flagged)
    }
}
