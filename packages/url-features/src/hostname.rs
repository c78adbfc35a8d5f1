//! Hostname normalization.
//!
//! Works on raw strings rather than `url::Url`: inputs are frequently
//! malformed on purpose, and a best-effort substring is more useful to the
//! heuristics than a parse error.

/// Prefix a scheme when the URL has neither `http://` nor `https://`.
pub fn with_default_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Canonical hostname of a raw URL: no scheme, userinfo, port or leading `www.`.
pub fn hostname_from_url(url: &str) -> String {
    let url = with_default_scheme(url);
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(&url);

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();

    let host = strip_port(strip_userinfo(authority));
    strip_www(host).to_string()
}

/// Drop a leading `www.` (case-insensitive).
pub fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

fn strip_userinfo(authority: &str) -> &str {
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // Bracketed IPv6 literal keeps its brackets.
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
