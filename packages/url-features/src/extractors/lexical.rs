//! Lexical extractors (F1-F7): pure functions over the URL string.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::feature::Signal;

const IPV4: &str = r"(([01]?\d\d?|2[0-4]\d|25[0-5])\.([01]?\d\d?|2[0-4]\d|25[0-5])\.([01]?\d\d?|2[0-4]\d|25[0-5])\.([01]?\d\d?|2[0-4]\d|25[0-5]))";

const IPV6: &str = concat!(
    r"(([0-9a-fA-F]{1,4}:){7,7}[0-9a-fA-F]{1,4}|",
    r"([0-9a-fA-F]{1,4}:){1,7}:|",
    r"([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|",
    r"([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}|",
    r"([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}|",
    r"([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}|",
    r"([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}|",
    r"[0-9a-fA-F]{1,4}:((:[0-9a-fA-F]{1,4}){1,6})|",
    r":((:[0-9a-fA-F]{1,4}){1,7}|:)|",
    r"fe80:(:[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]{1,}|",
    r"::(ffff(:0{1,4}){0,1}:){0,1}((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])|",
    r"([0-9a-fA-F]{1,4}:){1,4}:((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9]))",
);

static IP_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("{}|{}", IPV4, IPV6)).expect("valid IP pattern"));

/// Literal skipped before counting sub-domain dots: IPv4 or a full IPv6.
static LEADING_IP_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("{}|(?:[a-fA-F0-9]{{1,4}}:){{7}}[a-fA-F0-9]{{1,4}}", IPV4))
        .expect("valid IP pattern")
});

static SHORTENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"bit\.ly|goo\.gl|shorte\.st|go2l\.ink|x\.co|ow\.ly|t\.co|tinyurl|tr\.im|is\.gd|cli\.gs|",
        r"yfrog\.com|migre\.me|ff\.im|tiny\.cc|url4\.eu|twit\.ac|su\.pr|twurl\.nl|snipurl\.com|",
        r"short\.to|BudURL\.com|ping\.fm|post\.ly|Just\.as|bkite\.com|snipr\.com|fic\.kr|loopt\.us|",
        r"doiop\.com|short\.ie|kl\.am|wp\.me|rubyurl\.com|om\.ly|to\.ly|bit\.do|lnkd\.in|",
        r"db\.tt|qr\.ae|adf\.ly|bitly\.com|cur\.lv|tinyurl\.com|ity\.im|",
        r"q\.gs|po\.st|bc\.vc|twitthis\.com|u\.to|j\.mp|buzurl\.com|cutt\.us|u\.bb|yourls\.org|",
        r"prettylinkpro\.com|scrnch\.me|filoops\.info|vzturl\.com|qr\.net|1url\.com|tweez\.me|v\.gd|",
        r"link\.zip\.net",
    ))
    .expect("valid shortener pattern")
});

/// F1: an IPv4 or IPv6 literal anywhere in the URL.
pub fn ip_address(url: &str) -> Signal {
    Signal::flag(IP_LITERAL.is_match(url))
}

/// F2: length banding, in characters.
pub fn url_length(url: &str) -> Signal {
    match url.chars().count() {
        0..=53 => Signal::Benign,
        54..=75 => Signal::Neutral,
        _ => Signal::Suspicious,
    }
}

/// F3: a known link-shortener host anywhere in the URL.
pub fn shortening_service(url: &str) -> Signal {
    Signal::flag(SHORTENER.is_match(url))
}

/// F4
pub fn at_symbol(url: &str) -> Signal {
    Signal::flag(url.contains('@'))
}

/// F5: the last `//` sits past the scheme separator.
pub fn double_slash_redirect(url: &str) -> Signal {
    let position = url.rfind("//").map(|byte| url[..byte].chars().count());
    Signal::flag(matches!(position, Some(p) if p > 6))
}

/// F6: a hyphen in the hostname.
pub fn prefix_suffix(hostname: &str) -> Signal {
    Signal::flag(hostname.contains('-'))
}

/// F7: dot count after any leading IP literal.
pub fn sub_domain(url: &str) -> Signal {
    let remainder = if IP_LITERAL.is_match(url) {
        LEADING_IP_LITERAL
            .find(url)
            .map_or(url, |m| &url[m.end()..])
    } else {
        url
    };

    match remainder.matches('.').count() {
        0..=3 => Signal::Benign,
        4 => Signal::Neutral,
        _ => Signal::Suspicious,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_of_len(n: usize) -> String {
        let base = "http://a.com/";
        format!("{}{}", base, "x".repeat(n - base.len()))
    }

    #[test]
    fn test_ip_address() {
        assert_eq!(ip_address("http://192.168.0.1/x"), Signal::Suspicious);
        assert_eq!(ip_address("http://[2001:db8::1]/login"), Signal::Suspicious);
        assert_eq!(
            ip_address("http://2001:0db8:85a3:0000:0000:8a2e:0370:7334/"),
            Signal::Suspicious
        );
        assert_eq!(ip_address("https://example.com/path"), Signal::Benign);
    }

    #[test]
    fn test_url_length_boundaries() {
        assert_eq!(url_length(&url_of_len(53)), Signal::Benign);
        assert_eq!(url_length(&url_of_len(54)), Signal::Neutral);
        assert_eq!(url_length(&url_of_len(75)), Signal::Neutral);
        assert_eq!(url_length(&url_of_len(76)), Signal::Suspicious);
    }

    #[test]
    fn test_shortening_service() {
        assert_eq!(shortening_service("http://bit.ly/abc"), Signal::Suspicious);
        assert_eq!(shortening_service("https://tinyurl.com/xyz"), Signal::Suspicious);
        assert_eq!(shortening_service("https://example.org/"), Signal::Benign);
    }

    #[test]
    fn test_at_symbol() {
        assert_eq!(at_symbol("http://user@evil.com"), Signal::Suspicious);
        assert_eq!(at_symbol("http://good.com"), Signal::Benign);
    }

    #[test]
    fn test_double_slash_redirect() {
        assert_eq!(double_slash_redirect("https://example.com"), Signal::Benign);
        assert_eq!(double_slash_redirect("http://example.com"), Signal::Benign);
        assert_eq!(
            double_slash_redirect("http://example.com//http://evil.com"),
            Signal::Suspicious
        );
        assert_eq!(double_slash_redirect("example.com"), Signal::Benign);
    }

    #[test]
    fn test_prefix_suffix() {
        assert_eq!(prefix_suffix("pay-pal.com"), Signal::Suspicious);
        assert_eq!(prefix_suffix("paypal.com"), Signal::Benign);
    }

    #[test]
    fn test_sub_domain_boundaries() {
        assert_eq!(sub_domain("http://a.b.c.d"), Signal::Benign);
        assert_eq!(sub_domain("http://a.b.c.d.e"), Signal::Neutral);
        assert_eq!(sub_domain("http://a.b.c.d.e.f"), Signal::Suspicious);
    }

    #[test]
    fn test_sub_domain_skips_ip_literal() {
        // Only the dots after the address are counted.
        assert_eq!(sub_domain("http://10.0.0.1/a.b"), Signal::Benign);
        assert_eq!(sub_domain("http://10.0.0.1/a.b.c.d.e.f"), Signal::Suspicious);
    }

    #[test]
    fn test_lexical_extractors_are_deterministic() {
        let url = "http://secure-login.example.co.uk//redirect?to=http://x.y";
        let first = [
            ip_address(url),
            url_length(url),
            shortening_service(url),
            at_symbol(url),
            double_slash_redirect(url),
            prefix_suffix(url),
            sub_domain(url),
        ];
        for _ in 0..3 {
            let again = [
                ip_address(url),
                url_length(url),
                shortening_service(url),
                at_symbol(url),
                double_slash_redirect(url),
                prefix_suffix(url),
                sub_domain(url),
            ];
            assert_eq!(first, again);
        }
    }
}
