//! Document extractors (F9-F15, F17).
//!
//! Each function takes the fetched page when one exists. `None` yields the
//! value used for pages that could not be retrieved.
//!
//! A reference string is "same-site" when it contains either the full URL
//! or the page hostname.

use crate::hostname::hostname_from_url;
use crate::types::document::Document;
use crate::types::feature::Signal;

fn is_same_site(reference: &str, url: &str, hostname: &str) -> bool {
    reference.contains(url) || reference.contains(hostname)
}

/// Same-site, or a bare `name.ext` reference.
fn is_local_resource(reference: &str, url: &str, hostname: &str) -> bool {
    is_same_site(reference, url, hostname) || reference.matches('.').count() == 1
}

fn percentage(part: usize, total: usize) -> f64 {
    part as f64 / total as f64 * 100.0
}

/// F9: share of `link[href]` targets served from the page's own host.
pub fn favicon(doc: Option<&Document>, url: &str, hostname: &str) -> Signal {
    let Some(doc) = doc else {
        return Signal::Neutral;
    };

    let url_host = hostname_from_url(url);
    let hrefs: Vec<&str> = doc
        .attr_values("link", "href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .collect();

    if hrefs.is_empty() {
        return Signal::Benign;
    }

    let same_origin = hrefs
        .iter()
        .filter(|href| {
            let href_host = if href.starts_with("//") {
                hostname_from_url(&format!("http:{}", href))
            } else if href.starts_with("http://") || href.starts_with("https://") {
                hostname_from_url(href)
            } else {
                hostname.to_string()
            };
            href_host.contains(hostname) || href.contains(url_host.as_str())
        })
        .count();

    let ratio = percentage(same_origin, hrefs.len());
    if ratio >= 50.0 {
        Signal::Benign
    } else if ratio >= 20.0 {
        Signal::Neutral
    } else {
        Signal::Suspicious
    }
}

/// F10: an `http` token after the leading scheme. URL-only.
pub fn https_token(url: &str) -> Signal {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    Signal::flag(rest.contains("http"))
}

/// F11: embedded media sources that stay on-site.
pub fn request_url(doc: Option<&Document>, url: &str, hostname: &str) -> Signal {
    let Some(doc) = doc else {
        return Signal::Neutral;
    };

    let sources: Vec<&str> = ["img", "audio", "embed", "iframe"]
        .into_iter()
        .flat_map(|tag| doc.attr_values(tag, "src"))
        .collect();

    if sources.is_empty() {
        return Signal::Benign;
    }

    let local = sources
        .iter()
        .filter(|src| is_local_resource(src, url, hostname))
        .count();

    let ratio = percentage(local, sources.len());
    if ratio < 22.0 {
        Signal::Benign
    } else if ratio < 61.0 {
        Signal::Neutral
    } else {
        Signal::Suspicious
    }
}

/// F12: anchors that are fragments, script or mail links, or off-site.
pub fn url_of_anchor(doc: Option<&Document>, url: &str, hostname: &str) -> Signal {
    let Some(doc) = doc else {
        return Signal::Neutral;
    };

    let hrefs: Vec<&str> = doc.attr_values("a", "href").collect();
    if hrefs.is_empty() {
        return Signal::Benign;
    }

    let unsafe_count = hrefs
        .iter()
        .filter(|href| {
            let lower = href.to_lowercase();
            href.contains('#')
                || lower.contains("javascript")
                || lower.contains("mailto")
                || !is_same_site(href, url, hostname)
        })
        .count();

    let ratio = percentage(unsafe_count, hrefs.len());
    if ratio < 31.0 {
        Signal::Benign
    } else if ratio < 67.0 {
        Signal::Neutral
    } else {
        Signal::Suspicious
    }
}

/// F13: `link[href]` and `script[src]` that stay on-site.
pub fn links_in_tags(doc: Option<&Document>, url: &str, hostname: &str) -> Signal {
    let Some(doc) = doc else {
        return Signal::Neutral;
    };

    let references: Vec<&str> = doc
        .attr_values("link", "href")
        .chain(doc.attr_values("script", "src"))
        .collect();

    if references.is_empty() {
        return Signal::Benign;
    }

    let local = references
        .iter()
        .filter(|r| is_local_resource(r, url, hostname))
        .count();

    let ratio = percentage(local, references.len());
    if ratio < 17.0 {
        Signal::Benign
    } else if ratio < 81.0 {
        Signal::Neutral
    } else {
        Signal::Suspicious
    }
}

/// F14: where forms submit to, decided by majority over all forms.
pub fn server_form_handler(doc: Option<&Document>, url: &str, hostname: &str) -> Signal {
    let Some(doc) = doc else {
        return Signal::Benign;
    };

    let hostname = hostname.to_lowercase();
    let url_host = hostname_from_url(url).to_lowercase();

    let (mut blank, mut foreign, mut same) = (0usize, 0usize, 0usize);
    for action in doc.attr_values("form", "action") {
        let action = action.trim().to_lowercase();
        if action.is_empty() || action == "about:blank" {
            blank += 1;
        } else if (!hostname.is_empty() && action.contains(&hostname))
            || (!url.is_empty() && action.contains(&url_host))
        {
            same += 1;
        } else {
            foreign += 1;
        }
    }

    if blank + foreign + same == 0 {
        return Signal::Benign;
    }
    if blank > foreign.max(same) {
        Signal::Suspicious
    } else if foreign >= same {
        Signal::Neutral
    } else {
        Signal::Benign
    }
}

/// F15: any form posting to a `mailto:` address.
pub fn submitting_to_email(doc: Option<&Document>) -> Signal {
    let Some(doc) = doc else {
        return Signal::Benign;
    };
    Signal::flag(
        doc.attr_values("form", "action")
            .any(|action| action.contains("mailto:")),
    )
}

/// F17: invisible frames.
///
/// Only frames declaring both `width` and `height` are considered. One frame
/// with every dimension and its border at `"0"` is enough for `Suspicious`;
/// otherwise a single zero anywhere gives `Neutral`.
pub fn iframe(doc: Option<&Document>) -> Signal {
    let Some(doc) = doc else {
        return Signal::Benign;
    };

    let frames: Vec<[bool; 3]> = doc
        .tags("iframe")
        .chain(doc.tags("i_frame"))
        .filter(|el| el.has_attr("width") && el.has_attr("height"))
        .map(|el| {
            let zero = |name: &str| el.attr(name) == Some("0");
            [zero("width"), zero("height"), zero("frameborder")]
        })
        .collect();

    if frames.iter().any(|zeros| zeros.iter().all(|z| *z)) {
        Signal::Suspicious
    } else if frames.iter().any(|zeros| zeros.iter().any(|z| *z)) {
        Signal::Neutral
    } else {
        Signal::Benign
    }
}
