//! Ternary signals and the fixed 22-slot feature vector.

use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 22;

/// A single heuristic signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i8)]
pub enum Signal {
    /// Looks malicious
    Suspicious = -1,
    /// Unknown, or the stage that computes it was unavailable
    #[default]
    Neutral = 0,
    /// Looks legitimate
    Benign = 1,
}

impl Signal {
    /// Integer value in {-1, 0, 1}.
    pub fn value(self) -> i8 {
        self as i8
    }

    /// `Suspicious` when the condition holds, `Benign` otherwise.
    pub fn flag(suspicious: bool) -> Self {
        if suspicious {
            Signal::Suspicious
        } else {
            Signal::Benign
        }
    }
}

impl TryFrom<i64> for Signal {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Signal::Suspicious),
            0 => Ok(Signal::Neutral),
            1 => Ok(Signal::Benign),
            other => Err(format!("signal out of range: {}", other)),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.value())
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Signal::try_from(raw).map_err(de::Error::custom)
    }
}

/// Feature positions F1-F22, in the order the classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    IpAddress,
    UrlLength,
    ShorteningService,
    AtSymbol,
    DoubleSlashRedirect,
    PrefixSuffix,
    SubDomain,
    RegistrationLength,
    Favicon,
    HttpsToken,
    RequestUrl,
    AnchorUrl,
    LinksInTags,
    Sfh,
    SubmitToEmail,
    AbnormalUrl,
    Iframe,
    DomainAge,
    DnsRecord,
    WebTraffic,
    SearchIndex,
    ReputationReport,
}

impl Feature {
    /// All features in vector order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::IpAddress,
        Feature::UrlLength,
        Feature::ShorteningService,
        Feature::AtSymbol,
        Feature::DoubleSlashRedirect,
        Feature::PrefixSuffix,
        Feature::SubDomain,
        Feature::RegistrationLength,
        Feature::Favicon,
        Feature::HttpsToken,
        Feature::RequestUrl,
        Feature::AnchorUrl,
        Feature::LinksInTags,
        Feature::Sfh,
        Feature::SubmitToEmail,
        Feature::AbnormalUrl,
        Feature::Iframe,
        Feature::DomainAge,
        Feature::DnsRecord,
        Feature::WebTraffic,
        Feature::SearchIndex,
        Feature::ReputationReport,
    ];

    /// Zero-based slot in the vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable external name.
    pub fn name(self) -> &'static str {
        match self {
            Feature::IpAddress => "ip-address",
            Feature::UrlLength => "url-length",
            Feature::ShorteningService => "shortening-service",
            Feature::AtSymbol => "at-symbol",
            Feature::DoubleSlashRedirect => "double-slash-redirect",
            Feature::PrefixSuffix => "prefix-suffix",
            Feature::SubDomain => "sub-domain",
            Feature::RegistrationLength => "registration-length",
            Feature::Favicon => "favicon",
            Feature::HttpsToken => "https-token",
            Feature::RequestUrl => "request-url",
            Feature::AnchorUrl => "anchor-url",
            Feature::LinksInTags => "links-in-tags",
            Feature::Sfh => "sfh",
            Feature::SubmitToEmail => "submit-to-email",
            Feature::AbnormalUrl => "abnormal-url",
            Feature::Iframe => "iframe",
            Feature::DomainAge => "domain-age",
            Feature::DnsRecord => "dns-record",
            Feature::WebTraffic => "web-traffic",
            Feature::SearchIndex => "search-index",
            Feature::ReputationReport => "reputation-report",
        }
    }

    /// Column label used in tabular output (`F1`..`F22`).
    pub fn column(self) -> String {
        format!("F{}", self.index() + 1)
    }
}

/// Exactly 22 signals. Slots that no stage filled stay [`Signal::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureVector([Signal; FEATURE_COUNT]);

impl FeatureVector {
    /// All-neutral vector; also the substitution for a failed extraction.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn from_signals(signals: [Signal; FEATURE_COUNT]) -> Self {
        Self(signals)
    }

    pub fn get(&self, feature: Feature) -> Signal {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, signal: Signal) {
        self.0[feature.index()] = signal;
    }

    /// Set several consecutive-or-not slots at once.
    pub fn set_all(&mut self, values: &[(Feature, Signal)]) {
        for &(feature, signal) in values {
            self.set(feature, signal);
        }
    }

    pub fn signals(&self) -> &[Signal; FEATURE_COUNT] {
        &self.0
    }

    /// Integer values in vector order.
    pub fn values(&self) -> [i8; FEATURE_COUNT] {
        self.0.map(Signal::value)
    }

    /// Values as `f64`, the shape numeric classifiers consume.
    pub fn as_f64(&self) -> [f64; FEATURE_COUNT] {
        self.0.map(|s| f64::from(s.value()))
    }

    /// Feature name to value, in vector order.
    pub fn named(&self) -> IndexMap<&'static str, i8> {
        Feature::ALL
            .iter()
            .map(|f| (f.name(), self.get(*f).value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_indices_follow_contract_order() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
        assert_eq!(Feature::IpAddress.column(), "F1");
        assert_eq!(Feature::ReputationReport.column(), "F22");
    }

    #[test]
    fn test_neutral_vector() {
        let v = FeatureVector::neutral();
        assert_eq!(v.values(), [0i8; FEATURE_COUNT]);
    }

    #[test]
    fn test_named_map_is_ordered() {
        let mut v = FeatureVector::neutral();
        v.set(Feature::DnsRecord, Signal::Suspicious);

        let named = v.named();
        assert_eq!(named.len(), FEATURE_COUNT);
        assert_eq!(named.get_index(0).map(|(k, _)| *k), Some("ip-address"));
        assert_eq!(named.get("dns-record"), Some(&-1));
    }

    #[test]
    fn test_serializes_as_integer_array() {
        let mut v = FeatureVector::neutral();
        v.set(Feature::IpAddress, Signal::Benign);
        v.set(Feature::UrlLength, Signal::Suspicious);

        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with("[1,-1,0"));

        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_rejects_out_of_range_signal() {
        assert!(Signal::try_from(2).is_err());
        assert!(serde_json::from_str::<Signal>("-2").is_err());
    }
}
