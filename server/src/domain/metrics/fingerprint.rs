//! Attribute fingerprinting
//!
//! Normalizes well-known attribute aliases, drops configured keys, and
//! computes the content hash that identifies a series' attribute set.

use std::hash::Hasher;

use rustc_hash::{FxHashSet, FxHasher};

use crate::data::types::{AttrMap, Datapoint};

/// Well-known attribute name with the legacy aliases it supersedes
struct AttrName {
    canonical: &'static str,
    alts: &'static [&'static str],
}

const ATTR_NAMES: &[AttrName] = &[
    AttrName {
        canonical: "deployment.environment",
        alts: &["deployment_environment", "environment", "env"],
    },
    AttrName {
        canonical: "service.name",
        alts: &["service_name", "service", "component"],
    },
    AttrName {
        canonical: "service.version",
        alts: &["service_version"],
    },
    AttrName {
        canonical: "url.scheme",
        alts: &["http.scheme", "http_scheme"],
    },
    AttrName {
        canonical: "url.full",
        alts: &["http.url", "http_url"],
    },
    AttrName {
        canonical: "url.path",
        alts: &["http.target", "http_target"],
    },
    AttrName {
        canonical: "http.request.method",
        alts: &["http.method"],
    },
    AttrName {
        canonical: "http.response.status_code",
        alts: &["http.status_code"],
    },
];

/// Computes attribute fingerprints for incoming datapoints
pub struct Fingerprinter {
    drop_attrs: FxHashSet<String>,
}

impl Fingerprinter {
    pub fn new(drop_attrs: &[String]) -> Self {
        Self {
            drop_attrs: drop_attrs.iter().cloned().collect(),
        }
    }

    /// Normalize attributes and fill in `attrs_hash`, `string_keys`, and
    /// `string_values`. Keys are sorted so the hash is order-independent.
    pub fn fingerprint(&self, dp: &mut Datapoint) {
        normalize_attrs(&mut dp.attrs);

        if !self.drop_attrs.is_empty() {
            dp.attrs.retain(|key, _| !self.drop_attrs.contains(key));
        }

        let mut keys: Vec<String> = dp.attrs.keys().cloned().collect();
        keys.sort_unstable();

        let mut hasher = FxHasher::default();
        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            let value = &dp.attrs[key];
            hasher.write(key.as_bytes());
            hasher.write(value.as_bytes());
            values.push(value.clone());
        }

        dp.attrs_hash = hasher.finish();
        dp.string_keys = keys;
        dp.string_values = values;
    }
}

/// Rewrite legacy attribute aliases to their canonical names. The canonical
/// key wins when both are present; among aliases the first match wins.
fn normalize_attrs(attrs: &mut AttrMap) {
    for name in ATTR_NAMES {
        if attrs.contains_key(name.canonical) {
            continue;
        }
        for &alt in name.alts {
            if let Some(value) = attrs.remove(alt) {
                attrs.insert(name.canonical.to_string(), value);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn datapoint_with_attrs(pairs: &[(&str, &str)]) -> Datapoint {
        let mut dp = Datapoint::new(1, "test.metric", Utc::now());
        for (k, v) in pairs {
            dp.attrs.insert(k.to_string(), v.to_string());
        }
        dp
    }

    #[test]
    fn test_hash_is_order_independent() {
        let fp = Fingerprinter::new(&[]);

        let mut a = datapoint_with_attrs(&[("host", "a"), ("zone", "b")]);
        let mut b = datapoint_with_attrs(&[("zone", "b"), ("host", "a")]);
        fp.fingerprint(&mut a);
        fp.fingerprint(&mut b);

        assert_eq!(a.attrs_hash, b.attrs_hash);
        assert_eq!(a.string_keys, vec!["host", "zone"]);
        assert_eq!(a.string_values, vec!["a", "b"]);
    }

    #[test]
    fn test_different_values_different_hash() {
        let fp = Fingerprinter::new(&[]);

        let mut a = datapoint_with_attrs(&[("host", "a")]);
        let mut b = datapoint_with_attrs(&[("host", "b")]);
        fp.fingerprint(&mut a);
        fp.fingerprint(&mut b);

        assert_ne!(a.attrs_hash, b.attrs_hash);
    }

    #[test]
    fn test_alias_normalized_to_canonical() {
        let fp = Fingerprinter::new(&[]);

        let mut dp = datapoint_with_attrs(&[("env", "prod")]);
        fp.fingerprint(&mut dp);

        assert_eq!(
            dp.attrs.get("deployment.environment").map(String::as_str),
            Some("prod")
        );
        assert!(!dp.attrs.contains_key("env"));
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let fp = Fingerprinter::new(&[]);

        let mut dp = datapoint_with_attrs(&[("service.name", "api"), ("service", "legacy")]);
        fp.fingerprint(&mut dp);

        assert_eq!(
            dp.attrs.get("service.name").map(String::as_str),
            Some("api")
        );
        // the unpicked alias stays as an ordinary attribute
        assert_eq!(dp.attrs.get("service").map(String::as_str), Some("legacy"));
    }

    #[test]
    fn test_drop_attrs_removed_before_hashing() {
        let plain = Fingerprinter::new(&[]);
        let dropping = Fingerprinter::new(&["telemetry.sdk.name".to_string()]);

        let mut a = datapoint_with_attrs(&[("host", "a"), ("telemetry.sdk.name", "rust")]);
        let mut b = datapoint_with_attrs(&[("host", "a")]);
        dropping.fingerprint(&mut a);
        plain.fingerprint(&mut b);

        assert_eq!(a.attrs_hash, b.attrs_hash);
        assert_eq!(a.string_keys, vec!["host"]);
    }
}
