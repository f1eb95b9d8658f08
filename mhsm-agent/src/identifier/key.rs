//! Identifiers for keys stored under one module, in their versioned and
//! versionless shapes.
//!
//! The two shapes are structurally similar and the codec never guesses: the
//! caller chooses which parser to invoke, or uses [`KeyId::parse`] to try the
//! versioned shape first and fall back to the versionless one.

use crate::agent::agent_error::AgentError;
use crate::identifier::endpoint::{parse_data_plane_url, Endpoint};
use std::fmt;
use url::Url;

const KEYS_COLLECTION: &str = "keys";

pub(crate) const VERSIONED_KEY_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}/keys/{key-name}/{key-version}";
pub(crate) const VERSIONLESS_KEY_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}/keys/{key-name}";
const EITHER_KEY_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}/keys/{key-name}/{key-version} or https://{instance-name}.{domain-suffix}/keys/{key-name}";

/// The address of one specific version of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedKeyId {
    /// The module the key lives on.
    pub endpoint: Endpoint,
    /// The key name.
    pub name: String,
    /// The key version. Never empty.
    pub version: String,
}

impl VersionedKeyId {
    /// Assembles an identifier from already-validated components.
    pub fn new(
        endpoint: Endpoint,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Strict parse: exact-case literals, exactly three path segments, no
    /// empty or whitespace segments. A missing version is rejected here;
    /// use [`VersionlessKeyId::parse`] for the version-free shape.
    pub fn parse(raw: &str, expected_suffix: Option<&str>) -> Result<Self, AgentError> {
        let url = parse_data_plane_url(raw)?;
        let endpoint = Endpoint::from_url(&url, raw, expected_suffix)?;
        let segments = key_path_segments(&url, raw, VERSIONED_KEY_FORMAT)?;
        match segments.as_slice() {
            [collection, name, version] if *collection == KEYS_COLLECTION => {
                Ok(Self::new(endpoint, *name, *version))
            }
            _ => Err(AgentError::SchemaMismatch {
                raw: raw.to_string(),
                expected: VERSIONED_KEY_FORMAT,
            }),
        }
    }
}

impl fmt::Display for VersionedKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://{}/keys/{}/{}",
            self.endpoint, self.name, self.version
        )
    }
}

/// The address of a key as a whole, with no version pinned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionlessKeyId {
    /// The module the key lives on.
    pub endpoint: Endpoint,
    /// The key name.
    pub name: String,
}

impl VersionlessKeyId {
    /// Assembles an identifier from already-validated components.
    pub fn new(endpoint: Endpoint, name: impl Into<String>) -> Self {
        Self {
            endpoint,
            name: name.into(),
        }
    }

    /// Strict parse: exactly one path segment after the `keys` literal.
    pub fn parse(raw: &str, expected_suffix: Option<&str>) -> Result<Self, AgentError> {
        let url = parse_data_plane_url(raw)?;
        let endpoint = Endpoint::from_url(&url, raw, expected_suffix)?;
        let segments = key_path_segments(&url, raw, VERSIONLESS_KEY_FORMAT)?;
        match segments.as_slice() {
            [collection, name] if *collection == KEYS_COLLECTION => {
                Ok(Self::new(endpoint, *name))
            }
            _ => Err(AgentError::SchemaMismatch {
                raw: raw.to_string(),
                expected: VERSIONLESS_KEY_FORMAT,
            }),
        }
    }
}

impl fmt::Display for VersionlessKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/keys/{}", self.endpoint, self.name)
    }
}

/// A key identifier in either accepted shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// A key address pinning a specific version.
    Versioned(VersionedKeyId),
    /// A key address with no version.
    Versionless(VersionlessKeyId),
}

impl KeyId {
    /// Discovery parse: attempts the versioned shape first, falls back to the
    /// versionless one, and reports a combined error naming both formats only
    /// when neither matched. Failures before the path shape is examined (bad
    /// scheme, foreign domain) surface unchanged.
    pub fn parse(raw: &str, expected_suffix: Option<&str>) -> Result<Self, AgentError> {
        let versioned_error = match VersionedKeyId::parse(raw, expected_suffix) {
            Ok(id) => return Ok(Self::Versioned(id)),
            Err(e) => e,
        };
        if !matches!(versioned_error, AgentError::SchemaMismatch { .. }) {
            return Err(versioned_error);
        }
        match VersionlessKeyId::parse(raw, expected_suffix) {
            Ok(id) => Ok(Self::Versionless(id)),
            Err(_) => Err(AgentError::SchemaMismatch {
                raw: raw.to_string(),
                expected: EITHER_KEY_FORMAT,
            }),
        }
    }

    /// The module the key lives on.
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::Versioned(id) => &id.endpoint,
            Self::Versionless(id) => &id.endpoint,
        }
    }

    /// The key name.
    pub fn name(&self) -> &str {
        match self {
            Self::Versioned(id) => &id.name,
            Self::Versionless(id) => &id.name,
        }
    }

    /// The key version, when the identifier pins one.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Versioned(id) => Some(&id.version),
            Self::Versionless(_) => None,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned(id) => id.fmt(f),
            Self::Versionless(id) => id.fmt(f),
        }
    }
}

fn key_path_segments<'a>(
    url: &'a Url,
    raw: &str,
    expected: &'static str,
) -> Result<Vec<&'a str>, AgentError> {
    let path = url.path();
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<&str> = if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    };
    for segment in &segments {
        if segment.trim().is_empty() {
            return Err(AgentError::SchemaMismatch {
                raw: raw.to_string(),
                expected,
            });
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::{KeyId, VersionedKeyId, VersionlessKeyId};
    use crate::agent::agent_error::AgentError;
    use crate::identifier::endpoint::Endpoint;

    #[test]
    fn versioned_round_trips_bit_exact() {
        let raw = "https://example.managedhsm.azure.net/keys/abc123/bcd234";
        let id = VersionedKeyId::parse(raw, None).unwrap();
        assert_eq!(id.endpoint.name, "example");
        assert_eq!(id.endpoint.domain_suffix, "managedhsm.azure.net");
        assert_eq!(id.name, "abc123");
        assert_eq!(id.version, "bcd234");
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn versioned_requires_version_segment() {
        let error =
            VersionedKeyId::parse("https://h.managedhsm.azure.net/keys/abc123", None).unwrap_err();
        assert!(matches!(
            error,
            AgentError::SchemaMismatch { expected, .. } if expected.contains("{key-version}")
        ));
    }

    #[test]
    fn versioned_rejects_empty_version_segment() {
        let error = VersionedKeyId::parse("https://h.managedhsm.azure.net/keys/abc123/", None)
            .unwrap_err();
        assert!(matches!(error, AgentError::SchemaMismatch { .. }));
    }

    #[test]
    fn versioned_rejects_empty_interior_segment() {
        let error =
            VersionedKeyId::parse("https://h.managedhsm.azure.net/keys//v1", None).unwrap_err();
        assert!(matches!(error, AgentError::SchemaMismatch { .. }));
    }

    #[test]
    fn literals_are_case_sensitive() {
        let error =
            VersionedKeyId::parse("https://h.managedhsm.azure.net/Keys/abc/v1", None).unwrap_err();
        assert!(matches!(error, AgentError::SchemaMismatch { .. }));
    }

    #[test]
    fn versionless_accepts_exactly_one_trailing_segment() {
        let raw = "https://example.managedhsm.azure.net/keys/abc123";
        let id = VersionlessKeyId::parse(raw, None).unwrap();
        assert_eq!(id.name, "abc123");
        assert_eq!(id.to_string(), raw);

        let error = VersionlessKeyId::parse(
            "https://example.managedhsm.azure.net/keys/abc123/bcd234",
            None,
        )
        .unwrap_err();
        assert!(matches!(error, AgentError::SchemaMismatch { .. }));
    }

    #[test]
    fn format_parse_format_is_stable() {
        let cases = [
            ("a", "managedhsm.azure.net", "key1", "77abc"),
            ("my-hsm", "managedhsm.azure.cn", "rotation-key", "0"),
            ("x2", "managedhsm.usgovcloudapi.net", "k", "v"),
        ];
        for (name, suffix, key, version) in cases {
            let id = VersionedKeyId::new(Endpoint::new(name, suffix), key, version);
            let formatted = id.to_string();
            let reparsed = VersionedKeyId::parse(&formatted, Some(suffix)).unwrap();
            assert_eq!(reparsed.to_string(), formatted);
        }
    }

    #[test]
    fn discovery_prefers_versioned_then_falls_back() {
        let versioned =
            KeyId::parse("https://h.managedhsm.azure.net/keys/k/v", None).unwrap();
        assert_eq!(versioned.version(), Some("v"));

        let versionless = KeyId::parse("https://h.managedhsm.azure.net/keys/k", None).unwrap();
        assert_eq!(versionless.version(), None);
        assert_eq!(versionless.name(), "k");
    }

    #[test]
    fn discovery_reports_both_formats_when_neither_matches() {
        let error =
            KeyId::parse("https://h.managedhsm.azure.net/secrets/nope", None).unwrap_err();
        let rendered = format!("{error}");
        assert!(rendered.contains("{key-version}"));
        assert!(rendered.contains(" or "));
    }

    #[test]
    fn discovery_surfaces_early_failures_unchanged() {
        let error = KeyId::parse("http://h.managedhsm.azure.net/keys/k/v", None).unwrap_err();
        assert!(matches!(error, AgentError::MalformedUri { .. }));

        let error = KeyId::parse(
            "https://h.managedhsm.azure.cn/keys/k/v",
            Some("managedhsm.azure.net"),
        )
        .unwrap_err();
        assert!(matches!(error, AgentError::DomainMismatch { .. }));
    }
}
