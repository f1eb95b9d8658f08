//! Resolution of a data-plane base URI into the module's identity.

use crate::agent::agent_error::AgentError;
use std::fmt;
use url::Url;

/// First label every data-plane host of this resource class carries. The
/// sibling vault class uses a different label at this position, so matching
/// it here is what keeps the two address spaces apart.
pub(crate) const HOST_CLASS_LABEL: &str = "managedhsm";

const SECURE_SCHEME: &str = "https";

pub(crate) const ENDPOINT_FORMAT: &str = "https://{instance-name}.managedhsm.{cloud-root}";

/// The resolved identity of one module's data-plane endpoint: the instance
/// name and the cloud-specific domain suffix it lives under.
///
/// The suffix is never a single hard-coded value; sovereign clouds use
/// different roots (`managedhsm.azure.net`, `managedhsm.azure.cn`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// The instance name, the first host label.
    pub name: String,
    /// The remaining host labels, starting with [`HOST_CLASS_LABEL`].
    pub domain_suffix: String,
}

impl Endpoint {
    /// Assembles an endpoint from already-validated components.
    pub fn new(name: impl Into<String>, domain_suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_suffix: domain_suffix.into(),
        }
    }

    /// Resolves a data-plane base URI. When `expected_suffix` is given the
    /// host must live under exactly that suffix (compared case-insensitively);
    /// otherwise the suffix found in the host is reported back.
    pub fn from_uri(uri: &str, expected_suffix: Option<&str>) -> Result<Self, AgentError> {
        let url = parse_data_plane_url(uri)?;
        Self::from_url(&url, uri, expected_suffix)
    }

    pub(crate) fn from_url(
        url: &Url,
        raw: &str,
        expected_suffix: Option<&str>,
    ) -> Result<Self, AgentError> {
        let host = url
            .host_str()
            .ok_or_else(|| AgentError::MalformedUri {
                uri: raw.to_string(),
                reason: "the URI carries no host".to_string(),
            })?
            .to_ascii_lowercase();

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 3 || labels[1] != HOST_CLASS_LABEL {
            return Err(AgentError::SchemaMismatch {
                raw: raw.to_string(),
                expected: ENDPOINT_FORMAT,
            });
        }

        let domain_suffix = labels[1..].join(".");
        if let Some(expected) = expected_suffix {
            if !domain_suffix.eq_ignore_ascii_case(expected) {
                return Err(AgentError::DomainMismatch {
                    uri: raw.to_string(),
                    actual: domain_suffix,
                    expected: expected.to_string(),
                });
            }
        }

        Ok(Self {
            name: labels[0].to_string(),
            domain_suffix,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.domain_suffix)
    }
}

/// Parses a raw string as a secure data-plane URL. The `url` crate lowercases
/// registrable hosts and strips the default port, so an explicitly present
/// port here means a non-standard one.
pub(crate) fn parse_data_plane_url(raw: &str) -> Result<Url, AgentError> {
    let url = Url::parse(raw).map_err(|e| AgentError::MalformedUri {
        uri: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != SECURE_SCHEME {
        return Err(AgentError::MalformedUri {
            uri: raw.to_string(),
            reason: format!(r#"the scheme must be "{SECURE_SCHEME}""#),
        });
    }
    if let Some(port) = url.port() {
        return Err(AgentError::MalformedUri {
            uri: raw.to_string(),
            reason: format!("unexpected port {port}"),
        });
    }
    Ok(url)
}
