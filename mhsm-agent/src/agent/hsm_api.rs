//! Types exchanged with the data-plane API, as JSON over HTTPS.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// The standard error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The public portion of a stored key.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    /// The full versioned identifier of the key, as issued by the service.
    #[serde(default)]
    pub kid: Option<String>,
    /// The key type, e.g. `RSA-HSM`.
    #[serde(default)]
    pub kty: Option<String>,
    /// The operations the key may perform.
    #[serde(default)]
    pub key_ops: Vec<String>,
}

/// Management attributes attached to a key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyAttributes {
    /// Whether the key is usable.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Creation time, seconds since the epoch.
    #[serde(default)]
    pub created: Option<i64>,
    /// Last update time, seconds since the epoch.
    #[serde(default)]
    pub updated: Option<i64>,
    /// How far the key can be brought back once deleted.
    #[serde(default, rename = "recoveryLevel")]
    pub recovery_level: Option<String>,
}

/// A live key as returned by the key read and recover operations.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBundle {
    /// The key material description.
    #[serde(default)]
    pub key: Option<JsonWebKey>,
    /// The key's management attributes.
    #[serde(default)]
    pub attributes: Option<KeyAttributes>,
}

/// A soft-deleted key, as returned by the delete and deleted-key read
/// operations.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedKeyBundle {
    /// The live-key portion of the tombstone.
    #[serde(flatten)]
    pub bundle: KeyBundle,
    /// The address under which the tombstone can be read and recovered.
    #[serde(default, rename = "recoveryId")]
    pub recovery_id: Option<String>,
    /// When the key was soft-deleted, seconds since the epoch.
    #[serde(default, rename = "deletedDate")]
    pub deleted_date: Option<i64>,
    /// When the service will erase the tombstone, seconds since the epoch.
    #[serde(default, rename = "scheduledPurgeDate")]
    pub scheduled_purge_date: Option<i64>,
}

/// One administrator key in a security-domain download request.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityDomainKey {
    /// Content-derived fingerprint identifying the key to the service.
    pub kid: String,
    /// The key type.
    pub kty: String,
    /// The operations the key is offered for.
    pub key_ops: Vec<String>,
    /// The wrapping algorithm the service should use.
    pub alg: String,
    /// The certificate chain, standard base64 DER.
    pub x5c: Vec<String>,
    /// SHA-256 thumbprint of the leaf certificate, url-safe base64.
    #[serde(rename = "x5t#S256")]
    pub x5t_s256: String,
}

/// The body of a security-domain download request: the administrator key set
/// and the quorum threshold required to use it later.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSet {
    /// One entry per administrator certificate.
    pub certificates: Vec<SecurityDomainKey>,
    /// Minimum number of key-shares required to activate the domain.
    pub required: u32,
}

/// The envelope returned by the security-domain download call. The value is
/// an encrypted secret; it is withheld from `Debug` output.
#[derive(Clone, Deserialize)]
pub struct SecurityDomainEnvelope {
    /// The encrypted security-domain blob.
    pub value: String,
}

impl Debug for SecurityDomainEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityDomainEnvelope")
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Progress of an in-flight security-domain transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadPending {
    /// The transfer status; `"Success"` once fully applied.
    pub status: String,
    /// Optional human-readable detail accompanying the status.
    #[serde(default)]
    pub status_details: Option<String>,
}
