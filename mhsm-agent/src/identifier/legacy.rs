//! Migration decoding of the deprecated role-object identifier shape.
//!
//! Early releases wrote role-object identifiers without the canonical
//! `providers/...` anchor: `{scope}/Role{Assignment|Definition}/{name}`.
//! This decoder runs once at state-upgrade time; its output is re-encoded in
//! canonical form via [`RoleObjectId`]'s `Display` and persisted by the
//! caller. It is never consulted during steady-state operation.

use crate::agent::agent_error::AgentError;
use crate::identifier::endpoint::{parse_data_plane_url, Endpoint};
use crate::identifier::role::{RoleKind, RoleObjectId};

const LEGACY_ROLE_DEFINITION_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}{scope}/RoleDefinition/{name}";
const LEGACY_ROLE_ASSIGNMENT_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}{scope}/RoleAssignment/{name}";

fn legacy_format_template(kind: RoleKind) -> &'static str {
    match kind {
        RoleKind::Definition => LEGACY_ROLE_DEFINITION_FORMAT,
        RoleKind::Assignment => LEGACY_ROLE_ASSIGNMENT_FORMAT,
    }
}

/// Decodes a deprecated identifier into its canonical components. The type
/// literal must exactly match the migration in progress; a legacy assignment
/// identifier does not decode as a definition, and vice versa.
pub fn parse_legacy_role_uri(raw: &str, kind: RoleKind) -> Result<RoleObjectId, AgentError> {
    let url = parse_data_plane_url(raw)?;
    let endpoint = Endpoint::from_url(&url, raw, None)?;
    let mismatch = || AgentError::SchemaMismatch {
        raw: raw.to_string(),
        expected: legacy_format_template(kind),
    };

    let trimmed = url.path().trim_matches('/');
    let (remainder, name) = trimmed.rsplit_once('/').ok_or_else(mismatch)?;
    if name.trim().is_empty() {
        return Err(mismatch());
    }

    // The segment right before the name is the type literal; whatever is left
    // of it, re-rooted, is the scope. An absent left part is the root scope.
    let (scope_rest, type_segment) = match remainder.rsplit_once('/') {
        Some((rest, segment)) => (rest, segment),
        None => ("", remainder),
    };
    if type_segment != kind.legacy_segment() {
        return Err(mismatch());
    }

    let scope = format!("/{scope_rest}");
    Ok(RoleObjectId::new(endpoint, kind, scope, name))
}
