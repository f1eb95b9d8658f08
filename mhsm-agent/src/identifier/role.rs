//! Identifiers for scope-bound policy objects: role definitions and role
//! assignments.
//!
//! Both kinds share one path grammar, parameterized only by the collection
//! literal: `{scope}/providers/Microsoft.Authorization/role{Kind}s/{name}`,
//! where the scope always begins with `/` and may be arbitrarily deep,
//! including the degenerate root `/`.

use crate::agent::agent_error::AgentError;
use crate::identifier::endpoint::{parse_data_plane_url, Endpoint};
use std::fmt;

const ROLE_DEFINITION_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}{scope}/providers/Microsoft.Authorization/roleDefinitions/{name}";
const ROLE_ASSIGNMENT_FORMAT: &str =
    "https://{instance-name}.{domain-suffix}{scope}/providers/Microsoft.Authorization/roleAssignments/{name}";

/// Which of the two policy-object collections an identifier addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// A role definition: the set of permitted actions.
    Definition,
    /// A role assignment: a definition granted to a principal over a scope.
    Assignment,
}

impl RoleKind {
    /// The anchor between the scope and the object name in canonical form.
    pub(crate) fn anchor(self) -> &'static str {
        match self {
            Self::Definition => "/providers/Microsoft.Authorization/roleDefinitions/",
            Self::Assignment => "/providers/Microsoft.Authorization/roleAssignments/",
        }
    }

    /// The collection literal used by the deprecated pre-canonical shape.
    pub(crate) fn legacy_segment(self) -> &'static str {
        match self {
            Self::Definition => "RoleDefinition",
            Self::Assignment => "RoleAssignment",
        }
    }

    pub(crate) fn format_template(self) -> &'static str {
        match self {
            Self::Definition => ROLE_DEFINITION_FORMAT,
            Self::Assignment => ROLE_ASSIGNMENT_FORMAT,
        }
    }
}

/// The address of one role definition or role assignment, bound to the
/// subtree of the resource hierarchy named by `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleObjectId {
    /// The module the object lives on.
    pub endpoint: Endpoint,
    /// Which collection the object belongs to.
    pub kind: RoleKind,
    /// The governed subtree. Always begins with `/`; `/` alone is the root.
    pub scope: String,
    /// The object name.
    pub name: String,
}

impl RoleObjectId {
    /// Assembles an identifier from already-validated components.
    pub fn new(
        endpoint: Endpoint,
        kind: RoleKind,
        scope: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            kind,
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Strict parse: the `providers/...` anchor must appear with exact
    /// casing. Use this for everything the user authors.
    pub fn parse(
        raw: &str,
        kind: RoleKind,
        expected_suffix: Option<&str>,
    ) -> Result<Self, AgentError> {
        Self::parse_with(raw, kind, expected_suffix, false)
    }

    /// Lenient parse: accepts any casing of the static literals and emits the
    /// canonical casing on re-format. Exists solely to normalize identifiers
    /// the system already received from upstream or from an older release of
    /// itself; never run freshly user-authored values through this.
    pub fn parse_insensitive(
        raw: &str,
        kind: RoleKind,
        expected_suffix: Option<&str>,
    ) -> Result<Self, AgentError> {
        Self::parse_with(raw, kind, expected_suffix, true)
    }

    fn parse_with(
        raw: &str,
        kind: RoleKind,
        expected_suffix: Option<&str>,
        insensitive: bool,
    ) -> Result<Self, AgentError> {
        let url = parse_data_plane_url(raw)?;
        let endpoint = Endpoint::from_url(&url, raw, expected_suffix)?;
        let mismatch = || AgentError::SchemaMismatch {
            raw: raw.to_string(),
            expected: kind.format_template(),
        };

        let path = url.path();
        let anchor = kind.anchor();
        // The scope is captured greedily: everything up to the last anchor
        // occurrence belongs to it. ASCII lowering preserves byte offsets, so
        // the index found in the lowered copy is valid on the original.
        let index = if insensitive {
            path.to_ascii_lowercase().rfind(&anchor.to_ascii_lowercase())
        } else {
            path.rfind(anchor)
        }
        .ok_or_else(mismatch)?;

        let scope = &path[..index];
        let name = &path[index + anchor.len()..];

        if scope.is_empty() {
            return Err(mismatch());
        }
        if scope != "/" {
            for segment in scope[1..].split('/') {
                if segment.trim().is_empty() {
                    return Err(mismatch());
                }
            }
        }
        if name.trim().is_empty() || name.contains('/') {
            return Err(mismatch());
        }

        Ok(Self::new(endpoint, kind, scope, name))
    }
}

impl fmt::Display for RoleObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://{}{}{}{}",
            self.endpoint,
            self.scope,
            self.kind.anchor(),
            self.name
        )
    }
}
