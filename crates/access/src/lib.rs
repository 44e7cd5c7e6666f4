//! Auth/role gateway adapter.
//!
//! Implements the [`casework::AuthGateway`] trait from a static table of bearer
//! tokens and role grants loaded from configuration. Token issuance, password
//! handling, and role administration belong to the surrounding identity
//! service; this adapter only answers the two questions the core asks.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`casework`] crate sees only
//! [`casework::AuthGateway`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use casework::{AuthGateway, Caller, CaseworkError, PermissionName, RoleId};

/// Answers from a fixed token table and role-to-permission grants.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthGateway {
    tokens: HashMap<String, Caller>,
    grants: HashMap<RoleId, HashSet<PermissionName>>,
}

impl StaticAuthGateway {
    /// Builds the gateway from `(token, caller)` pairs and per-role grants.
    pub fn new(
        tokens: impl IntoIterator<Item = (String, Caller)>,
        grants: impl IntoIterator<Item = (RoleId, Vec<PermissionName>)>,
    ) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            grants: grants
                .into_iter()
                .map(|(role, permissions)| (role, permissions.into_iter().collect()))
                .collect(),
        }
    }
}

#[async_trait]
impl AuthGateway for StaticAuthGateway {
    async fn verify(&self, token: &str) -> Result<Caller, CaseworkError> {
        match self.tokens.get(token) {
            Some(caller) => Ok(*caller),
            None => {
                tracing::debug!("Unknown bearer token presented");
                Err(CaseworkError::Unauthenticated)
            }
        }
    }

    async fn has_permission(
        &self,
        role_id: RoleId,
        permission: &PermissionName,
    ) -> Result<bool, CaseworkError> {
        Ok(self
            .grants
            .get(&role_id)
            .is_some_and(|granted| granted.contains(permission)))
    }
}
