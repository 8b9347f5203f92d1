//! Verified-credential claims.
//!
//! Token verification itself lives outside this crate. The auth layer
//! verifies the inbound credential and inserts a [`Principal`] into request
//! extensions; the tenant resolver and branch scoper consume it from there.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated principal extracted from verified credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Subject claim: the user id.
    pub user_id: Uuid,

    /// Tenant claim, when the credential is tenant-bound. Takes priority
    /// over every other tenant signal during resolution.
    pub tenant_id: Option<Uuid>,
}

impl Principal {
    /// A principal without a tenant claim.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id: None,
        }
    }

    /// A principal whose credential carries a tenant claim.
    pub fn for_tenant(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id: Some(tenant_id),
        }
    }
}
