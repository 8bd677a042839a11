//! Bearer-token authentication.
//!
//! Tokens are configured as SHA-256 digests in `[[auth.tokens]]`. An
//! incoming `Authorization: Bearer <token>` header is hashed and looked up
//! in the [`TokenRegistry`]; the plain token never needs to be stored.
//!
//! | Role | Verified | Admin |
//! |------|----------|-------|
//! | `admin` | yes | yes |
//! | `user` | yes | no |
//! | `pending` | no | no |

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use evalboard_core::models::UserSummary;

use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
    Pending,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "pending" => Some(Role::Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Pending => "pending",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.role, Role::Admin | Role::User)
    }

    /// Row scope for owner-checked store calls: admins see every row.
    pub fn scope(&self) -> Option<&str> {
        if self.is_admin() {
            None
        } else {
            Some(self.id.as_str())
        }
    }
}

/// Lowercase hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lookup table from token digest to user.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    by_digest: HashMap<String, AuthUser>,
}

impl TokenRegistry {
    /// Build the registry from validated config. Tokens with an unknown role
    /// are skipped (config validation rejects them before this point).
    pub fn from_config(auth: &AuthConfig) -> Self {
        let by_digest = auth
            .tokens
            .iter()
            .filter_map(|t| {
                let role = Role::parse(&t.role)?;
                Some((
                    t.token_sha256.to_ascii_lowercase(),
                    AuthUser {
                        id: t.user_id.clone(),
                        name: t.name.clone().unwrap_or_else(|| t.user_id.clone()),
                        role,
                    },
                ))
            })
            .collect();
        Self { by_digest }
    }

    pub fn authenticate(&self, token: &str) -> Option<&AuthUser> {
        self.by_digest.get(&hash_token(token))
    }

    /// Display info for a user id, if any configured token belongs to it.
    pub fn user_summary(&self, user_id: &str) -> Option<UserSummary> {
        self.by_digest
            .values()
            .find(|u| u.id == user_id)
            .map(|u| UserSummary {
                id: u.id.clone(),
                name: u.name.clone(),
                role: u.role.as_str().to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}
