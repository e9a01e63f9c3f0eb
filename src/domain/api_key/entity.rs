//! API Key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Privilege level attached to an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    /// Fully trusted system key, exempt from rate limiting
    Root,
    /// May manage keys and read the audit trail
    Admin,
    /// Regular dashboard caller
    #[default]
    User,
}

impl ApiKeyRole {
    /// Only the highest-privilege role skips the rate limiter.
    pub fn bypasses_rate_limit(&self) -> bool {
        matches!(self, Self::Root)
    }

    /// Whether this role can use the administrative surface.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Root | Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "root" => Some(Self::Root),
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiKeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// API Key entity
///
/// The plaintext secret is never stored; only the salted hash survives
/// creation. A `user_id` of `None` marks a system/admin-issued key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    /// Salted one-way hash of the secret (PHC string)
    secret_hash: String,
    role: ApiKeyRole,
    is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a new active key with a freshly generated id
    pub fn new(name: impl Into<String>, secret_hash: impl Into<String>, role: ApiKeyRole) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id: None,
            name: name.into(),
            secret_hash: secret_hash.into(),
            role,
            is_active: true,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bind the key to an owning user
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set an expiration timestamp
    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Rebuild a key from stored fields (repository use)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Uuid,
        user_id: Option<Uuid>,
        name: String,
        secret_hash: String,
        role: ApiKeyRole,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            secret_hash,
            role,
            is_active,
            expires_at,
            created_at,
            updated_at,
        }
    }

    // Getters

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn role(&self) -> ApiKeyRole {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Status checks

    /// Usable right now: active and not past its expiration
    pub fn is_valid(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.touch();
    }

    pub fn set_expiration(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.set_active(false);
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
