/// Account database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-user settings record, distinct from the authentication identity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    /// IANA zone name; empty string means "use the configured default"
    pub timezone: String,
    pub language: String,
}

/// Invitation/registration code with usage limits and expiry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SignupCode {
    pub id: i64,
    pub code: String,
    /// 0 means unlimited
    pub max_uses: i64,
    pub expiry: Option<DateTime<Utc>>,
    pub inviter_id: Option<i64>,
    pub email: String,
    pub notes: String,
    pub sent: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    /// Derived: recomputed from signup_code_result on every redemption
    pub use_count: i64,
}

impl SignupCode {
    /// Display form, matching the admin-facing label
    pub fn label(&self) -> String {
        if self.email.is_empty() {
            self.code.clone()
        } else {
            format!("{} [{}]", self.email, self.code)
        }
    }
}

/// One signup-code redemption by one user; immutable once written
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SignupCodeResult {
    pub id: i64,
    pub signup_code_id: i64,
    pub user_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Pending or finalized account-deletion request
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountDeletion {
    pub id: i64,
    /// Nulled once the user identity itself is purged
    pub user_id: Option<i64>,
    pub email: String,
    pub date_requested: DateTime<Utc>,
    pub date_expunged: Option<DateTime<Utc>>,
}

/// Single prior password hash for a user; append-only
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PasswordHistory {
    pub id: i64,
    pub user_id: i64,
    pub password: String,
    pub timestamp: DateTime<Utc>,
}

/// Password expiration period for a single user; 0 means no policy
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PasswordExpiry {
    pub id: i64,
    pub user_id: i64,
    pub expiry: i64,
}

/// Email address attached to a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: i64,
    pub user_id: i64,
    pub email: String,
    pub is_primary: bool,
    pub verified: bool,
}
