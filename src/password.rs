/// Password history and expiry tracking
///
/// This module never sees cleartext passwords; callers hand it the hashes
/// their auth subsystem already produced. History is append-only.
use crate::{
    db::models::{PasswordExpiry, PasswordHistory},
    error::AccountResult,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

/// Password history and expiry manager
#[derive(Clone)]
pub struct PasswordManager {
    db: SqlitePool,
}

impl PasswordManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a password hash to the user's history
    pub async fn record(&self, user_id: i64, password_hash: &str) -> AccountResult<PasswordHistory> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO password_history (user_id, password, timestamp) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(PasswordHistory {
            id: inserted.last_insert_rowid(),
            user_id,
            password: password_hash.to_string(),
            timestamp: now,
        })
    }

    /// Full history for a user, oldest first
    pub async fn history(&self, user_id: i64) -> AccountResult<Vec<PasswordHistory>> {
        let rows = sqlx::query_as::<_, PasswordHistory>(
            "SELECT * FROM password_history WHERE user_id = ?1 ORDER BY timestamp ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Set the user's expiry period in days; 0 clears the policy
    pub async fn set_expiry(&self, user_id: i64, days: i64) -> AccountResult<PasswordExpiry> {
        sqlx::query(
            r#"
            INSERT INTO password_expiry (user_id, expiry) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET expiry = excluded.expiry
            "#,
        )
        .bind(user_id)
        .bind(days)
        .execute(&self.db)
        .await?;

        let row = sqlx::query_as::<_, PasswordExpiry>(
            "SELECT * FROM password_expiry WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    /// The user's expiry period, if a policy exists
    pub async fn expiry_for(&self, user_id: i64) -> AccountResult<Option<i64>> {
        let row = sqlx::query_as::<_, PasswordExpiry>(
            "SELECT * FROM password_expiry WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.expiry))
    }

    /// Whether the user's password has outlived its expiry period. Users
    /// without a policy (or with expiry 0) never expire; a policy with no
    /// recorded history counts as expired.
    pub async fn password_expired(&self, user_id: i64) -> AccountResult<bool> {
        let expiry = match self.expiry_for(user_id).await? {
            Some(days) if days > 0 => days,
            _ => return Ok(false),
        };

        let latest = sqlx::query_as::<_, PasswordHistory>(
            "SELECT * FROM password_history WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match latest {
            Some(entry) => Ok(Utc::now() - entry.timestamp > Duration::days(expiry)),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn manager() -> PasswordManager {
        PasswordManager::new(db::memory_pool().await)
    }

    #[tokio::test]
    async fn history_is_append_only_and_ordered() {
        let manager = manager().await;

        manager.record(1, "$argon2$old").await.unwrap();
        manager.record(1, "$argon2$new").await.unwrap();
        manager.record(2, "$argon2$other").await.unwrap();

        let history = manager.history(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].password, "$argon2$old");
        assert_eq!(history[1].password, "$argon2$new");
    }

    #[tokio::test]
    async fn set_expiry_upserts() {
        let manager = manager().await;

        assert_eq!(manager.expiry_for(1).await.unwrap(), None);
        manager.set_expiry(1, 90).await.unwrap();
        assert_eq!(manager.expiry_for(1).await.unwrap(), Some(90));
        manager.set_expiry(1, 30).await.unwrap();
        assert_eq!(manager.expiry_for(1).await.unwrap(), Some(30));
    }

    #[tokio::test]
    async fn fresh_password_is_not_expired() {
        let manager = manager().await;

        manager.set_expiry(1, 30).await.unwrap();
        manager.record(1, "$argon2$current").await.unwrap();
        assert!(!manager.password_expired(1).await.unwrap());
    }

    #[tokio::test]
    async fn stale_password_expires() {
        let manager = manager().await;

        manager.set_expiry(1, 30).await.unwrap();
        let entry = manager.record(1, "$argon2$old").await.unwrap();
        sqlx::query("UPDATE password_history SET timestamp = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::days(31))
            .bind(entry.id)
            .execute(&manager.db)
            .await
            .unwrap();

        assert!(manager.password_expired(1).await.unwrap());
    }

    #[tokio::test]
    async fn no_policy_means_no_expiry() {
        let manager = manager().await;

        // No policy row at all
        assert!(!manager.password_expired(1).await.unwrap());

        // Explicit zero disables the policy
        manager.set_expiry(1, 0).await.unwrap();
        assert!(!manager.password_expired(1).await.unwrap());

        // Policy without any history counts as expired
        manager.set_expiry(2, 10).await.unwrap();
        assert!(manager.password_expired(2).await.unwrap());
    }
}
