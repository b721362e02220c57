/// Account-deletion requests and the grace-period expunge sweep
use crate::{
    account::UserRef,
    config::AccountConfig,
    db::models::AccountDeletion,
    error::AccountResult,
    hooks::Hookset,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Account deletion manager
#[derive(Clone)]
pub struct AccountDeletionManager {
    db: SqlitePool,
    config: Arc<AccountConfig>,
    hooks: Arc<dyn Hookset>,
}

impl AccountDeletionManager {
    pub fn new(db: SqlitePool, config: Arc<AccountConfig>, hooks: Arc<dyn Hookset>) -> Self {
        Self { db, config, hooks }
    }

    /// Record a deletion request for the user. Idempotent: a second call
    /// returns the same underlying row with the email snapshot refreshed.
    pub async fn mark(&self, user: &UserRef) -> AccountResult<AccountDeletion> {
        let existing = sqlx::query_as::<_, AccountDeletion>(
            "SELECT * FROM account_deletion WHERE user_id = ?1",
        )
        .bind(user.id)
        .fetch_optional(&self.db)
        .await?;

        let deletion = match existing {
            Some(mut deletion) => {
                deletion.email = user.email.clone();
                sqlx::query("UPDATE account_deletion SET email = ?1 WHERE id = ?2")
                    .bind(&deletion.email)
                    .bind(deletion.id)
                    .execute(&self.db)
                    .await?;
                deletion
            }
            None => {
                let now = Utc::now();
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO account_deletion (user_id, email, date_requested)
                    VALUES (?1, ?2, ?3)
                    "#,
                )
                .bind(user.id)
                .bind(&user.email)
                .bind(now)
                .execute(&self.db)
                .await?;

                AccountDeletion {
                    id: inserted.last_insert_rowid(),
                    user_id: Some(user.id),
                    email: user.email.clone(),
                    date_requested: now,
                    date_expunged: None,
                }
            }
        };

        self.hooks.account_delete_mark(&deletion).await?;

        Ok(deletion)
    }

    /// Sweep deletion requests older than the grace window: requests with
    /// a live user reference and no expunge stamp get the purge hook
    /// invoked and their `date_expunged` set. Returns the number
    /// processed. Intended to run periodically, not per event.
    pub async fn expunge(&self, hours_ago: Option<i64>) -> AccountResult<u64> {
        let hours = hours_ago.unwrap_or(self.config.deletion_expunge_hours);
        let before = Utc::now() - Duration::hours(hours);

        let pending = sqlx::query_as::<_, AccountDeletion>(
            r#"
            SELECT * FROM account_deletion
            WHERE date_requested < ?1 AND user_id IS NOT NULL AND date_expunged IS NULL
            "#,
        )
        .bind(before)
        .fetch_all(&self.db)
        .await?;

        let mut count = 0;
        for deletion in pending {
            self.hooks.account_delete_expunge(&deletion).await?;

            sqlx::query("UPDATE account_deletion SET date_expunged = ?1 WHERE id = ?2")
                .bind(Utc::now())
                .bind(deletion.id)
                .execute(&self.db)
                .await?;

            tracing::info!("Expunged deletion request for {}", deletion.email);
            count += 1;
        }

        if count > 0 {
            tracing::info!("Expunged {} deletion requests past grace period", count);
        }

        Ok(count)
    }
}
