//! Postgres-backed [`CredentialStore`]. Schema lives in `sql/schema.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    Account, AccountUpdate, Asset, ChannelProfile, CreateOutcome, CredentialStore, NewAccount,
    UpdateOutcome, VideoOwner, WatchedVideo,
};

const ACCOUNT_COLUMNS: &str = "id, username, email, full_name, avatar_url, avatar_id, \
     cover_image_url, cover_image_id, password_hash, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Single-column lookup; `column` is always one of our own literals.
    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .with_context(|| format!("failed to lookup account by {column}"))?;

        Ok(row.as_ref().map(account_from_row))
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Account {
    let cover_url: Option<String> = row.get("cover_image_url");
    let cover_id: Option<String> = row.get("cover_image_id");
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar: Asset {
            url: row.get("avatar_url"),
            id: row.get("avatar_id"),
        },
        cover_image: cover_url
            .zip(cover_id)
            .map(|(url, id)| Asset { url, id }),
        password_hash: row.get("password_hash"),
        refresh_token: row.get("refresh_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by username or email")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup account by id")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let query = format!(
            r"
            INSERT INTO users
                (id, username, email, full_name, avatar_url, avatar_id,
                 cover_image_url, cover_image_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let (cover_url, cover_id) = account
            .cover_image
            .map_or((None, None), |asset| (Some(asset.url), Some(asset.id)));
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.full_name)
            .bind(&account.avatar.url)
            .bind(&account.avatar.id)
            .bind(cover_url)
            .bind(cover_id)
            .bind(&account.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(account_from_row(&row))),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn update(&self, id: Uuid, update: AccountUpdate) -> Result<UpdateOutcome> {
        let query = format!(
            r"
            UPDATE users SET
                full_name = COALESCE($2::text, full_name),
                email = COALESCE($3::text, email),
                password_hash = COALESCE($4::text, password_hash),
                avatar_url = COALESCE($5::text, avatar_url),
                avatar_id = COALESCE($6::text, avatar_id),
                cover_image_url = COALESCE($7::text, cover_image_url),
                cover_image_id = COALESCE($8::text, cover_image_id),
                refresh_token = CASE WHEN $9::boolean THEN $10::text ELSE refresh_token END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let (avatar_url, avatar_id) = update
            .avatar
            .map_or((None, None), |asset| (Some(asset.url), Some(asset.id)));
        let (cover_url, cover_id) = update
            .cover_image
            .map_or((None, None), |asset| (Some(asset.url), Some(asset.id)));
        let set_refresh_token = update.refresh_token.is_some();
        let row = sqlx::query(&query)
            .bind(id)
            .bind(update.full_name)
            .bind(update.email)
            .bind(update.password_hash)
            .bind(avatar_url)
            .bind(avatar_id)
            .bind(cover_url)
            .bind(cover_id)
            .bind(set_refresh_token)
            .bind(update.refresh_token.flatten())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(Some(row)) => Ok(UpdateOutcome::Updated(account_from_row(&row))),
            Ok(None) => Ok(UpdateOutcome::NotFound),
            Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
            Err(err) => Err(err).context("failed to update account"),
        }
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool> {
        // The WHERE clause is the compare half of the compare-and-swap.
        let query = r"
            UPDATE users
            SET refresh_token = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(expected)
            .bind(replacement)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh token")?;

        Ok(result.rows_affected() == 1)
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
    ) -> Result<Option<ChannelProfile>> {
        let query = r"
            SELECT
                u.full_name,
                u.username,
                u.email,
                u.avatar_url,
                COALESCE(u.cover_image_url, '') AS cover_image_url,
                u.created_at,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)
                    AS subscribers_count,
                (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id)
                    AS channels_subscribed_to_count,
                EXISTS (
                    SELECT 1 FROM subscriptions s
                    WHERE s.channel_id = u.id AND s.subscriber_id = $2::uuid
                ) AS is_subscribed
            FROM users u
            WHERE u.username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(viewer)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load channel profile")?;

        Ok(row.map(|row| ChannelProfile {
            full_name: row.get("full_name"),
            username: row.get("username"),
            email: row.get("email"),
            avatar: row.get("avatar_url"),
            cover_image: row.get("cover_image_url"),
            created_at: row.get("created_at"),
            subscribers_count: row.get("subscribers_count"),
            channels_subscribed_to_count: row.get("channels_subscribed_to_count"),
            is_subscribed: row.get("is_subscribed"),
        }))
    }

    async fn watch_history(&self, id: Uuid) -> Result<Vec<WatchedVideo>> {
        let query = r"
            SELECT
                v.id,
                v.video_file,
                v.thumbnail,
                v.title,
                v.description,
                v.duration,
                v.views,
                v.is_published,
                v.created_at,
                o.full_name AS owner_full_name,
                o.username AS owner_username,
                o.avatar_url AS owner_avatar
            FROM watch_history h
            JOIN videos v ON v.id = h.video_id
            JOIN users o ON o.id = v.owner_id
            WHERE h.user_id = $1
            ORDER BY h.position
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to load watch history")?;

        Ok(rows
            .into_iter()
            .map(|row| WatchedVideo {
                id: row.get("id"),
                video_file: row.get("video_file"),
                thumbnail: row.get("thumbnail"),
                title: row.get("title"),
                description: row.get("description"),
                duration: row.get("duration"),
                views: row.get("views"),
                is_published: row.get("is_published"),
                created_at: row.get("created_at"),
                owner: VideoOwner {
                    full_name: row.get("owner_full_name"),
                    username: row.get("owner_username"),
                    avatar: row.get("owner_avatar"),
                },
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let query = "SELECT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct FakeDbError {
        code: &'static str,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake db error {}", self.code)
        }
    }

    impl StdError for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[test]
    fn unique_violation_is_detected_by_sqlstate() {
        let err = sqlx::Error::Database(Box::new(FakeDbError { code: "23505" }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(FakeDbError { code: "23503" }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
