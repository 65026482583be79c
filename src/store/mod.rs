//! Account persistence.
//!
//! The session core only talks to [`CredentialStore`]; [`postgres::PgStore`] backs
//! it in production and [`memory::MemoryStore`] in tests and local runs. Each
//! account carries its single current refresh token next to the identity.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::token::Claims;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A file held by the media host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub url: String,
    /// Media-host identifier used to delete the file later.
    pub id: String,
}

/// Stored account record. Never serialized as is; see [`PublicAccount`].
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Asset,
    pub cover_image: Option<Asset>,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn claims(&self) -> Claims {
        Claims {
            account_id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }

    /// The account without its password hash and refresh token.
    #[must_use]
    pub fn public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.url.clone(),
            cover_image: self
                .cover_image
                .as_ref()
                .map(|asset| asset.url.clone())
                .unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized account as returned to clients.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    /// Empty when the account has no cover image.
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create an account. Username and email are expected to be
/// normalized already.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: Asset,
    pub cover_image: Option<Asset>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct AccountUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<Asset>,
    pub cover_image: Option<Asset>,
    /// `Some(None)` clears the stored refresh token.
    pub refresh_token: Option<Option<String>>,
}

impl AccountUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.avatar.is_none()
            && self.cover_image.is_none()
            && self.refresh_token.is_none()
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Account),
    /// Username or email already taken.
    Conflict,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Account),
    NotFound,
    /// The new email belongs to another account.
    Conflict,
}

/// Public channel view with subscription counts.
#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    /// Whether the requesting account subscribes to this channel; false for
    /// anonymous requests.
    pub is_subscribed: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoOwner {
    pub full_name: String,
    pub username: String,
    pub avatar: String,
}

#[derive(Clone, Debug, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchedVideo {
    pub id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// Seconds.
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub owner: VideoOwner,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the account whose username equals `username` or whose email equals
    /// `email`. Both are compared as given; callers normalize first.
    async fn find_by_username_or_email(&self, username: &str, email: &str)
    -> Result<Option<Account>>;

    /// Exact match on the (normalized) username only.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Exact match on the (normalized) email only.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Insert a new account. A unique violation is reported as
    /// [`CreateOutcome::Conflict`], not as an error.
    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    async fn update(&self, id: Uuid, update: AccountUpdate) -> Result<UpdateOutcome>;

    /// Replace the stored refresh token with `replacement` only if it still
    /// equals `expected`. Returns whether the swap happened.
    async fn swap_refresh_token(&self, id: Uuid, expected: &str, replacement: &str)
    -> Result<bool>;

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
    ) -> Result<Option<ChannelProfile>>;

    /// Watched videos in the order they were watched.
    async fn watch_history(&self, id: Uuid) -> Result<Vec<WatchedVideo>>;

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<()>;
}
