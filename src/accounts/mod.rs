//! Account lifecycle outside of sessions: registration, profile edits, channel
//! lookup and watch history.

use anyhow::anyhow;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        AuthError,
        utils::{normalize, valid_email},
    },
    media::{BlobStore, StagedFile, delete_best_effort},
    store::{
        AccountUpdate, ChannelProfile, CredentialStore, PublicAccount, UpdateOutcome, WatchedVideo,
    },
};

pub mod registration;

pub use registration::Registration;

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Avatar,
    CoverImage,
}

impl ImageKind {
    /// Multipart field name carrying the file.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::CoverImage => "coverImage",
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    blobs: Arc<dyn BlobStore>,
}

impl AccountService {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Change the display name and/or email.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] when neither field is given or the email is
    ///   malformed;
    /// - [`AuthError::Conflict`] when the email belongs to another account.
    pub async fn update_details(
        &self,
        account_id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<PublicAccount, AuthError> {
        let full_name = full_name.map(str::trim).filter(|v| !v.is_empty());
        let email = email.map(normalize).filter(|v| !v.is_empty());
        if full_name.is_none() && email.is_none() {
            return Err(AuthError::validation("fullName or email is required"));
        }
        if email.as_deref().is_some_and(|email| !valid_email(email)) {
            return Err(AuthError::validation("invalid email"));
        }

        let update = AccountUpdate {
            full_name: full_name.map(str::to_string),
            email,
            ..AccountUpdate::default()
        };
        match self.store.update(account_id, update).await? {
            UpdateOutcome::Updated(account) => {
                info!("Account {account_id} updated details");
                Ok(account.public())
            }
            UpdateOutcome::NotFound => Err(AuthError::unauthorized("invalid access token")),
            UpdateOutcome::Conflict => Err(AuthError::Conflict("email already in use".to_string())),
        }
    }

    /// Replace the avatar or cover image; the previous asset is deleted
    /// best-effort once the account points at the new one.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] when no file was sent;
    /// - [`AuthError::Upstream`] when the upload fails.
    pub async fn update_image(
        &self,
        account_id: Uuid,
        kind: ImageKind,
        file: Option<StagedFile>,
    ) -> Result<PublicAccount, AuthError> {
        let Some(file) = file else {
            return Err(AuthError::validation(format!(
                "{} file is missing",
                kind.field_name()
            )));
        };
        let Some(account) = self.store.find_by_id(account_id).await? else {
            return Err(AuthError::unauthorized("invalid access token"));
        };

        let Some(asset) = self.blobs.upload(file.path()).await else {
            return Err(AuthError::Upstream(anyhow!(
                "{} upload failed",
                kind.field_name()
            )));
        };
        drop(file);

        let (update, previous) = match kind {
            ImageKind::Avatar => (
                AccountUpdate {
                    avatar: Some(asset.clone()),
                    ..AccountUpdate::default()
                },
                Some(account.avatar),
            ),
            ImageKind::CoverImage => (
                AccountUpdate {
                    cover_image: Some(asset.clone()),
                    ..AccountUpdate::default()
                },
                account.cover_image,
            ),
        };

        let outcome = self.store.update(account_id, update).await;
        let updated = match outcome {
            Ok(UpdateOutcome::Updated(updated)) => updated,
            Ok(UpdateOutcome::NotFound) => {
                delete_best_effort(self.blobs.as_ref(), &asset).await;
                return Err(AuthError::unauthorized("invalid access token"));
            }
            Ok(UpdateOutcome::Conflict) => {
                delete_best_effort(self.blobs.as_ref(), &asset).await;
                return Err(AuthError::Upstream(anyhow!(
                    "unexpected conflict while storing {}",
                    kind.field_name()
                )));
            }
            Err(err) => {
                delete_best_effort(self.blobs.as_ref(), &asset).await;
                return Err(err.into());
            }
        };

        if let Some(previous) = previous {
            delete_best_effort(self.blobs.as_ref(), &previous).await;
        }
        info!("Account {account_id} replaced {}", kind.field_name());
        Ok(updated.public())
    }

    /// # Errors
    /// - [`AuthError::Validation`] when the username is blank;
    /// - [`AuthError::NotFound`] when no such channel exists.
    pub async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
    ) -> Result<ChannelProfile, AuthError> {
        let username = normalize(username);
        if username.is_empty() {
            return Err(AuthError::validation("username is missing"));
        }
        self.store
            .channel_profile(&username, viewer)
            .await?
            .ok_or_else(|| AuthError::NotFound("channel does not exist".to_string()))
    }

    /// # Errors
    /// Returns [`AuthError::Upstream`] on store failures.
    pub async fn watch_history(&self, account_id: Uuid) -> Result<Vec<WatchedVideo>, AuthError> {
        Ok(self.store.watch_history(account_id).await?)
    }
}
