//! Account registration with avatar and cover image upload.
//!
//! Flow Overview:
//! 1) Validate text fields (blank, email format, password policy) and normalize.
//! 2) Reject identities that already exist before touching the media host.
//! 3) Upload the optional cover image, then the mandatory avatar.
//! 4) Hash the password and create the account. If anything fails after an
//!    upload, the uploaded assets are deleted best-effort.
//!
//! Staged request files are owned by [`Registration`] and removed when it drops,
//! whichever way the flow exits.

use anyhow::anyhow;
use tracing::{info, warn};

use super::AccountService;
use crate::{
    auth::{
        AuthError, password,
        utils::{blank_fields, normalize, valid_email, valid_password, valid_username},
    },
    media::{StagedFile, delete_best_effort},
    store::{Asset, CreateOutcome, NewAccount, PublicAccount},
};

/// Registration input as received from the client.
#[derive(Debug, Default)]
pub struct Registration {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<StagedFile>,
    pub cover_image: Option<StagedFile>,
}

struct ValidFields {
    full_name: String,
    email: String,
    username: String,
    password: String,
}

impl Registration {
    fn validate(&self) -> Result<ValidFields, AuthError> {
        let blank = blank_fields(&[
            ("fullName", self.full_name.as_deref()),
            ("email", self.email.as_deref()),
            ("username", self.username.as_deref()),
            ("password", self.password.as_deref()),
        ]);
        if !blank.is_empty() {
            return Err(AuthError::validation(format!(
                "missing required fields: {}",
                blank.join(", ")
            )));
        }

        let username = normalize(self.username.as_deref().unwrap_or_default());
        if !valid_username(&username) {
            return Err(AuthError::validation(
                "username must be 3-32 characters of a-z, 0-9, _ or -",
            ));
        }
        let email = normalize(self.email.as_deref().unwrap_or_default());
        if !valid_email(&email) {
            return Err(AuthError::validation("invalid email"));
        }
        let password = self.password.clone().unwrap_or_default();
        if !valid_password(&password) {
            return Err(AuthError::validation(
                "password must be at least 8 characters with a letter, a digit and one of !#$%^*_",
            ));
        }

        Ok(ValidFields {
            full_name: self.full_name.as_deref().unwrap_or_default().trim().to_string(),
            email,
            username,
            password,
        })
    }
}

impl AccountService {
    /// Register a new account.
    ///
    /// # Errors
    /// - [`AuthError::Validation`] for blank fields, a malformed email, a weak
    ///   password or a missing avatar;
    /// - [`AuthError::Conflict`] when the username or email is taken;
    /// - [`AuthError::Upstream`] when the avatar upload or the store fails.
    pub async fn register(&self, registration: Registration) -> Result<PublicAccount, AuthError> {
        let fields = registration.validate()?;

        if self
            .store
            .find_by_username_or_email(&fields.username, &fields.email)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(
                "user with email or username already exists".to_string(),
            ));
        }

        let Some(avatar_file) = registration.avatar.as_ref() else {
            return Err(AuthError::validation("avatar file is required"));
        };

        let cover_image = match registration.cover_image.as_ref() {
            Some(file) => {
                let uploaded = self.blobs.upload(file.path()).await;
                if uploaded.is_none() {
                    warn!("Cover image upload failed; registering without one");
                }
                uploaded
            }
            None => None,
        };

        let Some(avatar) = self.blobs.upload(avatar_file.path()).await else {
            if let Some(cover) = &cover_image {
                delete_best_effort(self.blobs.as_ref(), cover).await;
            }
            return Err(AuthError::Upstream(anyhow!("avatar upload failed")));
        };

        let uploaded: Vec<Asset> = std::iter::once(avatar.clone())
            .chain(cover_image.clone())
            .collect();
        let result = self.create_account(fields, avatar, cover_image).await;
        if result.is_err() {
            for asset in &uploaded {
                delete_best_effort(self.blobs.as_ref(), asset).await;
            }
        }
        result
    }

    async fn create_account(
        &self,
        fields: ValidFields,
        avatar: Asset,
        cover_image: Option<Asset>,
    ) -> Result<PublicAccount, AuthError> {
        let password_hash = password::hash_blocking(fields.password).await?;
        let outcome = self
            .store
            .create(NewAccount {
                username: fields.username,
                email: fields.email,
                full_name: fields.full_name,
                password_hash,
                avatar,
                cover_image,
            })
            .await?;

        match outcome {
            CreateOutcome::Created(account) => {
                info!("Registered account {} ({})", account.id, account.username);
                Ok(account.public())
            }
            CreateOutcome::Conflict => Err(AuthError::Conflict(
                "user with email or username already exists".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        media::MemoryBlobStore,
        store::{CredentialStore, MemoryStore},
    };
    use anyhow::Result;
    use std::{path::PathBuf, sync::Arc};
    use ulid::Ulid;

    struct Fixture {
        dir: PathBuf,
        store: Arc<MemoryStore>,
        blobs: Arc<MemoryBlobStore>,
        service: AccountService,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let dir = std::env::temp_dir().join(format!("vidhub-register-{}", Ulid::new()));
            std::fs::create_dir_all(&dir)?;
            let store = Arc::new(MemoryStore::new());
            let blobs = Arc::new(MemoryBlobStore::new());
            let service = AccountService::new(store.clone(), blobs.clone());
            Ok(Self {
                dir,
                store,
                blobs,
                service,
            })
        }

        async fn registration(
            &self,
            username: &str,
            email: &str,
            cover: bool,
        ) -> Result<Registration> {
            let cover_image = if cover {
                Some(StagedFile::write(&self.dir, Some("cover.jpg"), b"cover").await?)
            } else {
                None
            };
            Ok(Registration {
                full_name: Some("Alice Liddell".to_string()),
                email: Some(email.to_string()),
                username: Some(username.to_string()),
                password: Some("Secr3t!abc".to_string()),
                avatar: Some(StagedFile::write(&self.dir, Some("avatar.png"), b"avatar").await?),
                cover_image,
            })
        }

        fn staged_files(&self) -> Result<usize> {
            Ok(std::fs::read_dir(&self.dir)?.count())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[tokio::test]
    async fn registers_and_normalizes() -> Result<()> {
        let fixture = Fixture::new()?;
        let registration = fixture.registration(" Alice ", "Alice@X.com", true).await?;
        let account = fixture.service.register(registration).await?;

        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "alice@x.com");
        assert!(account.avatar.starts_with("memory://media/"));
        assert!(account.cover_image.starts_with("memory://media/"));
        assert_eq!(fixture.blobs.stored_ids().await.len(), 2);
        assert_eq!(fixture.staged_files()?, 0);

        let stored = fixture.store.find_by_id(account.id).await?;
        assert!(stored.is_some_and(|a| password::verify("Secr3t!abc", &a.password_hash)));
        Ok(())
    }

    #[tokio::test]
    async fn cover_image_is_optional() -> Result<()> {
        let fixture = Fixture::new()?;
        let registration = fixture.registration("alice", "alice@x.com", false).await?;
        let account = fixture.service.register(registration).await?;
        assert_eq!(account.cover_image, "");
        Ok(())
    }

    #[tokio::test]
    async fn blank_fields_are_all_named() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registration = fixture.registration("alice", "alice@x.com", false).await?;
        registration.full_name = Some("  ".to_string());
        registration.password = None;

        let Err(AuthError::Validation(message)) = fixture.service.register(registration).await
        else {
            anyhow::bail!("expected a validation error");
        };
        assert!(message.contains("fullName"));
        assert!(message.contains("password"));
        assert!(!message.contains("email"));
        assert_eq!(fixture.staged_files()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_bad_email_and_weak_password() -> Result<()> {
        let fixture = Fixture::new()?;
        let registration = fixture.registration("alice", "not-an-email", false).await?;
        assert!(matches!(
            fixture.service.register(registration).await,
            Err(AuthError::Validation(_))
        ));

        let mut registration = fixture.registration("alice", "alice@x.com", false).await?;
        registration.password = Some("password".to_string());
        assert!(matches!(
            fixture.service.register(registration).await,
            Err(AuthError::Validation(_))
        ));
        assert!(fixture.blobs.stored_ids().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn email_shaped_username_is_rejected() -> Result<()> {
        let fixture = Fixture::new()?;
        let first = fixture.registration("alice", "alice@x.com", false).await?;
        fixture.service.register(first).await?;

        for username in ["alice@x.com", "al", "bad name", "dots.are.out"] {
            let registration = fixture.registration(username, "mallory@x.com", false).await?;
            assert!(
                matches!(
                    fixture.service.register(registration).await,
                    Err(AuthError::Validation(_))
                ),
                "{username} should be rejected"
            );
        }
        assert!(fixture.store.find_by_email("mallory@x.com").await?.is_none());
        assert_eq!(fixture.blobs.stored_ids().await.len(), 1);
        assert_eq!(fixture.staged_files()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_identity_conflicts_without_upload() -> Result<()> {
        let fixture = Fixture::new()?;
        let first = fixture.registration("alice", "alice@x.com", false).await?;
        fixture.service.register(first).await?;

        let same_email = fixture.registration("bob", "ALICE@x.com", true).await?;
        assert!(matches!(
            fixture.service.register(same_email).await,
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(fixture.blobs.stored_ids().await.len(), 1);
        assert_eq!(fixture.staged_files()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_avatar_is_validation() -> Result<()> {
        let fixture = Fixture::new()?;
        let mut registration = fixture.registration("alice", "alice@x.com", true).await?;
        registration.avatar = None;
        assert!(matches!(
            fixture.service.register(registration).await,
            Err(AuthError::Validation(_))
        ));
        assert!(fixture.blobs.stored_ids().await.is_empty());
        assert_eq!(fixture.staged_files()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_avatar_upload_leaves_nothing_behind() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture.blobs.set_fail_uploads(true);
        let registration = fixture.registration("alice", "alice@x.com", true).await?;

        assert!(matches!(
            fixture.service.register(registration).await,
            Err(AuthError::Upstream(_))
        ));
        assert!(fixture.blobs.stored_ids().await.is_empty());
        assert_eq!(fixture.staged_files()?, 0);
        assert!(
            fixture
                .store
                .find_by_username_or_email("alice", "alice@x.com")
                .await?
                .is_none()
        );
        Ok(())
    }
}
