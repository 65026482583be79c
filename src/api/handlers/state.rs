//! Shared handler state, injected as `Extension<Arc<AuthState>>`.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    accounts::AccountService,
    auth::{AuthConfig, AuthGuard, SessionManager},
    media::BlobStore,
    store::CredentialStore,
};

pub struct AuthState {
    config: AuthConfig,
    sessions: SessionManager,
    guard: AuthGuard,
    accounts: AccountService,
    store: Arc<dyn CredentialStore>,
    upload_dir: PathBuf,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        blobs: Arc<dyn BlobStore>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            sessions: SessionManager::new(&config, store.clone()),
            guard: AuthGuard::new(&config, store.clone()),
            accounts: AccountService::new(store.clone(), blobs),
            config,
            store,
            upload_dir,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }

    #[must_use]
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub(crate) fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}
