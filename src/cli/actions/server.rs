use crate::{
    api::{self, handlers::AuthState},
    auth::AuthConfig,
    media::HttpBlobStore,
    store::PgStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub cors_origin: Option<String>,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub cookie_secure: bool,
    pub media_upload_url: Url,
    pub media_api_key: SecretString,
    pub upload_dir: PathBuf,
}

impl Args {
    /// Token configuration derived from the arguments, validated.
    ///
    /// # Errors
    /// Returns an error if the secrets or lifetimes are unusable.
    pub fn auth_config(&self) -> Result<AuthConfig> {
        let config = AuthConfig::new(
            self.access_token_secret.clone(),
            self.refresh_token_secret.clone(),
        )
        .with_access_token_ttl_seconds(self.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(self.refresh_token_ttl_seconds)
        .with_cookie_secure(self.cookie_secure);

        config.validate().context("Invalid token configuration")?;
        Ok(config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config()?;

    let store = PgStore::connect(&args.dsn).await?;
    info!("Connected to database");

    let blobs = HttpBlobStore::new(args.media_upload_url.clone(), args.media_api_key.clone())?;

    tokio::fs::create_dir_all(&args.upload_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory: {}",
                args.upload_dir.display()
            )
        })?;
    debug!("Staging uploads in {}", args.upload_dir.display());

    let state = Arc::new(AuthState::new(
        auth_config,
        Arc::new(store),
        Arc::new(blobs),
        args.upload_dir,
    ));

    api::new(args.port, state, args.cors_origin.as_deref()).await
}
