//! Map validated CLI arguments to the action the binary should run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_CORS_ORIGIN, ARG_DSN, ARG_PORT, auth, media};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let cors_origin = matches
        .get_one::<String>(ARG_CORS_ORIGIN)
        .filter(|origin| !origin.trim().is_empty())
        .cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let media_opts = media::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        cors_origin,
        access_token_secret: auth_opts.access_token_secret,
        refresh_token_secret: auth_opts.refresh_token_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        cookie_secure: auth_opts.cookie_secure,
        media_upload_url: media_opts.upload_url,
        media_api_key: media_opts.api_key,
        upload_dir: media_opts.upload_dir,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::path::PathBuf;

    fn base_env() -> [(&'static str, Option<&'static str>); 6] {
        [
            ("VIDHUB_DSN", Some("postgres://user@localhost:5432/vidhub")),
            ("VIDHUB_ACCESS_TOKEN_SECRET", Some("access-secret")),
            ("VIDHUB_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
            (
                "VIDHUB_MEDIA_UPLOAD_URL",
                Some("https://media.vidhub.dev/v1/assets"),
            ),
            ("VIDHUB_MEDIA_API_KEY", Some("media-key")),
            ("VIDHUB_UPLOAD_DIR", Some("/tmp/vidhub-uploads")),
        ]
    }

    #[test]
    fn builds_server_action_from_env() {
        temp_env::with_vars(base_env(), || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["vidhub"]);
            let action = handler(&matches);
            assert!(action.is_ok());
            if let Ok(Action::Server(args)) = action {
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/vidhub");
                assert_eq!(args.access_token_secret.expose_secret(), "access-secret");
                assert_eq!(args.access_token_ttl_seconds, 900);
                assert_eq!(args.refresh_token_ttl_seconds, 864_000);
                assert!(args.cookie_secure);
                assert_eq!(
                    args.media_upload_url.as_str(),
                    "https://media.vidhub.dev/v1/assets"
                );
                assert_eq!(args.upload_dir, PathBuf::from("/tmp/vidhub-uploads"));
                assert!(args.cors_origin.is_none());
            }
        });
    }

    #[test]
    fn invalid_media_url_is_rejected() {
        let mut env = base_env();
        env[3] = ("VIDHUB_MEDIA_UPLOAD_URL", Some("not a url"));
        temp_env::with_vars(env, || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["vidhub"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--media-upload-url"));
            }
        });
    }

    #[test]
    fn blank_secret_is_rejected() {
        let mut env = base_env();
        env[1] = ("VIDHUB_ACCESS_TOKEN_SECRET", Some("   "));
        temp_env::with_vars(env, || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["vidhub"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(
                    err.to_string()
                        .contains("missing required argument: --access-token-secret")
                );
            }
        });
    }
}
