use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;
use url::Url;

pub const ARG_MEDIA_UPLOAD_URL: &str = "media-upload-url";
pub const ARG_MEDIA_API_KEY: &str = "media-api-key";
pub const ARG_UPLOAD_DIR: &str = "upload-dir";

#[derive(Debug, Clone)]
pub struct Options {
    pub upload_url: Url,
    pub api_key: SecretString,
    pub upload_dir: PathBuf,
}

impl Options {
    /// Parse media host arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the upload URL is missing or invalid, or the API key is blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let upload_url = matches
            .get_one::<String>(ARG_MEDIA_UPLOAD_URL)
            .with_context(|| format!("missing required argument: --{ARG_MEDIA_UPLOAD_URL}"))?;
        let upload_url = Url::parse(upload_url)
            .with_context(|| format!("invalid --{ARG_MEDIA_UPLOAD_URL}: {upload_url}"))?;

        let api_key = matches
            .get_one::<String>(ARG_MEDIA_API_KEY)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()))
            .with_context(|| format!("missing required argument: --{ARG_MEDIA_API_KEY}"))?;

        let upload_dir = matches
            .get_one::<String>(ARG_UPLOAD_DIR)
            .map_or_else(|| std::env::temp_dir().join("vidhub"), PathBuf::from);

        Ok(Self {
            upload_url,
            api_key,
            upload_dir,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MEDIA_UPLOAD_URL)
                .long(ARG_MEDIA_UPLOAD_URL)
                .help("Media host endpoint that receives image uploads")
                .env("VIDHUB_MEDIA_UPLOAD_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_MEDIA_API_KEY)
                .long(ARG_MEDIA_API_KEY)
                .help("Bearer API key for the media host")
                .env("VIDHUB_MEDIA_API_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_UPLOAD_DIR)
                .long(ARG_UPLOAD_DIR)
                .help("Directory for staging uploads before they reach the media host")
                .long_help(
                    "Directory for staging uploads before they reach the media host. Defaults to a vidhub directory under the system temp dir.",
                )
                .env("VIDHUB_UPLOAD_DIR"),
        )
}
