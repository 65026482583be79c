use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_OTLP_ENDPOINT: &str = "otlp-endpoint";
pub const ARG_OTLP_TOKEN: &str = "otlp-token";

/// Where to export traces. Absent when no endpoint was given.
#[derive(Debug, Clone)]
pub struct Options {
    pub endpoint: Url,
    pub token: Option<SecretString>,
}

impl Options {
    /// Parse the OTLP export arguments; `None` keeps tracing local.
    ///
    /// # Errors
    /// Returns an error if the endpoint is not an `http(s)` URL.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let Some(endpoint) = matches
            .get_one::<String>(ARG_OTLP_ENDPOINT)
            .filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("invalid --{ARG_OTLP_ENDPOINT}: {endpoint}"))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("--{ARG_OTLP_ENDPOINT} must be an http or https URL");
        }

        let token = matches
            .get_one::<String>(ARG_OTLP_TOKEN)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()));

        Ok(Some(Self { endpoint, token }))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTLP_ENDPOINT)
                .long(ARG_OTLP_ENDPOINT)
                .help("OTLP/gRPC collector that receives traces, e.g. https://otel.vidhub.dev:4317")
                .env("VIDHUB_OTLP_ENDPOINT")
                .global(true),
        )
        .arg(
            Arg::new(ARG_OTLP_TOKEN)
                .long(ARG_OTLP_TOKEN)
                .help("Bearer token sent to the OTLP collector")
                .env("VIDHUB_OTLP_TOKEN")
                .hide_env_values(true)
                .global(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse(args: &[&str]) -> Result<Option<Options>> {
        let matches = with_args(Command::new("vidhub")).try_get_matches_from(args)?;
        Options::parse(&matches)
    }

    #[test]
    fn no_endpoint_means_no_export() -> Result<()> {
        temp_env::with_vars(
            [
                ("VIDHUB_OTLP_ENDPOINT", None::<&str>),
                ("VIDHUB_OTLP_TOKEN", Some("ignored")),
            ],
            || -> Result<()> {
                assert!(parse(&["vidhub"])?.is_none());
                assert!(parse(&["vidhub", "--otlp-endpoint", " "])?.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn endpoint_and_token_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("VIDHUB_OTLP_ENDPOINT", Some("https://otel.vidhub.dev:4317")),
                ("VIDHUB_OTLP_TOKEN", Some("collector-token")),
            ],
            || -> Result<()> {
                let options = parse(&["vidhub"])?.context("expected export options")?;
                assert_eq!(options.endpoint.host_str(), Some("otel.vidhub.dev"));
                assert_eq!(options.endpoint.port(), Some(4317));
                assert_eq!(
                    options.token.as_ref().map(ExposeSecret::expose_secret),
                    Some("collector-token")
                );
                Ok(())
            },
        )
    }

    #[test]
    fn rejects_non_http_endpoints() {
        temp_env::with_vars(
            [
                ("VIDHUB_OTLP_ENDPOINT", None::<&str>),
                ("VIDHUB_OTLP_TOKEN", None),
            ],
            || {
                assert!(parse(&["vidhub", "--otlp-endpoint", "localhost:4317"]).is_err());
                assert!(parse(&["vidhub", "--otlp-endpoint", "not a url"]).is_err());
            },
        );
    }
}
