//! [`BlobStore`] over a remote media host's HTTP API.
//!
//! Uploads are `POST {base}` with a multipart `file` part; deletes are
//! `DELETE {base}/{id}`. Both authenticate with a bearer API key. The upload
//! response is JSON carrying the public URL (`url` or `secure_url`) and the
//! host id (`id` or `public_id`).

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument, warn};
use url::Url;

use super::BlobStore;
use crate::{api::APP_USER_AGENT, store::Asset};

#[derive(Clone, Debug)]
pub struct HttpBlobStore {
    base_url: Url,
    api_key: SecretString,
    client: Client,
}

impl HttpBlobStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url, api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build media host client")?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn asset_url(&self, id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("media upload URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn try_upload(&self, path: &Path) -> Result<Asset> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.base_url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} - {status}", self.base_url));
        }

        let json_response: Value = response.json().await?;
        parse_asset(&json_response)
    }
}

fn parse_asset(json: &Value) -> Result<Asset> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| json.get(*name).and_then(Value::as_str))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let url = field(&["url", "secure_url"])
        .ok_or_else(|| anyhow!("Error parsing JSON response: no url found"))?;
    let id = field(&["id", "public_id"])
        .ok_or_else(|| anyhow!("Error parsing JSON response: no id found"))?;
    Ok(Asset { url, id })
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self))]
    async fn upload(&self, path: &Path) -> Option<Asset> {
        match self.try_upload(path).await {
            Ok(asset) => {
                debug!("Uploaded {} as {}", path.display(), asset.id);
                Some(asset)
            }
            Err(err) => {
                warn!("Media upload failed: {err:#}");
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.asset_url(id)?;
        let response = self
            .client
            .delete(url.clone())
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .with_context(|| format!("failed to reach media host at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{url} - {status}"));
        }
        Ok(())
    }
}
