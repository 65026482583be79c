//! Multipart form reading with on-disk staging of file parts.

use axum::extract::{Multipart, multipart::MultipartRejection};
use std::{collections::HashMap, path::Path};
use tracing::debug;

use crate::{auth::AuthError, media::StagedFile};

/// Text fields plus staged files of one multipart request. Files not taken by
/// the handler are removed when the form drops.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, StagedFile>,
}

impl UploadForm {
    /// Drain `multipart`, staging every non-empty file part under `upload_dir`.
    /// Repeated names keep their first value.
    pub(crate) async fn read(
        multipart: Result<Multipart, MultipartRejection>,
        upload_dir: &Path,
    ) -> Result<Self, AuthError> {
        let mut multipart = multipart.map_err(|rejection| {
            debug!("Multipart rejected: {rejection}");
            AuthError::validation("expected a multipart/form-data body")
        })?;

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|err| {
            debug!("Malformed multipart body: {err}");
            AuthError::validation("malformed multipart body")
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AuthError::validation("malformed multipart body"))?;
                if bytes.is_empty() || form.files.contains_key(&name) {
                    continue;
                }
                let staged = StagedFile::write(upload_dir, Some(&file_name), &bytes).await?;
                form.files.insert(name, staged);
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AuthError::validation("malformed multipart body"))?;
                form.fields.entry(name).or_insert(text);
            }
        }
        Ok(form)
    }

    pub(crate) fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub(crate) fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.remove(name)
    }
}
