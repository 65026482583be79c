//! Avatar and cover image replacement.

use axum::{
    Json,
    extract::{Extension, Multipart, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{form::UploadForm, principal::require_auth, state::AuthState};
use crate::{accounts::ImageKind, api::error::ErrorBody, auth::AuthError, store::PublicAccount};

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct AvatarForm {
    #[schema(value_type = String, format = Binary)]
    avatar: Vec<u8>,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CoverImageForm {
    #[schema(rename = "coverImage", value_type = String, format = Binary)]
    cover_image: Vec<u8>,
}

async fn replace_image(
    headers: &HeaderMap,
    state: &AuthState,
    multipart: Result<Multipart, MultipartRejection>,
    kind: ImageKind,
) -> Result<Response, AuthError> {
    let account = require_auth(headers, state).await?;
    let mut form = UploadForm::read(multipart, state.upload_dir()).await?;
    let file = form.take_file(kind.field_name());
    let updated = state.accounts().update_image(account.id, kind, file).await?;
    Ok((StatusCode::OK, Json(updated)).into_response())
}

#[utoipa::path(
    patch,
    path = "/v1/users/avatar",
    request_body(content = AvatarForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar replaced", body = PublicAccount),
        (status = 400, description = "Missing avatar file", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Upload failed", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers, multipart))]
pub async fn update_avatar(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AuthError> {
    replace_image(&headers, &state, multipart, ImageKind::Avatar).await
}

#[utoipa::path(
    patch,
    path = "/v1/users/cover-image",
    request_body(content = CoverImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Cover image replaced", body = PublicAccount),
        (status = 400, description = "Missing cover image file", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 500, description = "Upload failed", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers, multipart))]
pub async fn update_cover_image(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AuthError> {
    replace_image(&headers, &state, multipart, ImageKind::CoverImage).await
}
