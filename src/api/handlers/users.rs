//! Account and session endpoints under `/v1/users`.

use axum::{
    Json,
    extract::{Extension, Multipart, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{
    cookies::{REFRESH_COOKIE_NAME, cleared_cookies, extract_cookie, session_cookies},
    form::UploadForm,
    principal::require_auth,
    state::AuthState,
};
use crate::{
    accounts::Registration,
    api::error::ErrorBody,
    auth::{AuthError, TokenPair},
    store::PublicAccount,
};

/// Multipart registration form (documentation only; parsed by [`UploadForm`]).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct RegisterForm {
    #[schema(rename = "fullName")]
    full_name: String,
    email: String,
    username: String,
    password: String,
    #[schema(value_type = String, format = Binary)]
    avatar: Vec<u8>,
    #[schema(rename = "coverImage", value_type = Option<String>, format = Binary)]
    cover_image: Option<Vec<u8>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct LoginRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicAccount,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    full_name: Option<String>,
    email: Option<String>,
}

/// Token responses always carry the cookies; a header that cannot be built is a
/// server fault since tokens are base64url.
fn with_session_cookies(
    state: &AuthState,
    tokens: &TokenPair,
    body: impl IntoResponse,
) -> Response {
    match session_cookies(state.config(), tokens) {
        Ok(headers) => (StatusCode::OK, headers, body).into_response(),
        Err(err) => {
            error!("Failed to build session cookies: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/register",
    request_body(content = RegisterForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Account created", body = PublicAccount),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 409, description = "Username or email already exists", body = ErrorBody),
        (status = 500, description = "Media upload or storage failure", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, multipart))]
pub async fn register(
    state: Extension<Arc<AuthState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AuthError> {
    let mut form = UploadForm::read(multipart, state.upload_dir()).await?;
    let registration = Registration {
        full_name: form.text("fullName"),
        email: form.text("email"),
        username: form.text("username"),
        password: form.text("password"),
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("coverImage"),
    };
    let account = state.accounts().register(registration).await?;
    Ok((StatusCode::CREATED, Json(account)).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; token cookies set", body = LoginResponse),
        (status = 400, description = "Missing identifier or password", body = ErrorBody),
        (status = 401, description = "Incorrect password", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, payload))]
pub async fn login(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("missing payload"));
    };
    let password = request.password.unwrap_or_default();

    let outcome = state
        .sessions()
        .login_with(
            request.username.as_deref(),
            request.email.as_deref(),
            &password,
        )
        .await?;
    let body = Json(LoginResponse {
        user: outcome.account,
        access_token: outcome.tokens.access_token.clone(),
        refresh_token: outcome.tokens.refresh_token.clone(),
    });
    Ok(with_session_cookies(&state, &outcome.tokens, body))
}

#[utoipa::path(
    post,
    path = "/v1/users/refresh-token",
    request_body(content = RefreshRequest, description = "Used when the refreshToken cookie is absent"),
    responses(
        (status = 200, description = "Rotated; token cookies set", body = TokenPair),
        (status = 401, description = "Missing, invalid, expired or reused refresh token", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers, payload))]
pub async fn refresh_token(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Response, AuthError> {
    let incoming = extract_cookie(&headers, REFRESH_COOKIE_NAME)
        .or_else(|| payload.and_then(|Json(request)| request.refresh_token));

    let tokens = state.sessions().refresh(incoming.as_deref()).await?;
    Ok(with_session_cookies(&state, &tokens, Json(tokens.clone())))
}

#[utoipa::path(
    post,
    path = "/v1/users/logout",
    responses(
        (status = 204, description = "Refresh token revoked; cookies cleared"),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers))]
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let account = require_auth(&headers, &state).await?;
    state.sessions().logout(account.id).await?;
    Ok((StatusCode::NO_CONTENT, cleared_cookies(state.config())).into_response())
}

#[utoipa::path(
    post,
    path = "/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Missing fields, weak or unchanged password", body = ErrorBody),
        (status = 401, description = "Not authenticated or incorrect old password", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers, payload))]
pub async fn change_password(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<Response, AuthError> {
    let account = require_auth(&headers, &state).await?;
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    state
        .sessions()
        .change_password(
            account.id,
            request.old_password.as_deref().unwrap_or_default(),
            request.new_password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[utoipa::path(
    get,
    path = "/v1/users/current-user",
    responses(
        (status = 200, description = "Authenticated account", body = PublicAccount),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn current_user(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let account = require_auth(&headers, &state).await?;
    Ok((StatusCode::OK, Json(account)).into_response())
}

#[utoipa::path(
    patch,
    path = "/v1/users/update-account",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated account", body = PublicAccount),
        (status = 400, description = "Nothing to update or invalid email", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody)
    ),
    tag = "users"
)]
#[instrument(skip(state, headers, payload))]
pub async fn update_account(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<UpdateAccountRequest>>,
) -> Result<Response, AuthError> {
    let account = require_auth(&headers, &state).await?;
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let updated = state
        .accounts()
        .update_details(
            account.id,
            request.full_name.as_deref(),
            request.email.as_deref(),
        )
        .await?;
    Ok((StatusCode::OK, Json(updated)).into_response())
}
