//! Channel profile and watch history.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    principal::{optional_auth, require_auth},
    state::AuthState,
};
use crate::{
    api::error::ErrorBody,
    auth::AuthError,
    store::{ChannelProfile, WatchedVideo},
};

#[utoipa::path(
    get,
    path = "/v1/users/channel/{username}",
    params(
        ("username" = String, Path, description = "Channel owner's username")
    ),
    responses(
        (status = 200, description = "Channel profile with subscription counts", body = ChannelProfile),
        (status = 400, description = "Blank username", body = ErrorBody),
        (status = 404, description = "Unknown channel", body = ErrorBody)
    ),
    tag = "channels"
)]
#[instrument(skip(state, headers))]
pub async fn channel_profile(
    headers: HeaderMap,
    Path(username): Path<String>,
    state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let viewer = optional_auth(&headers, &state).await?;
    let profile = state
        .accounts()
        .channel_profile(&username, viewer.map(|account| account.id))
        .await?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}

#[utoipa::path(
    get,
    path = "/v1/users/history",
    responses(
        (status = 200, description = "Watched videos in watch order", body = [WatchedVideo]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    tag = "channels"
)]
pub async fn watch_history(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let account = require_auth(&headers, &state).await?;
    let history = state.accounts().watch_history(account.id).await?;
    Ok((StatusCode::OK, Json(history)).into_response())
}
