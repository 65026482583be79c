use axum::response::IntoResponse;

/// Plain-text banner for `/`; not part of the documented API.
pub async fn root() -> impl IntoResponse {
    format!(
        "{} {}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}
