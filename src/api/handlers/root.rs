use axum::response::IntoResponse;

use crate::APP_USER_AGENT;

// axum handler for /
pub async fn root() -> impl IntoResponse {
    format!("{APP_USER_AGENT}\nEventazia registration API\n")
}
