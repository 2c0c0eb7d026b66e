use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
}

/// Liveness probe: `{"status":"OK"}`
pub async fn root_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}
