use super::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    storage_backend: &'static str,
    storage_connected: bool,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_connected = state.store.ping().await;

    Json(HealthResponse {
        status: if storage_connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        storage_backend: state.store.backend(),
        storage_connected,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, send, state_with};
    use crate::config::Config;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_on_memory_store() {
        let app = app(state_with(&Config::default()));
        let (status, body) = send(app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage_backend"], "memory");
    }
}
