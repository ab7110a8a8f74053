use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::design::DesignRecord;
use crate::routes::json_error;

#[derive(Debug, Deserialize)]
pub struct GenerateDesignRequest {
    pub topic: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateDesignResponse {
    success: bool,
    design: DesignRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub async fn generate_design(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateDesignRequest>,
) -> Response {
    let topic = request.topic.unwrap_or_default();
    let topic = topic.trim();
    if topic.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Topic is required");
    }

    let result = crate::design::generate_design(&state.config, &state.cache, topic).await;
    Json(GenerateDesignResponse {
        success: true,
        design: result.design,
        provider: result.provider,
        from_cache: result.from_cache.then_some(true),
        is_fallback: result.is_fallback.then_some(true),
        message: result.message,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::test_support::{body_json, state_with};

    #[tokio::test]
    async fn missing_topic_is_a_client_error() {
        let (_dir, state) = state_with(Config::default());
        let response = generate_design(
            State(state),
            Json(GenerateDesignRequest { topic: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Topic is required");
    }

    #[tokio::test]
    async fn unconfigured_generation_returns_fallback_payload() {
        let (_dir, state) = state_with(Config::default());
        let response = generate_design(
            State(state),
            Json(GenerateDesignRequest {
                topic: Some("Space Exploration".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["isFallback"], true);
        assert_eq!(body["design"]["topic"], "Space Exploration");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("No AI API keys configured"));
    }
}
