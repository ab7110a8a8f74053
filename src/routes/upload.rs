use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::hosting::{self, HOSTING_REMEDIATION};
use crate::routes::json_error;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    pub image_url: Option<String>,
}

/// Hosts an inline base64 design so the print provider can fetch it. Only
/// `data:` URLs are accepted here; http URLs need no hosting.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadImageRequest>,
) -> Response {
    let Some(image_url) = request
        .image_url
        .filter(|value| value.starts_with("data:"))
    else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Invalid image URL. Expected base64 data URL.",
        );
    };

    if state.config.imgbb_api_key.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!("ImgBB API key not configured. {HOSTING_REMEDIATION}"),
                "needsImageHosting": true,
                "solution": HOSTING_REMEDIATION,
            })),
        )
            .into_response();
    }

    match hosting::ensure_http_url(state.config.imgbb_api_key.as_deref(), &image_url).await {
        Ok(hosted_url) => Json(json!({
            "success": true,
            "imageUrl": hosted_url,
            "hostingService": "imgbb",
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(%err, "image upload failed");
            let status = if err.needs_image_hosting {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::BAD_REQUEST
            };
            (
                status,
                Json(json!({
                    "success": false,
                    "error": err.message,
                    "needsImageHosting": err.needs_image_hosting,
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::test_support::{body_json, state_with};

    #[tokio::test]
    async fn non_data_urls_are_rejected() {
        let (_dir, state) = state_with(Config::default());
        let request = UploadImageRequest {
            image_url: Some("https://example.com/design.png".to_string()),
        };
        let response = upload_image(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid image URL. Expected base64 data URL.");
    }

    #[tokio::test]
    async fn missing_hosting_key_is_a_configuration_error() {
        let (_dir, state) = state_with(Config::default());
        let request = UploadImageRequest {
            image_url: Some("data:image/png;base64,aGVsbG8=".to_string()),
        };
        let response = upload_image(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["needsImageHosting"], true);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn invalid_base64_with_key_is_a_client_error() {
        let (_dir, state) = state_with(Config {
            imgbb_api_key: Some("imgbb_key".to_string()),
            ..Config::default()
        });
        let request = UploadImageRequest {
            image_url: Some("data:image/png;base64,!!notbase64!!".to_string()),
        };
        let response = upload_image(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
