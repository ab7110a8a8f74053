use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const STABILITY_API_URL: &str =
    "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";
const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const OPENAI_IMAGE_MODEL: &str = "dall-e-3";

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(anyhow!("image provider request failed: {status} {text}"))
}

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    artifacts: Option<Vec<StabilityArtifact>>,
}

#[derive(Debug, Deserialize)]
struct StabilityArtifact {
    base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImagesResponse {
    data: Option<Vec<OpenAiImage>>,
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: Option<String>,
}

/// SDXL text-to-image. Stability returns base64 artifacts, so the result is
/// an inline `data:` URL that must be materialized before reaching Printful.
pub async fn generate_with_stability(prompt: &str, api_key: &str) -> Result<String> {
    let client = Client::new();
    let response = client
        .post(STABILITY_API_URL)
        .bearer_auth(api_key)
        .header("Accept", "application/json")
        .json(&json!({
            "text_prompts": [
                {"text": prompt, "weight": 1}
            ],
            "cfg_scale": 7,
            "height": 1024,
            "width": 1024,
            "samples": 1,
            "steps": 30,
        }))
        .send()
        .await?;

    let response = assert_ok_response(response).await?;
    let payload: StabilityResponse = response.json().await?;
    let artifact = payload
        .artifacts
        .and_then(|artifacts| artifacts.into_iter().next())
        .and_then(|artifact| artifact.base64)
        .ok_or_else(|| anyhow!("Stability AI returned no image artifacts"))?;
    Ok(format!("data:image/png;base64,{artifact}"))
}

/// DALL-E 3 generation. OpenAI hosts the result, so this path yields a plain
/// HTTP URL.
pub async fn generate_with_openai(prompt: &str, api_key: &str) -> Result<String> {
    let client = Client::new();
    let response = client
        .post(OPENAI_IMAGES_URL)
        .bearer_auth(api_key)
        .json(&json!({
            "model": OPENAI_IMAGE_MODEL,
            "prompt": prompt,
            "size": "1024x1024",
            "quality": "standard",
            "n": 1,
        }))
        .send()
        .await?;

    let response = assert_ok_response(response).await?;
    let payload: OpenAiImagesResponse = response.json().await?;
    if let Some(message) = payload.error.and_then(|err| err.message) {
        return Err(anyhow!("OpenAI returned an error: {message}"));
    }
    payload
        .data
        .and_then(|images| images.into_iter().next())
        .and_then(|image| image.url)
        .ok_or_else(|| anyhow!("OpenAI returned no image URL"))
}
