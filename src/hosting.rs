use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const IMGBB_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

pub const HOSTING_REMEDIATION: &str =
    "Get a free ImgBB API key from https://api.imgbb.com/ and add IMGBB_API_KEY to your .env file.";

/// Materialization failure, with the flag the HTTP layer relays so the UI
/// can point the operator at image hosting.
#[derive(Debug)]
pub struct HostingError {
    pub message: String,
    pub needs_image_hosting: bool,
}

impl std::fmt::Display for HostingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostingError {}

impl HostingError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            needs_image_hosting: false,
        }
    }

    fn hosting(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            needs_image_hosting: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImgbbResponse {
    data: Option<ImgbbData>,
    error: Option<ImgbbError>,
}

#[derive(Debug, Deserialize)]
struct ImgbbData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImgbbError {
    Structured { message: Option<String> },
    Plain(String),
}

impl ImgbbError {
    fn into_message(self) -> Option<String> {
        match self {
            ImgbbError::Structured { message } => message,
            ImgbbError::Plain(message) => Some(message),
        }
    }
}

/// Splits a `data:<mime>;base64,<payload>` URL into its payload and checks
/// that the payload actually decodes.
fn base64_payload(data_url: &str) -> Result<&str, HostingError> {
    let payload = data_url
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or_else(|| HostingError::invalid("Invalid data URL: missing base64 payload."))?;
    BASE64
        .decode(payload)
        .map_err(|_| HostingError::invalid("Invalid data URL: payload is not valid base64."))?;
    Ok(payload)
}

/// Uploads a base64 image payload to ImgBB and returns the hosted URL.
pub async fn upload_to_imgbb(api_key: &str, base64_data: &str) -> Result<String, HostingError> {
    let client = Client::new();
    let response = client
        .post(IMGBB_UPLOAD_URL)
        .form(&[("key", api_key), ("image", base64_data)])
        .send()
        .await
        .map_err(|err| HostingError::hosting(format!("ImgBB upload failed: {err}.")))?;

    let status = response.status();
    let payload: ImgbbResponse = response
        .json()
        .await
        .map_err(|err| HostingError::hosting(format!("ImgBB upload failed: {err}.")))?;

    if let Some(url) = payload.data.and_then(|data| data.url) {
        tracing::info!("image uploaded to hosting service");
        return Ok(url);
    }

    let message = payload
        .error
        .and_then(ImgbbError::into_message)
        .unwrap_or_else(|| format!("no URL returned (status {status})"));
    Err(HostingError::hosting(format!(
        "ImgBB upload failed: {message}. Please check your API key."
    )))
}

/// Guarantees an http(s) image URL before an order reaches Printful, which
/// rejects inline references outright. `data:` URLs are uploaded to ImgBB;
/// anything else non-http is rejected rather than forwarded.
pub async fn ensure_http_url(
    imgbb_api_key: Option<&str>,
    image_ref: &str,
) -> Result<String, HostingError> {
    if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
        Url::parse(image_ref)
            .map_err(|err| HostingError::invalid(format!("Invalid image URL: {err}.")))?;
        return Ok(image_ref.to_string());
    }

    if image_ref.starts_with("data:") {
        let Some(api_key) = imgbb_api_key else {
            return Err(HostingError::hosting(format!(
                "ImgBB API key not configured. {HOSTING_REMEDIATION}"
            )));
        };
        let payload = base64_payload(image_ref)?;
        return upload_to_imgbb(api_key, payload).await;
    }

    Err(HostingError::invalid(
        "Image reference is neither an HTTP URL nor a base64 data URL.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn http_urls_pass_through_unchanged() {
        let url = "https://example.com/design.png";
        assert_eq!(ensure_http_url(None, url).await.unwrap(), url);
    }

    #[tokio::test]
    async fn data_url_without_hosting_key_names_the_provider() {
        let err = ensure_http_url(None, "data:image/png;base64,aGVsbG8=")
            .await
            .unwrap_err();
        assert!(err.needs_image_hosting);
        assert!(err.message.contains("ImgBB API key not configured"));
        assert!(err.message.contains("api.imgbb.com"));
    }

    #[tokio::test]
    async fn malformed_references_are_rejected() {
        let err = ensure_http_url(None, "ftp://example.com/x.png").await.unwrap_err();
        assert!(!err.needs_image_hosting);

        let err = ensure_http_url(Some("key"), "data:image/png;base64,!!notbase64!!")
            .await
            .unwrap_err();
        assert!(err.message.contains("not valid base64"));
    }

    #[test]
    fn payload_extraction_strips_the_header() {
        assert_eq!(
            base64_payload("data:image/png;base64,aGVsbG8=").unwrap(),
            "aGVsbG8="
        );
        assert!(base64_payload("data:image/png;base64").is_err());
    }
}
