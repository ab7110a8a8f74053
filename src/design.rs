use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cache::DesignCache;
use crate::config::{AiProviderPreference, Config};
use crate::genai;

/// Stock T-shirt photo served when no AI backend can produce an image.
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1521572163474-6864f9cf17ab?w=800&h=800&fit=crop";

/// A generated design plus its generation metadata. Created once per unique
/// topic and immutable afterwards; `cached_at` is set by the cache on write.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    pub id: String,
    pub topic: String,
    pub image_url: String,
    pub prompt: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
}

/// Outcome of the provider-selection chain, ready for the wire.
#[derive(Debug)]
pub struct GeneratedDesign {
    pub design: DesignRecord,
    pub provider: Option<String>,
    pub from_cache: bool,
    pub is_fallback: bool,
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageProvider {
    Stability,
    OpenAi,
}

impl ImageProvider {
    pub fn name(self) -> &'static str {
        match self {
            ImageProvider::Stability => "stability-ai",
            ImageProvider::OpenAi => "openai",
        }
    }

    fn api_key(self, config: &Config) -> Option<&str> {
        match self {
            ImageProvider::Stability => config.stability_api_key.as_deref(),
            ImageProvider::OpenAi => config.openai_api_key.as_deref(),
        }
    }

    async fn generate(self, prompt: &str, api_key: &str) -> anyhow::Result<String> {
        match self {
            ImageProvider::Stability => genai::generate_with_stability(prompt, api_key).await,
            ImageProvider::OpenAi => genai::generate_with_openai(prompt, api_key).await,
        }
    }
}

/// Ordered list of backends to try for a generation request.
pub fn provider_chain(preference: AiProviderPreference) -> &'static [ImageProvider] {
    match preference {
        AiProviderPreference::StabilityFirst => {
            &[ImageProvider::Stability, ImageProvider::OpenAi]
        }
        AiProviderPreference::OpenAiOnly => &[ImageProvider::OpenAi],
    }
}

pub fn design_prompt(topic: &str) -> String {
    format!(
        "A trendy, eye-catching T-shirt design for \"{topic}\". Bold and modern design \
         suitable for printing on a T-shirt. Include text and graphics. Visually appealing \
         with vibrant colors. Style: modern, minimalist, trendy. Square design suitable for \
         T-shirt printing."
    )
}

fn new_design_id() -> String {
    format!("design-{}", Utc::now().timestamp_millis())
}

fn placeholder_message(config: &Config, last_error: Option<&str>) -> String {
    if !config.has_any_ai_key() {
        "No AI API keys configured. Using placeholder design. Add STABILITY_API_KEY or \
         OPENAI_API_KEY to generate real designs."
            .to_string()
    } else {
        format!(
            "AI generation failed: {}. Using placeholder design.",
            last_error.unwrap_or("unknown error")
        )
    }
}

/// Consults the cache, then walks the provider chain; on total failure (or no
/// configured keys) synthesizes the placeholder record. Only real generations
/// are cached, never the placeholder.
pub async fn generate_design(config: &Config, cache: &DesignCache, topic: &str) -> GeneratedDesign {
    if let Some(cached) = cache.lookup(topic).await {
        let provider = cached.provider.clone();
        return GeneratedDesign {
            design: cached,
            provider: provider.or_else(|| Some("cached".to_string())),
            from_cache: true,
            is_fallback: false,
            message: None,
        };
    }

    let prompt = design_prompt(topic);
    let mut last_error: Option<String> = None;

    for provider in provider_chain(config.ai_provider_preference()) {
        let Some(api_key) = provider.api_key(config) else {
            continue;
        };
        match provider.generate(&prompt, api_key).await {
            Ok(image_url) => {
                let design = DesignRecord {
                    id: new_design_id(),
                    topic: topic.to_string(),
                    image_url,
                    prompt: prompt.clone(),
                    created_at: Utc::now().to_rfc3339(),
                    provider: Some(provider.name().to_string()),
                    cached_at: None,
                };
                cache.store(&design).await;
                return GeneratedDesign {
                    provider: Some(provider.name().to_string()),
                    design,
                    from_cache: false,
                    is_fallback: false,
                    message: None,
                };
            }
            Err(err) => {
                tracing::warn!(provider = provider.name(), %err, "image generation failed");
                last_error = Some(err.to_string());
            }
        }
    }

    let message = placeholder_message(config, last_error.as_deref());
    GeneratedDesign {
        design: DesignRecord {
            id: new_design_id(),
            topic: topic.to_string(),
            image_url: PLACEHOLDER_IMAGE_URL.to_string(),
            prompt: format!(
                "A trendy T-shirt design featuring \"{topic}\" with modern graphics and bold typography"
            ),
            created_at: Utc::now().to_rfc3339(),
            provider: None,
            cached_at: None,
        },
        provider: None,
        from_cache: false,
        is_fallback: true,
        message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn prompt_embeds_the_topic() {
        let prompt = design_prompt("Space Exploration");
        assert!(prompt.contains("\"Space Exploration\""));
        assert!(prompt.contains("T-shirt"));
    }

    #[test]
    fn chain_order_prefers_stability() {
        let chain = provider_chain(AiProviderPreference::StabilityFirst);
        assert_eq!(chain, &[ImageProvider::Stability, ImageProvider::OpenAi][..]);
        assert_eq!(provider_chain(AiProviderPreference::OpenAiOnly).len(), 1);
    }

    #[test]
    fn placeholder_message_distinguishes_unconfigured_from_failure() {
        let unconfigured = Config::default();
        assert!(placeholder_message(&unconfigured, None).contains("No AI API keys configured"));

        let configured = Config {
            openai_api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        let message = placeholder_message(&configured, Some("quota exceeded"));
        assert!(message.contains("AI generation failed: quota exceeded"));
    }

    #[tokio::test]
    async fn unconfigured_generation_falls_back_without_caching() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());
        let config = Config::default();

        let first = generate_design(&config, &cache, "Space Exploration").await;
        assert!(first.is_fallback);
        assert!(!first.from_cache);
        assert_eq!(first.design.image_url, PLACEHOLDER_IMAGE_URL);

        // Placeholders are never cached, so the second call is not a hit.
        let second = generate_design(&config, &cache, "Space Exploration").await;
        assert!(!second.from_cache);
    }

    #[tokio::test]
    async fn cached_design_is_returned_with_hit_indicator() {
        let dir = tempdir().unwrap();
        let cache = DesignCache::new(dir.path().to_path_buf());
        let design = DesignRecord {
            id: "design-42".to_string(),
            topic: "Space Exploration".to_string(),
            image_url: "https://example.com/42.png".to_string(),
            prompt: design_prompt("Space Exploration"),
            created_at: Utc::now().to_rfc3339(),
            provider: Some("openai".to_string()),
            cached_at: None,
        };
        cache.store(&design).await;

        let result = generate_design(&Config::default(), &cache, "space exploration").await;
        assert!(result.from_cache);
        assert_eq!(result.design.id, "design-42");
        assert_eq!(result.provider.as_deref(), Some("openai"));
    }
}
