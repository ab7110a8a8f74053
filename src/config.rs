use std::env;

/// Which AI image backend to try first. Stability is the default because it
/// is the cheaper of the two; OpenAI always remains the fallback hop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiProviderPreference {
    StabilityFirst,
    OpenAiOnly,
}

/// All provider credentials and toggles, read from the environment once at
/// startup. A `None` key selects the documented demo branch for that
/// provider instead of a real call.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub stability_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub printful_api_key: Option<String>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub imgbb_api_key: Option<String>,
    pub ai_provider: Option<String>,
    /// Public base URL of this app, used for checkout redirect targets.
    pub app_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            stability_api_key: non_empty_var("STABILITY_API_KEY"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            printful_api_key: non_empty_var("PRINTFUL_API_KEY"),
            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            // A key left at the .env.example placeholder counts as unset.
            imgbb_api_key: non_empty_var("IMGBB_API_KEY")
                .filter(|value| value != "your_imgbb_api_key_here"),
            ai_provider: non_empty_var("AI_PROVIDER"),
            app_url: non_empty_var("PUBLIC_APP_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
        }
    }

    pub fn ai_provider_preference(&self) -> AiProviderPreference {
        match self.ai_provider.as_deref() {
            Some("openai") => AiProviderPreference::OpenAiOnly,
            _ => AiProviderPreference::StabilityFirst,
        }
    }

    pub fn has_any_ai_key(&self) -> bool {
        self.stability_api_key.is_some() || self.openai_api_key.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_preference_is_stability_first() {
        let config = Config::default();
        assert_eq!(
            config.ai_provider_preference(),
            AiProviderPreference::StabilityFirst
        );
    }

    #[test]
    fn openai_preference_skips_stability() {
        let config = Config {
            ai_provider: Some("openai".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.ai_provider_preference(),
            AiProviderPreference::OpenAiOnly
        );
    }
}
