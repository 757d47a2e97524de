//! Upstream chat service configuration settings.

use secrecy::SecretString;

use crate::{ReasoningMode, env};

const DEFAULT_UPSTREAM_URL: &str = "https://chat.z.ai";
const DEFAULT_MODEL: &str = "GLM-4.5";

/// User fields substituted into `{{USER_NAME}}`-style prompt placeholders.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Substituted for `{{USER_NAME}}`.
    pub name: Option<String>,
    /// Substituted for `{{USER_LOCATION}}`.
    pub location: Option<String>,
    /// Substituted for `{{USER_LANG}}`.
    pub language: Option<String>,
    /// IANA timezone, substituted for `{{TZ}}` and used for `{{DATE}}`,
    /// `{{TIME}}` and `{{DAY}}` expansion. Falls back to UTC.
    pub timezone: Option<String>,
}

/// Upstream chat service configuration settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service, without a trailing slash.
    pub base_url: String,
    /// Bearer token for the upstream. When unset and anonymous tokens are
    /// enabled, a visitor token is fetched and cached instead.
    pub token: Option<SecretString>,
    /// Fetch an anonymous visitor token when no token is configured.
    pub anonymous_token: bool,
    /// Model every inbound `claude-*` (and unknown Anthropic) name maps to.
    pub default_model: String,
    /// Rendering style for upstream reasoning content.
    pub reasoning_mode: ReasoningMode,
    /// User fields for prompt placeholder expansion.
    pub user: UserProfile,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.to_string(),
            token: None,
            anonymous_token: true,
            default_model: DEFAULT_MODEL.to_string(),
            reasoning_mode: ReasoningMode::default(),
            user: UserProfile::default(),
        }
    }
}

impl UpstreamConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let base_url = env::var("GLM_RELAY_UPSTREAM_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        Ok(Self {
            base_url,
            token: env::var("GLM_RELAY_UPSTREAM_TOKEN").map(SecretString::from),
            anonymous_token: env::flag("GLM_RELAY_ANONYMOUS_TOKEN", defaults.anonymous_token)?,
            default_model: env::var("GLM_RELAY_DEFAULT_MODEL").unwrap_or(defaults.default_model),
            reasoning_mode: env::parsed("GLM_RELAY_REASONING_MODE", defaults.reasoning_mode)?,
            user: UserProfile {
                name: env::var("GLM_RELAY_USER_NAME"),
                location: env::var("GLM_RELAY_USER_LOCATION"),
                language: env::var("GLM_RELAY_USER_LANG"),
                timezone: env::var("GLM_RELAY_TZ"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        temp_env::with_vars([("GLM_RELAY_UPSTREAM_URL", Some("https://example.com/"))], || {
            let config = UpstreamConfig::from_env().unwrap();
            assert_eq!(config.base_url, "https://example.com");
        });
    }
}
