//! Inbound API key authentication settings.

use secrecy::SecretString;

use crate::env;

/// Inbound API key authentication settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// The shared bearer token callers must present. Auth is disabled when
    /// unset or empty.
    pub api_key: Option<SecretString>,
    /// Allows disabling auth while keeping the key configured.
    pub enabled: bool,
}

impl AuthConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            api_key: env::var("GLM_RELAY_API_KEY").map(SecretString::from),
            enabled: env::flag("GLM_RELAY_AUTH_ENABLED", true)?,
        })
    }

    /// Whether requests must carry the shared key.
    pub fn enforced(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}
