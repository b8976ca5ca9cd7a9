//! Configuration for the API client.
//!
//! Supports environment-based configuration with sensible defaults.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::base_url::{
    BaseUrlResolver, DomainSource, HostContext, DEFAULT_DOMAIN_VAR, LOCAL_FALLBACK_URL,
};
use crate::error::{ApiError, ApiResult};

const DEFAULT_USER_AGENT: &str = concat!("api-core/", env!("CARGO_PKG_VERSION"));

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Environment variable holding the public API domain
    pub domain_var: String,
    /// Fixed domain; when set the environment is not consulted
    pub domain: Option<String>,
    /// Runtime the client is embedded in
    pub host: HostContext,
    /// Address used when neither a domain nor a page origin is available
    pub fallback_url: String,
    /// Request timeout for the bundled transport; `None` waits indefinitely
    #[serde(with = "secs_opt")]
    pub timeout: Option<Duration>,
    /// `User-Agent` sent by the bundled transport
    pub user_agent: String,
}

mod secs_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain_var: DEFAULT_DOMAIN_VAR.to_string(),
            domain: None,
            host: HostContext::Native,
            fallback_url: LOCAL_FALLBACK_URL.to_string(),
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    ///
    /// Reads `API_TIMEOUT_SECS` once. The domain variable is *not* read
    /// here; the resolver reads it on every request.
    pub fn from_env() -> Self {
        let timeout = env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Builder-style method to set the host context
    #[must_use]
    pub fn with_host(mut self, host: HostContext) -> Self {
        self.host = host;
        self
    }

    /// Builder-style method to run inside a browser page with `origin`
    #[must_use]
    pub fn in_browser(self, origin: impl Into<String>) -> Self {
        self.with_host(HostContext::Browser {
            origin: origin.into(),
        })
    }

    /// Builder-style method to pin the domain instead of reading the environment
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Builder-style method to change which environment variable holds the domain
    #[must_use]
    pub fn with_domain_var(mut self, var: impl Into<String>) -> Self {
        self.domain_var = var.into();
        self
    }

    /// Builder-style method to set the local fallback address
    #[must_use]
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder-style method to set the user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the resolver described by this configuration
    pub fn resolver(&self) -> BaseUrlResolver {
        let domain = match &self.domain {
            Some(domain) => DomainSource::Fixed(Some(domain.clone())),
            None => DomainSource::Env(self.domain_var.clone()),
        };
        BaseUrlResolver::new(domain, self.host.clone()).with_fallback(self.fallback_url.clone())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ApiResult<()> {
        if !self.fallback_url.starts_with("http://") && !self.fallback_url.starts_with("https://") {
            return Err(ApiError::config(format!(
                "fallback_url must start with http:// or https://, got {:?}",
                self.fallback_url
            )));
        }

        if let HostContext::Browser { origin } = &self.host {
            if origin.is_empty() {
                return Err(ApiError::config("browser origin cannot be empty"));
            }
        }

        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ApiError::config("timeout cannot be zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.domain_var, "PUBLIC_API_DOMAIN");
        assert_eq!(config.fallback_url, "http://localhost:5000/");
        assert!(config.timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixed_domain_skips_env() {
        let config = ClientConfig::default()
            .with_domain_var("API_CORE_TEST_UNSET_VAR")
            .with_domain("pinned.example.com");
        assert_eq!(config.resolver().resolve(), "https://pinned.example.com/");
    }

    #[test]
    fn test_browser_builder() {
        let config = ClientConfig::default()
            .with_domain_var("API_CORE_TEST_UNSET_VAR")
            .in_browser("https://app.example.com");
        assert_eq!(config.resolver().resolve(), "https://app.example.com/");
    }

    #[test]
    fn test_validation() {
        let invalid = ClientConfig::default().with_fallback_url("localhost:5000");
        assert!(invalid.validate().is_err());

        let zero = ClientConfig::default().with_timeout(Duration::ZERO);
        assert!(zero.validate().is_err());

        let empty_origin = ClientConfig::default().in_browser("");
        assert!(empty_origin.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip_keeps_timeout_seconds() {
        let config = ClientConfig::default().with_timeout(Duration::from_secs(15));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 15);
        let back: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
