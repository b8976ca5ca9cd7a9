//! Base URL resolution.
//!
//! # Design
//! The base URL is recomputed on every call and never cached, so a domain
//! exported into the environment after startup takes effect on the next
//! request. Three strategies are tried in a fixed order; the first that
//! yields a value wins:
//!
//! 1. configured domain, always served over `https`,
//! 2. the page origin when running inside a browser,
//! 3. a local development address.
//!
//! The host platform is injected once through `HostContext` rather than
//! probed at call time.

use serde::{Deserialize, Serialize};

/// Environment variable consulted for the public API domain.
pub const DEFAULT_DOMAIN_VAR: &str = "PUBLIC_API_DOMAIN";

/// Address used when no domain is configured and no page origin exists.
pub const LOCAL_FALLBACK_URL: &str = "http://localhost:5000/";

/// Runtime the client is embedded in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostContext {
    /// Web build; `origin` is the current page origin, e.g. `https://app.example.com`.
    Browser { origin: String },
    /// Native app or any runtime without a page origin.
    #[default]
    Native,
}

/// Where the configured domain comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainSource {
    /// Read the named environment variable on every resolution.
    Env(String),
    /// A fixed value; `None` skips straight to the next strategy.
    Fixed(Option<String>),
}

impl Default for DomainSource {
    fn default() -> Self {
        Self::Env(DEFAULT_DOMAIN_VAR.to_string())
    }
}

impl DomainSource {
    fn current(&self) -> Option<String> {
        match self {
            DomainSource::Env(var) => std::env::var(var).ok(),
            DomainSource::Fixed(value) => value.clone(),
        }
    }
}

/// One step of the resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ConfiguredDomain,
    BrowserOrigin,
    LocalFallback,
}

/// Resolution order; `LocalFallback` always succeeds, so it is last.
pub const RESOLUTION_ORDER: [Strategy; 3] = [
    Strategy::ConfiguredDomain,
    Strategy::BrowserOrigin,
    Strategy::LocalFallback,
];

/// Produces the absolute base URL every request is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrlResolver {
    domain: DomainSource,
    host: HostContext,
    fallback: String,
}

impl Default for BaseUrlResolver {
    fn default() -> Self {
        Self::new(DomainSource::default(), HostContext::Native)
    }
}

impl BaseUrlResolver {
    pub fn new(domain: DomainSource, host: HostContext) -> Self {
        Self {
            domain,
            host,
            fallback: LOCAL_FALLBACK_URL.to_string(),
        }
    }

    /// Replace the local development address used by the last strategy.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = with_trailing_slash(&fallback.into());
        self
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    pub fn domain_source(&self) -> &DomainSource {
        &self.domain
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Same host and fallback, different domain source.
    #[must_use]
    pub fn with_domain_source(mut self, domain: DomainSource) -> Self {
        self.domain = domain;
        self
    }

    /// Resolve the base URL. Always ends in `/`.
    pub fn resolve(&self) -> String {
        self.resolve_with_strategy().0
    }

    /// Resolve and report which strategy produced the URL.
    pub fn resolve_with_strategy(&self) -> (String, Strategy) {
        for strategy in RESOLUTION_ORDER {
            if let Some(url) = self.try_strategy(strategy) {
                return (url, strategy);
            }
        }
        (self.fallback.clone(), Strategy::LocalFallback)
    }

    fn try_strategy(&self, strategy: Strategy) -> Option<String> {
        match strategy {
            Strategy::ConfiguredDomain => self
                .domain
                .current()
                .filter(|d| !d.trim().is_empty())
                .map(|d| https_base(&d)),
            Strategy::BrowserOrigin => match &self.host {
                HostContext::Browser { origin } if !origin.is_empty() => {
                    Some(with_trailing_slash(origin))
                }
                _ => None,
            },
            Strategy::LocalFallback => Some(self.fallback.clone()),
        }
    }
}

/// Resolve with the default resolver: `PUBLIC_API_DOMAIN`, native host.
pub fn resolve_base_url() -> String {
    BaseUrlResolver::default().resolve()
}

/// `example.com`, `http://example.com/` and `https://example.com` all map
/// to `https://example.com/`.
fn https_base(domain: &str) -> String {
    let domain = domain.trim();
    let host = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(domain);
    let host = host.strip_suffix('/').unwrap_or(host);
    format!("https://{host}/")
}

fn with_trailing_slash(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(domain: Option<&str>, host: HostContext) -> BaseUrlResolver {
        BaseUrlResolver::new(DomainSource::Fixed(domain.map(str::to_string)), host)
    }

    fn browser(origin: &str) -> HostContext {
        HostContext::Browser {
            origin: origin.to_string(),
        }
    }

    #[test]
    fn domain_variants_resolve_to_https_root() {
        for domain in [
            "api.example.com",
            "api.example.com/",
            "http://api.example.com",
            "https://api.example.com",
            "https://api.example.com/",
            "http://api.example.com/",
        ] {
            let url = fixed(Some(domain), HostContext::Native).resolve();
            assert_eq!(url, "https://api.example.com/", "domain {domain:?}");
        }
    }

    #[test]
    fn domain_wins_over_browser_origin() {
        let (url, strategy) =
            fixed(Some("api.example.com"), browser("https://app.example.com")).resolve_with_strategy();
        assert_eq!(url, "https://api.example.com/");
        assert_eq!(strategy, Strategy::ConfiguredDomain);
    }

    #[test]
    fn browser_without_domain_uses_origin() {
        let (url, strategy) = fixed(None, browser("https://app.example.com")).resolve_with_strategy();
        assert_eq!(url, "https://app.example.com/");
        assert_eq!(strategy, Strategy::BrowserOrigin);
    }

    #[test]
    fn browser_origin_with_port_is_kept() {
        let url = fixed(None, browser("http://localhost:8081")).resolve();
        assert_eq!(url, "http://localhost:8081/");
    }

    #[test]
    fn native_without_domain_falls_back_to_localhost() {
        let (url, strategy) = fixed(None, HostContext::Native).resolve_with_strategy();
        assert_eq!(url, "http://localhost:5000/");
        assert_eq!(strategy, Strategy::LocalFallback);
    }

    #[test]
    fn empty_domain_is_treated_as_absent() {
        let url = fixed(Some(""), HostContext::Native).resolve();
        assert_eq!(url, "http://localhost:5000/");
    }

    #[test]
    fn custom_fallback_gets_trailing_slash() {
        let url = fixed(None, HostContext::Native)
            .with_fallback("http://10.0.2.2:5000")
            .resolve();
        assert_eq!(url, "http://10.0.2.2:5000/");
    }

    #[test]
    fn env_domain_is_read_on_every_call() {
        let var = "API_CORE_TEST_DOMAIN_LIVE";
        std::env::remove_var(var);
        let resolver = BaseUrlResolver::new(DomainSource::Env(var.to_string()), HostContext::Native);
        assert_eq!(resolver.resolve(), "http://localhost:5000/");

        std::env::set_var(var, "https://late.example.com/");
        assert_eq!(resolver.resolve(), "https://late.example.com/");

        std::env::remove_var(var);
        assert_eq!(resolver.resolve(), "http://localhost:5000/");
    }
}
