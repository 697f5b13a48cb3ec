//! Provider configuration.
//!
//! [`Config`] is deserialized from the `[provider]` table of a manifest.
//! Unset values fall back to the `GITLAB_TOKEN` and `GITLAB_BASE_URL`
//! environment variables, and file paths expand `~`.

use crate::backend::Backend;
use crate::backend::http::HttpBackend;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::validation;
use reconcile::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, RootCerts, TlsConfig};

/// API base used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4/";

/// Environment variable holding the token.
pub const TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Environment variable holding the base URL.
pub const BASE_URL_ENV: &str = "GITLAB_BASE_URL";

const API_SUFFIX: &str = "api/v4/";

/// GitLab provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Instance URL, with or without the `/api/v4/` suffix.
    pub base_url: String,
    /// Personal, project or group access token.
    #[serde(skip_serializing)]
    pub token: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// PEM file with the CA certificates to trust.
    pub cacert_file: Option<String>,
    /// PEM client certificate, for instances behind a proxy that wants one.
    pub client_cert: Option<String>,
    /// PEM private key matching `client_cert`.
    pub client_key: Option<String>,
    /// Per-request timeout in seconds; `0` disables it.
    pub timeout_secs: u64,
    /// Check the token with a `GET /user` when the client is built.
    pub early_auth_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            insecure: false,
            cacert_file: None,
            client_cert: None,
            client_key: None,
            timeout_secs: 60,
            early_auth_check: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "(sensitive)" })
            .field("insecure", &self.insecure)
            .field("cacert_file", &self.cacert_file)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key)
            .field("timeout_secs", &self.timeout_secs)
            .field("early_auth_check", &self.early_auth_check)
            .finish()
    }
}

impl Config {
    /// Fill unset values from the process environment.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    /// Fill unset values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.token.is_empty()
            && let Some(token) = lookup(TOKEN_ENV)
        {
            self.token = token;
        }
        if self.base_url.is_empty()
            && let Some(url) = lookup(BASE_URL_ENV)
        {
            self.base_url = url;
        }
    }

    /// Normalized API base URL, always ending in `/api/v4/`.
    pub fn api_url(&self) -> Result<String> {
        let raw = self.base_url.trim();
        if raw.is_empty() {
            return Ok(DEFAULT_BASE_URL.to_string());
        }
        validation::url("base_url", raw)
            .map_err(|_| Error::config(format!("base_url {raw:?} is not a valid URL")))?;

        let trimmed = raw.trim_end_matches('/');
        if trimmed.ends_with("/api/v3") {
            return Err(Error::config(format!(
                "GitLab API v3 is not supported; use /api/v4 in {raw}"
            )));
        }

        let mut url = format!("{trimmed}/");
        if !url.ends_with(API_SUFFIX) {
            url.push_str(API_SUFFIX);
        }
        Ok(url)
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::config(format!(
                "token is required (set it in [provider] or {TOKEN_ENV})"
            )));
        }
        self.api_url()?;
        match (non_empty(&self.client_cert), non_empty(&self.client_key)) {
            (Some(_), None) | (None, Some(_)) => Err(Error::config(
                "client_cert and client_key must be set together",
            )),
            _ => Ok(()),
        }
    }

    /// Per-request timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// TLS settings from `insecure`, `cacert_file` and the client pair.
    pub fn tls_config(&self) -> Result<TlsConfig> {
        let mut builder = TlsConfig::builder().disable_verification(self.insecure);
        if self.insecure {
            log::warn!("TLS certificate verification is disabled");
        }

        if let Some(path) = non_empty(&self.cacert_file) {
            let certs = load_certificates(path)?;
            log::debug!("trusting {} certificate(s) from {path}", certs.len());
            builder = builder.root_certs(RootCerts::new_with_certs(&certs));
        }

        if let (Some(cert_path), Some(key_path)) =
            (non_empty(&self.client_cert), non_empty(&self.client_key))
        {
            let chain = load_certificates(cert_path)?;
            let key = PrivateKey::from_pem(&read_file(key_path)?)
                .map_err(|e| Error::tls(expand(key_path), e))?;
            builder = builder.client_cert(Some(ClientCert::new_with_certs(&chain, key)));
        }

        Ok(builder.build())
    }

    /// Build the HTTP agent.
    ///
    /// Error statuses are returned as responses so their bodies can be read.
    pub fn agent(&self) -> Result<ureq::Agent> {
        let config = ureq::Agent::config_builder()
            .tls_config(self.tls_config()?)
            .timeout_global(self.timeout())
            .http_status_as_error(false)
            .build();
        Ok(ureq::Agent::new_with_config(config))
    }

    /// Build a client talking to the configured instance.
    pub fn client(&self) -> Result<Client> {
        self.validate()?;
        let backend = HttpBackend::new(self.agent()?, self.api_url()?, self.token.clone());
        self.connect(backend)
    }

    /// Build a client over a given backend, running the early auth check if
    /// enabled.
    pub fn connect(&self, backend: impl Backend + 'static) -> Result<Client> {
        let client = Client::with_backend(backend);
        if self.early_auth_check {
            let user = client.current_user(&Context::new())?;
            let name = user
                .get("username")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown user");
            log::info!("authenticated as {name}");
        }
        Ok(client)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    let path = expand(path);
    std::fs::read(&path).map_err(|source| Error::Io { path, source })
}

fn load_certificates(path: &str) -> Result<Vec<Certificate<'static>>> {
    let pem = read_file(path)?;
    let certs = ureq::tls::parse_pem(&pem)
        .filter_map(|item| match item {
            Ok(PemItem::Certificate(cert)) => Some(Ok(cert.to_owned())),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::tls(expand(path), e))?;

    if certs.is_empty() {
        return Err(Error::tls(expand(path), "no certificates found"));
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ApiResponse, Method, MockBackend};
    use crate::error::ErrorCategory;
    use serde_json::json;
    use std::collections::HashMap;

    fn config(base_url: &str) -> Config {
        Config {
            base_url: base_url.to_string(),
            token: "glpat-test".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 60);
        assert!(config.early_auth_check);
        assert!(!config.insecure);
        assert_eq!(config.api_url().unwrap(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_url_normalization() {
        assert_eq!(
            config("https://gitlab.example.com").api_url().unwrap(),
            "https://gitlab.example.com/api/v4/"
        );
        assert_eq!(
            config("https://gitlab.example.com/").api_url().unwrap(),
            "https://gitlab.example.com/api/v4/"
        );
        assert_eq!(
            config("https://gitlab.example.com/api/v4").api_url().unwrap(),
            "https://gitlab.example.com/api/v4/"
        );
        assert_eq!(
            config("https://example.com/gitlab/").api_url().unwrap(),
            "https://example.com/gitlab/api/v4/"
        );
    }

    #[test]
    fn test_api_v3_rejected() {
        let err = config("https://gitlab.example.com/api/v3/").api_url().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("v3"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(config("gitlab.example.com").api_url().is_err());
    }

    #[test]
    fn test_env_fills_unset_values_only() {
        let env: HashMap<&str, &str> = HashMap::from([
            (TOKEN_ENV, "from-env"),
            (BASE_URL_ENV, "https://env.example.com"),
        ]);
        let lookup = |name: &str| env.get(name).map(ToString::to_string);

        let mut empty = Config::default();
        empty.apply_env(lookup);
        assert_eq!(empty.token, "from-env");
        assert_eq!(empty.base_url, "https://env.example.com");

        let mut set = config("https://file.example.com");
        set.apply_env(lookup);
        assert_eq!(set.token, "glpat-test");
        assert_eq!(set.base_url, "https://file.example.com");
    }

    #[test]
    fn test_validate() {
        assert!(config("").validate().is_ok());

        let mut missing_token = config("");
        missing_token.token = String::new();
        assert!(missing_token.validate().unwrap_err().to_string().contains(TOKEN_ENV));

        let mut half_pair = config("");
        half_pair.client_cert = Some("~/cert.pem".to_string());
        assert!(half_pair.validate().is_err());

        let mut blank_pair = config("");
        blank_pair.client_cert = Some(String::new());
        assert!(blank_pair.validate().is_ok());
    }

    #[test]
    fn test_deserialize_provider_table() {
        let config: Config = serde_json::from_value(json!({
            "base_url": "https://gitlab.example.com",
            "token": "t",
            "insecure": true,
            "timeout_secs": 5
        }))
        .unwrap();
        assert!(config.insecure);
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert!(config.early_auth_check);

        let unknown = serde_json::from_value::<Config>(json!({"tokn": "t"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_token_never_serialized_or_printed() {
        let config = config("");
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("glpat-test"));
        assert!(!format!("{config:?}").contains("glpat-test"));
    }

    #[test]
    fn test_missing_cacert_file() {
        let mut config = config("");
        config.cacert_file = Some("/nonexistent/ca.pem".to_string());
        let err = config.tls_config().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_cacert_without_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();

        let mut config = config("");
        config.cacert_file = Some(path.to_string_lossy().into_owned());
        let err = config.tls_config().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Tls);
    }

    #[test]
    fn test_connect_runs_auth_check() {
        let mock = MockBackend::new();
        mock.respond(
            Method::Get,
            "user",
            ApiResponse::ok(json!({"id": 1, "username": "root"})),
        );
        config("").connect(mock.clone()).unwrap();
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_connect_rejected_token() {
        let mock = MockBackend::new();
        mock.respond(Method::Get, "user", ApiResponse::error(401, "401 Unauthorized"));
        let err = config("").connect(mock).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Auth);
    }

    #[test]
    fn test_connect_without_auth_check() {
        let mock = MockBackend::new();
        let mut config = config("");
        config.early_auth_check = false;
        config.connect(mock.clone()).unwrap();
        assert!(mock.requests().is_empty());
    }
}
