use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use oci_distribution::secrets::RegistryAuth;
use serde::{Deserialize, Serialize};

/// Cloud provider hosting a registry, derived from the registry hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Aws,
    Gcr,
    Azure,
    /// Any registry that needs no provider-specific login
    Generic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Aws => "AWS",
            Provider::Gcr => "GCR",
            Provider::Azure => "Azure",
            Provider::Generic => "Generic",
        };
        f.write_str(name)
    }
}

/// Per-provider auto-login switches
///
/// A provider is only logged into when its flag is set. A set flag without a
/// client configured for the provider is still an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default)]
    pub aws_auto_login: bool,
    #[serde(default)]
    pub gcp_auto_login: bool,
    #[serde(default)]
    pub azure_auto_login: bool,
}

impl ProviderOptions {
    /// Auto-login flag for a provider (always false for `Generic`)
    pub fn auto_login(&self, provider: Provider) -> bool {
        match provider {
            Provider::Aws => self.aws_auto_login,
            Provider::Gcr => self.gcp_auto_login,
            Provider::Azure => self.azure_auto_login,
            Provider::Generic => false,
        }
    }
}

/// Basic-auth credentials for a registry
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials obtained from a provider login, ready to be presented to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    pub fn from_config(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn auth_config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn password(&self) -> &str {
        &self.config.password
    }

    /// Value for an HTTP `Authorization` header
    pub fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.config.username, self.config.password);
        format!("Basic {}", BASE64.encode(raw))
    }
}

impl From<Authenticator> for RegistryAuth {
    fn from(auth: Authenticator) -> Self {
        RegistryAuth::Basic(auth.config.username, auth.config.password)
    }
}
