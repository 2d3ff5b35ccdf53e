use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::registry::providers::{AwsClient, AzureClient, GcpClient, ManagedIdentityCredential};
use crate::registry::{Manager, ProviderOptions};

/// Default config file (without extension), loaded when present
const DEFAULT_CONFIG_FILE: &str = "config/autologin";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub providers: ProviderOptions,
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub gcp: GcpSettings,
    #[serde(default)]
    pub azure: AzureSettings,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AwsSettings {
    /// Override for the ECR API endpoint (e.g. a VPC endpoint)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Optional static credentials; the default AWS credential chain is used otherwise
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GcpSettings {
    /// Override for the metadata server token URL
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AzureSettings {
    /// Scheme for the registry exchange endpoint (default: https)
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Client ID of a user-assigned managed identity
    #[serde(default)]
    pub client_id: Option<String>,
    /// Override for the instance metadata token endpoint
    #[serde(default)]
    pub imds_endpoint: Option<String>,
}

impl Settings {
    /// Load settings from `$AUTOLOGIN_CONFIG` (or `config/autologin.{toml,yaml}`
    /// when unset) and `AUTOLOGIN_*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        let config_file = env::var("AUTOLOGIN_CONFIG").ok();
        Self::load(config_file.as_deref())
    }

    /// Load settings from an explicit file (required) plus the environment
    ///
    /// Nested keys use `__` in variable names, e.g.
    /// `AUTOLOGIN_PROVIDERS__AWS_AUTO_LOGIN=true`.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = match config_file {
            Some(path) => {
                tracing::info!("Loading config file: {}", path);
                builder.add_source(File::with_name(path))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("AUTOLOGIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Build a manager with a client for every provider, configured from these settings
    ///
    /// Whether a provider is actually logged into is still decided by
    /// `providers` at login time.
    pub fn manager(&self) -> Manager {
        let mut aws = AwsClient::new();
        if let Some(endpoint) = &self.aws.endpoint_url {
            aws = aws.with_endpoint(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) =
            (&self.aws.access_key_id, &self.aws.secret_access_key)
        {
            aws = aws.with_credentials(access_key, secret_key, self.aws.session_token.clone());
        }

        let mut gcp = GcpClient::new();
        if let Some(token_url) = &self.gcp.token_url {
            gcp = gcp.with_token_url(token_url);
        }

        let mut credential = ManagedIdentityCredential::new();
        if let Some(endpoint) = &self.azure.imds_endpoint {
            credential = credential.with_endpoint(endpoint);
        }
        if let Some(client_id) = &self.azure.client_id {
            credential = credential.with_client_id(client_id);
        }
        let mut azure = AzureClient::new().with_token_credential(credential);
        if let Some(scheme) = &self.azure.scheme {
            azure = azure.with_scheme(scheme);
        }
        if let Some(tenant_id) = &self.azure.tenant_id {
            azure = azure.with_tenant_id(tenant_id);
        }

        Manager::new()
            .with_aws_client(aws)
            .with_gcp_client(gcp)
            .with_azure_client(azure)
    }
}
