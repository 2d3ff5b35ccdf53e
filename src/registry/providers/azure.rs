use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::registry::{
    AuthConfig, Authenticator, Exchanger, LoginContext, LoginError, Provider, Reference,
};

/// Scope requested from AAD for the ACR token exchange
pub const RESOURCE_MANAGER_SCOPE: &str = "https://management.azure.com/.default";

/// Default Azure Instance Metadata Service token endpoint
pub const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// ACR's username for logins using a refresh token
const ACR_REFRESH_TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

/// An AAD access token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Source of AAD access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, LoginError>;
}

/// Credential returning a fixed token
///
/// Useful when the token is provisioned outside this process, and in tests.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken, LoginError> {
        Ok(AccessToken {
            token: self.token.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
}

/// Credential backed by the Azure Instance Metadata Service (managed identity)
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    endpoint: String,
    client_id: Option<String>,
    http: reqwest::Client,
}

impl Default for ManagedIdentityCredential {
    fn default() -> Self {
        Self {
            endpoint: IMDS_TOKEN_URL.to_string(),
            client_id: None,
            http: reqwest::Client::new(),
        }
    }
}

impl ManagedIdentityCredential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Select a user-assigned identity
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, LoginError> {
        // IMDS takes a resource, not a scope
        let scope = scopes.first().copied().unwrap_or(RESOURCE_MANAGER_SCOPE);
        let resource = scope.trim_end_matches(".default");

        let mut query = vec![("api-version", "2018-02-01"), ("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| LoginError::Credential(format!("managed identity request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoginError::Credential(format!(
                "unexpected status from managed identity endpoint: {}",
                status
            )));
        }

        let token: ImdsTokenResponse = response.json().await.map_err(|e| {
            LoginError::Credential(format!("failed to decode managed identity token: {}", e))
        })?;

        Ok(AccessToken {
            token: token.access_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    refresh_token: String,
}

/// Azure client logging into ACR by exchanging an AAD token for a refresh token
///
/// The exchange is sent to the registry that hosts the image being
/// authenticated (`{scheme}://{registry}/oauth2/exchange`), never to a
/// configured endpoint.
#[derive(Clone)]
pub struct AzureClient {
    credential: Arc<dyn TokenCredential>,
    scheme: String,
    tenant_id: Option<String>,
    http: reqwest::Client,
}

impl Default for AzureClient {
    fn default() -> Self {
        Self {
            credential: Arc::new(ManagedIdentityCredential::new()),
            scheme: "https".to_string(),
            tenant_id: None,
            http: reqwest::Client::new(),
        }
    }
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("scheme", &self.scheme)
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl AzureClient {
    /// Create a new ACR client using the managed identity of the host
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_credential(mut self, credential: impl TokenCredential + 'static) -> Self {
        self.credential = Arc::new(credential);
        self
    }

    /// Scheme used to reach the registry's exchange endpoint ("https" unless testing)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    async fn get_login_auth(
        &self,
        ctx: &LoginContext,
        reference: &Reference,
    ) -> Result<AuthConfig, LoginError> {
        let aad_token = ctx
            .run(self.credential.get_token(&[RESOURCE_MANAGER_SCOPE]))
            .await?;

        let registry = reference.registry();
        let refresh_token = self.exchange_acr_access_token(ctx, registry, &aad_token).await?;

        Ok(AuthConfig::new(ACR_REFRESH_TOKEN_USERNAME, refresh_token))
    }

    /// Trade an AAD token for an ACR refresh token at the registry's exchange endpoint
    async fn exchange_acr_access_token(
        &self,
        ctx: &LoginContext,
        registry: &str,
        aad_token: &AccessToken,
    ) -> Result<String, LoginError> {
        let exchange_url = format!("{}://{}/oauth2/exchange", self.scheme, registry);
        let service = registry.split(':').next().unwrap_or(registry);

        let mut form = vec![
            ("grant_type", "access_token"),
            ("service", service),
            ("access_token", aad_token.token.as_str()),
        ];
        if let Some(tenant) = &self.tenant_id {
            form.push(("tenant", tenant.as_str()));
        }

        debug!(url = %exchange_url, "exchanging AAD token for ACR refresh token");

        let response = ctx
            .run(async {
                self.http
                    .post(&exchange_url)
                    .form(&form)
                    .send()
                    .await
                    .map_err(LoginError::from)
            })
            .await?;

        let status = response.status();
        let body = ctx
            .run(async { response.text().await.map_err(LoginError::from) })
            .await?;

        if !status.is_success() {
            return Err(LoginError::InvalidResponse(format!(
                "unexpected status code {} from exchange request: {}",
                status, body
            )));
        }

        let exchange: ExchangeResponse = serde_json::from_str(&body).map_err(|e| {
            LoginError::InvalidResponse(format!("failed to decode exchange response: {}", e))
        })?;

        Ok(exchange.refresh_token)
    }
}

#[async_trait]
impl Exchanger for AzureClient {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<Authenticator, LoginError> {
        async {
            if !auto_login {
                info!("ACR authentication is not enabled. To enable, set the controller flag --azure-autologin-for-acr");
                return Err(LoginError::unconfigured(
                    Provider::Azure,
                    "ACR auto-login is disabled",
                ));
            }

            info!("logging in to Azure ACR for {}", image);
            match self.get_login_auth(ctx, reference).await {
                Ok(config) => Ok(Authenticator::from_config(config)),
                Err(e) => {
                    info!("error logging into ACR {}", e);
                    Err(e)
                }
            }
        }
        .instrument(ctx.span().clone())
        .await
    }
}
