use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::registry::providers::{AwsClient, AzureClient, GcpClient};
use crate::registry::{
    image_registry_provider, Authenticator, Exchanger, LoginContext, LoginError, Provider,
    ProviderOptions, Reference,
};

/// Routes image logins to the exchanger of the provider hosting the image
///
/// Clients are injected while building the manager, one per provider;
/// injecting a second client for a provider replaces the first. The builder
/// methods consume the manager, so once it is shared (e.g. behind an `Arc`)
/// its clients can no longer change.
#[derive(Clone, Default)]
pub struct Manager {
    clients: HashMap<Provider, Arc<dyn Exchanger>>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("providers", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Manager {
    /// Create a manager with no clients configured
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aws_client(self, client: AwsClient) -> Self {
        self.with_client(Arc::new(client))
    }

    pub fn with_gcp_client(self, client: GcpClient) -> Self {
        self.with_client(Arc::new(client))
    }

    pub fn with_azure_client(self, client: AzureClient) -> Self {
        self.with_client(Arc::new(client))
    }

    /// Register an exchanger under the provider it reports
    pub fn with_client(mut self, client: Arc<dyn Exchanger>) -> Self {
        let provider = client.provider();
        if provider == Provider::Generic {
            // Generic registries never go through an exchanger
            return self;
        }
        self.clients.insert(provider, client);
        self
    }

    pub fn client(&self, provider: Provider) -> Option<&Arc<dyn Exchanger>> {
        self.clients.get(&provider)
    }

    /// Log into the registry hosting `image`
    ///
    /// Returns `Ok(None)` for registries without a cloud provider: no login
    /// is needed and the caller should fall back to its default credentials.
    /// Errors from the provider exchanger are returned as-is.
    pub async fn login(
        &self,
        ctx: &LoginContext,
        image: &str,
        reference: &Reference,
        opts: &ProviderOptions,
    ) -> Result<Option<Authenticator>, LoginError> {
        let provider = image_registry_provider(image, reference);

        if provider == Provider::Generic {
            ctx.span()
                .in_scope(|| debug!("no provider login needed for {}", image));
            return Ok(None);
        }

        let client = self.client(provider).ok_or_else(|| {
            LoginError::unconfigured(provider, format!("no {} client configured", provider))
        })?;

        let auto_login = opts.auto_login(provider);
        ctx.span().in_scope(|| {
            debug!(provider = %provider, auto_login, "routing login for {}", image)
        });

        client
            .login(ctx, auto_login, image, reference)
            .await
            .map(Some)
    }
}
