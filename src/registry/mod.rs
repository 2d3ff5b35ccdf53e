pub mod classifier;
pub mod context;
pub mod error;
pub mod manager;
pub mod models;
pub mod providers;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::image_registry_provider;
pub use context::LoginContext;
pub use error::LoginError;
pub use manager::Manager;
pub use models::{AuthConfig, Authenticator, Provider, ProviderOptions};
pub use oci_distribution::Reference;

use async_trait::async_trait;

/// Trait for cloud registry credential exchangers
///
/// One implementation exists per cloud provider. Implementations hold only
/// configuration fixed at construction, so a single instance can serve
/// concurrent logins.
#[async_trait]
pub trait Exchanger: Send + Sync {
    /// The provider this exchanger logs into
    fn provider(&self) -> Provider;

    /// Exchange ambient cloud credentials for registry credentials
    ///
    /// # Arguments
    /// * `ctx` - Cancellation and logging for this call
    /// * `auto_login` - Whether auto-login is enabled for this provider
    /// * `image` - The image as given by the caller
    /// * `reference` - The parsed form of `image`
    ///
    /// # Errors
    /// Returns `LoginError::UnconfiguredProvider` when `auto_login` is false.
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        reference: &Reference,
    ) -> Result<Authenticator, LoginError>;
}

/// Parse an image reference (e.g. "gcr.io/foo/bar:v1")
pub fn parse_reference(image: &str) -> Result<Reference, LoginError> {
    image
        .parse::<Reference>()
        .map_err(|e| LoginError::InvalidImage(format!("{}: {}", image, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let reference = parse_reference("gcr.io/foo/bar:v1").unwrap();
        assert_eq!(reference.registry(), "gcr.io");
        assert_eq!(reference.repository(), "foo/bar");

        let reference = parse_reference("foo/bar:v1").unwrap();
        assert_eq!(reference.registry(), "docker.io");
    }

    #[test]
    fn test_parse_reference_invalid() {
        let err = parse_reference("Not A Valid Image!").unwrap_err();
        assert!(matches!(err, LoginError::InvalidImage(_)));
    }
}
