pub mod aws;
pub mod azure;
pub mod gcp;

pub use aws::AwsClient;
pub use azure::{AzureClient, ManagedIdentityCredential, StaticTokenCredential, TokenCredential};
pub use gcp::GcpClient;
