//! Cloud registry auto-login
//!
//! Given a container image reference, work out which cloud registry hosts
//! it (AWS ECR, Google GCR / Artifact Registry, Azure ACR) and, when
//! auto-login is enabled for that provider, exchange the ambient cloud
//! identity for basic-auth credentials that can pull the image.
//!
//! ```rust,ignore
//! use registry_autologin::registry::{parse_reference, LoginContext, Manager, ProviderOptions};
//! use registry_autologin::registry::providers::GcpClient;
//!
//! let manager = Manager::new().with_gcp_client(GcpClient::new());
//! let image = "gcr.io/my-project/app:v1";
//! let reference = parse_reference(image)?;
//! let opts = ProviderOptions { gcp_auto_login: true, ..Default::default() };
//! let auth = manager.login(&LoginContext::default(), image, &reference, &opts).await?;
//! ```

pub mod registry;
pub mod settings;
