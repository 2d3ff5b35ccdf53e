use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, Instrument};

use crate::registry::{
    AuthConfig, Authenticator, Exchanger, LoginContext, LoginError, Provider, Reference,
};

/// Default GCP metadata endpoint used for authentication
pub const GCP_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Username GCR expects when an OAuth2 access token is used as the password
const GCR_TOKEN_USERNAME: &str = "oauth2accesstoken";

#[derive(Debug, Deserialize)]
struct GceToken {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: i64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

/// Whether `host` is a GCR or Artifact Registry host
pub fn valid_host(host: &str) -> bool {
    host == "gcr.io" || host.ends_with(".gcr.io") || host.ends_with("-docker.pkg.dev")
}

/// GCP client logging into GCR / Artifact Registry with a metadata server token
///
/// This works on GCE and GKE with either the node service account or
/// workload identity, as long as that identity may pull the image.
#[derive(Debug, Clone)]
pub struct GcpClient {
    token_url: String,
    http: reqwest::Client,
}

impl Default for GcpClient {
    fn default() -> Self {
        Self {
            token_url: GCP_TOKEN_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

impl GcpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch tokens from `url` instead of the metadata server
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub(crate) async fn get_login_auth(&self, ctx: &LoginContext) -> Result<AuthConfig, LoginError> {
        let response = ctx
            .run(async {
                self.http
                    .get(&self.token_url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(LoginError::from)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoginError::InvalidResponse(format!(
                "unexpected status from metadata service: {}",
                status
            )));
        }

        let body = ctx
            .run(async { response.text().await.map_err(LoginError::from) })
            .await?;
        let token: GceToken = serde_json::from_str(&body).map_err(|e| {
            LoginError::InvalidResponse(format!("failed to decode metadata token: {}", e))
        })?;

        Ok(AuthConfig::new(GCR_TOKEN_USERNAME, token.access_token))
    }
}

#[async_trait]
impl Exchanger for GcpClient {
    fn provider(&self) -> Provider {
        Provider::Gcr
    }

    /// The host is not re-validated here; callers pick this client through
    /// `valid_host` or the provider classifier.
    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        _reference: &Reference,
    ) -> Result<Authenticator, LoginError> {
        async {
            if !auto_login {
                info!("GCR authentication is not enabled. To enable, set the controller flag --gcp-autologin-for-gcr");
                return Err(LoginError::unconfigured(
                    Provider::Gcr,
                    "GCR auto-login is disabled",
                ));
            }

            info!("logging in to GCP GCR for {}", image);
            match self.get_login_auth(ctx).await {
                Ok(config) => Ok(Authenticator::from_config(config)),
                Err(e) => {
                    info!("error logging into GCP {}", e);
                    Err(e)
                }
            }
        }
        .instrument(ctx.span().clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{parse_reference, test_support::TestServer};
    use axum::http::StatusCode;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const TEST_VALID_GCR_IMAGE: &str = "gcr.io/foo/bar:v1";
    const TEST_RESPONSE: &str =
        r#"{"access_token": "some-token","expires_in": 10, "token_type": "foo"}"#;

    #[tokio::test]
    async fn test_get_login_auth_success() {
        let body = r#"{
	"access_token": "some-token",
	"expires_in": 10,
	"token_type": "foo"
}"#;
        let srv = TestServer::start(StatusCode::OK, body).await;

        let config = GcpClient::new()
            .with_token_url(&srv.url)
            .get_login_auth(&LoginContext::default())
            .await
            .unwrap();
        assert_eq!(config, AuthConfig::new("oauth2accesstoken", "some-token"));

        let requests = srv.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, axum::http::Method::GET);
        assert_eq!(
            requests[0].headers.get("Metadata-Flavor").unwrap(),
            "Google"
        );
    }

    #[tokio::test]
    async fn test_get_login_auth_fail() {
        let srv = TestServer::start(StatusCode::INTERNAL_SERVER_ERROR, "").await;
        let err = GcpClient::new()
            .with_token_url(&srv.url)
            .get_login_auth(&LoginContext::default())
            .await
            .unwrap_err();
        match err {
            LoginError::InvalidResponse(msg) => assert!(msg.contains("500")),
            other => panic!("Expected InvalidResponse, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_login_auth_invalid_response() {
        let srv = TestServer::start(StatusCode::OK, "foo").await;
        let err = GcpClient::new()
            .with_token_url(&srv.url)
            .get_login_auth(&LoginContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_get_login_auth_cancelled() {
        let srv =
            TestServer::start_delayed(StatusCode::OK, TEST_RESPONSE, Duration::from_secs(30)).await;
        let token = CancellationToken::new();
        let ctx = LoginContext::default().with_cancellation(token.clone());

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = GcpClient::new()
            .with_token_url(&srv.url)
            .get_login_auth(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::Cancelled));
        cancel.await.unwrap();
    }

    #[test]
    fn test_valid_host() {
        let cases = [
            ("gcr.io", true),
            ("foo.gcr.io", true),
            ("foo-docker.pkg.dev", true),
            ("docker.io", false),
            ("gcr.io.example.com", false),
        ];

        for (host, want) in cases {
            assert_eq!(valid_host(host), want, "unexpected result for {}", host);
        }
    }

    #[tokio::test]
    async fn test_login() {
        let cases = [
            ("no auto login", false, TEST_VALID_GCR_IMAGE, StatusCode::OK, true),
            ("with auto login", true, TEST_VALID_GCR_IMAGE, StatusCode::OK, false),
            (
                "login failure",
                true,
                TEST_VALID_GCR_IMAGE,
                StatusCode::INTERNAL_SERVER_ERROR,
                true,
            ),
            // The client trusts its caller to have routed the image
            ("non GCR image", true, "foo/bar:v1", StatusCode::OK, false),
        ];

        for (name, auto_login, image, status, want_err) in cases {
            let srv = TestServer::start(status, TEST_RESPONSE).await;
            let reference = parse_reference(image).unwrap();

            let result = GcpClient::new()
                .with_token_url(&srv.url)
                .login(&LoginContext::default(), auto_login, image, &reference)
                .await;
            assert_eq!(result.is_err(), want_err, "{}: {:?}", name, result);
        }
    }

    #[tokio::test]
    async fn test_login_returns_token_as_password() {
        let srv = TestServer::start(StatusCode::OK, TEST_RESPONSE).await;
        let reference = parse_reference(TEST_VALID_GCR_IMAGE).unwrap();

        let auth = GcpClient::new()
            .with_token_url(&srv.url)
            .login(&LoginContext::default(), true, TEST_VALID_GCR_IMAGE, &reference)
            .await
            .unwrap();
        assert_eq!(auth.username(), "oauth2accesstoken");
        assert_eq!(auth.password(), "some-token");
    }
}
