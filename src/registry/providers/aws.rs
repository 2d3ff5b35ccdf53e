use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::config::{retry::RetryConfig, Credentials};
use aws_sdk_ecr::Client as EcrClient;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, Instrument};

use crate::registry::{
    AuthConfig, Authenticator, Exchanger, LoginContext, LoginError, Provider, Reference,
};

lazy_static! {
    /// `{account-id}.dkr.ecr.{region}.amazonaws.com[.partition]/{repository}`
    static ref REGISTRY_PART_RE: Regex = Regex::new(
        r"^([0-9]{12})\.dkr\.ecr\.([^/.]+)\.amazonaws\.com(?:\.[a-z]+)?/([^:@]+)"
    )
    .expect("ECR registry pattern is valid");
}

/// Extract the account ID and region from an ECR image
///
/// Returns `None` when the image is not hosted on ECR, including a bare
/// registry host with no repository after it.
pub fn parse_image(image: &str) -> Option<(String, String)> {
    let caps = REGISTRY_PART_RE.captures(image)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// AWS ECR client exchanging AWS credentials for a registry authorization token
///
/// Without explicit credentials the default AWS credential chain is used
/// (environment, IRSA, instance profile, ...).
#[derive(Debug, Clone, Default)]
pub struct AwsClient {
    endpoint_url: Option<String>,
    credentials: Option<Credentials>,
}

impl AwsClient {
    /// Create a new ECR client with the default credential chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Send ECR API calls to `url` instead of the regional endpoint
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Use static credentials instead of the default credential chain
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(
            access_key_id,
            secret_access_key,
            session_token,
            None,
            "static",
        ));
        self
    }

    async fn ecr_client(&self, region: &str) -> EcrClient {
        let region = Region::new(region.to_string());

        let builder = match &self.credentials {
            Some(creds) => aws_sdk_ecr::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(creds.clone()),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load()
                    .await;
                aws_sdk_ecr::config::Builder::from(&shared)
            }
        };

        let mut builder = builder.region(region).retry_config(RetryConfig::disabled());
        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        EcrClient::from_conf(builder.build())
    }

    /// Fetch an authorization token for the account's registry and decode it
    pub(crate) async fn get_login_auth(
        &self,
        ctx: &LoginContext,
        account_id: &str,
        region: &str,
    ) -> Result<AuthConfig, LoginError> {
        let client = self.ecr_client(region).await;

        let response = ctx
            .run(async {
                client
                    .get_authorization_token()
                    .registry_ids(account_id)
                    .send()
                    .await
                    .map_err(LoginError::from)
            })
            .await?;

        let auth_data = response.authorization_data().first().ok_or_else(|| {
            LoginError::InvalidResponse("no authorization data returned from ECR".to_string())
        })?;

        let token = auth_data.authorization_token().ok_or_else(|| {
            LoginError::InvalidResponse("no authorization token in ECR response".to_string())
        })?;

        decode_authorization_token(token)
    }

    /// Log into the ECR registry hosting `image`
    pub async fn login_image(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
    ) -> Result<Authenticator, LoginError> {
        async {
            if !auto_login {
                info!("ECR authentication is not enabled. To enable, set the controller flag --aws-autologin-for-ecr");
                return Err(LoginError::unconfigured(
                    Provider::Aws,
                    "ECR auto-login is disabled",
                ));
            }

            let (account_id, region) = parse_image(image).ok_or_else(|| {
                LoginError::InvalidImage(format!("failed to parse AWS ECR image {}", image))
            })?;

            info!("logging in to AWS ECR for {}", image);
            debug!(account_id = %account_id, region = %region, "requesting ECR authorization token");

            match self.get_login_auth(ctx, &account_id, &region).await {
                Ok(config) => Ok(Authenticator::from_config(config)),
                Err(e) => {
                    info!("error logging into ECR {}", e);
                    Err(e)
                }
            }
        }
        .instrument(ctx.span().clone())
        .await
    }
}

/// Decode an ECR authorization token (base64 of `username:password`)
fn decode_authorization_token(token: &str) -> Result<AuthConfig, LoginError> {
    let decoded = BASE64
        .decode(token)
        .map_err(|e| LoginError::InvalidToken(format!("failed to decode ECR token: {}", e)))?;

    let decoded = String::from_utf8(decoded)
        .map_err(|_| LoginError::InvalidToken("ECR token is not valid UTF-8".to_string()))?;

    let (username, password) = decoded.split_once(':').ok_or_else(|| {
        LoginError::InvalidToken("ECR token is not of the form username:password".to_string())
    })?;

    Ok(AuthConfig::new(username, password))
}

#[async_trait]
impl Exchanger for AwsClient {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn login(
        &self,
        ctx: &LoginContext,
        auto_login: bool,
        image: &str,
        _reference: &Reference,
    ) -> Result<Authenticator, LoginError> {
        self.login_image(ctx, auto_login, image).await
    }
}
