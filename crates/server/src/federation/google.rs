use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, header};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use super::http::{HttpClient, build_client, read_body};
use super::{IdentityProvider, ProviderProfile};
use crate::error::FederationError;
use crate::users::GOOGLE_PROVIDER;

/// OAuth2 client settings for Google, built once at start-up and injected.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    /// Bound on each round-trip to Google.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Subset of the `oauth2/v2/userinfo` document we rely on.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: String,
}

#[derive(Clone)]
pub struct GoogleProvider {
    config: GoogleConfig,
    auth_url: Url,
    client: HttpClient,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("client_id", &self.config.client_id)
            .field("redirect_url", &self.config.redirect_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GoogleSetupError {
    #[error("Invalid authorization URL: {0}")]
    AuthUrl(#[from] url::ParseError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self, GoogleSetupError> {
        let auth_url = Url::parse(&config.auth_url)?;
        Ok(Self {
            config,
            auth_url,
            client: build_client()?,
        })
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, FederationError>
    where
        F: Future<Output = Result<T, hyper_util::client::legacy::Error>>,
    {
        match timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FederationError::Network(e.to_string())),
            Err(_) => Err(FederationError::Network(format!(
                "timeout after {:?}",
                self.config.timeout
            ))),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<String, FederationError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("client_id", &self.config.client_id)
            .append_pair("client_secret", &self.config.client_secret)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .finish();

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.config.token_url.as_str())
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::from(form)))
            .map_err(|e| FederationError::Network(e.to_string()))?;

        let resp = self.bounded(self.client.request(req)).await?;
        let status = resp.status();
        let body = read_body(resp.into_body())
            .await
            .map_err(FederationError::Network)?;
        if !status.is_success() {
            tracing::warn!(%status, "token endpoint rejected authorization code");
            return Err(FederationError::ExchangeFailed { status });
        }

        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| FederationError::ExchangeDecodeFailed(e.to_string()))?;
        Ok(token.access_token)
    }

    #[tracing::instrument(skip_all)]
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, FederationError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.config.userinfo_url.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|e| FederationError::Network(e.to_string()))?;

        let resp = self.bounded(self.client.request(req)).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FederationError::ProfileFetchFailed { status });
        }
        let body = read_body(resp.into_body())
            .await
            .map_err(FederationError::Network)?;

        let info: GoogleUserInfo = serde_json::from_slice(&body)
            .map_err(|e| FederationError::ProfileDecodeFailed(e.to_string()))?;
        Ok(ProviderProfile {
            provider_id: info.id,
            email: info.email,
            name: info.name,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        GOOGLE_PROVIDER
    }

    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        url.into()
    }

    #[tracing::instrument(skip_all, fields(provider = GOOGLE_PROVIDER))]
    async fn exchange_and_fetch_profile(
        &self,
        code: &str,
    ) -> Result<ProviderProfile, FederationError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_profile(&access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            redirect_url: "http://localhost:8080/api/auth/login/google/callback".into(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn authorization_url_carries_client_and_state() {
        let provider = GoogleProvider::new(config()).unwrap();
        let url = Url::parse(&provider.authorization_url("n0nce")).unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "openid profile email");
        assert_eq!(pairs["state"], "n0nce");
        assert_eq!(
            pairs["redirect_uri"],
            "http://localhost:8080/api/auth/login/google/callback"
        );
    }

    #[test]
    fn invalid_auth_url_is_rejected() {
        let mut cfg = config();
        cfg.auth_url = "not a url".into();
        assert!(matches!(
            GoogleProvider::new(cfg),
            Err(GoogleSetupError::AuthUrl(_))
        ));
    }
}
