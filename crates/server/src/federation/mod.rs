//! Identity federation: authorization-code exchange against an external
//! OAuth2 provider followed by a profile fetch.
//!
//! - `google`: the Google implementation of [`IdentityProvider`]
//! - `http`: shared outbound HTTPS client

pub mod google;
pub mod http;

pub use google::{GoogleConfig, GoogleProvider};

use async_trait::async_trait;

use crate::error::FederationError;

/// Profile returned by the provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider-assigned, stable account id.
    pub provider_id: String,
    pub email: String,
    pub name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name stored on identities, e.g. `google`.
    fn name(&self) -> &str;

    /// URL the browser is redirected to in order to start the login.
    fn authorization_url(&self, state: &str) -> String;

    /// Trade an authorization code for a provider token and use it to load the
    /// account profile.
    async fn exchange_and_fetch_profile(
        &self,
        code: &str,
    ) -> Result<ProviderProfile, FederationError>;
}
