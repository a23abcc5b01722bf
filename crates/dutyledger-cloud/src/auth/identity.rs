//! Userinfo lookup
//!
//! The implicit-grant fragment carries a token but no profile, so after an
//! interactive sign-in the manager reads the user's email and name from the
//! provider's userinfo endpoint.

use dutyledger_core::{
    domain::{AccessToken, Identity},
    ports::AuthError,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Response from the OpenID Connect userinfo endpoint
#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserInfoClient {
    client: Client,
    url: String,
}

impl UserInfoClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Fetches the signed-in user's identity
    pub async fn fetch(&self, token: &AccessToken) -> Result<Identity, AuthError> {
        debug!("Fetching identity from userinfo endpoint");

        let info: UserInfoResponse = self
            .client
            .get(&self.url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| AuthError::Identity(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Identity(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Identity(e.to_string()))?;

        let email = info.email.unwrap_or_default();
        let display_name = info
            .name
            .or(info.given_name)
            .unwrap_or_else(|| email.clone());

        Ok(Identity::new(email, display_name))
    }
}
