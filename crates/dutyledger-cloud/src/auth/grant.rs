//! OAuth 2.0 implicit-grant authorization requests
//!
//! Builds the authorization URL for both the interactive consent view
//! (`prompt=select_account`) and the prompt-less silent renewal
//! (`prompt=none`, optionally with `login_hint`). The CSRF `state` value
//! doubles as the correlation id the callback relay routes on.

use dutyledger_core::ports::AuthError;
use oauth2::{
    basic::BasicClient, url::Url, AuthUrl, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope,
};
use tracing::debug;

/// Consent behaviour requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Always show the account chooser
    SelectAccount,
    /// Never show UI; fail with an error code if interaction is required
    None,
}

impl Prompt {
    fn as_str(&self) -> &'static str {
        match self {
            Prompt::SelectAccount => "select_account",
            Prompt::None => "none",
        }
    }
}

/// A ready-to-open authorization URL and its correlation id
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub url: Url,
    pub state: String,
}

/// Implicit-grant URL builder
pub struct ImplicitGrantFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet>,
    scopes: Vec<String>,
}

impl ImplicitGrantFlow {
    /// # Arguments
    /// * `client_id` - OAuth client id registered with the provider
    /// * `authorize_url` - The provider's authorization endpoint
    /// * `redirect_uri` - The callback relay's `/callback` URL
    /// * `scopes` - Requested scopes
    pub fn new(
        client_id: &str,
        authorize_url: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<Self, AuthError> {
        if client_id.trim().is_empty() {
            return Err(AuthError::NotConfigured);
        }

        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_auth_uri(
                AuthUrl::new(authorize_url.to_string())
                    .map_err(|e| AuthError::Callback(format!("invalid authorize URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.to_string())
                    .map_err(|e| AuthError::Callback(format!("invalid redirect URI: {}", e)))?,
            );

        Ok(Self {
            client,
            scopes: scopes.to_vec(),
        })
    }

    /// Builds an authorization URL with `response_type=token`
    ///
    /// # Arguments
    /// * `prompt` - Interactive chooser or prompt-less renewal
    /// * `login_hint` - Email of the identity to renew, if known
    pub fn authorize(&self, prompt: Prompt, login_hint: Option<&str>) -> AuthorizeRequest {
        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .use_implicit_flow()
            .add_extra_param("prompt", prompt.as_str());

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        if let Some(hint) = login_hint.filter(|h| !h.is_empty()) {
            request = request.add_extra_param("login_hint", hint.to_string());
        }

        let (url, state) = request.url();
        debug!(prompt = prompt.as_str(), "Built authorization URL");
        AuthorizeRequest {
            url,
            state: state.secret().to_string(),
        }
    }
}
