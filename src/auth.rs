//! Token acquisition
//!
//! The provider's intended flow is an interactive Authorization Code Grant:
//! a browser visits the authorization endpoint, the user signs in, and the
//! redirect carries a one-time code. This runs headless on a schedule, so the
//! login form is POSTed directly instead of rendered. The sequence has to be
//! reproduced exactly:
//!
//! 1. GET the authorization endpoint; the redirect target is the login form
//! 2. POST the sign-in fields straight to that form
//! 3. Read the `code` query parameter off the final redirected URL
//! 4. Exchange the code at the token endpoint under HTTP Basic auth
//!
//! Any non-200 response fails the whole acquisition. There is no retry at
//! this layer; a failure here aborts the run.

use crate::config::ProviderConfig;
use crate::credentials::Credentials;
use crate::models::TokenResponse;
use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

/// Acquire a bearer token for the reports API without user interaction.
pub async fn acquire_access_token(
    http: &Client,
    provider: &ProviderConfig,
    credentials: &Credentials,
) -> Result<String> {
    let auth_response = http
        .get(&provider.authorization_url)
        .query(&[
            ("response_type", "code"),
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("scope", provider.scopes.as_str()),
            ("state", provider.state.as_str()),
        ])
        .send()
        .await
        .context("authorization endpoint request failed")?;
    if auth_response.status() != StatusCode::OK {
        bail!(
            "authorization endpoint request failed, HTTP response was: {}",
            auth_response.status()
        );
    }
    let login_url = auth_response.url().clone();
    debug!(login_url = %login_url, "resolved login form");

    let login_response = http
        .post(login_url)
        .form(&[
            ("emailAddress", credentials.auth_user.as_str()),
            ("password", credentials.auth_pass.as_str()),
            ("submit", "Sign+in"),
            ("rememberMe", "on"),
        ])
        .send()
        .await
        .context("login form submission failed")?;
    if login_response.status() != StatusCode::OK {
        bail!(
            "login form submission failed, HTTP response was: {}",
            login_response.status()
        );
    }

    let redirected = login_response.url().clone();
    let code = authorization_code(&redirected).with_context(|| {
        format!("login redirect to {redirected} carried no authorization code")
    })?;

    let token_response = http
        .post(&provider.token_url)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("code", code.as_str()),
        ])
        .send()
        .await
        .context("token endpoint request failed")?;
    if token_response.status() != StatusCode::OK {
        bail!(
            "token endpoint request failed, HTTP response was: {}",
            token_response.status()
        );
    }

    let token: TokenResponse = token_response
        .json()
        .await
        .context("token endpoint response was not valid JSON")?;

    Ok(token.access_token)
}

/// Extract the authorization `code` query parameter from a redirect URL
fn authorization_code(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_extracted_from_redirect() {
        let url = Url::parse("https://iss-na.com/?code=abc123&state=NOTAPPLICABLE").unwrap();
        assert_eq!(authorization_code(&url).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_redirect_without_code_yields_none() {
        let url = Url::parse("https://iss-na.com/?error=access_denied").unwrap();
        assert!(authorization_code(&url).is_none());
    }

    #[test]
    fn test_code_position_does_not_matter() {
        let url = Url::parse("https://iss-na.com/?state=x&code=zzz").unwrap();
        assert_eq!(authorization_code(&url).as_deref(), Some("zzz"));
    }
}
