//! Keycloak admin REST client.
//!
//! Implements [`UserAdapter`] over the admin API
//! (`/admin/realms/{realm}/users...`) and the realm token endpoint
//! (`/realms/{realm}/protocol/openid-connect/token`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use serde::Serialize;
use url::Url;

use crate::adapter::UserAdapter;
use crate::error::{IdentityError, IdentityResult};
use crate::model::{CredentialRepresentation, GetUsersParams, Jwt, User};

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct PasswordReset<'a> {
    #[serde(rename = "type")]
    credential_type: &'static str,
    value: &'a str,
    temporary: bool,
}

/// HTTP client for a Keycloak server.
#[derive(Debug, Clone)]
pub struct KeycloakClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl KeycloakClient {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` cannot carry path segments or the HTTP
    /// client cannot be built.
    pub fn new(base_url: Url, request_timeout: Duration) -> IdentityResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(IdentityError::InvalidBaseUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> IdentityResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn users_url(&self, realm: &str, rest: &[&str]) -> IdentityResult<Url> {
        let mut segments = vec!["admin", "realms", realm, "users"];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    fn token_url(&self, realm: &str) -> IdentityResult<Url> {
        self.url(&["realms", realm, "protocol", "openid-connect", "token"])
    }

    async fn request_token(&self, realm: &str, form: &[(&str, &str)]) -> IdentityResult<Jwt> {
        let url = self.token_url(realm)?;
        tracing::debug!(realm, "Requesting token from {}", url);

        let response = self.http_client.post(url).form(form).send().await?;
        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(format!("Failed to parse token response: {e}")))
    }
}

/// Turns a non-success response into [`IdentityError::Http`].
async fn ensure_success(response: reqwest::Response) -> IdentityResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "Identity provider returned an error");
    Err(IdentityError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Last path segment of the `Location` header of a creation response.
fn created_id(response: &reqwest::Response) -> IdentityResult<String> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| IdentityError::InvalidResponse("Missing Location header".to_string()))?;

    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IdentityError::InvalidResponse(format!("Invalid Location header: {location}")))
}

#[async_trait]
impl UserAdapter for KeycloakClient {
    async fn create_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<String> {
        let url = self.users_url(realm, &[])?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(user)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let id = created_id(&response)?;

        tracing::info!(realm, user_id = %id, "User created");
        Ok(id)
    }

    async fn get_users(
        &self,
        token: &str,
        realm: &str,
        params: &GetUsersParams,
    ) -> IdentityResult<Vec<User>> {
        let url = self.users_url(realm, &[])?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn get_user_by_id(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<User> {
        let url = self.users_url(realm, &[user_id])?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn login_client(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        scopes: &[String],
    ) -> IdentityResult<Jwt> {
        let scope = scopes.join(" ");
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        self.request_token(realm, &form).await
    }

    async fn set_password(
        &self,
        token: &str,
        user_id: &str,
        realm: &str,
        password: &str,
        temporary: bool,
    ) -> IdentityResult<()> {
        let url = self.users_url(realm, &[user_id, "reset-password"])?;
        let body = PasswordReset {
            credential_type: "password",
            value: password,
            temporary,
        };
        let response = self
            .http_client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn get_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<Vec<CredentialRepresentation>> {
        let url = self.users_url(realm, &[user_id, "credentials"])?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn delete_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        credential_id: &str,
    ) -> IdentityResult<()> {
        let url = self.users_url(realm, &[user_id, "credentials", credential_id])?;
        let response = self
            .http_client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn logout_all_sessions(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<()> {
        let url = self.users_url(realm, &[user_id, "logout"])?;
        let response = self.http_client.post(url).bearer_auth(token).send().await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn login(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> IdentityResult<Jwt> {
        let mut form = vec![
            ("grant_type", "password"),
            ("client_id", client_id),
            ("username", username),
            ("password", password),
        ];
        if !client_secret.is_empty() {
            form.push(("client_secret", client_secret));
        }

        self.request_token(realm, &form).await
    }

    async fn update_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<()> {
        let user_id = user.id.as_deref().ok_or(IdentityError::MissingUserId)?;
        let url = self.users_url(realm, &[user_id])?;
        let response = self
            .http_client
            .put(url)
            .bearer_auth(token)
            .json(user)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn verify_token(&self, token: &str, realm: &str) -> IdentityResult<()> {
        let url = self.users_url(realm, &["count"])?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        ensure_success(response).await?;
        Ok(())
    }
}
