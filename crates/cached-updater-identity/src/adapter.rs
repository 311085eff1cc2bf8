//! The upstream user source contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IdentityResult;
use crate::model::{CredentialRepresentation, GetUsersParams, Jwt, User};

/// Operations offered by the identity provider.
///
/// `token` is an admin access token for the given `realm`. Implementations
/// must be safe to call concurrently.
#[async_trait]
pub trait UserAdapter: Send + Sync {
    /// Creates a user and returns its id.
    async fn create_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<String>;

    /// Searches users.
    async fn get_users(
        &self,
        token: &str,
        realm: &str,
        params: &GetUsersParams,
    ) -> IdentityResult<Vec<User>>;

    /// Fetches a single user by id.
    async fn get_user_by_id(&self, token: &str, realm: &str, user_id: &str)
    -> IdentityResult<User>;

    /// Client credentials grant.
    async fn login_client(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        scopes: &[String],
    ) -> IdentityResult<Jwt>;

    /// Replaces the password of a user.
    async fn set_password(
        &self,
        token: &str,
        user_id: &str,
        realm: &str,
        password: &str,
        temporary: bool,
    ) -> IdentityResult<()>;

    async fn get_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<Vec<CredentialRepresentation>>;

    async fn delete_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        credential_id: &str,
    ) -> IdentityResult<()>;

    /// Ends every session of a user.
    async fn logout_all_sessions(&self, token: &str, realm: &str, user_id: &str)
    -> IdentityResult<()>;

    /// Resource owner password grant.
    async fn login(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> IdentityResult<Jwt>;

    /// Replaces a user record. The record must carry its id.
    async fn update_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<()>;

    /// Checks that `token` may read the users of `realm`.
    async fn verify_token(&self, token: &str, realm: &str) -> IdentityResult<()>;
}

#[async_trait]
impl<A: UserAdapter + ?Sized> UserAdapter for Arc<A> {
    async fn create_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<String> {
        (**self).create_user(token, realm, user).await
    }

    async fn get_users(
        &self,
        token: &str,
        realm: &str,
        params: &GetUsersParams,
    ) -> IdentityResult<Vec<User>> {
        (**self).get_users(token, realm, params).await
    }

    async fn get_user_by_id(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<User> {
        (**self).get_user_by_id(token, realm, user_id).await
    }

    async fn login_client(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        scopes: &[String],
    ) -> IdentityResult<Jwt> {
        (**self)
            .login_client(client_id, client_secret, realm, scopes)
            .await
    }

    async fn set_password(
        &self,
        token: &str,
        user_id: &str,
        realm: &str,
        password: &str,
        temporary: bool,
    ) -> IdentityResult<()> {
        (**self)
            .set_password(token, user_id, realm, password, temporary)
            .await
    }

    async fn get_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<Vec<CredentialRepresentation>> {
        (**self).get_credentials(token, realm, user_id).await
    }

    async fn delete_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        credential_id: &str,
    ) -> IdentityResult<()> {
        (**self)
            .delete_credentials(token, realm, user_id, credential_id)
            .await
    }

    async fn logout_all_sessions(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<()> {
        (**self).logout_all_sessions(token, realm, user_id).await
    }

    async fn login(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> IdentityResult<Jwt> {
        (**self)
            .login(client_id, client_secret, realm, username, password)
            .await
    }

    async fn update_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<()> {
        (**self).update_user(token, realm, user).await
    }

    async fn verify_token(&self, token: &str, realm: &str) -> IdentityResult<()> {
        (**self).verify_token(token, realm).await
    }
}
