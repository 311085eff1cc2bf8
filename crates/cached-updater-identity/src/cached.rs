//! Cache-first decorator over a [`UserAdapter`].
//!
//! Lookups by id, and searches that are nothing but an exact email match,
//! are answered from a [`DualKeyCache`] when a live entry exists. On a miss
//! the upstream is asked and every user it returns is written back under its
//! id and email. The cache is not partitioned by realm.
//!
//! A cached record is only handed to a caller whose token the upstream has
//! accepted for that realm. Acceptance comes from a successful upstream read
//! or from [`UserAdapter::verify_token`], and is remembered in
//! [`TokenGrants`] for a short while.

use std::sync::Arc;

use async_trait::async_trait;
use cached_updater_core::{DualKeyCache, SharedCounter, events};
use time::Duration;
use tracing::{debug, warn};

use crate::adapter::UserAdapter;
use crate::error::IdentityResult;
use crate::grants::{DEFAULT_GRANT_TTL, TokenGrants};
use crate::model::{CredentialRepresentation, GetUsersParams, Jwt, User};

pub struct CachedUserAdapter<A> {
    upstream: A,
    cache: Arc<DualKeyCache<User>>,
    grants: TokenGrants,
    counter: SharedCounter,
}

impl<A: UserAdapter> CachedUserAdapter<A> {
    /// Wraps `upstream` with a fresh cache whose entries live for `ttl`.
    pub fn new(upstream: A, ttl: Duration, counter: SharedCounter) -> Self {
        let cache = Arc::new(DualKeyCache::new(ttl, Arc::clone(&counter)));
        Self::with_cache(upstream, cache, counter)
    }

    /// Wraps `upstream` around an existing cache.
    pub fn with_cache(upstream: A, cache: Arc<DualKeyCache<User>>, counter: SharedCounter) -> Self {
        Self {
            upstream,
            cache,
            grants: TokenGrants::new(DEFAULT_GRANT_TTL),
            counter,
        }
    }

    /// Sets how long an accepted token is trusted before it is checked again.
    pub fn with_grant_ttl(mut self, ttl: Duration) -> Self {
        self.grants = TokenGrants::new(ttl);
        self
    }

    pub fn cache(&self) -> &Arc<DualKeyCache<User>> {
        &self.cache
    }

    pub fn grants(&self) -> &TokenGrants {
        &self.grants
    }

    pub fn upstream(&self) -> &A {
        &self.upstream
    }

    fn remember(&self, identifier: &str, user: &User) {
        let email = user.email.clone().unwrap_or_default();
        self.cache.put(identifier, email, user.clone());
    }

    /// Succeeds when `token` may read the users of `realm`.
    async fn authorize(&self, token: &str, realm: &str) -> IdentityResult<()> {
        if self.grants.is_granted(token, realm) {
            return Ok(());
        }

        match self.upstream.verify_token(token, realm).await {
            Ok(()) => {
                self.counter.increment(events::VERIFY_TOKEN);
                self.grants.grant(token, realm);
                Ok(())
            }
            Err(err) => {
                self.counter.increment(events::ERROR_VERIFY_TOKEN);
                warn!(realm, error = %err, "Token rejected for cached user read");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<A: UserAdapter> UserAdapter for CachedUserAdapter<A> {
    async fn create_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<String> {
        self.upstream.create_user(token, realm, user).await
    }

    async fn get_users(
        &self,
        token: &str,
        realm: &str,
        params: &GetUsersParams,
    ) -> IdentityResult<Vec<User>> {
        if let Some(email) = params.exact_email()
            && let Some(user) = self.cache.get_by_email(email)
        {
            self.authorize(token, realm).await?;
            debug!(realm, "User served from cache by email");
            return Ok(vec![User::clone(&user)]);
        }

        match self.upstream.get_users(token, realm, params).await {
            Ok(users) => {
                self.counter.increment(events::GET_USERS);
                self.grants.grant(token, realm);
                for user in &users {
                    if let Some(id) = user.id.as_deref() {
                        self.remember(id, user);
                    }
                }
                Ok(users)
            }
            Err(err) => {
                self.counter.increment(events::ERROR_GET_USERS);
                warn!(realm, error = %err, "Upstream user search failed");
                Err(err)
            }
        }
    }

    async fn get_user_by_id(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<User> {
        if let Some(user) = self.cache.get_by_identifier(user_id) {
            self.authorize(token, realm).await?;
            debug!(realm, user_id, "User served from cache by id");
            return Ok(User::clone(&user));
        }

        match self.upstream.get_user_by_id(token, realm, user_id).await {
            Ok(user) => {
                self.counter.increment(events::GET_USER_BY_ID);
                self.grants.grant(token, realm);
                self.remember(user_id, &user);
                Ok(user)
            }
            Err(err) => {
                self.counter.increment(events::ERROR_GET_USER_BY_ID);
                warn!(realm, user_id, error = %err, "Upstream user lookup failed");
                Err(err)
            }
        }
    }

    async fn login_client(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        scopes: &[String],
    ) -> IdentityResult<Jwt> {
        self.upstream
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
        self.upstream
            .set_password(token, user_id, realm, password, temporary)
            .await
    }

    async fn get_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<Vec<CredentialRepresentation>> {
        self.upstream.get_credentials(token, realm, user_id).await
    }

    async fn delete_credentials(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
        credential_id: &str,
    ) -> IdentityResult<()> {
        self.upstream
            .delete_credentials(token, realm, user_id, credential_id)
            .await
    }

    async fn logout_all_sessions(
        &self,
        token: &str,
        realm: &str,
        user_id: &str,
    ) -> IdentityResult<()> {
        self.upstream.logout_all_sessions(token, realm, user_id).await
    }

    async fn login(
        &self,
        client_id: &str,
        client_secret: &str,
        realm: &str,
        username: &str,
        password: &str,
    ) -> IdentityResult<Jwt> {
        self.upstream
            .login(client_id, client_secret, realm, username, password)
            .await
    }

    async fn update_user(&self, token: &str, realm: &str, user: &User) -> IdentityResult<()> {
        self.upstream.update_user(token, realm, user).await?;
        if let Some(id) = user.id.as_deref() {
            self.remember(id, user);
        }
        Ok(())
    }

    async fn verify_token(&self, token: &str, realm: &str) -> IdentityResult<()> {
        self.authorize(token, realm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IdentityError;
    use cached_updater_core::RecordingCounter;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ACCEPTED_TOKEN: &str = "t";

    /// In-memory provider that counts upstream calls and accepts one token.
    #[derive(Default)]
    struct StubAdapter {
        users: Mutex<HashMap<String, User>>,
        lookups: AtomicUsize,
        verifications: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl StubAdapter {
        fn with_users(users: impl IntoIterator<Item = User>) -> Self {
            let stub = Self::default();
            {
                let mut map = stub.users.lock().unwrap();
                for user in users {
                    map.insert(user.id.clone().unwrap(), user);
                }
            }
            stub
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        fn verifications(&self) -> usize {
            self.verifications.load(Ordering::SeqCst)
        }

        fn check(&self, token: &str) -> IdentityResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(IdentityError::upstream("provider unavailable"));
            }
            if token != ACCEPTED_TOKEN {
                return Err(IdentityError::Http {
                    status: 401,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserAdapter for StubAdapter {
        async fn create_user(&self, _: &str, _: &str, user: &User) -> IdentityResult<String> {
            let id = format!("generated-{}", self.users.lock().unwrap().len());
            let mut stored = user.clone();
            stored.id = Some(id.clone());
            self.users.lock().unwrap().insert(id.clone(), stored);
            Ok(id)
        }

        async fn get_users(
            &self,
            token: &str,
            _: &str,
            params: &GetUsersParams,
        ) -> IdentityResult<Vec<User>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.check(token)?;
            let matches_email = |u: &User| match (params.email.as_deref(), u.email.as_deref()) {
                (None, _) => true,
                (Some(wanted), Some(email)) if params.exact == Some(true) => email == wanted,
                (Some(wanted), Some(email)) => email.contains(wanted),
                (Some(_), None) => false,
            };
            let users = self.users.lock().unwrap();
            Ok(users
                .values()
                .filter(|u| matches_email(u))
                .filter(|u| params.enabled.is_none() || u.enabled == params.enabled)
                .cloned()
                .collect())
        }

        async fn get_user_by_id(&self, token: &str, _: &str, user_id: &str) -> IdentityResult<User> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.check(token)?;
            self.users
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .ok_or(IdentityError::Http {
                    status: 404,
                    body: String::new(),
                })
        }

        async fn login_client(&self, _: &str, _: &str, _: &str, _: &[String]) -> IdentityResult<Jwt> {
            Ok(Jwt {
                access_token: "client-token".into(),
                ..Jwt::default()
            })
        }

        async fn set_password(&self, _: &str, _: &str, _: &str, _: &str, _: bool) -> IdentityResult<()> {
            Ok(())
        }

        async fn get_credentials(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> IdentityResult<Vec<CredentialRepresentation>> {
            Ok(Vec::new())
        }

        async fn delete_credentials(&self, _: &str, _: &str, _: &str, _: &str) -> IdentityResult<()> {
            Ok(())
        }

        async fn logout_all_sessions(&self, _: &str, _: &str, _: &str) -> IdentityResult<()> {
            Ok(())
        }

        async fn login(&self, _: &str, _: &str, _: &str, _: &str, _: &str) -> IdentityResult<Jwt> {
            Ok(Jwt::default())
        }

        async fn update_user(&self, token: &str, _: &str, user: &User) -> IdentityResult<()> {
            self.check(token)?;
            let id = user.id.clone().ok_or(IdentityError::MissingUserId)?;
            self.users.lock().unwrap().insert(id, user.clone());
            Ok(())
        }

        async fn verify_token(&self, token: &str, _: &str) -> IdentityResult<()> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.check(token)
        }
    }

    fn decorated(
        users: impl IntoIterator<Item = User>,
        ttl: Duration,
    ) -> (CachedUserAdapter<StubAdapter>, Arc<RecordingCounter>) {
        let counter = Arc::new(RecordingCounter::new());
        let adapter = CachedUserAdapter::new(StubAdapter::with_users(users), ttl, counter.clone());
        (adapter, counter)
    }

    #[tokio::test]
    async fn test_get_user_by_id_populates_cache_on_miss() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, counter) = decorated([user.clone()], Duration::minutes(1));

        let first = adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        let second = adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        assert_eq!(first, user);
        assert_eq!(second, user);
        assert_eq!(adapter.upstream().lookups(), 1);
        assert_eq!(counter.count(events::GET_USER_BY_ID), 1);
        assert_eq!(counter.count(events::CACHE_ERROR_GET_USER_BY_ID), 1);
        assert_eq!(counter.count(events::CACHE_GET_USER_BY_ID), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_id_also_serves_lookup_by_email() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, _) = decorated([user.clone()], Duration::minutes(1));

        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        let found = adapter
            .get_users("t", "realm", &GetUsersParams::by_email("u1@example.com"))
            .await
            .unwrap();

        assert_eq!(found, vec![user]);
        assert_eq!(adapter.upstream().lookups(), 1);
    }

    #[tokio::test]
    async fn test_search_results_are_cached_by_both_keys() {
        let users = [
            User::with_identity("u1", "u1@example.com"),
            User::with_identity("u2", "u2@example.com"),
        ];
        let (adapter, counter) = decorated(users.clone(), Duration::minutes(1));

        let all = adapter
            .get_users("t", "realm", &GetUsersParams::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        assert_eq!(adapter.get_user_by_id("t", "realm", "u2").await.unwrap(), users[1]);
        let by_email = adapter
            .get_users("t", "realm", &GetUsersParams::by_email("u1@example.com"))
            .await
            .unwrap();
        assert_eq!(by_email, vec![users[0].clone()]);

        assert_eq!(adapter.upstream().lookups(), 1);
        assert_eq!(counter.count(events::GET_USERS), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_go_upstream() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, _) = decorated([user], Duration::minutes(-1));

        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        assert_eq!(adapter.upstream().lookups(), 2);
    }

    #[tokio::test]
    async fn test_upstream_errors_pass_through_and_are_not_cached() {
        let (adapter, counter) = decorated([], Duration::minutes(1));

        let err = adapter.get_user_by_id("t", "realm", "ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(counter.count(events::ERROR_GET_USER_BY_ID), 1);

        adapter.upstream().fail.store(true, Ordering::SeqCst);
        let err = adapter
            .get_users("t", "realm", &GetUsersParams::by_email("ghost@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Upstream { .. }));
        assert_eq!(counter.count(events::ERROR_GET_USERS), 1);
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_user_without_email_is_cached_under_empty_email() {
        let user = User {
            id: Some("u1".into()),
            ..User::default()
        };
        let (adapter, _) = decorated([user.clone()], Duration::minutes(1));

        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        assert_eq!(adapter.cache().get_by_email("").as_deref(), Some(&user));
    }

    #[tokio::test]
    async fn test_update_user_refreshes_cached_entry() {
        let user = User::with_identity("u1", "old@example.com");
        let (adapter, _) = decorated([user], Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        let updated = User::with_identity("u1", "new@example.com");
        adapter.update_user("t", "realm", &updated).await.unwrap();

        assert_eq!(adapter.get_user_by_id("t", "realm", "u1").await.unwrap(), updated);
        // The old email entry is left to expire on its own.
        assert!(adapter.cache().get_by_email("old@example.com").is_some());
        assert_eq!(adapter.upstream().lookups(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_cached_entry() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, _) = decorated([user.clone()], Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        adapter.upstream().fail.store(true, Ordering::SeqCst);
        let updated = User::with_identity("u1", "other@example.com");
        assert!(adapter.update_user("t", "realm", &updated).await.is_err());

        assert_eq!(adapter.cache().get_by_identifier("u1").as_deref(), Some(&user));
    }

    #[tokio::test]
    async fn test_pass_through_operations() {
        let (adapter, _) = decorated([], Duration::minutes(1));

        let id = adapter
            .create_user("t", "realm", &User::with_identity("", "new@example.com"))
            .await
            .unwrap();
        assert_eq!(id, "generated-0");
        assert!(adapter.cache().is_empty());

        let jwt = adapter
            .login_client("client", "secret", "realm", &[])
            .await
            .unwrap();
        assert_eq!(jwt.access_token, "client-token");
    }

    #[tokio::test]
    async fn test_rejected_token_is_refused_on_cache_hit() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, counter) = decorated([user], Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        let err = adapter.get_user_by_id("bogus", "realm", "u1").await.unwrap_err();
        assert!(matches!(err, IdentityError::Http { status: 401, .. }));

        let err = adapter
            .get_users("bogus", "realm", &GetUsersParams::by_email("u1@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Http { status: 401, .. }));

        assert_eq!(adapter.upstream().lookups(), 1);
        assert_eq!(counter.count(events::ERROR_VERIFY_TOKEN), 2);
        assert!(!adapter.grants().is_granted("bogus", "realm"));
    }

    #[tokio::test]
    async fn test_granted_token_is_not_verified_again() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, counter) = decorated([user], Duration::minutes(1));

        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        adapter
            .get_users("t", "realm", &GetUsersParams::by_email("u1@example.com"))
            .await
            .unwrap();

        assert_eq!(adapter.upstream().verifications(), 0);
        assert_eq!(counter.count(events::VERIFY_TOKEN), 0);
    }

    #[tokio::test]
    async fn test_token_granted_for_one_realm_is_verified_for_another() {
        let user = User::with_identity("u1", "u1@example.com");
        let (adapter, counter) = decorated([user], Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        adapter.get_user_by_id("t", "other", "u1").await.unwrap();
        adapter.get_user_by_id("t", "other", "u1").await.unwrap();

        assert_eq!(adapter.upstream().verifications(), 1);
        assert_eq!(counter.count(events::VERIFY_TOKEN), 1);
        assert_eq!(adapter.upstream().lookups(), 1);
    }

    #[tokio::test]
    async fn test_zero_grant_ttl_verifies_every_cache_hit() {
        let user = User::with_identity("u1", "u1@example.com");
        let counter = Arc::new(RecordingCounter::new());
        let adapter = CachedUserAdapter::new(
            StubAdapter::with_users([user]),
            Duration::minutes(1),
            counter.clone(),
        )
        .with_grant_ttl(Duration::ZERO);

        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        assert_eq!(adapter.upstream().lookups(), 1);
        assert_eq!(adapter.upstream().verifications(), 2);
        assert!(adapter.grants().is_empty());
    }

    #[tokio::test]
    async fn test_filtered_email_search_goes_upstream() {
        let user = User {
            enabled: Some(true),
            ..User::with_identity("u1", "u1@example.com")
        };
        let (adapter, _) = decorated([user], Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        let params = GetUsersParams {
            enabled: Some(false),
            ..GetUsersParams::by_email("u1@example.com")
        };
        let found = adapter.get_users("t", "realm", &params).await.unwrap();

        assert!(found.is_empty());
        assert_eq!(adapter.upstream().lookups(), 2);
    }

    #[tokio::test]
    async fn test_substring_email_search_goes_upstream() {
        let users = [
            User::with_identity("u1", "ann@example.com"),
            User::with_identity("u2", "bob@example.com"),
        ];
        let (adapter, _) = decorated(users, Duration::minutes(1));
        adapter.get_user_by_id("t", "realm", "u1").await.unwrap();

        let params = GetUsersParams {
            email: Some("example.com".into()),
            exact: Some(false),
            ..GetUsersParams::default()
        };
        assert_eq!(adapter.get_users("t", "realm", &params).await.unwrap().len(), 2);

        let unset = GetUsersParams {
            email: Some("ann@example.com".into()),
            ..GetUsersParams::default()
        };
        assert_eq!(adapter.get_users("t", "realm", &unset).await.unwrap().len(), 1);

        assert_eq!(adapter.upstream().lookups(), 3);
    }

    #[tokio::test]
    async fn test_verify_token_uses_grants() {
        let (adapter, counter) = decorated([], Duration::minutes(1));

        adapter.verify_token("t", "realm").await.unwrap();
        adapter.verify_token("t", "realm").await.unwrap();
        assert!(adapter.verify_token("bogus", "realm").await.is_err());

        assert_eq!(adapter.upstream().verifications(), 2);
        assert_eq!(counter.count(events::VERIFY_TOKEN), 1);
        assert_eq!(counter.count(events::ERROR_VERIFY_TOKEN), 1);
    }
}
