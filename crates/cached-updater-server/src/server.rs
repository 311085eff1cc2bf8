use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cached_updater_core::{CancellationToken, Producer, RefreshingCache};
use cached_updater_identity::{CachedUserAdapter, GetUsersParams, KeycloakClient, User, UserAdapter};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::AppConfig;
use crate::error::ServerError;
use crate::metrics::{PrometheusEventCounter, render_metrics};
use crate::producer::HttpReportProducer;

pub type ReportProducer = Arc<dyn Producer<Output = Value>>;
pub type ReportCache = RefreshingCache<ReportProducer>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub report: Arc<ReportCache>,
    pub users: Arc<dyn UserAdapter>,
    pub realm: Arc<str>,
}

impl AppState {
    pub fn new(report: Arc<ReportCache>, users: Arc<dyn UserAdapter>, realm: &str) -> Self {
        Self {
            report,
            users,
            realm: Arc::from(realm),
        }
    }

    /// Wires the HTTP report producer and the cached Keycloak client.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServerError> {
        let report_url = Url::parse(&cfg.upstream.report_url)
            .map_err(|e| ServerError::Config(format!("upstream.report_url: {e}")))?;
        let producer = HttpReportProducer::new(report_url, cfg.upstream_timeout())
            .map_err(|e| ServerError::Config(format!("report client: {e}")))?;
        let report = RefreshingCache::new(
            cfg.refresh_interval(),
            Arc::new(producer) as ReportProducer,
            PrometheusEventCounter::response(),
        );

        let keycloak_url = Url::parse(&cfg.keycloak.base_url)
            .map_err(|e| ServerError::Config(format!("keycloak.base_url: {e}")))?;
        let keycloak = KeycloakClient::new(keycloak_url, cfg.keycloak_timeout())?;
        let users = CachedUserAdapter::new(
            keycloak,
            cfg.user_cache_ttl(),
            PrometheusEventCounter::keycloak(),
        )
        .with_grant_ttl(cfg.token_grant_ttl());

        Ok(Self::new(
            Arc::new(report),
            Arc::new(users),
            &cfg.keycloak.realm,
        ))
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
        .route("/report", get(report))
        .route("/users", get(find_users))
        .route("/users/{id}", get(get_user))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http.request",
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Starts the refresh loop and serves `state` on `listener` until `token`
/// is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    token: CancellationToken,
) -> Result<(), ServerError> {
    let refresher = state.report.start(token.child_token());
    let app = build_app(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(token.clone().cancelled_owned())
        .await?;

    token.cancel();
    if let Err(e) = refresher.await {
        tracing::warn!(error = %e, "Refresh loop ended abnormally");
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Runs the server for `cfg` until Ctrl-C.
pub async fn run(cfg: AppConfig) -> Result<(), ServerError> {
    let state = AppState::from_config(&cfg)?;
    let listener = TcpListener::bind(cfg.addr()).await?;
    let token = CancellationToken::new();

    tokio::spawn(shutdown_signal(token.clone()));
    serve(listener, state, token).await
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "report_cache_active": state.report.is_active(),
    }))
}

async fn prometheus_metrics() -> Response {
    match render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

async fn report(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let value = state.report.get().await.into_result()?;
    Ok(Json(Value::clone(&value)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<User>, ServerError> {
    let token = bearer_token(&headers)?;
    let user = state.users.get_user_by_id(token, &state.realm, &id).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    email: Option<String>,
}

async fn find_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, ServerError> {
    let email = query
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("email query parameter is required".into()))?;
    let token = bearer_token(&headers)?;

    let users = state
        .users
        .get_users(token, &state.realm, &GetUsersParams::by_email(email))
        .await?;
    Ok(Json(users))
}

/// Token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ServerError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| ServerError::Unauthorized("malformed Authorization header".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ServerError::Unauthorized(
            "expected a bearer token".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header::AUTHORIZATION};
    use cached_updater_core::{FnProducer, NoopCounter, ProducerError, Snapshot};
    use cached_updater_identity::{
        CredentialRepresentation, IdentityError, IdentityResult, Jwt,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Serves a single known user and records the last token it saw.
    #[derive(Default)]
    struct OneUser {
        lookups: AtomicUsize,
        last_token: Mutex<Option<String>>,
    }

    impl OneUser {
        fn remember_token(&self, token: &str) {
            *self.last_token.lock().unwrap() = Some(token.to_string());
        }

        fn last_token(&self) -> Option<String> {
            self.last_token.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl UserAdapter for OneUser {
        async fn create_user(&self, _: &str, _: &str, _: &User) -> IdentityResult<String> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn get_users(
            &self,
            token: &str,
            _: &str,
            params: &GetUsersParams,
        ) -> IdentityResult<Vec<User>> {
            self.remember_token(token);
            match params.email.as_deref() {
                Some("jdoe@example.com") => Ok(vec![User::with_identity("u1", "jdoe@example.com")]),
                _ => Ok(Vec::new()),
            }
        }

        async fn get_user_by_id(&self, token: &str, realm: &str, id: &str) -> IdentityResult<User> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.remember_token(token);
            assert_eq!(realm, "shop");
            if id == "u1" {
                Ok(User::with_identity("u1", "jdoe@example.com"))
            } else {
                Err(IdentityError::Http {
                    status: 404,
                    body: String::new(),
                })
            }
        }

        async fn login_client(&self, _: &str, _: &str, _: &str, _: &[String]) -> IdentityResult<Jwt> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn set_password(&self, _: &str, _: &str, _: &str, _: &str, _: bool) -> IdentityResult<()> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn get_credentials(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> IdentityResult<Vec<CredentialRepresentation>> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn delete_credentials(&self, _: &str, _: &str, _: &str, _: &str) -> IdentityResult<()> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn logout_all_sessions(&self, _: &str, _: &str, _: &str) -> IdentityResult<()> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn login(&self, _: &str, _: &str, _: &str, _: &str, _: &str) -> IdentityResult<Jwt> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn update_user(&self, _: &str, _: &str, _: &User) -> IdentityResult<()> {
            Err(IdentityError::upstream("unsupported"))
        }

        async fn verify_token(&self, token: &str, _: &str) -> IdentityResult<()> {
            if token == "admin-token" {
                Ok(())
            } else {
                Err(IdentityError::Http {
                    status: 401,
                    body: String::new(),
                })
            }
        }
    }

    fn report_cache(snapshot: Snapshot<Value>) -> Arc<ReportCache> {
        let producer = FnProducer::new(move || {
            let snapshot = snapshot.clone();
            async move { snapshot }
        });
        Arc::new(RefreshingCache::new(
            Duration::from_secs(60),
            Arc::new(producer) as ReportProducer,
            NoopCounter::shared(),
        ))
    }

    fn app_with(report: Arc<ReportCache>, users: Arc<OneUser>) -> Router {
        build_app(AppState::new(report, users, "shop"))
    }

    async fn call(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_healthz_reports_cache_state() {
        let report = report_cache(Snapshot::ok(json!({ "total": 1 })));
        let app = app_with(report.clone(), Arc::default());

        let (status, body) = call(app.clone(), "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["report_cache_active"], false);

        report.refresh().await;
        let (_, body) = call(app, "/healthz", None).await;
        assert_eq!(body["report_cache_active"], true);
    }

    #[tokio::test]
    async fn test_report_served_from_producer_when_inactive() {
        let app = app_with(report_cache(Snapshot::ok(json!({ "total": 3 }))), Arc::default());

        let (status, body) = call(app, "/report", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "total": 3 }));
    }

    #[tokio::test]
    async fn test_report_failure_maps_to_bad_gateway() {
        let app = app_with(
            report_cache(Snapshot::failed(ProducerError::upstream("down"))),
            Arc::default(),
        );

        let (status, body) = call(app, "/report", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "report-unavailable");
    }

    #[tokio::test]
    async fn test_empty_report_is_unavailable() {
        let app = app_with(report_cache(Snapshot::empty()), Arc::default());

        let (status, _) = call(app, "/report", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_get_user_passes_bearer_token() {
        let users = Arc::new(OneUser::default());
        let app = app_with(report_cache(Snapshot::empty()), users.clone());

        let (status, body) = call(app, "/users/u1", Some("admin-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "u1");
        assert_eq!(body["email"], "jdoe@example.com");
        assert_eq!(users.last_token().as_deref(), Some("admin-token"));
    }

    #[tokio::test]
    async fn test_get_user_requires_token() {
        let users = Arc::new(OneUser::default());
        let app = app_with(report_cache(Snapshot::empty()), users.clone());

        let (status, body) = call(app, "/users/u1", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(users.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let app = app_with(report_cache(Snapshot::empty()), Arc::default());

        let (status, _) = call(app, "/users/ghost", Some("admin-token")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_find_users_by_email() {
        let app = app_with(report_cache(Snapshot::empty()), Arc::default());

        let (status, body) = call(
            app.clone(),
            "/users?email=jdoe%40example.com",
            Some("admin-token"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) = call(app, "/users?email=nobody%40example.com", Some("admin-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_find_users_requires_email() {
        let app = app_with(report_cache(Snapshot::empty()), Arc::default());

        let (status, body) = call(app, "/users", Some("admin-token")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad-request");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc");

        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_err());
    }
}
