use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use ras_identity_zalo::{
    AuthOutcome, AuthRequest, AuthenticateOptions, Credentials, InMemoryPkceStore, VerifyCallback,
    VerifyDecision, ZaloStrategy, ZaloStrategyConfig,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// How the demo binds PKCE verifiers to a login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceSetting {
    /// Random verifier per attempt, kept in an in-memory store
    Store,
    /// Fixed verifier, no store
    Compat,
}

const MAX_STATE_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Parse a login attempt lifetime in seconds, bounded to one day.
fn parse_state_ttl(raw: &str) -> Result<chrono::Duration> {
    let seconds: i64 = raw
        .trim()
        .parse()
        .context("ZALO_STATE_TTL_SECONDS must be a number of seconds")?;
    if !(1..=MAX_STATE_TTL_SECONDS).contains(&seconds) {
        anyhow::bail!("ZALO_STATE_TTL_SECONDS must be between 1 and {MAX_STATE_TTL_SECONDS}");
    }
    chrono::Duration::try_seconds(seconds).context("ZALO_STATE_TTL_SECONDS is out of range")
}

/// Configuration for the Zalo login demo
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub zalo_app_id: String,
    pub zalo_app_secret: String,
    pub callback_url: String,
    pub pkce: PkceSetting,
    pub state_ttl: chrono::Duration,
    pub server_host: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let pkce = match std::env::var("ZALO_PKCE_MODE")
            .unwrap_or_else(|_| "store".to_string())
            .as_str()
        {
            "store" => PkceSetting::Store,
            "compat" => PkceSetting::Compat,
            other => anyhow::bail!("ZALO_PKCE_MODE must be 'store' or 'compat', got '{other}'"),
        };

        let state_ttl = parse_state_ttl(
            &std::env::var("ZALO_STATE_TTL_SECONDS").unwrap_or_else(|_| "600".to_string()),
        )?;

        Ok(Self {
            zalo_app_id: std::env::var("ZALO_APP_ID")
                .context("ZALO_APP_ID environment variable is required")?,
            zalo_app_secret: std::env::var("ZALO_APP_SECRET")
                .context("ZALO_APP_SECRET environment variable is required")?,
            callback_url: std::env::var("ZALO_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:3000/auth/zalo/callback".to_string()),
            pkce,
            state_ttl,
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }
}

/// The user handed back after a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: String,
    pub display_name: String,
    pub picture: Option<String>,
    pub has_refresh_token: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub strategy: Arc<ZaloStrategy<LoginUser>>,
}

/// Build the strategy, and the store backing it when running in store mode.
fn create_strategy(
    config: &AppConfig,
) -> Result<(ZaloStrategy<LoginUser>, Option<Arc<InMemoryPkceStore>>)> {
    let credentials = Credentials::new(
        config.zalo_app_id.clone(),
        config.zalo_app_secret.clone(),
        config.callback_url.clone(),
    );
    let mut strategy_config = ZaloStrategyConfig::new(credentials);

    let store = match config.pkce {
        PkceSetting::Store => {
            let store = Arc::new(InMemoryPkceStore::with_ttl(config.state_ttl));
            strategy_config = strategy_config.with_store(store.clone());
            Some(store)
        }
        PkceSetting::Compat => None,
    };

    let verify = VerifyCallback::new(|access_token: String, refresh_token, profile| async move {
        debug!(
            "Verifying Zalo user {} (token length {})",
            profile.profile.id,
            access_token.len()
        );
        let profile = profile.into_profile();
        Ok(VerifyDecision::accept(LoginUser {
            id: profile.id,
            display_name: profile.display_name,
            picture: profile.picture,
            has_refresh_token: refresh_token.is_some(),
        }))
    });

    let strategy = ZaloStrategy::new(strategy_config, verify)
        .context("Failed to configure Zalo strategy")?;
    Ok((strategy, store))
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/auth/zalo", get(zalo_login_handler))
        .route("/auth/zalo/callback", get(zalo_login_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the login when there is no `code`, completes it otherwise.
async fn zalo_login_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut options = AuthenticateOptions::new();
    if let Some(return_to) = query.get("return_to") {
        options = options.with_state(return_to.clone());
    }

    let request = AuthRequest::new().with_query(query).with_headers(headers);

    match state.strategy.authenticate(&request, &options).await {
        AuthOutcome::Redirect { location } => Redirect::to(&location).into_response(),
        AuthOutcome::Success { user, info } => {
            info!("User {} logged in with Zalo", user.id);
            Json(serde_json::json!({ "user": user, "info": info })).into_response()
        }
        AuthOutcome::Fail(failure) => {
            let message = failure
                .message
                .unwrap_or_else(|| "authentication rejected".to_string());
            warn!("Zalo login failed: {}", message);
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "authentication_failed",
                    "message": message,
                })),
            )
                .into_response()
        }
        AuthOutcome::Error(e) => {
            error!("Zalo login error: {}", e);
            let status = if e.is_transport() || e.is_provider() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(serde_json::json!({ "error": "authentication_error" })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "zalo-login",
        "timestamp": chrono::Utc::now(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ras_identity_zalo=debug".into()),
        )
        .init();

    info!("Starting Zalo login demo server");

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded, server will bind to {}:{}",
        config.server_host, config.server_port
    );

    let (strategy, store) = create_strategy(&config)?;
    info!("Zalo strategy ready in {:?} PKCE mode", strategy.pkce_mode());

    if let Some(store) = store {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let removed = store.cleanup_expired().await;
                if removed > 0 {
                    debug!("Removed {} expired login attempts", removed);
                }
            }
        });
    }

    let app = app(AppState {
        strategy: Arc::new(strategy),
    });

    let bind_address = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {bind_address}"))?;

    info!("Server running on http://{}", bind_address);
    info!("  GET /auth/zalo           - Start Zalo login");
    info!("  GET /auth/zalo/callback  - Zalo redirect target");
    info!("  GET /health              - Health check");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use ras_identity_zalo::DEFAULT_AUTHORIZATION_URL;
    use tower::ServiceExt;

    fn test_config(pkce: PkceSetting) -> AppConfig {
        AppConfig {
            zalo_app_id: "demo-app".to_string(),
            zalo_app_secret: "demo-secret".to_string(),
            callback_url: "http://localhost:3000/auth/zalo/callback".to_string(),
            pkce,
            state_ttl: chrono::Duration::minutes(10),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
        }
    }

    fn test_app(pkce: PkceSetting) -> Router {
        let (strategy, _) = create_strategy(&test_config(pkce)).unwrap();
        app(AppState {
            strategy: Arc::new(strategy),
        })
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_state_ttl_bounds() {
        assert_eq!(parse_state_ttl("600").unwrap(), chrono::Duration::minutes(10));
        assert_eq!(parse_state_ttl("86400").unwrap(), chrono::Duration::days(1));

        for raw in ["0", "-5", "86401", "9223372036854775807", "ten", ""] {
            assert!(parse_state_ttl(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let response = get(test_app(PkceSetting::Store), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_redirects_to_zalo() {
        for pkce in [PkceSetting::Store, PkceSetting::Compat] {
            let response = get(test_app(pkce), "/auth/zalo?return_to=%2Fhome").await;
            assert!(response.status().is_redirection());

            let location = response.headers()[header::LOCATION].to_str().unwrap();
            assert!(location.starts_with(DEFAULT_AUTHORIZATION_URL));
            assert!(location.contains("app_id=demo-app"));
        }
    }

    #[tokio::test]
    async fn test_denied_callback_is_unauthorized() {
        let response = get(
            test_app(PkceSetting::Store),
            "/auth/zalo/callback?error=access_denied",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_state_is_unauthorized() {
        let response = get(
            test_app(PkceSetting::Store),
            "/auth/zalo/callback?code=abc&state=forged",
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
