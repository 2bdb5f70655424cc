use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use portico_api::{
    config::Config,
    middleware::logging,
    routes::{assistant, feedback, health},
    state::AppState,
};
use portico_guard::{LlmClassifier, OutOfContextGuard};
use portico_llm::{ChatClient, Dispatcher, ProviderConfig, ProviderKind};
use portico_persist::PersistClient;
use portico_session::{AuthBackend, HttpAuthBackend, SessionEvent, SessionValidator};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Portico API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Build the AI dispatcher from provider settings
    let provider: ProviderKind = config.llm.provider.parse()?;
    let mut provider_config = ProviderConfig::new(provider);
    if let Some(model) = &config.llm.model {
        provider_config = provider_config.with_model(model.clone());
    }
    if let Some(api_key) = &config.llm_api_key {
        provider_config = provider_config.with_api_key(api_key.clone());
    }
    if let Some(base_url) = &config.llm.base_url {
        provider_config = provider_config.with_base_url(base_url.clone());
    }
    let chat: Arc<dyn ChatClient> = Arc::new(Dispatcher::new(provider_config)?);
    tracing::info!(provider = %provider, "AI dispatcher ready");

    // Connect to MongoDB
    tracing::info!("Connecting to MongoDB");
    let persist = Arc::new(
        PersistClient::builder()
            .mongodb_uri(&config.mongodb_uri)
            .database(&config.mongodb.database)
            .build()
            .await?,
    );
    tracing::info!("MongoDB connected");

    // Wire the out-of-context guard over Mongo-backed stores
    let classifier = Arc::new(LlmClassifier::new(chat.clone()));
    let guard = Arc::new(OutOfContextGuard::new(
        Arc::new(persist.limits().clone()),
        classifier,
        Arc::new(persist.feedback().clone()),
        config.guard.clone().into(),
    ));

    // Session watchdog against the managed auth backend
    let auth_backend = Arc::new(HttpAuthBackend::new(
        &config.auth.base_url,
        config.auth_api_key.clone().unwrap_or_default(),
    )?);
    let (session_events_tx, session_events_rx) = mpsc::channel(16);
    let validator = Arc::new(SessionValidator::new(
        auth_backend.clone(),
        session_events_tx,
    ));
    spawn_session_event_logger(session_events_rx, auth_backend.clone());

    let watchdog = match &config.auth_refresh_token {
        Some(refresh_token) => match auth_backend.refresh(refresh_token).await {
            Ok(lease) => {
                tracing::info!(user_id = %lease.user_id, "service session established");
                validator.mark_signed_in(lease).await;
                Some(validator.spawn())
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial sign-in failed; session watchdog idle");
                None
            }
        },
        None => {
            tracing::info!("AUTH_REFRESH_TOKEN not set; session watchdog idle");
            None
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), persist, guard, chat));

    // Build router
    let app = build_router(state.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(watchdog) = watchdog {
        watchdog.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

/// Map session events onto log lines; terminal expiry also signs the
/// service account out, mirroring the forced re-authentication flow.
fn spawn_session_event_logger(
    mut events: mpsc::Receiver<SessionEvent>,
    backend: Arc<HttpAuthBackend>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Expired => {
                    tracing::error!("service session expired; re-authentication required");
                    if let Err(e) = backend.sign_out().await {
                        tracing::warn!(error = %e, "sign-out after expiry failed");
                    }
                }
                SessionEvent::RefreshFailed { reason } => {
                    tracing::warn!(reason, "session refresh failed; lease may lapse soon");
                }
                SessionEvent::Refreshed => {
                    tracing::debug!("service session refreshed");
                }
            }
        }
    });
}

fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Assistant
        .route("/assistant/query", post(assistant::submit_query))
        // Review surface
        .route("/admin/feedback", get(feedback::list_feedback))
        .route("/admin/feedback/investigate", get(feedback::list_investigations));

    Router::new()
        .merge(api_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(60)))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
