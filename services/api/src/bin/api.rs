//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{JsonFileStore, OpenAiClassifierAdapter},
    config::Config,
    error::ApiError,
    web::{
        rest::{
            complete_course_handler, expiring_handler, list_completions_handler,
            process_document_handler, recent_events_handler, stats_handler,
            user_assignments_handler, user_history_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use training_tracker_core::{
    AuditLog, CompletionTracker, DocumentRegistry, ExpirationScheduler,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Persistent Stores ---
    info!("Opening data stores in {}", config.data_dir.display());
    let store = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let registry = Arc::new(DocumentRegistry::open(store.clone()).await);
    let audit = Arc::new(AuditLog::open(store.clone()).await);
    let completions = Arc::new(CompletionTracker::open(store).await);
    let scheduler = Arc::new(ExpirationScheduler::with_default_catalog());
    info!(
        documents = registry.document_count().await,
        audit_events = audit.len().await,
        "Stores loaded"
    );

    // --- 3. Initialize the Classifier Adapter ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let classifier = Arc::new(OpenAiClassifierAdapter::new(
        openai_client,
        config.classifier_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        registry,
        audit,
        completions,
        scheduler,
        classifier,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/documents", post(process_document_handler))
        .route("/users/{user_id}/assignments", get(user_assignments_handler))
        .route("/users/{user_id}/history", get(user_history_handler))
        .route("/events/recent", get(recent_events_handler))
        .route("/expiring", get(expiring_handler))
        .route(
            "/completions",
            post(complete_course_handler).get(list_completions_handler),
        )
        .route("/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
