pub mod archive;
pub mod config;
pub mod dashboard;
pub mod fetcher;
pub mod github;
pub mod record;
pub mod store;
pub mod types;

use archive::{Archive, ArchiveError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use config::AppConfig;
use dashboard::{Dashboard, DashboardEntry, RepoItem};
use fetcher::{FetchError, RepoFetcher, RepoSource};
use github::GitHubSource;
use record::RepoRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::RepoListStore;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use types::{RepoIdentifier, ValidationError};

pub const SAVE_SUCCESS_MESSAGE: &str = "Data saved successfully!";
pub const SAVE_FAILURE_MESSAGE: &str = "Failed to save data";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct SubmitRepoRequest {
    pub repo: String,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
    /// Identifiers submitted during this process's lifetime.
    pub store: RepoListStore,
    /// Cached access to upstream repository records.
    pub fetcher: RepoFetcher,
    /// The on-disk record archive.
    pub archive: Archive,
    /// Archive-backed board of displayed records.
    pub dashboard: Dashboard,
}

impl AppState {
    /// Initializes the application state against the configured GitHub API.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let source = GitHubSource::new(&config.github_api_url)?;
        Ok(Self::with_source(config, Arc::new(source)).await)
    }

    /// Initializes the application state with an explicit upstream and hydrates the dashboard.
    pub async fn with_source(config: AppConfig, source: Arc<dyn RepoSource>) -> Self {
        let fetcher = RepoFetcher::new(&config, source);
        let archive = if config.archive_serialize_writes {
            Archive::serialized(&config.archive_path)
        } else {
            Archive::new(&config.archive_path)
        };
        let dashboard = Dashboard::new();
        dashboard.hydrate(&archive).await;

        Self {
            store: RepoListStore::new(),
            fetcher,
            archive,
            dashboard,
            config,
        }
    }
}

/// Failures a handler reports to the client.
pub enum ApiError {
    Validation(ValidationError),
    Fetch(FetchError),
    Save(ArchiveError),
    ArchiveRead(ArchiveError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Fetch(e @ FetchError::InvalidIdentifier(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Fetch(e) if e.is_not_found() => {
                (StatusCode::NOT_FOUND, "Repository Not Found".to_string())
            }
            ApiError::Fetch(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Save(e) => {
                tracing::error!("Failed to save record: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SAVE_FAILURE_MESSAGE.to_string(),
                )
            }
            ApiError::ArchiveRead(e) => {
                tracing::error!("Failed to read archive: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read data".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let serve_dir = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/repos", get(list_repos).post(submit_repo))
        .route("/api/repos/items", get(list_repo_items))
        .route("/api/repos/{owner}/{name}", get(get_repo))
        .route("/api/saveRepo", post(save_repo))
        .route("/api/archive", get(get_archive))
        .route("/api/dashboard", get(get_dashboard))
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "repo-archive",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_repos(State(state): State<Arc<AppState>>) -> Json<Vec<RepoIdentifier>> {
    Json(state.store.repos())
}

/// Validates and stores a submitted identifier, then starts fetching it for the dashboard.
pub async fn submit_repo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRepoRequest>,
) -> Result<(StatusCode, Json<Vec<RepoIdentifier>>), ApiError> {
    let identifier = RepoIdentifier::parse(request.repo).map_err(ApiError::Validation)?;

    state.store.add_repo(identifier.clone());
    let entry_id = state.dashboard.begin(identifier.clone());

    let task_state = state.clone();
    tokio::spawn(async move {
        task_state
            .dashboard
            .resolve(
                entry_id,
                &identifier,
                &task_state.fetcher,
                &task_state.archive,
            )
            .await;
    });

    Ok((StatusCode::CREATED, Json(state.store.repos())))
}

pub async fn list_repo_items(State(state): State<Arc<AppState>>) -> Json<Vec<RepoItem>> {
    Json(
        dashboard::list_items(
            &state.store,
            &state.fetcher,
            &state.archive,
            state.config.fetch_concurrency_limit,
        )
        .await,
    )
}

pub async fn get_repo(
    Path((owner, name)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RepoRecord>, ApiError> {
    let identifier =
        RepoIdentifier::parse(format!("{owner}/{name}")).map_err(ApiError::Validation)?;

    let record = dashboard::fetch_and_archive(&state.fetcher, &state.archive, &identifier)
        .await
        .map_err(ApiError::Fetch)?;

    tracing::debug!(repo = %identifier, "Returning repository");
    Ok(Json(record))
}

/// Appends the posted record to the archive.
pub async fn save_repo(
    State(state): State<Arc<AppState>>,
    Json(record): Json<RepoRecord>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.archive.append(record).await.map_err(ApiError::Save)?;

    Ok(Json(MessageResponse {
        message: SAVE_SUCCESS_MESSAGE,
    }))
}

pub async fn get_archive(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RepoRecord>>, ApiError> {
    let records = state
        .archive
        .load_newest_first()
        .await
        .map_err(ApiError::ArchiveRead)?;
    Ok(Json(records))
}

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<Vec<DashboardEntry>> {
    Json(state.dashboard.entries())
}
