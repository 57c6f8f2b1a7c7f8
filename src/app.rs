use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::activity::Activity;
use crate::asset::{Asset, AssetStatus};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::login::{self, User, UserDirectory};
use crate::pagination::{self, DEFAULT_PAGE_SIZE, Page, PageParams};
use crate::reference::DropdownOptions;
use crate::repair::AllocateRepaired;
use crate::store::Store;
use crate::summary::Summary;
use crate::workflow::{ApprovalRequest, ApprovalView, Submission};

pub struct AppState {
    pub store: Store,
    pub users: UserDirectory,
    pub config: Config,
}

impl AppState {
    /// Open the user directory and the asset store under `config.data_dir`.
    /// An empty user directory is seeded with the default accounts.
    pub fn open(config: Config) -> AppResult<Self> {
        let users = UserDirectory::open(config.users_path())?;
        users.seed_defaults()?;
        let store = Store::open(config.clone())?;
        Ok(AppState {
            store,
            users,
            config,
        })
    }
}

#[derive(Deserialize)]
struct AssetQuery {
    page: Option<usize>,
    page_size: Option<usize>,
    status: Option<String>,
}

/// Body of approve/reject. The body itself may be omitted.
#[derive(Deserialize)]
struct DecisionForm {
    #[serde(default)]
    notes: String,
}

#[derive(Deserialize)]
struct DepreciationForm {
    /// Defaults to the current calendar year
    year: Option<i32>,
}

#[derive(Serialize)]
struct DepreciationResponse {
    status: String,
    year: i32,
    updated: usize,
}

#[derive(Deserialize)]
struct LocationForm {
    location: String,
    room: String,
}

#[derive(Serialize)]
struct LocationResponse {
    status: String,
    added: bool,
}

/// Build the HTTP router. Everything under `/api` requires a session.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/assets", get(list_assets))
        .route("/assets/:id", get(get_asset))
        .route("/assets/:id/history", get(asset_history))
        .route("/activity/:kind", get(activity_of_kind))
        .route("/requests", post(submit_request))
        .route("/approvals", get(list_approvals))
        .route("/approvals/inbox", get(approvals_inbox))
        .route("/approvals/:id", get(get_approval))
        .route("/approvals/:id/approve", post(approve_request))
        .route("/approvals/:id/reject", post(reject_request))
        .route("/approvals/:id/cancel", post(cancel_request))
        .route("/repair/:id/allocate", post(allocate_repaired))
        .route("/depreciation/update", post(update_depreciation))
        .route("/summary", get(summary))
        .route("/reference", get(reference))
        .route("/reference/locations", post(add_location))
        .route(
            "/users",
            get(login::list_users).post(login::handle_create_user),
        )
        .route("/users/:username/active", post(login::handle_set_active))
        .route(
            "/users/:username/reset_password",
            post(login::handle_reset_password),
        )
        .route(
            "/users/:username/profile",
            post(login::handle_update_user_profile),
        )
        .route("/profile", post(login::handle_update_profile))
        .route("/password", post(login::handle_change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/login", post(login::handle_login))
        .route("/logout", post(login::handle_logout))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::open(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_assets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetQuery>,
) -> AppResult<Json<Page<Asset>>> {
    let assets = match query.status.as_deref() {
        Some(status) => state.store.assets_with_status(status.parse::<AssetStatus>()?),
        None => state.store.assets(),
    };
    let params = PageParams {
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    };
    Ok(Json(pagination::paginate(assets, params)))
}

async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> AppResult<Json<Asset>> {
    Ok(Json(state.store.asset(id)?))
}

async fn asset_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> AppResult<Json<Vec<Activity>>> {
    Ok(Json(state.store.history(id)?))
}

async fn activity_of_kind(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> AppResult<Json<Vec<Activity>>> {
    Ok(Json(state.store.activity_of_kind(&kind)?))
}

async fn submit_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(submission): Json<Submission>,
) -> AppResult<(StatusCode, Json<ApprovalRequest>)> {
    let request = state.store.submit(&user, submission)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<ApprovalView> {
    Json(state.store.approvals_for(&user))
}

async fn approvals_inbox(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<Vec<ApprovalRequest>> {
    Json(state.store.inbox(&user))
}

async fn get_approval(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<u64>,
) -> AppResult<Json<ApprovalRequest>> {
    Ok(Json(state.store.request_for(&user, id)?))
}

async fn approve_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<u64>,
    form: Option<Json<DecisionForm>>,
) -> AppResult<Json<ApprovalRequest>> {
    let notes = form.map(|Json(form)| form.notes).unwrap_or_default();
    Ok(Json(state.store.approve(&user, id, &notes)?))
}

async fn reject_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<u64>,
    form: Option<Json<DecisionForm>>,
) -> AppResult<Json<ApprovalRequest>> {
    let notes = form.map(|Json(form)| form.notes).unwrap_or_default();
    Ok(Json(state.store.reject(&user, id, &notes)?))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<u64>,
) -> AppResult<Json<ApprovalRequest>> {
    Ok(Json(state.store.cancel(&user, id)?))
}

async fn allocate_repaired(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<u64>,
    Json(form): Json<AllocateRepaired>,
) -> AppResult<Json<Asset>> {
    Ok(Json(state.store.allocate_repaired(&user, id, form)?))
}

async fn update_depreciation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    form: Option<Json<DepreciationForm>>,
) -> AppResult<Json<DepreciationResponse>> {
    let year = form
        .and_then(|Json(form)| form.year)
        .unwrap_or_else(|| Utc::now().year());
    let updated = state.store.recalculate_depreciation(&user, year)?;
    Ok(Json(DepreciationResponse {
        status: "ok".to_string(),
        year,
        updated,
    }))
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<Summary> {
    Json(state.store.summary_now())
}

async fn reference(State(state): State<Arc<AppState>>) -> Json<DropdownOptions> {
    Json(state.store.reference().dropdown_options())
}

async fn add_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(form): Json<LocationForm>,
) -> Result<Json<LocationResponse>, AppError> {
    let added = state.store.add_location(&user, &form.location, &form.room)?;
    Ok(Json(LocationResponse {
        status: "ok".to_string(),
        added,
    }))
}
