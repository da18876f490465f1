// COSTA School Administration - Operator API
// REST API with Axum over the same RecordStore the CLI and TUI use

use anyhow::Context;
use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::NaiveDate;
use costa_school::{
    logging, AppConfig, AuditEvent, AuthError, AuthenticationPolicy, FixedCredentialPolicy, LedgerAggregator,
    LogTarget, Operator, RecordStore, ReportError, ReportRenderer, SimilarMatch, StoreError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<RecordStore>>,
    policy: Arc<dyn AuthenticationPolicy>,
    /// token -> operator; no expiry, cleared on logout
    sessions: Arc<Mutex<HashMap<String, Operator>>>,
    renderer: Arc<ReportRenderer>,
}

impl AppState {
    fn new(store: RecordStore, policy: Arc<dyn AuthenticationPolicy>, renderer: ReportRenderer) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            policy,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            renderer: Arc::new(renderer),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, RecordStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("record store lock poisoned".to_string()))
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Operator>>, ApiError> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::Internal("session table lock poisoned".to_string()))
    }
}

/// Authenticated request context, inserted by `require_session`
#[derive(Clone)]
struct AuthContext {
    token: String,
    operator: Operator,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::DuplicateKey { .. }) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Invalid(_))
            | ApiError::Store(StoreError::UnknownClass(_))
            | ApiError::Store(StoreError::Overflow(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Report(ReportError::InvalidSummary(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Auth(AuthError::InvalidCredentials)
            | ApiError::Auth(AuthError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    username: String,
}

#[derive(Deserialize)]
struct NewClass {
    name: String,
}

#[derive(Deserialize)]
struct NewStudent {
    name: String,
    age: i64,
    enrollment_date: NaiveDate,
    #[serde(default)]
    class_id: Option<i64>,
    /// Alternative to class_id
    #[serde(default)]
    class_name: Option<String>,
}

#[derive(Deserialize)]
struct NewUniform {
    #[serde(rename = "type")]
    item_type: String,
    size: String,
    stock: i64,
    unit_cost: Decimal,
}

#[derive(Deserialize)]
struct NewExpense {
    date: NaiveDate,
    amount: Decimal,
    category: String,
}

#[derive(Deserialize)]
struct NewIncome {
    date: NaiveDate,
    amount: Decimal,
    source: String,
}

/// Created row id plus advisory near-duplicate names
#[derive(Serialize)]
struct Created {
    id: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    similar: Vec<SimilarMatch>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct AuditQuery {
    limit: Option<usize>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
type CreatedResult = Result<(StatusCode, Json<ApiResponse<Created>>), ApiError>;

fn created(id: i64, similar: Vec<SimilarMatch>) -> CreatedResult {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(Created { id, similar }))))
}

// ============================================================================
// Session handling
// ============================================================================

/// Session-level audit entry (login, logout, report export); failures are logged only.
fn note_event(state: &AppState, action: &str, actor: &str, details: serde_json::Value) -> Result<(), ApiError> {
    let store = state.store()?;
    let event = AuditEvent::new(action, "session", None, details, actor);
    if let Err(e) = store.record_event(&event) {
        warn!(action, error = %e, "failed to write audit event");
    }
    Ok(())
}

/// POST /api/login - Exchange credentials for a bearer token
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let operator = state.policy.authenticate(&payload.username, &payload.password)?;
    let token = Uuid::new_v4().to_string();

    info!(user = %operator.username, policy = state.policy.name(), "operator logged in");
    state.sessions()?.insert(token.clone(), operator.clone());
    note_event(&state, "login", &operator.username, serde_json::json!({ "via": "api" }))?;

    Ok(Json(ApiResponse::ok(LoginResponse {
        token,
        username: operator.username,
    })))
}

/// POST /api/logout - Drop the caller's token
async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<&'static str> {
    state.sessions()?.remove(&ctx.token);
    info!(user = %ctx.operator.username, "operator logged out");
    note_event(&state, "logout", &ctx.operator.username, serde_json::json!({ "via": "api" }))?;
    Ok(Json(ApiResponse::ok("logged out")))
}

/// Middleware: reject requests without a live `Authorization: Bearer <token>`.
async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .ok_or(AuthError::NotAuthenticated)?;

    let operator = state
        .sessions()?
        .get(&token)
        .cloned()
        .ok_or(AuthError::NotAuthenticated)?;

    req.extensions_mut().insert(AuthContext { token, operator });
    Ok(next.run(req).await)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/dashboard - Whole-ledger figures, head counts, recent records
async fn get_dashboard(State(state): State<AppState>) -> ApiResult<costa_school::DashboardMetrics> {
    let store = state.store()?;
    let metrics = LedgerAggregator::new(&store).dashboard()?;
    Ok(Json(ApiResponse::ok(metrics)))
}

/// GET /api/classes
async fn list_classes(State(state): State<AppState>) -> ApiResult<Vec<costa_school::Class>> {
    let store = state.store()?;
    Ok(Json(ApiResponse::ok(store.list_classes()?)))
}

/// POST /api/classes
async fn create_class(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewClass>,
) -> CreatedResult {
    let mut store = state.store()?;
    store.set_actor(&ctx.operator.username);

    let similar = store.similar_class_names(&payload.name)?;
    let id = store.create_class(&payload.name)?;
    created(id, similar)
}

/// GET /api/students - Students with their class names resolved
async fn list_students(
    State(state): State<AppState>,
) -> ApiResult<Vec<costa_school::StudentWithClass>> {
    let store = state.store()?;
    Ok(Json(ApiResponse::ok(store.list_students_with_class_names()?)))
}

/// POST /api/students
async fn create_student(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewStudent>,
) -> CreatedResult {
    let mut store = state.store()?;
    store.set_actor(&ctx.operator.username);

    let class_id = match (payload.class_id, payload.class_name.as_deref()) {
        (Some(id), _) => Some(id),
        (None, Some(name)) => Some(
            store
                .find_class_id(name)?
                .ok_or_else(|| StoreError::Invalid(format!("no class named '{}'", name.trim())))?,
        ),
        (None, None) => None,
    };

    let similar = store.similar_student_names(&payload.name)?;
    let id = store.create_student(&payload.name, payload.age, payload.enrollment_date, class_id)?;
    created(id, similar)
}

/// GET /api/uniforms
async fn list_uniforms(State(state): State<AppState>) -> ApiResult<Vec<costa_school::UniformItem>> {
    let store = state.store()?;
    Ok(Json(ApiResponse::ok(store.list_uniform_items()?)))
}

/// POST /api/uniforms
async fn create_uniform(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewUniform>,
) -> CreatedResult {
    let mut store = state.store()?;
    store.set_actor(&ctx.operator.username);

    let id = store.create_uniform_item(&payload.item_type, &payload.size, payload.stock, payload.unit_cost)?;
    created(id, Vec::new())
}

/// POST /api/expenses
async fn create_expense(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewExpense>,
) -> CreatedResult {
    let mut store = state.store()?;
    store.set_actor(&ctx.operator.username);

    let id = store.create_expense(payload.date, payload.amount, &payload.category)?;
    created(id, Vec::new())
}

/// POST /api/incomes
async fn create_income(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<NewIncome>,
) -> CreatedResult {
    let mut store = state.store()?;
    store.set_actor(&ctx.operator.username);

    let id = store.create_income(payload.date, payload.amount, &payload.source)?;
    created(id, Vec::new())
}

/// GET /api/summary?start=YYYY-MM-DD&end=YYYY-MM-DD
async fn get_summary(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<costa_school::LedgerSummary> {
    let store = state.store()?;
    let summary = LedgerAggregator::new(&store).compute_ledger_summary(range.start, range.end)?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// GET /api/cashbook?start=YYYY-MM-DD&end=YYYY-MM-DD
async fn get_cashbook(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Vec<costa_school::CashbookEntry>> {
    let store = state.store()?;
    let rows = LedgerAggregator::new(&store).cashbook(range.start, range.end)?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// GET /api/by-category?start=YYYY-MM-DD&end=YYYY-MM-DD - Income per source, expenses per category
async fn get_by_category(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<costa_school::CategoryBreakdown> {
    let store = state.store()?;
    let breakdown = LedgerAggregator::new(&store).category_totals(range.start, range.end)?;
    Ok(Json(ApiResponse::ok(breakdown)))
}

/// GET /api/report?start=YYYY-MM-DD&end=YYYY-MM-DD - PDF download
async fn get_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Query(range): Query<RangeQuery>,
) -> Result<Response, ApiError> {
    let summary = {
        let store = state.store()?;
        LedgerAggregator::new(&store).compute_ledger_summary(range.start, range.end)?
    };

    let doc = state.renderer.render(range.start, range.end, &summary)?;
    let disposition = format!("attachment; filename=\"{}\"", doc.filename);
    note_event(
        &state,
        "export_report",
        &ctx.operator.username,
        serde_json::json!({ "start": range.start, "end": range.end, "file": doc.filename }),
    )?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, costa_school::report::PDF_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        doc.bytes,
    )
        .into_response())
}

/// GET /api/audit?limit=N - Newest audit events first
async fn get_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<costa_school::AuditEvent>> {
    let store = state.store()?;
    let events = store.list_audit_log(query.limit.unwrap_or(100))?;
    Ok(Json(ApiResponse::ok(events)))
}

// ============================================================================
// Router
// ============================================================================

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/logout", post(logout))
        .route("/dashboard", get(get_dashboard))
        .route("/classes", get(list_classes).post(create_class))
        .route("/students", get(list_students).post(create_student))
        .route("/uniforms", get(list_uniforms).post(create_uniform))
        .route("/expenses", post(create_expense))
        .route("/incomes", post(create_income))
        .route("/summary", get(get_summary))
        .route("/cashbook", get(get_cashbook))
        .route("/by-category", get(get_by_category))
        .route("/report", get(get_report))
        .route("/audit", get(get_audit))
        // Everything above needs a session; login below does not
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session))
        .route("/login", post(login))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    logging::init(LogTarget::Stderr)?;

    println!("🌐 COSTA School - Operator API");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = RecordStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    println!("✓ Database opened: {}", config.db_path.display());

    let policy: Arc<dyn AuthenticationPolicy> = Arc::new(FixedCredentialPolicy::from_config(&config)?);
    let renderer = ReportRenderer::new(&config.report_title, &config.currency_label);

    let app = build_router(AppState::new(store, policy, renderer));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   Login: POST http://{}/api/login", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
