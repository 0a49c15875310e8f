use axum::{
    Json, Router,
    extract::{FromRef, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use handlebars::Handlebars;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::{DashboardConfig, PageConfig, SectionConfig};
use crate::downloader::{XLSX_MIME, download_file_name, export_workbook};
use crate::error::WearError;
use crate::graph::{build_chart, render_png};
use crate::login::{self, CredentialStore, Session, SessionStore, derive_cookie_key};
use crate::pages::{page_href, page_view};
use crate::summary::summarize;

/// Size of the chart image served to the dashboard
const CHART_WIDTH: u32 = 1000;
const CHART_HEIGHT: u32 = 500;

/// Shared state of the dashboard server
///
/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
    pub cookie_key: Key,
    pub templates: Arc<Handlebars<'static>>,
}

impl AppState {
    /// Build the state for a validated configuration
    pub fn new(config: DashboardConfig) -> Result<Self, WearError> {
        let mut templates: Handlebars<'static> = Handlebars::new();
        templates
            .register_template_string("login", include_str!("./static/login.hbs"))
            .map_err(|e| WearError::Render(e.to_string()))?;
        templates
            .register_template_string("dashboard", include_str!("./static/dashboard.hbs"))
            .map_err(|e| WearError::Render(e.to_string()))?;

        Ok(AppState {
            credentials: Arc::new(CredentialStore::from_config(&config)),
            sessions: Arc::new(SessionStore::with_expiry_days(config.cookie.expiry_days)),
            cookie_key: derive_cookie_key(&config.cookie.key)?,
            templates: Arc::new(templates),
            config: Arc::new(config),
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

impl IntoResponse for WearError {
    fn into_response(self) -> Response {
        let status = match &self {
            WearError::FileNotFound(_) => StatusCode::NOT_FOUND,
            WearError::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.assets_dir);

    Router::new()
        .route("/", get(serve_root))
        .route("/login", get(login::serve_login_page).post(login::handle_login))
        .route("/logout", post(login::handle_logout))
        .route("/pages/:page", get(serve_page))
        .route("/pages/:page/sections/:section/summary.json", get(section_summary))
        .route("/pages/:page/sections/:section/chart.json", get(section_chart))
        .route("/pages/:page/sections/:section/chart.png", get(section_chart_png))
        .route("/pages/:page/sections/:section/download", get(section_download))
        .nest_service("/assets", assets)
        .with_state(state)
}

/// Start the dashboard server on `bind`
pub async fn run(config: DashboardConfig, bind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;
    if state.credentials.is_empty() {
        warn!("No users configured; nobody will be able to log in");
    }

    let app = router(state);

    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run workbook IO off the async executor
async fn blocking<F>(work: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(e) => {
            error!("Worker task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn unknown(what: &str, slug: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Unknown {}: {}", what, slug)).into_response()
}

fn find_page<'a>(config: &'a DashboardConfig, page: &str) -> Result<&'a PageConfig, Response> {
    config.page(page).ok_or_else(|| unknown("page", page))
}

fn find_section<'a>(
    config: &'a DashboardConfig,
    page: &str,
    section: &str,
) -> Result<&'a SectionConfig, Response> {
    find_page(config, page)?
        .section(section)
        .ok_or_else(|| unknown("section", section))
}

async fn serve_root(_session: Session, State(state): State<AppState>) -> Response {
    match state.config.pages.first() {
        Some(page) => Redirect::to(&page_href(page)).into_response(),
        None => unknown("page", "/"),
    }
}

async fn serve_page(
    session: Session,
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Response {
    if let Err(response) = find_page(&state.config, &page) {
        return response;
    }

    blocking(move || {
        let Some(page) = state.config.page(&page) else {
            return unknown("page", &page);
        };
        let view = page_view(&state.config, page, &session.identity);

        match state.templates.render("dashboard", &view) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Failed to render page '{}': {}", page.slug, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
            }
        }
    })
    .await
}

async fn section_summary(
    _session: Session,
    State(state): State<AppState>,
    Path((page, section)): Path<(String, String)>,
) -> Response {
    let path = match find_section(&state.config, &page, &section) {
        Ok(section) => state.config.workbook_path(section),
        Err(response) => return response,
    };

    blocking(move || match summarize(&path) {
        Ok(records) => Json(records).into_response(),
        Err(e) => e.into_response(),
    })
    .await
}

async fn section_chart(
    _session: Session,
    State(state): State<AppState>,
    Path((page, section)): Path<(String, String)>,
) -> Response {
    let path = match find_section(&state.config, &page, &section) {
        Ok(section) => state.config.workbook_path(section),
        Err(response) => return response,
    };

    blocking(move || match build_chart(&path) {
        Ok(chart) => Json(chart).into_response(),
        Err(e) => e.into_response(),
    })
    .await
}

async fn section_chart_png(
    _session: Session,
    State(state): State<AppState>,
    Path((page, section)): Path<(String, String)>,
) -> Response {
    let path = match find_section(&state.config, &page, &section) {
        Ok(section) => state.config.workbook_path(section),
        Err(response) => return response,
    };

    blocking(move || {
        let png = build_chart(&path).and_then(|chart| render_png(&chart, CHART_WIDTH, CHART_HEIGHT));
        match png {
            Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
            Err(e) => {
                warn!("Chart for {} unavailable: {}", path.display(), e);
                e.into_response()
            }
        }
    })
    .await
}

async fn section_download(
    session: Session,
    State(state): State<AppState>,
    Path((page, section)): Path<(String, String)>,
) -> Response {
    let path = match find_section(&state.config, &page, &section) {
        Ok(section) => state.config.workbook_path(section),
        Err(response) => return response,
    };

    blocking(move || match export_workbook(&path) {
        Ok(bytes) => {
            info!("User '{}' downloaded {}", session.identity.username, path.display());
            let file_name = urlencoding::encode(&download_file_name(&path)).into_owned();
            let disposition = format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                file_name, file_name
            );
            (
                [
                    (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    })
    .await
}
