use std::path::Path;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use axum::{extract::FromRef, extract::State, http::StatusCode, middleware, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use routes::{auth_router, formulas_router, people_router, refresh_and_search};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use time::Duration;
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use super::routes;
use super::session::{session_key, CurrentUser};
use crate::cache::DataCache;
use crate::cleanup;
use crate::config::Settings;
use crate::models::SessionUser;

#[derive(FromRef, Clone)]
pub struct AppState {
    cache: Arc<DataCache>,
}

impl AppState {
    pub fn new(cache: Arc<DataCache>) -> Self {
        Self { cache }
    }
}

/// All routes with sessions and tracing. Page routes refresh the cache and honour `?search=`.
pub fn router(state: AppState, static_dir: &Path, key: Key) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::weeks(1)))
        .with_signed(key);

    Router::new()
        .route("/", get(index))
        .with_state(state.clone())
        .merge(people_router(state.clone()))
        .merge(formulas_router(state.clone()))
        .merge(auth_router(state.clone()))
        .fallback(routes::not_found)
        .layer(middleware::from_fn(routes::render_error_pages))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            refresh_and_search,
        ))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(cache: Arc<DataCache>, settings: &Settings) -> anyhow::Result<()> {
    let state = AppState::new(cache.clone());
    let app = router(
        state,
        &settings.static_dir,
        session_key(settings.session_secret.as_ref()),
    );
    let listener = TcpListener::bind(settings.bind_addr()).await?;

    tracing::info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(cleanup::shutdown(cache))
        .await?;
    Ok(())
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
struct IndexPage {
    user: Option<SessionUser>,
    people: usize,
}

async fn index(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
) -> IndexPage {
    IndexPage {
        user,
        people: cache.snapshot().mathematicians.len(),
    }
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buf = vec![];
    encoder.encode(&metrics, &mut buf).unwrap();
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buf))
        .unwrap()
}
