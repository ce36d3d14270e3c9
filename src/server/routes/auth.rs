use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    cache::DataCache,
    models::{SessionUser, User},
    password::hash_password_blocking,
    server::{
        app::AppState,
        session::{CurrentUser, USER_KEY},
    },
    telemetry::{Color, Logger, SIGNUP_CNTR},
};

use super::ApiResponse;

const LOGGER: Logger = Logger::new("Auth", Color::Magenta);

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginQuery {
    status: Option<u16>,
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
struct LoginPage {
    user: Option<SessionUser>,
    error: Option<&'static str>,
}

impl LoginPage {
    fn with_error(error: &'static str) -> Self {
        LoginPage {
            user: None,
            error: Some(error),
        }
    }
}

fn status_message(status: Option<u16>) -> Option<&'static str> {
    match status {
        Some(401) => Some("Could not log in"),
        Some(409) => Some("Account already exists"),
        _ => None,
    }
}

async fn login_form(
    CurrentUser(user): CurrentUser,
    query: Result<Query<LoginQuery>, QueryRejection>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    // a malformed status shows the plain form
    let status = query.ok().and_then(|Query(query)| query.status);
    LoginPage {
        user,
        error: status_message(status),
    }
    .into_response()
}

async fn log_in(session: Session, user: &User) -> ApiResponse<()> {
    session.cycle_id().await?;
    session.insert(USER_KEY, SessionUser::from(user)).await?;
    Ok(())
}

async fn login(
    State(cache): State<Arc<DataCache>>,
    session: Session,
    Form(credentials): Form<Credentials>,
) -> ApiResponse<Redirect> {
    match cache
        .login(credentials.username.trim(), &credentials.password)
        .await
    {
        Some(user) => {
            log_in(session, &user).await?;
            LOGGER.log(format!("'{}' logged in", user.username));
            Ok(Redirect::to("/"))
        }
        None => Ok(Redirect::to("/login?status=401")),
    }
}

async fn signup(
    State(cache): State<Arc<DataCache>>,
    session: Session,
    Form(credentials): Form<Credentials>,
) -> ApiResponse<Response> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.is_empty() {
        return Ok(LoginPage::with_error("Missing username or password").into_response());
    }

    let user = User {
        username: username.to_owned(),
        password_hash: hash_password_blocking(credentials.password).await?,
        image: None,
    };
    match cache.add_user(user.clone()).await {
        Ok(true) => {
            SIGNUP_CNTR.with_label_values(&["created"]).inc();
            LOGGER.log(format!("Created account '{}'", user.username));
            log_in(session, &user).await?;
            Ok(Redirect::to("/").into_response())
        }
        Ok(false) => {
            SIGNUP_CNTR.with_label_values(&["duplicate"]).inc();
            Ok((
                StatusCode::CONFLICT,
                LoginPage::with_error("Account already exists"),
            )
                .into_response())
        }
        Err(e) => {
            SIGNUP_CNTR.with_label_values(&["failed"]).inc();
            LOGGER.error(format!("Failed to add user '{}': {e}", user.username));
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginPage::with_error("Could not create account"),
            )
                .into_response())
        }
    }
}

async fn logout(session: Session) -> ApiResponse<Redirect> {
    session.flush().await?;
    Ok(Redirect::to("/"))
}

pub fn auth_router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/signup", post(signup))
        .route("/logout", get(logout))
        .with_state(state)
}
