mod auth;
mod formulas;
mod people;
mod search;

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::rejection::FormRejection;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

use crate::models::SessionUser;
use crate::password::PasswordError;
use crate::server::session::CurrentUser;

pub use auth::auth_router;
pub use formulas::formulas_router;
pub use people::people_router;
pub use search::refresh_and_search;

pub type ApiResponse<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Could not edit person")]
    EditFailed,

    #[error("{}", .0.body_text())]
    InvalidForm(#[from] FormRejection),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
struct ErrorPage {
    user: Option<SessionUser>,
    status: String,
    message: String,
}

/// Kept on error responses so [render_error_pages] can redraw them for the session user.
#[derive(Debug, Clone)]
struct ErrorDetails {
    status: StatusCode,
    message: String,
}

impl ErrorDetails {
    fn render(&self, user: Option<SessionUser>) -> Response {
        let page = ErrorPage {
            user,
            status: format!(
                "{} - {}",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or_default()
            ),
            message: self.message.clone(),
        };
        (self.status, page).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::EditFailed => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::InvalidForm(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            AppError::Session(_) | AppError::Password(_) => {
                tracing::error!("Request failed: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_owned(),
                )
            }
        };
        let details = ErrorDetails { status, message };
        let mut response = details.render(None);
        response.extensions_mut().insert(details);
        response
    }
}

/// Redraws error pages with the logged in user.
pub async fn render_error_pages(
    CurrentUser(user): CurrentUser,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    match (user, response.extensions().get::<ErrorDetails>()) {
        (Some(user), Some(details)) => details.render(Some(user)),
        _ => response,
    }
}

pub async fn not_found() -> AppError {
    tracing::info!("Fallback");
    AppError::NotFound("Page")
}

/// `/{collection}/{name}` with `name` percent-encoded as one path segment.
pub(crate) fn item_path(collection: &str, name: &str) -> String {
    let mut url = Url::parse("http://localhost/").expect("static base url");
    url.path_segments_mut()
        .expect("base url can have segments")
        .pop_if_empty()
        .push(collection)
        .push(name);
    url.path().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_path_encodes_names() {
        assert_eq!(item_path("people", "Test"), "/people/Test");
        assert_eq!(item_path("people", "Leonhard Euler"), "/people/Leonhard%20Euler");
        assert_eq!(item_path("formulas", "a/b"), "/formulas/a%2Fb");
    }

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(
            AppError::NotFound("Person").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::EditFailed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_responses_carry_their_details() {
        let response = AppError::NotFound("Formula").into_response();
        let details = response.extensions().get::<ErrorDetails>().unwrap();
        assert_eq!(details.status, StatusCode::NOT_FOUND);
        assert_eq!(details.message, "Formula not found");
    }
}
