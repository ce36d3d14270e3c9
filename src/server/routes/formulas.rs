use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use crate::{
    cache::DataCache,
    common::compare_string,
    models::{Formula, Mathematician, SessionUser},
    server::{app::AppState, session::CurrentUser},
};

use super::{ApiResponse, AppError};

struct FormulaEntry {
    formula: Formula,
    owner: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "formulas.html")]
struct FormulasPage {
    user: Option<SessionUser>,
    formulas: Vec<FormulaEntry>,
}

#[derive(Template, WebTemplate)]
#[template(path = "formula.html")]
struct FormulaPage {
    user: Option<SessionUser>,
    formula: Formula,
    owner: String,
}

fn find_formula<'a>(people: &'a [Mathematician], name: &str) -> Option<&'a Mathematician> {
    people
        .iter()
        .find(|person| compare_string(&person.best_known_for.name, name))
}

async fn list_formulas(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
) -> FormulasPage {
    let formulas = cache
        .snapshot()
        .mathematicians
        .iter()
        .map(|person| FormulaEntry {
            formula: person.best_known_for.clone(),
            owner: person.name.clone(),
        })
        .collect();
    FormulasPage { user, formulas }
}

async fn formula(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
) -> ApiResponse<FormulaPage> {
    let snapshot = cache.snapshot();
    let owner = find_formula(&snapshot.mathematicians, &name).ok_or(AppError::NotFound("Formula"))?;
    Ok(FormulaPage {
        user,
        formula: owner.best_known_for.clone(),
        owner: owner.name.clone(),
    })
}

pub fn formulas_router(state: AppState) -> Router {
    Router::new()
        .route("/formulas", get(list_formulas))
        .route("/formulas/{name}", get(formula))
        .with_state(state)
}
