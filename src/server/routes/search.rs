use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    cache::DataCache,
    common::includes_string,
    models::{Mathematician, SessionUser},
    server::session::CurrentUser,
};

use super::item_path;

#[derive(Deserialize)]
pub struct SearchQuery {
    search: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub kind: &'static str,
    pub name: String,
    pub href: String,
    /// Mathematician the hit belongs to
    pub owner: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
struct SearchPage {
    user: Option<SessionUser>,
    query: String,
    results: Vec<SearchHit>,
}

/// Mathematicians whose name contains `query`, followed by the formulas whose name does.
pub fn search(people: &[Mathematician], query: &str) -> Vec<SearchHit> {
    let by_name = people
        .iter()
        .filter(|person| includes_string(&person.name, query))
        .map(|person| SearchHit {
            kind: "Mathematician",
            name: person.name.clone(),
            href: item_path("people", &person.name),
            owner: person.name.clone(),
        });
    let by_formula = people
        .iter()
        .filter(|person| includes_string(&person.best_known_for.name, query))
        .map(|person| SearchHit {
            kind: "Formula",
            name: person.best_known_for.name.clone(),
            href: item_path("formulas", &person.best_known_for.name),
            owner: person.name.clone(),
        });
    by_name.chain(by_formula).collect()
}

/// Runs before every page: refreshes a stale snapshot and answers `?search=` itself.
pub async fn refresh_and_search(
    State(cache): State<Arc<DataCache>>,
    Query(query): Query<SearchQuery>,
    CurrentUser(user): CurrentUser,
    request: Request,
    next: Next,
) -> Response {
    cache.refresh(false).await;

    match query.search.filter(|search| !search.trim().is_empty()) {
        Some(search_query) => SearchPage {
            user,
            results: search(&cache.snapshot().mathematicians, &search_query),
            query: search_query,
        }
        .into_response(),
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::mathematician;

    #[test]
    fn matches_names_then_formulas() {
        let people = vec![
            mathematician("euler", "Leonhard Euler", "Euler's Identity"),
            mathematician("gauss", "Carl Friedrich Gauss", "Gauss's law"),
        ];
        let hits = search(&people, "euler");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].kind, "Mathematician");
        assert_eq!(hits[0].name, "Leonhard Euler");
        assert_eq!(hits[1].kind, "Formula");
        assert_eq!(hits[1].name, "Euler's Identity");
        assert_eq!(hits[1].owner, "Leonhard Euler");
        assert_eq!(hits[1].href, "/formulas/Euler's%20Identity");
    }

    #[test]
    fn no_hits_for_unknown_terms() {
        let people = vec![mathematician("gauss", "Carl Friedrich Gauss", "Gauss's law")];
        assert!(search(&people, "noether").is_empty());
    }
}
