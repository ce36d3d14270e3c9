use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    response::Redirect,
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::{
    cache::DataCache,
    common::{compare_string, includes_string, sort_copy, SortOrder, SortValue},
    models::{Field, Mathematician, MathematicianUpdate, SessionUser},
    server::{
        app::AppState,
        deserializers::{deserialize_bool_from_checkbox, split_semicolon_list},
        session::CurrentUser,
    },
    telemetry::{Color, Logger, EDIT_CNTR},
};

use super::{item_path, ApiResponse, AppError};

const LOGGER: Logger = Logger::new("Server", Color::Green);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Name,
    Age,
    BirthDate,
    Field,
    Id,
}

impl SortKey {
    /// Unknown keys sort by name.
    fn parse(value: &str) -> Self {
        match value.trim() {
            "age" => SortKey::Age,
            "birth_date" => SortKey::BirthDate,
            "field" => SortKey::Field,
            "id" => SortKey::Id,
            _ => SortKey::Name,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Age => "age",
            SortKey::BirthDate => "birth_date",
            SortKey::Field => "field",
            SortKey::Id => "id",
        }
    }

    fn value<'a>(&self, person: &'a Mathematician) -> SortValue<'a> {
        match self {
            SortKey::Name => SortValue::Text(&person.name),
            SortKey::Age => SortValue::Number(person.age.into()),
            SortKey::BirthDate => SortValue::Date(person.birth_date_value()),
            SortKey::Field => SortValue::Text(person.field.as_str()),
            SortKey::Id => SortValue::Text(&person.id),
        }
    }
}

/// Keep people whose field is `filter`, or whose name contains it when it is not a field.
fn filter_people(people: &[Mathematician], filter: &str) -> Vec<Mathematician> {
    match filter.parse::<Field>() {
        Ok(field) => people
            .iter()
            .filter(|person| person.field == field)
            .cloned()
            .collect(),
        Err(_) => people
            .iter()
            .filter(|person| includes_string(&person.name, filter))
            .cloned()
            .collect(),
    }
}

fn sort_people(people: &[Mathematician], key: SortKey, order: SortOrder) -> Vec<Mathematician> {
    sort_copy(people, order, |person| key.value(person))
}

pub(super) fn find_person<'a>(people: &'a [Mathematician], name: &str) -> Option<&'a Mathematician> {
    people.iter().find(|person| compare_string(&person.name, name))
}

#[derive(Deserialize)]
struct PeopleQuery {
    filter: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

#[derive(Deserialize)]
struct Edit {
    age: u32,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_bool_from_checkbox")]
    dead: Option<bool>,
    field: Field,
    #[serde(default)]
    interests: String,
}

impl From<Edit> for MathematicianUpdate {
    fn from(edit: Edit) -> Self {
        MathematicianUpdate {
            age: Some(edit.age),
            alive: Some(!edit.dead.unwrap_or(false)),
            field: Some(edit.field),
            main_interests: Some(split_semicolon_list(&edit.interests)),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "people.html")]
struct PeoplePage {
    user: Option<SessionUser>,
    cards: Vec<Mathematician>,
    fields: Vec<&'static str>,
    filter: String,
    sort: &'static str,
    asc: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "person.html")]
struct PersonPage {
    user: Option<SessionUser>,
    person: Mathematician,
}

struct FieldOption {
    name: &'static str,
    selected: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "edit.html")]
struct EditPage {
    user: Option<SessionUser>,
    person: Mathematician,
    fields: Vec<FieldOption>,
    interests: String,
}

async fn list_people(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PeopleQuery>,
) -> PeoplePage {
    let snapshot = cache.snapshot();
    let filter = query.filter.unwrap_or_default();
    let mut people = if filter.trim().is_empty() {
        snapshot.mathematicians.clone()
    } else {
        filter_people(&snapshot.mathematicians, &filter)
    };

    let key = query.sort.as_deref().map(SortKey::parse).unwrap_or(SortKey::Name);
    let order = query
        .order
        .as_deref()
        .and_then(|order| order.parse().ok())
        .unwrap_or_default();
    if query.sort.is_some() {
        people = sort_people(&people, key, order);
    }

    PeoplePage {
        user,
        cards: people,
        fields: Field::ALL.iter().map(Field::as_str).collect(),
        filter,
        sort: key.as_str(),
        asc: order == SortOrder::Asc,
    }
}

async fn person(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
) -> ApiResponse<PersonPage> {
    let snapshot = cache.snapshot();
    let person = find_person(&snapshot.mathematicians, &name).ok_or(AppError::NotFound("Person"))?;
    Ok(PersonPage {
        user,
        person: person.clone(),
    })
}

async fn edit_form(
    State(cache): State<Arc<DataCache>>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
) -> ApiResponse<EditPage> {
    let snapshot = cache.snapshot();
    let person = find_person(&snapshot.mathematicians, &name).ok_or(AppError::NotFound("Person"))?;
    Ok(EditPage {
        user,
        fields: Field::ALL
            .iter()
            .map(|field| FieldOption {
                name: field.as_str(),
                selected: *field == person.field,
            })
            .collect(),
        interests: person.main_interests.join(";"),
        person: person.clone(),
    })
}

async fn submit_edit(
    State(cache): State<Arc<DataCache>>,
    Path(name): Path<String>,
    form: Result<Form<Edit>, FormRejection>,
) -> ApiResponse<Redirect> {
    let Form(edit) = form?;
    let snapshot = cache.snapshot();
    let person = find_person(&snapshot.mathematicians, &name).ok_or(AppError::EditFailed)?;

    LOGGER.log(format!("Updating '{}'...", person.name));
    let outcome = match cache.update_mathematician(&person.id, &edit.into()).await {
        Ok(true) => "updated",
        Ok(false) => "unchanged",
        Err(e) => {
            LOGGER.error(format!("Could not update '{}': {e}", person.name));
            "failed"
        }
    };
    LOGGER.log(if outcome == "updated" { "Success" } else { "Failed" });
    EDIT_CNTR.with_label_values(&[outcome]).inc();

    Ok(Redirect::to(&item_path("people", &name)))
}

pub fn people_router(state: AppState) -> Router {
    Router::new()
        .route("/people", get(list_people))
        .route("/people/{name}", get(person))
        .route("/people/{name}/edit", get(edit_form).post(submit_edit))
        .with_state(state)
}
