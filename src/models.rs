use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::common::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Algebra,
    Geometry,
    Calculus,
    Statistics,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Algebra,
        Field::Geometry,
        Field::Calculus,
        Field::Statistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Algebra => "Algebra",
            Field::Geometry => "Geometry",
            Field::Calculus => "Calculus",
            Field::Statistics => "Statistics",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Field::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("Unknown field {value}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mathematician {
    pub id: String,
    pub name: String,
    pub description: String,
    pub age: u32,
    pub alive: bool,
    pub born_bc: bool,
    pub birth_date: String,
    // Url to an image
    pub picture: String,
    pub field: Field,
    pub main_interests: Vec<String>,
    pub best_known_for: Formula,
}

impl Mathematician {
    /// Birth date as a calendar date, with the year negated for people born BC.
    pub fn birth_date_value(&self) -> Option<NaiveDate> {
        let date = parse_date(&self.birth_date)?;
        if self.born_bc && date.year() > 0 {
            date.with_year(-date.year())
        } else {
            Some(date)
        }
    }

    pub fn apply(&mut self, update: &MathematicianUpdate) {
        if let Some(age) = update.age {
            self.age = age;
        }
        if let Some(alive) = update.alive {
            self.alive = alive;
        }
        if let Some(field) = update.field {
            self.field = field;
        }
        if let Some(interests) = &update.main_interests {
            self.main_interests = interests.clone();
        }
    }
}

/// Partial update of a [Mathematician], only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MathematicianUpdate {
    pub age: Option<u32>,
    pub alive: Option<bool>,
    pub field: Option<Field>,
    pub main_interests: Option<Vec<String>>,
}

impl MathematicianUpdate {
    /// Layer `newer` on top of this update, its `Some` fields win.
    pub fn merge(&mut self, newer: &MathematicianUpdate) {
        if newer.age.is_some() {
            self.age = newer.age;
        }
        if newer.alive.is_some() {
            self.alive = newer.alive;
        }
        if newer.field.is_some() {
            self.field = newer.field;
        }
        if newer.main_interests.is_some() {
            self.main_interests = newer.main_interests.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub image: Option<String>,
}

/// The part of a [User] kept in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub image: Option<String>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            username: user.username.clone(),
            image: user.image.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn mathematician(id: &str, name: &str, formula: &str) -> Mathematician {
        Mathematician {
            id: id.to_owned(),
            name: name.to_owned(),
            description: format!("{name} was a mathematician"),
            age: 50,
            alive: false,
            born_bc: false,
            birth_date: "1700-01-01".to_owned(),
            picture: String::new(),
            field: Field::Algebra,
            main_interests: vec!["Numbers".to_owned()],
            best_known_for: Formula {
                id: format!("{id}-formula"),
                name: formula.to_owned(),
                description: String::new(),
            },
        }
    }

    #[test]
    fn field_parses_ignoring_case() {
        assert_eq!("calculus".parse::<Field>(), Ok(Field::Calculus));
        assert_eq!(" Geometry ".parse::<Field>(), Ok(Field::Geometry));
        assert!("Topology".parse::<Field>().is_err());
    }

    #[test]
    fn apply_only_touches_given_fields() {
        let mut person = mathematician("euler", "Leonhard Euler", "Euler's Identity");
        person.apply(&MathematicianUpdate {
            age: Some(76),
            ..Default::default()
        });
        assert_eq!(person.age, 76);
        assert!(!person.alive);
        assert_eq!(person.main_interests, vec!["Numbers"]);
    }

    #[test]
    fn bc_birth_dates_have_negative_years() {
        let mut person = mathematician("euclid", "Euclid", "Elements");
        person.birth_date = "0300-01-01".to_owned();
        person.born_bc = true;
        assert_eq!(person.birth_date_value().map(|d| d.year()), Some(-300));
    }
}
