use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use itertools::Itertools;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d/%m/%Y"];

/// Compare two strings ignoring case and surrounding whitespace
pub fn compare_string(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Check if `haystack` contains `needle` ignoring case, `needle` is trimmed
pub fn includes_string(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

/// Parse a calendar date written in one of the formats found in the dataset.
/// A bare year is read as the first of January.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(year) = value.parse::<i32>() {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("Unknown sort order {other}")),
        }
    }
}

/// A typed key to sort by. Values of different kinds compare as equal.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
    Date(Option<NaiveDate>),
}

impl SortValue<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            // undated entries go first
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Sort a copy of `data` by `key`, leaving the input untouched.
///
/// The ascending sort is stable and the descending order is its exact reverse.
pub fn sort_copy<T, F>(data: &[T], order: SortOrder, key: F) -> Vec<T>
where
    T: Clone,
    F: for<'a> Fn(&'a T) -> SortValue<'a>,
{
    let sorted = data
        .iter()
        .cloned()
        .sorted_by(|a, b| key(a).compare(&key(b)));
    match order {
        SortOrder::Asc => sorted.collect(),
        SortOrder::Desc => sorted.rev().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        name: &'static str,
        age: u32,
        born: &'static str,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "euler", age: 76, born: "1707-04-15" },
            Row { name: "Gauss", age: 77, born: "April 30, 1777" },
            Row { name: "abel", age: 26, born: "1802-08-05" },
            Row { name: "Noether", age: 53, born: "23 March 1882" },
        ]
    }

    #[test]
    fn compare_ignores_case_and_whitespace() {
        assert!(compare_string("Euler", " euler "));
        assert!(!compare_string("Euler", "Eule"));
    }

    #[test]
    fn includes_ignores_case() {
        assert!(includes_string("Leonhard Euler", "EULER"));
        assert!(includes_string("Leonhard Euler", " hard "));
        assert!(!includes_string("Leonhard Euler", "gauss"));
    }

    #[test]
    fn parses_dataset_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1777, 4, 30);
        assert_eq!(parse_date("1777-04-30"), expected);
        assert_eq!(parse_date("April 30, 1777"), expected);
        assert_eq!(parse_date("30 April 1777"), expected);
        assert_eq!(parse_date("1777"), NaiveDate::from_ymd_opt(1777, 1, 1));
        assert_eq!(parse_date("someday"), None);
    }

    #[test]
    fn sort_order_parses_leniently() {
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn sorts_text_case_insensitively() {
        let sorted = sort_copy(&rows(), SortOrder::Asc, |r| SortValue::Text(r.name));
        let names: Vec<_> = sorted.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["abel", "euler", "Gauss", "Noether"]);
    }

    #[test]
    fn sorts_numbers_numerically() {
        let sorted = sort_copy(&rows(), SortOrder::Asc, |r| SortValue::Number(r.age.into()));
        let ages: Vec<_> = sorted.iter().map(|r| r.age).collect();
        assert_eq!(ages, vec![26, 53, 76, 77]);
    }

    #[test]
    fn sorts_dates_chronologically() {
        let sorted = sort_copy(&rows(), SortOrder::Asc, |r| SortValue::Date(parse_date(r.born)));
        let names: Vec<_> = sorted.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["euler", "Gauss", "abel", "Noether"]);
    }

    #[test]
    fn descending_is_exact_reverse_of_ascending() {
        let data = rows();
        let keys: [fn(&Row) -> SortValue<'_>; 3] = [
            |r| SortValue::Text(r.name),
            |r| SortValue::Number(r.age.into()),
            |r| SortValue::Date(parse_date(r.born)),
        ];
        for key in keys {
            let mut asc = sort_copy(&data, SortOrder::Asc, key);
            let desc = sort_copy(&data, SortOrder::Desc, key);
            asc.reverse();
            assert_eq!(asc, desc);
        }
    }

    #[test]
    fn input_is_left_untouched() {
        let data = rows();
        let _ = sort_copy(&data, SortOrder::Desc, |r| SortValue::Number(r.age.into()));
        assert_eq!(data, rows());
    }
}
