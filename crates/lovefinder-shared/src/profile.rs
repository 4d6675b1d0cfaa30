//! Profile sections stored on a principal's document.
//!
//! The birthday section is a fixed list of labelled items; item `0` holds
//! the birthdate as `day month year` with a Swedish month name and item `1`
//! holds the gender used by the discovery filter.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Item id of the birthdate entry in the birthday section.
pub const BIRTHDATE_ITEM: u32 = 0;

/// Position of the gender entry in the birthday section.
pub const GENDER_POSITION: usize = 1;

const SWEDISH_MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "mars",
    "april",
    "maj",
    "juni",
    "juli",
    "augusti",
    "september",
    "oktober",
    "november",
    "december",
];

/// One labelled entry of the birthday section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoItem {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub placeholder: String,
}

/// Free-text card, used by both the activity list and the main-info cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextCard {
    pub id: i64,
    pub description: String,
}

/// A gallery image: the public URL plus the file store path needed to
/// delete it again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GalleryImage {
    pub url: String,
    pub path: String,
}

/// The empty birthday section a new profile starts with.
pub fn default_birthday_section() -> Vec<InfoItem> {
    [
        (0, "Ange din födelsedag"),
        (1, "Välj kön"),
        (7, "Välj längd"),
        (2, "Ange yrke"),
        (9, "Ange plats"),
        (3, "Välj etnicitet"),
        (4, "Välj inställning till barn"),
        (5, "Välj rökvanor"),
        (6, "Välj alkoholvanor"),
    ]
    .into_iter()
    .map(|(id, placeholder)| InfoItem {
        id,
        text: String::new(),
        placeholder: placeholder.to_string(),
    })
    .collect()
}

/// Parse `"14 februari 1990"` into a date.
pub fn parse_birthdate(text: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidBirthdate(text.to_string());

    let parts: Vec<&str> = text.split_whitespace().collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };

    let day: u32 = day.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month = SWEDISH_MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month))
        .ok_or_else(invalid)?;

    NaiveDate::from_ymd_opt(year, month as u32 + 1, day).ok_or_else(invalid)
}

/// Whole years between `birthdate` and `today`.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Check a birthday section before saving: every item filled, and the
/// birthdate item parseable. Returns the parsed birthdate if present.
pub fn validate_birthday_section(items: &[InfoItem]) -> Result<Option<NaiveDate>, ValidationError> {
    let mut birthdate = None;
    for (index, item) in items.iter().enumerate() {
        if item.text.trim().is_empty() {
            return Err(ValidationError::EmptyItem { index });
        }
        if item.id == BIRTHDATE_ITEM {
            birthdate = Some(parse_birthdate(&item.text)?);
        }
    }
    Ok(birthdate)
}

/// Every card needs a non-empty description.
pub fn validate_cards(cards: &[TextCard]) -> Result<(), ValidationError> {
    match cards.iter().position(|c| c.description.trim().is_empty()) {
        Some(index) => Err(ValidationError::EmptyItem { index }),
        None => Ok(()),
    }
}

/// Lower-cased gender taken from the birthday section, if filled.
pub fn gender_of(items: &[InfoItem]) -> Option<String> {
    items
        .get(GENDER_POSITION)
        .map(|item| item.text.trim().to_lowercase())
        .filter(|g| !g.is_empty())
}

/// Store file names must not contain whitespace or path separators, so an
/// upload always lands directly in its folder.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
