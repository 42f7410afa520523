//! Answer validators — pure functions deciding whether raw input is
//! acceptable and normalizing it.

use super::event::ImageVariant;
use super::model::{Education, Gender, PhotoRef};

/// Youngest accepted age.
pub const MIN_AGE: u8 = 4;
/// Oldest accepted age.
pub const MAX_AGE: u8 = 120;

/// Why an answer was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("empty answer")]
    Empty,

    #[error("name contains non-alphabetic characters: {0:?}")]
    NotAlphabetic(String),

    #[error("not a whole number: {0:?}")]
    NotANumber(String),

    #[error("age {0} outside {MIN_AGE}..={MAX_AGE}")]
    AgeOutOfRange(u64),

    #[error("unknown choice {0:?}")]
    UnknownChoice(String),

    #[error("no image attached")]
    NoImage,
}

/// Valid iff non-empty and made only of alphabetic characters.
pub fn name(text: &str) -> Result<String, ValidationFailure> {
    if text.is_empty() {
        return Err(ValidationFailure::Empty);
    }
    if !text.chars().all(char::is_alphabetic) {
        return Err(ValidationFailure::NotAlphabetic(text.to_string()));
    }
    Ok(text.to_string())
}

/// Valid iff the trimmed text is all ASCII digits and within the age range.
pub fn age(text: &str) -> Result<u8, ValidationFailure> {
    let digits = text.trim();
    if digits.is_empty() {
        return Err(ValidationFailure::Empty);
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationFailure::NotANumber(text.to_string()));
    }
    // Overlong inputs saturate so they report as out of range, not as junk.
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    if !(u64::from(MIN_AGE)..=u64::from(MAX_AGE)).contains(&value) {
        return Err(ValidationFailure::AgeOutOfRange(value));
    }
    u8::try_from(value).map_err(|_| ValidationFailure::AgeOutOfRange(value))
}

pub fn gender(key: &str) -> Result<Gender, ValidationFailure> {
    Gender::from_choice_key(key).ok_or_else(|| ValidationFailure::UnknownChoice(key.to_string()))
}

pub fn education(key: &str) -> Result<Education, ValidationFailure> {
    Education::from_choice_key(key)
        .ok_or_else(|| ValidationFailure::UnknownChoice(key.to_string()))
}

pub fn wants_news(key: &str) -> Result<bool, ValidationFailure> {
    match key {
        "yes_news" | "yes" => Ok(true),
        "no_news" | "no" => Ok(false),
        _ => Err(ValidationFailure::UnknownChoice(key.to_string())),
    }
}

/// Pick the largest resolution. On equal sizes the later variant wins, since
/// transports list resolutions smallest first.
pub fn largest_photo(images: &[ImageVariant]) -> Result<PhotoRef, ValidationFailure> {
    images
        .iter()
        .max_by_key(|img| img.size)
        .map(|img| PhotoRef {
            unique_id: img.unique_id.clone(),
            retrieval_id: img.retrieval_id.clone(),
        })
        .ok_or(ValidationFailure::NoImage)
}
