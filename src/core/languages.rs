//! Languages offered by the translate editor.

use crate::shared::error::{AppError, AppResult};
use crate::shared::types::LanguageCode;

pub const LANGUAGES: &[(&str, &str)] = &[
    ("EN", "English"),
    ("TR", "Turkish"),
    ("DE", "German"),
    ("ES", "Spanish"),
    ("FR", "French"),
    ("IT", "Italian"),
    ("NL", "Dutch"),
    ("PL", "Polish"),
    ("PT", "Portuguese"),
    ("RU", "Russian"),
    ("JA", "Japanese"),
    ("ZH", "Chinese"),
    ("AR", "Arabic"),
];

pub fn is_supported(code: &LanguageCode) -> bool {
    LANGUAGES.iter().any(|(c, _)| *c == code.as_str())
}

pub fn display_name(code: &LanguageCode) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code.as_str())
        .map(|(_, name)| *name)
}

/// Parse a code and require it to be one the editor offers
pub fn parse_supported(code: &str) -> AppResult<LanguageCode> {
    let parsed = LanguageCode::parse(code)?;
    if !is_supported(&parsed) {
        return Err(AppError::Validation(format!("Unsupported language: {}", parsed)));
    }
    Ok(parsed)
}
