//! # Free Text
//!
//! Validation for user-authored prose: dispute descriptions and comment
//! bodies. Input is trimmed, bounded to [`MIN_TEXT_LENGTH`]..=[`MAX_TEXT_LENGTH`]
//! characters and restricted to Latin and Cyrillic letters, ASCII digits,
//! whitespace and the punctuation set `_ - . , ! ? : ; ( ) " ' / №`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minimum length of a description or comment, in characters.
pub const MIN_TEXT_LENGTH: usize = 3;

/// Maximum length of a description or comment, in characters.
pub const MAX_TEXT_LENGTH: usize = 2000;

const PUNCTUATION: &[char] = &[
    '_', '-', '.', ',', '!', '?', ':', ';', '(', ')', '"', '\'', '/', '№',
];

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_cyrillic(c) || c.is_whitespace() || PUNCTUATION.contains(&c)
}

/// A validated, trimmed piece of free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FreeText(String);

impl FreeText {
    /// Validate and trim `value`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::TextTooShort`] below [`MIN_TEXT_LENGTH`]
    /// - [`ValidationError::TextTooLong`] above [`MAX_TEXT_LENGTH`]
    /// - [`ValidationError::InvalidTextCharacter`] for the first character
    ///   outside the allowed set
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        let actual = trimmed.chars().count();

        if actual < MIN_TEXT_LENGTH {
            return Err(ValidationError::TextTooShort {
                min: MIN_TEXT_LENGTH,
                actual,
            });
        }
        if actual > MAX_TEXT_LENGTH {
            return Err(ValidationError::TextTooLong {
                max: MAX_TEXT_LENGTH,
                actual,
            });
        }
        if let Some(bad) = trimmed.chars().find(|c| !is_allowed(*c)) {
            return Err(ValidationError::InvalidTextCharacter(bad));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Access the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for FreeText {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FreeText> for String {
    fn from(text: FreeText) -> Self {
        text.0
    }
}

impl std::fmt::Display for FreeText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_latin_and_cyrillic_prose() {
        let text = FreeText::new("  Договор №12 was breached (see p. 3)!  ").unwrap();
        assert_eq!(text.as_str(), "Договор №12 was breached (see p. 3)!");
    }

    #[test]
    fn rejects_short_after_trim() {
        assert_eq!(
            FreeText::new("  ab  "),
            Err(ValidationError::TextTooShort { min: 3, actual: 2 })
        );
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(MAX_TEXT_LENGTH + 1);
        assert!(matches!(
            FreeText::new(long),
            Err(ValidationError::TextTooLong { max: 2000, .. })
        ));
        assert!(FreeText::new("a".repeat(MAX_TEXT_LENGTH)).is_ok());
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert_eq!(
            FreeText::new("price is 100$"),
            Err(ValidationError::InvalidTextCharacter('$'))
        );
        assert!(FreeText::new("<script>").is_err());
        assert!(FreeText::new("emoji 🙂 here").is_err());
    }

    #[test]
    fn multiline_text_is_allowed() {
        assert!(FreeText::new("line one\nline two\ttabbed").is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn valid_alphabet_within_bounds_is_accepted(s in "[a-zA-Zа-яА-Я0-9]{3,200}") {
            prop_assert!(FreeText::new(s).is_ok());
        }

        #[test]
        fn accepted_text_is_trimmed_and_bounded(s in "\\PC{0,64}") {
            if let Ok(text) = FreeText::new(s) {
                let n = text.as_str().chars().count();
                prop_assert!((MIN_TEXT_LENGTH..=MAX_TEXT_LENGTH).contains(&n));
                prop_assert_eq!(text.as_str(), text.as_str().trim());
            }
        }
    }
}
