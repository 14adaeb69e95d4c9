//! Input validation for user-supplied text.

use socialnet_types::{Result, SocialnetError};

/// Maximum post and group post length, in characters.
pub const MAX_POST_LEN: usize = 5000;
/// Maximum comment length, in characters.
pub const MAX_COMMENT_LEN: usize = 1000;
/// Maximum direct message length, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;
/// Maximum group title length, in characters.
pub const MAX_GROUP_TITLE_LEN: usize = 100;
/// Maximum group description length, in characters.
pub const MAX_GROUP_DESCRIPTION_LEN: usize = 1000;
/// Maximum profile full name length, in characters.
pub const MAX_FULL_NAME_LEN: usize = 100;
/// Maximum profile bio length, in characters.
pub const MAX_BIO_LEN: usize = 500;
/// Maximum avatar URL length, in characters.
pub const MAX_AVATAR_URL_LEN: usize = 500;
/// Maximum report reason length, in characters.
pub const MAX_REPORT_REASON_LEN: usize = 1000;
/// Maximum user search term length, in characters.
pub const MAX_SEARCH_TERM_LEN: usize = 100;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;

/// Trims `raw` and checks it is non-empty and at most `max` characters.
///
/// Returns the trimmed text.
pub fn content<'a>(field: &str, raw: &'a str, max: usize) -> Result<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(invalid(format!(
            "{field} is {len} characters, at most {max} allowed"
        )));
    }
    Ok(trimmed)
}

/// Like [`content`], but an empty value is allowed.
pub fn optional_content<'a>(field: &str, raw: &'a str, max: usize) -> Result<&'a str> {
    if raw.trim().is_empty() {
        return Ok("");
    }
    content(field, raw, max)
}

/// 3 to 30 characters of ASCII letters, digits and underscores.
pub fn username(raw: &str) -> Result<&str> {
    if !USERNAME_LEN.contains(&raw.len()) {
        return Err(invalid("username must be 3 to 30 characters".into()));
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(
            "username may only contain letters, digits and underscores".into(),
        ));
    }
    Ok(raw)
}

fn invalid(reason: String) -> SocialnetError {
    SocialnetError::InvalidContent { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed() -> Result<()> {
        assert_eq!(content("post", "  hello  ", 10)?, "hello");
        Ok(())
    }

    #[test]
    fn blank_content_rejected() {
        assert!(matches!(
            content("post", "   ", 10),
            Err(SocialnetError::InvalidContent { .. })
        ));
    }

    #[test]
    fn length_counts_characters_not_bytes() -> Result<()> {
        assert_eq!(content("comment", "ééé", 3)?, "ééé");
        assert!(content("comment", "éééé", 3).is_err());
        Ok(())
    }

    #[test]
    fn optional_allows_empty() -> Result<()> {
        assert_eq!(optional_content("description", "", 10)?, "");
        assert!(optional_content("description", "x".repeat(11).as_str(), 10).is_err());
        Ok(())
    }

    #[test]
    fn usernames() {
        assert!(username("alice_01").is_ok());
        assert!(username("al").is_err());
        assert!(username("alice!").is_err());
        assert!(username(&"a".repeat(31)).is_err());
    }
}
