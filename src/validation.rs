//! Input validation for account fields and user-authored quest text

use std::collections::HashSet;

pub const USERNAME_MIN_LEN: usize = 2;
pub const USERNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const QUEST_TITLE_MAX_BYTES: usize = 120;
pub const QUEST_DESCRIPTION_MAX_BYTES: usize = 1000;

/// Validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username is too short (minimum {min} characters)")]
    UsernameTooShort { min: usize },

    #[error("Username is too long (maximum {max} characters)")]
    UsernameTooLong { max: usize },

    #[error("Username cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Username contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Username is a reserved system name")]
    Reserved,

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be between {min} and {max} characters")]
    PasswordLength { min: usize, max: usize },

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long (max {max_bytes} bytes)")]
    TooLong {
        field: &'static str,
        max_bytes: usize,
    },
}

/// Get set of reserved usernames that should not be allowed
fn reserved_names() -> HashSet<&'static str> {
    [
        // System/admin terms
        "admin", "administrator", "root", "system", "sysop", "operator",
        "guest", "anonymous", "null", "none",
        // Names that read like commands in the CLI
        "init", "register", "login", "logout", "profile", "quests", "skills",
        "shop", "leaderboard", "dungeon", "help",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a username. Returns the accepted name unchanged.
pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();
    let length = trimmed.chars().count();

    if length < USERNAME_MIN_LEN {
        return Err(ValidationError::UsernameTooShort {
            min: USERNAME_MIN_LEN,
        });
    }
    if length > USERNAME_MAX_LEN {
        return Err(ValidationError::UsernameTooLong {
            max: USERNAME_MAX_LEN,
        });
    }
    if trimmed != username {
        return Err(ValidationError::InvalidWhitespace);
    }
    if reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(ValidationError::Reserved);
    }

    let invalid: HashSet<char> = trimmed
        .chars()
        .filter(|c| !(c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.'))
        .collect();
    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.into_iter().collect();
        chars.sort_unstable();
        return Err(ValidationError::InvalidCharacters {
            chars: chars.into_iter().collect(),
        });
    }

    Ok(trimmed.to_string())
}

/// Minimal structural check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');
    if local.is_empty() || !domain_ok || trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&length) {
        return Err(ValidationError::PasswordLength {
            min: PASSWORD_MIN_LEN,
            max: PASSWORD_MAX_LEN,
        });
    }
    Ok(())
}

/// Strip control characters (newlines and tabs survive) and enforce a byte limit.
pub fn sanitize_text(
    field: &'static str,
    content: &str,
    max_bytes: usize,
    required: bool,
) -> Result<String, ValidationError> {
    let sanitized: String = content
        .trim()
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect();
    if required && sanitized.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if sanitized.len() > max_bytes {
        return Err(ValidationError::TooLong { field, max_bytes });
    }
    Ok(sanitized)
}

pub fn validate_quest_title(title: &str) -> Result<String, ValidationError> {
    sanitize_text("Quest title", title, QUEST_TITLE_MAX_BYTES, true)
}

pub fn validate_quest_description(description: &str) -> Result<String, ValidationError> {
    sanitize_text(
        "Quest description",
        description,
        QUEST_DESCRIPTION_MAX_BYTES,
        false,
    )
}
