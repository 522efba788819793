use std::sync::LazyLock;

use regex::Regex;

use crate::constants::credentials::{PASSWORD_MIN_LEN, USERNAME_MAX_LEN, USERNAME_MIN_LEN};

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "^[A-Za-z0-9_]{{{USERNAME_MIN_LEN},{USERNAME_MAX_LEN}}}$"
    ))
    .expect("username pattern is valid")
});

/// Returns true if `s` is 3-20 ASCII letters, digits or underscores.
///
/// Surrounding whitespace is not stripped here; callers trim before validating.
#[must_use]
pub fn valid_username(s: &str) -> bool {
    USERNAME_RE.is_match(s)
}

/// Returns true if `s` has at least 8 characters including one lowercase
/// letter, one uppercase letter and one digit.
#[must_use]
pub fn valid_password(s: &str) -> bool {
    s.chars().count() >= PASSWORD_MIN_LEN
        && s.chars().any(|c| c.is_ascii_lowercase())
        && s.chars().any(|c| c.is_ascii_uppercase())
        && s.chars().any(|c| c.is_ascii_digit())
}
