use serde::Deserialize;
use std::collections::BTreeMap;

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MAX: usize = 60;

const REQUIRED: &str = "This field is required.";

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

pub trait Validate {
    fn validate(&self) -> FieldErrors;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for RegistrationForm {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_username(&mut errors, &self.username);
        if required(&mut errors, "password", &self.password) {
            if let Some(msg) = length_message(&self.password, None, Some(PASSWORD_MAX)) {
                errors.add("password", msg);
            }
        }
        errors
    }
}

impl Validate for LoginForm {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        check_username(&mut errors, &self.username);
        required(&mut errors, "password", &self.password);
        errors
    }
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    if required(errors, "username", username) {
        if let Some(msg) = length_message(username, Some(USERNAME_MIN), Some(USERNAME_MAX)) {
            errors.add("username", msg);
        }
    }
}

// Records the "required" error and returns false when the value is blank.
// Later checks on the same field only run when this passes.
fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn length_message(value: &str, min: Option<usize>, max: Option<usize>) -> Option<String> {
    let len = value.chars().count();
    let too_short = min.is_some_and(|m| len < m);
    let too_long = max.is_some_and(|m| len > m);
    if !too_short && !too_long {
        return None;
    }

    match (min, max) {
        (Some(min), Some(max)) => Some(format!("Field must be between {} and {} characters long.", min, max)),
        (Some(min), None) => Some(format!("Field must be at least {} characters long.", min)),
        (None, Some(max)) => Some(format!("Field cannot be longer than {} characters.", max)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, password: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(registration("sita", "secret").validate().is_empty());
    }

    #[test]
    fn test_required_fields() {
        let errors = registration("   ", "").validate();
        assert_eq!(errors.get("username"), [REQUIRED.to_string()]);
        assert_eq!(errors.get("password"), [REQUIRED.to_string()]);
    }

    #[test]
    fn test_username_length_bounds() {
        let msg = "Field must be between 2 and 20 characters long.";
        assert_eq!(registration("a", "pw").validate().get("username"), [msg.to_string()]);
        assert_eq!(registration(&"a".repeat(21), "pw").validate().get("username"), [msg.to_string()]);
        assert!(registration("ab", "pw").validate().is_empty());
        assert!(registration(&"a".repeat(20), "pw").validate().is_empty());
    }

    #[test]
    fn test_username_length_counts_characters() {
        // 20 characters, 60 bytes
        assert!(registration(&"न".repeat(20), "pw").validate().is_empty());
        assert!(!registration(&"न".repeat(21), "pw").validate().is_empty());
    }

    #[test]
    fn test_registration_password_max() {
        let errors = registration("sita", &"x".repeat(61)).validate();
        assert_eq!(errors.get("password"), ["Field cannot be longer than 60 characters.".to_string()]);
    }

    #[test]
    fn test_login_password_has_no_max() {
        let form = LoginForm {
            username: "sita".into(),
            password: "x".repeat(100),
        };
        assert!(form.validate().is_empty());
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let form: LoginForm = serde_json::from_str("{}").unwrap();
        assert_eq!(form.validate().get("username"), [REQUIRED.to_string()]);
    }
}
