//! One-shot messages carried across a redirect in a signed cookie.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};

const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Success,
    Danger,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub category: Category,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    AccountCreated,
    LoginSucceeded,
    LoginFailed,
}

impl Flash {
    fn code(self) -> &'static str {
        match self {
            Flash::AccountCreated => "account-created",
            Flash::LoginSucceeded => "login-succeeded",
            Flash::LoginFailed => "login-failed",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "account-created" => Some(Flash::AccountCreated),
            "login-succeeded" => Some(Flash::LoginSucceeded),
            "login-failed" => Some(Flash::LoginFailed),
            _ => None,
        }
    }

    pub fn message(self) -> Message {
        match self {
            Flash::AccountCreated => Message {
                category: Category::Success,
                text: "Your account has been created!",
            },
            Flash::LoginSucceeded => Message {
                category: Category::Success,
                text: "Login successful!",
            },
            Flash::LoginFailed => Message {
                category: Category::Danger,
                text: "Login unsuccessful. Please check your username and password.",
            },
        }
    }
}

/// Queues `flash` for the next page rendered for this client.
pub fn push(jar: SignedCookieJar, flash: Flash) -> SignedCookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, flash.code()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Takes the pending message, if any, and clears it from the jar.
/// Cookies with a bad signature or unknown code are dropped silently.
pub fn take(jar: SignedCookieJar) -> (SignedCookieJar, Option<Message>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };
    let message = Flash::from_code(cookie.value()).map(Flash::message);
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Key;

    #[test]
    fn test_codes_round_trip() {
        for flash in [Flash::AccountCreated, Flash::LoginSucceeded, Flash::LoginFailed] {
            assert_eq!(Flash::from_code(flash.code()), Some(flash));
        }
        assert_eq!(Flash::from_code("nope"), None);
    }

    #[test]
    fn test_push_then_take() {
        let jar = SignedCookieJar::new(Key::generate());
        let jar = push(jar, Flash::AccountCreated);

        let (jar, message) = take(jar);
        let message = message.unwrap();
        assert_eq!(message.category, Category::Success);
        assert_eq!(message.text, "Your account has been created!");

        let (_, again) = take(jar);
        assert!(again.is_none());
    }

    #[test]
    fn test_login_failed_is_danger() {
        assert_eq!(Flash::LoginFailed.message().category.as_str(), "danger");
    }
}
