//! Request / response types for the signup and login routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /signup`.
#[derive(Clone, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password must not be empty"))]
    pub password: String,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Request body for `POST /login`.
#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Confirmation body for `POST /signup`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusMessage {
    pub message: String,
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_passwords_are_accepted() {
        let req = SignupRequest {
            username: "a".into(),
            email: "a@x.com".into(),
            password: "pw".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn malformed_email_is_rejected() {
        let req = SignupRequest {
            username: "a".into(),
            email: "not-an-email".into(),
            password: "pw".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_username_is_rejected() {
        let req = SignupRequest {
            username: "".into(),
            email: "a@x.com".into(),
            password: "pw".into(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn debug_output_never_shows_the_password() {
        let req = SignupRequest {
            username: "a".into(),
            email: "a@x.com".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{req:?}");
        assert!(!printed.contains("hunter2"));
    }
}
