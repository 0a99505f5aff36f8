//! Login, signup and logout flows built on the API client.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthResponse, Role, User};

use super::session::Session;
use super::store::StoreError;

/// Login endpoint, relative to the base URL
pub const LOGIN_ENDPOINT: &str = "auth/login/";

/// Registration endpoint, relative to the base URL
pub const REGISTER_ENDPOINT: &str = "auth/register/";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Message suitable for an inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Registration form as submitted by the signup page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub school_name: String,
    pub role: Role,
}

impl SignupForm {
    /// Local checks run before anything is sent.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.password != self.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        let required = [
            &self.full_name,
            &self.email,
            &self.password,
            &self.school_name,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(AuthError::Validation(
                "Please fill in all required fields".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub message: Option<String>,
}

impl LoginOutcome {
    /// Where the user should be sent next
    pub fn landing_path(&self) -> &'static str {
        self.user.role.landing_path()
    }
}

pub struct AuthService {
    api: ApiClient,
    session: Session,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        let session = Session::new(api.store().clone());
        Self { api, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password required".to_string(),
            ));
        }

        // Credentials are replaced wholesale, a stale token must not ride along
        self.session.clear()?;

        let response: AuthResponse = self
            .api
            .post_json(LOGIN_ENDPOINT, &LoginRequest { email, password })
            .await?;
        self.establish(response)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<LoginOutcome, AuthError> {
        form.validate()?;
        self.session.clear()?;

        let response: AuthResponse = self.api.post_json(REGISTER_ENDPOINT, form).await?;
        self.establish(response)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.session.clear()?;
        info!("Logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        Ok(self.session.user()?)
    }

    fn establish(&self, response: AuthResponse) -> Result<LoginOutcome, AuthError> {
        let (tokens, user) = match (response.tokens, response.user) {
            (Some(tokens), Some(user)) => (tokens, user),
            _ => {
                return Err(AuthError::InvalidResponse(
                    "missing tokens or user".to_string(),
                ))
            }
        };
        self.session.save(&tokens, &user)?;
        info!(user_id = %user.id, role = user.role.display_name(), "Logged in");
        Ok(LoginOutcome {
            user,
            message: response.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SignupForm {
        SignupForm {
            full_name: "Hamza Ali".to_string(),
            email: "hamza@example.com".to_string(),
            password: "s3cret!".to_string(),
            confirm_password: "s3cret!".to_string(),
            school_name: "City School".to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn test_signup_form_valid() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_signup_form_password_mismatch() {
        let mut f = form();
        f.confirm_password = "other".to_string();
        let err = f.validate().unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn test_signup_form_missing_school() {
        let mut f = form();
        f.school_name = "  ".to_string();
        let err = f.validate().unwrap_err();
        assert_eq!(err.user_message(), "Please fill in all required fields");
    }

    #[test]
    fn test_signup_form_serializes_role_lowercase() {
        let json = serde_json::to_value(form()).unwrap();
        assert_eq!(json["role"], "student");
        assert_eq!(json["school_name"], "City School");
    }
}
