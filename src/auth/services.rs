use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    dto::RegisterRequest,
    password::{hash_password_blocking, verify_password_blocking},
    repo::UserStore,
    repo_types::NewUser,
};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn first_validation_message(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid input".to_string())
}

/// Creates an account; the email is trimmed but otherwise stored verbatim.
pub async fn register(users: &dyn UserStore, mut req: RegisterRequest) -> AppResult<Uuid> {
    req.name = req.name.trim().to_string();
    req.email = req.email.trim().to_string();

    if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    req.validate()
        .map_err(|e| AppError::Validation(first_validation_message(e)))?;
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    if users.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let user = users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
        })
        .await?
        // lost a race with a concurrent registration
        .ok_or(AppError::DuplicateEmail)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user.id)
}

/// Checks credentials and returns the user's id and display name.
pub async fn verify_credentials(
    users: &dyn UserStore,
    email: &str,
    password: &str,
) -> AppResult<(Uuid, String)> {
    let email = email.trim();
    let Some(user) = users.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let ok = verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    Ok((user.id, user.name))
}
