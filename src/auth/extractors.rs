use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::SessionUser, jwt::JwtKeys};
use crate::error::AppError;

fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
}

/// Requires a valid `Authorization: Bearer <token>` header.
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthenticated("Access denied. No token provided.".into()))?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(user) => Ok(AuthUser(user)),
            Err(_) => {
                warn!("invalid or expired token");
                Err(AppError::Unauthenticated("Invalid or expired token".into()))
            }
        }
    }
}

/// Identifies the caller when a valid token is present; never rejects.
pub struct MaybeAuthUser(pub Option<SessionUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuthUser(
            bearer_token(parts).and_then(|t| keys.try_verify(t)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = auth {
            builder = builder.header("Authorization", v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_user_accepts_valid_bearer() {
        let state = AppState::fake();
        let id = Uuid::new_v4();
        let token = state.jwt.issue(id, "erin", false).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AuthUser(user) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name, "erin");
    }

    #[tokio::test]
    async fn auth_user_rejects_missing_header() {
        let state = AppState::fake();
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn maybe_auth_user_degrades_to_anonymous() {
        let state = AppState::fake();
        let mut parts = parts_with(Some("Bearer garbage"));
        let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
