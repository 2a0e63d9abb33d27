use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use swiftair_core::model::user::{Role, User};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<bool>,
}

/// Sign a token for the user. Tokens always carry an expiry; `reset` scopes
/// the token to the password-reset flow.
pub fn issue_token(
    user: &User,
    secret: &str,
    expiration_seconds: u64,
    reset: bool,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.as_str().to_string(),
        exp: (Utc::now() + Duration::seconds(expiration_seconds as i64)).timestamp() as usize,
        reset: reset.then_some(true),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

/// The caller resolved from the bearer token: decoded claims plus the stored
/// user record the permission checks run against.
pub struct CurrentUser {
    pub user: User,
    pub claims: Claims,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                ApiError::AuthenticationError(
                    "Authorization required. Please sign in again.".to_string(),
                )
            })?;

        // Validation::default() enforces the exp claim.
        let token_data = decode::<Claims>(
            bearer.token(),
            &DecodingKey::from_secret(state.auth.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| {
            ApiError::AuthenticationError("Invalid token. Please sign in again.".to_string())
        })?;
        let claims = token_data.claims;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            ApiError::AuthenticationError("Invalid token. Please sign in again.".to_string())
        })?;
        Role::parse(&claims.role).ok_or_else(|| {
            ApiError::AuthenticationError("Invalid token. Please sign in again.".to_string())
        })?;

        let user = state
            .store
            .find_user(user_id)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))?;

        Ok(Self { user, claims })
    }
}
