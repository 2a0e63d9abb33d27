use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use swiftair_core::model::user::{Role, User};

use crate::{
    error::ApiError,
    extractor::{issue_token, CurrentUser},
    state::AppState,
};

pub const SECURITY_QUESTIONS: [&str; 5] = [
    "What is your mother's maiden name?",
    "What was the name of your first pet?",
    "In which city were you born?",
    "What is your favorite book?",
    "What was your first school name?",
];

/// Account representation for responses: never exposes hashes; balance and
/// security questions only exist for customers.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q3: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let customer = user.role == Role::Customer;
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            created_at: user.created_at,
            balance: customer.then_some(user.balance),
            q1: if customer { user.q1.clone() } else { None },
            q2: if customer { user.q2.clone() } else { None },
            q3: if customer { user.q3.clone() } else { None },
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(questions))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password-questions", get(forgot_password_questions))
        .route("/forgot-password", post(forgot_password))
        .route("/change-password", post(change_password))
        .route("/me", get(me))
}

async fn questions() -> Json<Value> {
    Json(json!({ "questions": SECURITY_QUESTIONS }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: Option<String>,
    password: Option<String>,
    q1: Option<usize>,
    q2: Option<usize>,
    q3: Option<usize>,
    a1: Option<String>,
    a2: Option<String>,
    a3: Option<String>,
}

fn hash_answer(answer: &str) -> Result<String, ApiError> {
    bcrypt::hash(answer.trim().to_lowercase(), bcrypt::DEFAULT_COST)
        .context("hashing security answer")
        .map_err(ApiError::from)
}

fn verify_answer(answer: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(h) => bcrypt::verify(answer.trim().to_lowercase(), h).unwrap_or(false),
        None => false,
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = req.username.as_deref().unwrap_or("").trim().to_string();
    let password = req.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::ValidationError(
            "Username and password required".to_string(),
        ));
    }

    let (q1, q2, q3) = match (req.q1, req.q2, req.q3) {
        (Some(q1), Some(q2), Some(q3)) => (q1, q2, q3),
        _ => {
            return Err(ApiError::ValidationError(
                "All 3 security questions and answers required".to_string(),
            ))
        }
    };
    let (a1, a2, a3) = match (&req.a1, &req.a2, &req.a3) {
        (Some(a1), Some(a2), Some(a3)) if !a1.is_empty() && !a2.is_empty() && !a3.is_empty() => {
            (a1, a2, a3)
        }
        _ => {
            return Err(ApiError::ValidationError(
                "All 3 security questions and answers required".to_string(),
            ))
        }
    };
    let question = |idx: usize| {
        SECURITY_QUESTIONS.get(idx).map(|q| q.to_string()).ok_or_else(|| {
            ApiError::ValidationError("Invalid security question selection".to_string())
        })
    };

    if state
        .store
        .find_user_by_username(&username)
        .await
        .map_err(ApiError::from)?
        .is_some()
    {
        return Err(ApiError::ConflictError(
            "Username already exists".to_string(),
        ));
    }

    let password_hash =
        bcrypt::hash(&password, bcrypt::DEFAULT_COST).context("hashing password")?;
    let user = User {
        id: Uuid::new_v4(),
        username,
        password_hash,
        role: Role::Customer,
        balance: state.rules.default_customer_balance,
        q1: Some(question(q1)?),
        q2: Some(question(q2)?),
        q3: Some(question(q3)?),
        a1_hash: Some(hash_answer(a1)?),
        a2_hash: Some(hash_answer(a2)?),
        a3_hash: Some(hash_answer(a3)?),
        created_at: Utc::now(),
    };
    state.store.insert_user(&user).await.map_err(|e| match e {
        swiftair_core::StoreError::Duplicate(_) => {
            ApiError::ConflictError("Username already exists".to_string())
        }
        other => other.into(),
    })?;

    let token = issue_token(&user, &state.auth.secret, state.auth.expiration, false)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created",
            "token": token,
            "user": UserResponse::from(&user),
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = req.username.as_deref().unwrap_or("").trim().to_string();
    let password = req.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::ValidationError(
            "Username and password required".to_string(),
        ));
    }

    let user = state
        .store
        .find_user_by_username(&username)
        .await
        .map_err(ApiError::from)?;
    let user = match user {
        Some(u) if bcrypt::verify(&password, &u.password_hash).unwrap_or(false) => u,
        _ => {
            return Err(ApiError::AuthenticationError(
                "Invalid credentials".to_string(),
            ))
        }
    };

    let token = issue_token(&user, &state.auth.secret, state.auth.expiration, false)?;
    Ok(Json(json!({
        "token": token,
        "user": UserResponse::from(&user),
    })))
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordQuestionsQuery {
    username: Option<String>,
}

async fn forgot_password_questions(
    State(state): State<AppState>,
    Query(query): Query<ForgotPasswordQuestionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let username = query.username.as_deref().unwrap_or("").trim().to_string();
    if username.is_empty() {
        return Err(ApiError::ValidationError("Username required".to_string()));
    }

    let user = state
        .store
        .find_user_by_username(&username)
        .await
        .map_err(ApiError::from)?
        .filter(|u| u.role == Role::Customer);
    match user {
        Some(u) if u.q1.is_some() && u.q2.is_some() && u.q3.is_some() => Ok(Json(json!({
            "questions": [u.q1, u.q2, u.q3],
        }))),
        _ => Err(ApiError::NotFoundError("User not found".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    username: Option<String>,
    a1: Option<String>,
    a2: Option<String>,
    a3: Option<String>,
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = req.username.as_deref().unwrap_or("").trim().to_string();
    let (a1, a2, a3) = match (&req.a1, &req.a2, &req.a3) {
        (Some(a1), Some(a2), Some(a3)) if !username.is_empty() => (a1, a2, a3),
        _ => {
            return Err(ApiError::ValidationError(
                "Username and all 3 answers required".to_string(),
            ))
        }
    };

    let user = state
        .store
        .find_user_by_username(&username)
        .await
        .map_err(ApiError::from)?
        .filter(|u| u.role == Role::Customer)
        .ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))?;

    let all_correct = verify_answer(a1, user.answer_hash(1))
        && verify_answer(a2, user.answer_hash(2))
        && verify_answer(a3, user.answer_hash(3));
    if !all_correct {
        return Err(ApiError::AuthenticationError(
            "Incorrect answers to security questions".to_string(),
        ));
    }

    let token = issue_token(&user, &state.auth.secret, state.auth.expiration, true)?;
    Ok(Json(json!({
        "message": "Answers verified. Use this token to set new password.",
        "token": token,
        "user": UserResponse::from(&user),
    })))
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    new_password: Option<String>,
    target_username: Option<String>,
}

async fn change_password(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let new_password = match req.new_password.filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => {
            return Err(ApiError::ValidationError(
                "New password required".to_string(),
            ))
        }
    };

    // Admins may rotate another user's password; reset tokens and regular
    // sessions change their own.
    let caller_id = caller.user.id;
    let reset = caller.claims.reset.unwrap_or(false);
    let mut target = match &req.target_username {
        Some(target_username) if caller.is_admin() && !reset => state
            .store
            .find_user_by_username(target_username)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::NotFoundError("Target user not found".to_string()))?,
        _ => caller.user,
    };

    let changed_other = target.id != caller_id;
    target.password_hash =
        bcrypt::hash(&new_password, bcrypt::DEFAULT_COST).context("hashing password")?;
    let username = target.username.clone();
    state
        .store
        .update_user(&target)
        .await
        .map_err(ApiError::from)?;

    let message = if reset {
        "Password updated. You can now sign in.".to_string()
    } else if changed_other {
        format!("Password updated for {username}")
    } else {
        "Password updated".to_string()
    };
    Ok(Json(json!({ "message": message })))
}

async fn me(caller: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&caller.user))
}
