use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
        },
        jwt::{AuthUser, TokenKeys},
        password::{hash_password, verify_password},
        repo::{unique_violation, User},
        validate,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

const USERNAME_TAKEN: &str = "Username is already taken. Please choose a different one.";
const EMAIL_TAKEN: &str = "An account with this email already exists. Please use a different email.";

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    validate::validate_registration(&payload.username, &payload.email, &payload.password)?;

    // Two separate uniqueness lookups; the insert below catches the race
    // where a concurrent registration wins between check and write.
    match User::find_by_username(&state.db, &payload.username).await {
        Ok(Some(_)) => {
            warn!(username = %payload.username, "username taken");
            return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return Err(ApiError::internal(
                "User creation failed. (Internal server error)",
                e.into(),
            ));
        }
    }

    match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::internal(
                "User creation failed. (Internal server error)",
                e.into(),
            ));
        }
    }

    let hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "hash_password failed");
            return Err(ApiError::internal(
                "User creation failed. (Internal server error)",
                e,
            ));
        }
    };

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash).await {
        Ok(u) => u,
        Err(e) => {
            if let Some(constraint) = unique_violation(&e) {
                warn!(constraint = %constraint, "duplicate registration lost the race");
                let message = if constraint == "users_username_key" {
                    USERNAME_TAKEN
                } else {
                    EMAIL_TAKEN
                };
                return Err(ApiError::Conflict(message.into()));
            }
            error!(error = %e, "create user failed");
            return Err(ApiError::internal(
                "User creation failed. (Internal server error)",
                e.into(),
            ));
        }
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            created_user: user.into(),
            message: "User created successfully.".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    validate::validate_login_email(&payload.email)?;

    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::NotFound("User not found!".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::internal(
                "User login failed. (Internal server error)",
                e.into(),
            ));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "verify_password failed");
            return Err(ApiError::internal(
                "User login failed. (Internal server error)",
                e,
            ));
        }
    };

    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    // Re-login while already active is allowed; this is a plain overwrite.
    if let Err(e) = User::set_active(&state.db, user.id, true).await {
        error!(error = %e, "set_active failed");
        return Err(ApiError::internal(
            "User login failed. (Internal server error)",
            e.into(),
        ));
    }

    let keys = TokenKeys::from_ref(&state);
    let token = match keys.sign(user.id) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return Err(ApiError::internal(
                "User login failed. (Internal server error)",
                e,
            ));
        }
    };

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        success: true,
        token,
    }))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LogoutResponse>, ApiError> {
    let user = match User::find_by_id(&state.db, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = %user_id, "logout for unknown user");
            return Err(ApiError::NotFound("User not found!".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_id failed");
            return Err(ApiError::internal(
                "User logout failed. (Internal server error)",
                e.into(),
            ));
        }
    };

    if let Err(e) = User::set_active(&state.db, user.id, false).await {
        error!(error = %e, "set_active failed");
        return Err(ApiError::internal(
            "User logout failed. (Internal server error)",
            e.into(),
        ));
    }

    info!(user_id = %user.id, "user logged out");
    Ok(Json(LogoutResponse {
        success: true,
        message: "User logged out successfully.".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::token_with_expiry;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn whoami(AuthUser(user_id): AuthUser) -> Json<Value> {
        Json(json!({ "userId": user_id }))
    }

    /// Auth routes plus a gate-only probe route that never touches the pool.
    fn test_app() -> Router {
        Router::new()
            .merge(auth_routes())
            .route("/protected", post(whoami))
            .with_state(AppState::fake())
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = test_app().oneshot(request).await.expect("request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn register_rejects_empty_fields_with_403() {
        let (status, body) = send(post_json(
            "/register",
            json!({ "username": "", "email": "", "password": "" }),
        ))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["errorMessage"],
            "All fields are mandatory. Please provide a username, email, and password."
        );
    }

    #[tokio::test]
    async fn register_rejects_short_username() {
        let (status, body) = send(post_json(
            "/register",
            json!({ "username": "t", "email": "validuser@gmail.com", "password": "TestPass123." }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["errorMessage"],
            "Username is required and must be at least 4 characters long."
        );
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let (status, body) = send(post_json(
            "/register",
            json!({ "username": "validUser", "email": "invalid-email", "password": "TestPass123." }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "Please enter a valid email.");
    }

    #[tokio::test]
    async fn register_rejects_weak_password() {
        let (status, body) = send(post_json(
            "/register",
            json!({ "username": "validUser", "email": "validuser@gmail.com", "password": "short" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["errorMessage"],
            "Password needs to have at least 8 chars and must contain at least one number, one lowercase and one uppercase letter."
        );
    }

    #[tokio::test]
    async fn login_rejects_malformed_email() {
        let (status, body) = send(post_json(
            "/login",
            json!({ "email": "not-an-email", "password": "TestPass123." }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "Please enter a valid email.");
    }

    #[tokio::test]
    async fn gate_rejects_missing_header_with_401() {
        let request = Request::builder()
            .method("POST")
            .uri("/protected")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errorMessage"], "Unauthorized");
    }

    #[tokio::test]
    async fn gate_rejects_expired_token_with_401() {
        let keys = TokenKeys::from_ref(&AppState::fake());
        let expired = token_with_expiry(&keys, 1, -3600);
        let request = Request::builder()
            .method("POST")
            .uri("/protected")
            .header(header::AUTHORIZATION, format!("Bearer {expired}"))
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errorMessage"], "Token has expired");
    }

    #[tokio::test]
    async fn gate_rejects_invalid_token_with_403() {
        let request = Request::builder()
            .method("POST")
            .uri("/protected")
            .header(header::AUTHORIZATION, "Bearer invalidToken")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errorMessage"], "Invalid token");
    }

    #[tokio::test]
    async fn gate_injects_the_decoded_user_id() {
        let keys = TokenKeys::from_ref(&AppState::fake());
        let token = keys.sign(1).expect("sign");
        let request = Request::builder()
            .method("POST")
            .uri("/protected")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], 1);
    }
}
