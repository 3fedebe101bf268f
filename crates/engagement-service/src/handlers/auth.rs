//! 认证 API 处理器

use axum::{Json, extract::State};

use crate::{
    auth::AuthUser,
    dto::{LoginRequest, TokenResponse, UserIdResponse, required},
    error::Result,
    extract::ApiJson,
    state::AppState,
};

/// 登录
///
/// POST /api/v1/auth/login/
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;

    let (user, token) = state.users.login(&username, &password).await?;
    Ok(Json(TokenResponse { id: user.id, token }))
}

/// 当前用户 ID
///
/// GET /api/v1/auth/me/
pub async fn me(auth: AuthUser) -> Json<UserIdResponse> {
    Json(UserIdResponse { id: auth.user_id })
}
