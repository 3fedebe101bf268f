//! 用户 API 处理器

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::{
    auth::AuthUser,
    dto::{
        ChangePasswordRequest, CreateUserRequest, EmptyResponse, TokenResponse,
        UserDetailResponse, required, required_text,
    },
    error::Result,
    extract::ApiJson,
    state::AppState,
};

/// 注册用户
///
/// POST /api/v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<Json<TokenResponse>> {
    req.validate()?;
    let full_name = required_text(req.full_name, "full_name")?;
    let email = required_text(req.email, "email")?;
    let password = required_text(req.password, "password")?;

    let (user, token) = state
        .users
        .create_user(&full_name, &email, &password)
        .await?;

    Ok(Json(TokenResponse { id: user.id, token }))
}

/// 获取用户及档案
///
/// GET /api/v1/users/user/{user_id}/
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<UserDetailResponse>> {
    auth.require_owner_or_staff(user_id)?;

    let detail = state.users.get_user_detail(user_id).await?;
    Ok(Json(detail.into()))
}

/// 修改密码
///
/// POST /api/v1/users/user/{user_id}/password/
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<EmptyResponse>> {
    auth.require_owner_or_staff(user_id)?;

    let current = required(req.current_password, "current_password")?;
    let new_password = required_text(req.new_password, "new_password")?;
    let new_password2 = required_text(req.new_password2, "new_password2")?;

    state
        .users
        .change_password(user_id, &current, &new_password, &new_password2)
        .await?;

    Ok(Json(EmptyResponse::default()))
}
