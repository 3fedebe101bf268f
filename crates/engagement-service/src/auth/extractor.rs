//! 当前用户提取器
//!
//! 从 `Authorization: Bearer <token>` 解析用户；缺失或无效时返回 401

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::ApiError;
use crate::state::AppState;

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl AuthUser {
    /// 仅管理员
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// 管理员或路径中的用户本人
    pub fn require_owner_or_staff(&self, user_id: i64) -> Result<(), ApiError> {
        if self.is_staff || self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("缺少认证 Token".to_string()))?;

        let state = AppState::from_ref(state);
        let claims = state.jwt.verify_token(bearer.token())?;

        Ok(Self {
            user_id: claims.user_id()?,
            username: claims.username,
            is_staff: claims.is_staff,
        })
    }
}
