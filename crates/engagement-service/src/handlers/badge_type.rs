//! 徽章类型 API 处理器
//!
//! 读取需登录，写入仅限管理员

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    dto::{BadgeTypeRequest, BadgeTypeResponse, ListQuery, Page},
    error::Result,
    extract::ApiJson,
    state::AppState,
};

/// GET /api/v1/badgetypes/?org=
pub async fn list_badge_types(
    State(state): State<AppState>,
    _auth: AuthUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<BadgeTypeResponse>>> {
    let page = query.page_request(&state.api)?;

    let (items, count) = state.badges.list_badge_types(query.org, Some(page)).await?;
    let results = items.into_iter().map(Into::into).collect();

    Ok(Json(Page::new(results, count, page, &uri)?))
}

/// POST /api/v1/badgetypes/
pub async fn create_badge_type(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<BadgeTypeRequest>,
) -> Result<(StatusCode, Json<BadgeTypeResponse>)> {
    auth.require_staff()?;

    let created = state.badges.create_badge_type(&req.into_new()?).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/v1/badgetypes/{id}/
pub async fn get_badge_type(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<BadgeTypeResponse>> {
    let badge_type = state.badges.get_badge_type(id).await?;
    Ok(Json(badge_type.into()))
}

/// PUT /api/v1/badgetypes/{id}/
pub async fn update_badge_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<BadgeTypeRequest>,
) -> Result<Json<BadgeTypeResponse>> {
    auth.require_staff()?;

    let updated = state.badges.update_badge_type(id, &req.into_new()?).await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/v1/badgetypes/{id}/
pub async fn delete_badge_type(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_staff()?;

    state.badges.delete_badge_type(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
