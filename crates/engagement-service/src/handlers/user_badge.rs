//! 用户徽章 API 处理器

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    dto::{ListQuery, Page, UserBadgeRequest, UserBadgeResponse},
    error::Result,
    extract::ApiJson,
    repository::UserBadgeFilter,
    state::AppState,
};

/// GET /api/v1/userbadges/?user=&badge_type=
pub async fn list_user_badges(
    State(state): State<AppState>,
    auth: AuthUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<UserBadgeResponse>>> {
    auth.require_staff()?;
    let page = query.page_request(&state.api)?;

    let (items, count) = state
        .badges
        .list_user_badges(query.user_badge_filter(), Some(page))
        .await?;
    let results = items.into_iter().map(Into::into).collect();

    Ok(Json(Page::new(results, count, page, &uri)?))
}

/// POST /api/v1/userbadges/
pub async fn create_user_badge(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<UserBadgeRequest>,
) -> Result<(StatusCode, Json<UserBadgeResponse>)> {
    auth.require_staff()?;

    let created = state
        .badges
        .create_user_badge(req.user, req.badge_type)
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/v1/userbadges/{id}/
pub async fn get_user_badge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<UserBadgeResponse>> {
    auth.require_staff()?;

    let user_badge = state.badges.get_user_badge(id).await?;
    auth.require_owner_or_staff(user_badge.user_id)?;
    Ok(Json(user_badge.into()))
}

/// DELETE /api/v1/userbadges/{id}/
pub async fn delete_user_badge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_staff()?;

    state.badges.delete_user_badge(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 用户已获得的徽章
///
/// GET /api/v1/userbadges/user/{user_id}/?org=
pub async fn list_badges_for_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserBadgeResponse>>> {
    auth.require_owner_or_staff(user_id)?;

    let filter = UserBadgeFilter {
        user: Some(user_id),
        badge_type: query.badge_type,
        org: query.org,
    };
    let (items, _) = state.badges.list_user_badges(filter, None).await?;

    Ok(Json(items.into_iter().map(Into::into).collect()))
}
