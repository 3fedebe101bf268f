//! 故事互动 API 处理器
//!
//! 收藏、评分、阅读、奖励四类资源共用一组泛型处理器：
//! 管理端集合接口按实体类型实例化，用户维度接口按资源分别实现。

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    dto::{
        CountResponse, ListQuery, Page, StoryActionRequest, StoryActionView, UserBadgeResponse,
        UserStoryRequest,
    },
    error::Result,
    extract::ApiJson,
    models::{StorySummary, StoryUserEntity},
    repository::{StoryActionEntity, StoryUserFilter},
    state::AppState,
};

type FlatView = StoryActionView<i64>;
type DetailedView = StoryActionView<StorySummary>;

fn created_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// 管理端分页列表
///
/// GET /api/v1/{resource}/?user=&story=
pub async fn list<E: StoryActionEntity>(
    State(state): State<AppState>,
    auth: AuthUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<FlatView>>> {
    auth.require_staff()?;
    let page = query.page_request(&state.api)?;

    let (items, count) = state
        .engagement
        .list::<E>(query.story_user_filter(), Some(page))
        .await?;
    let results = items.iter().map(FlatView::flat).collect();

    Ok(Json(Page::new(results, count, page, &uri)?))
}

/// 管理端创建
///
/// POST /api/v1/{resource}/
pub async fn create<E: StoryActionEntity>(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<StoryActionRequest>,
) -> Result<(StatusCode, Json<FlatView>)> {
    auth.require_staff()?;

    let created = state.engagement.create::<E>(req.into()).await?;
    Ok((StatusCode::CREATED, Json(FlatView::flat(&created))))
}

/// GET /api/v1/{resource}/{id}/
pub async fn retrieve<E: StoryActionEntity>(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<FlatView>> {
    auth.require_staff()?;

    let entity = state.engagement.get::<E>(id).await?;
    auth.require_owner_or_staff(entity.user_id())?;
    Ok(Json(FlatView::flat(&entity)))
}

/// DELETE /api/v1/{resource}/{id}/
pub async fn destroy<E: StoryActionEntity>(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_staff()?;

    let entity = state.engagement.get::<E>(id).await?;
    auth.require_owner_or_staff(entity.user_id())?;
    state.engagement.delete::<E>(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 用户维度详细列表，`?user=` 与路径用户不一致时结果为空
///
/// GET /api/v1/{resource}/user/{user_id}/?story=
pub async fn list_for_user<E: StoryActionEntity>(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DetailedView>>> {
    auth.require_owner_or_staff(user_id)?;
    if query.user.is_some_and(|user| user != user_id) {
        return Ok(Json(vec![]));
    }

    let filter = StoryUserFilter {
        user: Some(user_id),
        story: query.story,
    };
    let (items, _) = state.engagement.list_detailed::<E>(filter, None).await?;

    Ok(Json(
        items
            .into_iter()
            .map(|(entity, story)| DetailedView::detailed(&entity, story))
            .collect(),
    ))
}

/// 收藏故事，已收藏时返回 200
///
/// POST /api/v1/storybookmarks/user/{user_id}/
pub async fn create_user_bookmark(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UserStoryRequest>,
) -> Result<(StatusCode, Json<DetailedView>)> {
    auth.require_owner_or_staff(user_id)?;

    let (bookmark, story, created) = state
        .engagement
        .bookmark_story(user_id, req.story)
        .await?;
    Ok((
        created_status(created),
        Json(DetailedView::detailed(&bookmark, story)),
    ))
}

/// 取消收藏，请求体为空或缺少 story 时返回 0
///
/// DELETE /api/v1/storybookmarks/user/{user_id}/
pub async fn delete_user_bookmark(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UserStoryRequest>,
) -> Result<Json<CountResponse>> {
    auth.require_owner_or_staff(user_id)?;

    let count = state.engagement.remove_bookmark(user_id, req.story).await?;
    Ok(Json(CountResponse { count }))
}

/// 评分，已评分时覆盖并返回 200
///
/// POST /api/v1/storyratings/user/{user_id}/
pub async fn create_user_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UserStoryRequest>,
) -> Result<(StatusCode, Json<DetailedView>)> {
    auth.require_owner_or_staff(user_id)?;

    let (rating, story, created) = state
        .engagement
        .rate_story(user_id, req.story, req.score)
        .await?;
    Ok((
        created_status(created),
        Json(DetailedView::detailed(&rating, story)),
    ))
}

/// 记录阅读，返回本次新获得的徽章
///
/// POST /api/v1/storyreads/user/{user_id}/
pub async fn create_user_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UserStoryRequest>,
) -> Result<(StatusCode, Json<Vec<UserBadgeResponse>>)> {
    auth.require_owner_or_staff(user_id)?;

    let (badges, created) = state.engagement.read_story(user_id, req.story).await?;
    Ok((
        created_status(created),
        Json(badges.into_iter().map(Into::into).collect()),
    ))
}
