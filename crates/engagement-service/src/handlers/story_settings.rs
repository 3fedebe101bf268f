//! 故事设置 API 处理器
//!
//! 读取公开，修改仅限管理员

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::{
    auth::AuthUser,
    dto::{StorySettingsResponse, UpdateStorySettingsRequest},
    error::Result,
    extract::ApiJson,
    state::AppState,
};

/// GET /api/v1/storysettings/story/{story_id}/
pub async fn get_story_settings(
    State(state): State<AppState>,
    Path(story_id): Path<i64>,
) -> Result<Json<StorySettingsResponse>> {
    let settings = state.stories.get_settings(story_id).await?;
    Ok(Json(settings.into()))
}

/// PATCH /api/v1/storysettings/story/{story_id}/
pub async fn update_story_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(story_id): Path<i64>,
    ApiJson(req): ApiJson<UpdateStorySettingsRequest>,
) -> Result<Json<StorySettingsResponse>> {
    auth.require_staff()?;
    req.validate()?;

    let settings = state
        .stories
        .update_settings(story_id, &req.into())
        .await?;
    Ok(Json(settings.into()))
}
