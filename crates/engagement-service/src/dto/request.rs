//! 请求 DTO
//!
//! 字段多为 Option，以便缺失字段返回字段级错误而不是反序列化失败

use serde::Deserialize;
use validator::Validate;

use crate::error::{ApiError, Result};
use crate::models::{BadgeItemType, NewBadgeType, StorySettingsUpdate};
use crate::service::StoryActionInput;

/// 必填字段
pub fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| ApiError::required(field))
}

/// 必填且非空白的文本字段
pub fn required_text(value: Option<String>, field: &str) -> Result<String> {
    let value = required(value, field)?;
    if value.trim().is_empty() {
        return Err(ApiError::field(field, "This field may not be blank."));
    }
    Ok(value)
}

/// 注册请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(max = 128, message = "Ensure this field has no more than 128 characters."))]
    pub full_name: Option<String>,
    // 邮箱同时作为用户名，受 users.username 长度限制
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub email: Option<String>,
    pub password: Option<String>,
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 修改密码请求
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub new_password2: Option<String>,
}

/// 故事设置部分更新
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStorySettingsRequest {
    #[validate(range(
        min = 0,
        max = 32767,
        message = "Ensure this value is between 0 and 32767."
    ))]
    pub reward_points: Option<i64>,
    pub display_rating: Option<bool>,
}

impl From<UpdateStorySettingsRequest> for StorySettingsUpdate {
    fn from(req: UpdateStorySettingsRequest) -> Self {
        Self {
            // 已由 validate 限定范围
            reward_points: req.reward_points.map(|p| p as i16),
            display_rating: req.display_rating,
        }
    }
}

/// 管理端通用创建请求
#[derive(Debug, Deserialize)]
pub struct StoryActionRequest {
    pub user: Option<i64>,
    pub story: Option<i64>,
    pub score: Option<i64>,
    pub points: Option<i64>,
}

impl From<StoryActionRequest> for StoryActionInput {
    fn from(req: StoryActionRequest) -> Self {
        Self {
            user: req.user,
            story: req.story,
            score: req.score,
            points: req.points,
        }
    }
}

/// 用户维度请求，`user` 取自路径
#[derive(Debug, Default, Deserialize)]
pub struct UserStoryRequest {
    pub story: Option<i64>,
    pub score: Option<i64>,
}

/// 徽章类型创建或整体更新
#[derive(Debug, Deserialize, Validate)]
pub struct BadgeTypeRequest {
    pub org: Option<i64>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 250, message = "Ensure this field has no more than 250 characters."))]
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub image: Option<String>,
    pub is_visible: Option<bool>,
    pub item_type: Option<BadgeItemType>,
    pub item_category: Option<i64>,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub item_count: Option<i32>,
}

impl BadgeTypeRequest {
    pub fn into_new(self) -> Result<NewBadgeType> {
        self.validate()?;

        Ok(NewBadgeType {
            org_id: required(self.org, "org")?,
            title: required_text(self.title, "title")?,
            description: self.description.unwrap_or_default(),
            image: self.image.filter(|image| !image.is_empty()),
            is_visible: self.is_visible.unwrap_or(true),
            item_type: self.item_type.unwrap_or_default(),
            item_category: self.item_category,
            item_count: self.item_count.unwrap_or(1),
        })
    }
}

/// 管理端发放用户徽章
#[derive(Debug, Deserialize)]
pub struct UserBadgeRequest {
    pub badge_type: Option<i64>,
    pub user: Option<i64>,
}
