//! 响应 DTO

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    BadgeItemType, BadgeType, StorySettings, StorySummary, StoryUserEntity, User, UserBadge,
    UserProfile,
};

/// 注册与登录响应
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: i64,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserIdResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub contact_uuid: String,
    pub image: Option<String>,
}

/// 用户详情
#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: Option<ProfileResponse>,
}

impl From<(User, Option<UserProfile>)> for UserDetailResponse {
    fn from((user, profile): (User, Option<UserProfile>)) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            profile: profile.map(|p| ProfileResponse {
                contact_uuid: p.contact_uuid,
                image: p.image,
            }),
        }
    }
}

/// 空对象 `{}`
#[derive(Debug, Default, Serialize)]
pub struct EmptyResponse {}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct StorySettingsResponse {
    pub display_rating: bool,
    pub rating: f64,
}

impl From<StorySettings> for StorySettingsResponse {
    fn from(settings: StorySettings) -> Self {
        Self {
            display_rating: settings.display_rating,
            rating: settings.cached_rating,
        }
    }
}

/// 互动记录表示
///
/// `S` 为 i64 时是扁平表示，为 [`StorySummary`] 时是详细表示
#[derive(Debug, Serialize)]
pub struct StoryActionView<S> {
    pub id: i64,
    pub user: i64,
    pub story: S,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i16>,
}

impl StoryActionView<i64> {
    pub fn flat<E: StoryUserEntity>(entity: &E) -> Self {
        Self::with_story(entity, entity.story_id())
    }
}

impl StoryActionView<StorySummary> {
    pub fn detailed<E: StoryUserEntity>(entity: &E, story: StorySummary) -> Self {
        Self::with_story(entity, story)
    }
}

impl<S> StoryActionView<S> {
    fn with_story<E: StoryUserEntity>(entity: &E, story: S) -> Self {
        Self {
            id: entity.id(),
            user: entity.user_id(),
            story,
            score: entity.score(),
            points: entity.points(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BadgeTypeResponse {
    pub id: i64,
    pub org: i64,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub is_visible: bool,
    pub item_type: BadgeItemType,
    pub item_category: Option<i64>,
    pub item_count: i32,
}

impl From<BadgeType> for BadgeTypeResponse {
    fn from(bt: BadgeType) -> Self {
        Self {
            id: bt.id,
            org: bt.org_id,
            title: bt.title,
            image: bt.image,
            description: bt.description,
            is_visible: bt.is_visible,
            item_type: bt.item_type,
            item_category: bt.item_category,
            item_count: bt.item_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserBadgeResponse {
    pub id: i64,
    pub badge_type: BadgeTypeResponse,
    pub user: i64,
    pub received_on: DateTime<Utc>,
}

impl From<UserBadge> for UserBadgeResponse {
    fn from(ub: UserBadge) -> Self {
        Self {
            id: ub.id,
            badge_type: ub.badge_type.into(),
            user: ub.user_id,
            received_on: ub.received_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StoryBookmark, StoryRating};
    use serde_json::json;

    #[test]
    fn test_flat_views_only_carry_their_value_column() {
        let bookmark = StoryBookmark {
            id: 1,
            story_id: 2,
            user_id: 3,
            created_on: Utc::now(),
        };
        assert_eq!(
            serde_json::to_value(StoryActionView::flat(&bookmark)).unwrap(),
            json!({"id": 1, "user": 3, "story": 2})
        );

        let rating = StoryRating {
            id: 4,
            story_id: 2,
            user_id: 3,
            score: 5,
            created_on: Utc::now(),
        };
        assert_eq!(
            serde_json::to_value(StoryActionView::flat(&rating)).unwrap(),
            json!({"id": 4, "user": 3, "story": 2, "score": 5})
        );
    }

    #[test]
    fn test_settings_representation() {
        let mut settings = StorySettings::new(1);
        settings.cached_rating = 4.5;
        assert_eq!(
            serde_json::to_value(StorySettingsResponse::from(settings)).unwrap(),
            json!({"display_rating": true, "rating": 4.5})
        );
    }
}
