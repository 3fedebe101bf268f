//! 故事互动服务
//!
//! 管理端通用增删查，以及用户维度的收藏、评分、阅读写入。
//! 阅读首次写入时按故事设置发放奖励积分，并触发徽章评估。

use std::sync::Arc;

use tracing::{info, instrument};
use ureport_shared::observability::metrics;

use super::{BadgeAwarder, StoryService};
use crate::error::{ApiError, FieldErrors, Result};
use crate::models::{
    StoryActionKind, StoryBookmark, StoryRating, StoryRead, StoryReward, StorySummary,
    StoryUserEntity, UserBadge,
};
use crate::repository::{
    PageRequest, StoryActionEntity, StoryActionRepos, StoryUserFilter, UserRepositoryTrait,
};

const MAX_POINTS: i64 = i16::MAX as i64;

/// 通用创建请求的输入
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoryActionInput {
    pub user: Option<i64>,
    pub story: Option<i64>,
    pub score: Option<i64>,
    pub points: Option<i64>,
}

/// 校验并返回写入数值列的值
///
/// 评分必填且在 1 到 5 之间；奖励积分缺省为 0；其余实体没有数值列
pub fn action_value(
    kind: StoryActionKind,
    score: Option<i64>,
    points: Option<i64>,
) -> Result<Option<i32>> {
    match kind {
        StoryActionKind::Rating => {
            let score = score.ok_or_else(|| ApiError::field("score", "This field may not be null."))?;
            check_range("score", score, 1, 5)?;
            Ok(Some(score as i32))
        }
        StoryActionKind::Reward => {
            let points = points.unwrap_or(0);
            check_range("points", points, 0, MAX_POINTS)?;
            Ok(Some(points as i32))
        }
        StoryActionKind::Bookmark | StoryActionKind::Read => Ok(None),
    }
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min {
        return Err(ApiError::field(
            field,
            format!("Ensure this value is greater than or equal to {min}."),
        ));
    }
    if value > max {
        return Err(ApiError::field(
            field,
            format!("Ensure this value is less than or equal to {max}."),
        ));
    }
    Ok(())
}

pub struct EngagementService {
    stories: Arc<StoryService>,
    actions: StoryActionRepos,
    users: Arc<dyn UserRepositoryTrait>,
    awarder: BadgeAwarder,
}

impl EngagementService {
    pub fn new(
        stories: Arc<StoryService>,
        actions: StoryActionRepos,
        users: Arc<dyn UserRepositoryTrait>,
        awarder: BadgeAwarder,
    ) -> Self {
        Self {
            stories,
            actions,
            users,
            awarder,
        }
    }

    // ---------- 管理端通用操作 ----------

    pub async fn list<E: StoryActionEntity>(
        &self,
        filter: StoryUserFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<E>, i64)> {
        self.actions.get::<E>().list(filter, page).await
    }

    /// 列表并附带故事摘要
    pub async fn list_detailed<E: StoryActionEntity>(
        &self,
        filter: StoryUserFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<(E, StorySummary)>, i64)> {
        let (items, total) = self.list::<E>(filter, page).await?;

        let mut detailed = Vec::with_capacity(items.len());
        for item in items {
            let story = self.stories.get_story(item.story_id()).await?;
            detailed.push((item, story));
        }
        Ok((detailed, total))
    }

    pub async fn get<E: StoryActionEntity>(&self, id: i64) -> Result<E> {
        self.actions
            .get::<E>()
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{} {id}", E::KIND)))
    }

    /// 严格创建，(story, user) 已存在时返回唯一约束错误
    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub async fn create<E: StoryActionEntity>(&self, input: StoryActionInput) -> Result<E> {
        let mut errors = FieldErrors::new();
        if input.story.is_none() {
            errors.insert("story".into(), vec!["This field is required.".into()]);
        }
        if input.user.is_none() {
            errors.insert("user".into(), vec!["This field is required.".into()]);
        }
        let value = match action_value(E::KIND, input.score, input.points) {
            Ok(value) => value,
            Err(ApiError::Validation(value_errors)) => {
                errors.extend(value_errors);
                None
            }
            Err(e) => return Err(e),
        };
        let (Some(story_id), Some(user_id)) = (input.story, input.user) else {
            return Err(ApiError::Validation(errors));
        };
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        self.stories
            .find_story(story_id)
            .await?
            .ok_or_else(|| ApiError::invalid_pk("story", story_id))?;
        self.users
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::invalid_pk("user", user_id))?;

        let created = self.actions.get::<E>().create(story_id, user_id, value).await?;
        metrics::record_story_action(E::KIND.as_str(), "created");
        info!(id = created.id(), story_id, user_id, "Story action created");

        if E::KIND == StoryActionKind::Rating {
            self.stories.refresh_rating(story_id).await?;
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub async fn delete<E: StoryActionEntity>(&self, id: i64) -> Result<()> {
        let existing = self.get::<E>(id).await?;
        if !self.actions.get::<E>().delete(id).await? {
            return Err(ApiError::NotFound(format!("{} {id}", E::KIND)));
        }
        metrics::record_story_action(E::KIND.as_str(), "removed");

        if E::KIND == StoryActionKind::Rating {
            self.stories.refresh_rating(existing.story_id()).await?;
        }
        Ok(())
    }

    // ---------- 用户维度操作 ----------

    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        self.users
            .get_user(user_id)
            .await?
            .map(|_| ())
            .ok_or(ApiError::UserNotFound(user_id))
    }

    async fn resolve_story(&self, story: Option<i64>) -> Result<StorySummary> {
        let story_id = story.ok_or_else(|| ApiError::required("story"))?;
        self.stories
            .find_story(story_id)
            .await?
            .ok_or_else(|| ApiError::invalid_pk("story", story_id))
    }

    fn outcome(created: bool) -> &'static str {
        if created { "created" } else { "existing" }
    }

    /// 收藏故事，已收藏时原样返回；第三个值表示是否新建
    #[instrument(skip(self))]
    pub async fn bookmark_story(
        &self,
        user_id: i64,
        story: Option<i64>,
    ) -> Result<(StoryBookmark, StorySummary, bool)> {
        self.ensure_user(user_id).await?;
        let story = self.resolve_story(story).await?;

        let (bookmark, created) = self
            .actions
            .bookmarks
            .get_or_create(story.id, user_id, None)
            .await?;
        metrics::record_story_action(StoryActionKind::Bookmark.as_str(), Self::outcome(created));

        Ok((bookmark, story, created))
    }

    /// 取消收藏，返回删除条数
    #[instrument(skip(self))]
    pub async fn remove_bookmark(&self, user_id: i64, story: Option<i64>) -> Result<u64> {
        let Some(story_id) = story else {
            return Ok(0);
        };

        let count = self.actions.bookmarks.delete_for(story_id, user_id).await?;
        if count > 0 {
            metrics::record_story_action(StoryActionKind::Bookmark.as_str(), "removed");
        }
        Ok(count)
    }

    /// 评分，已评分时覆盖分数；第三个值表示是否新建
    #[instrument(skip(self))]
    pub async fn rate_story(
        &self,
        user_id: i64,
        story: Option<i64>,
        score: Option<i64>,
    ) -> Result<(StoryRating, StorySummary, bool)> {
        let value = action_value(StoryActionKind::Rating, score, None)?;
        self.ensure_user(user_id).await?;
        let story = self.resolve_story(story).await?;

        let (rating, created) = self
            .actions
            .ratings
            .upsert(story.id, user_id, value)
            .await?;
        let outcome = if created { "created" } else { "updated" };
        metrics::record_story_action(StoryActionKind::Rating.as_str(), outcome);

        self.stories.refresh_rating(story.id).await?;
        Ok((rating, story, created))
    }

    /// 记录阅读并评估徽章，返回本次新获得的徽章与是否首次阅读
    #[instrument(skip(self))]
    pub async fn read_story(
        &self,
        user_id: i64,
        story: Option<i64>,
    ) -> Result<(Vec<UserBadge>, bool)> {
        self.ensure_user(user_id).await?;
        let story = self.resolve_story(story).await?;

        let (_, created): (StoryRead, bool) = self
            .actions
            .reads
            .get_or_create(story.id, user_id, None)
            .await?;
        metrics::record_story_action(StoryActionKind::Read.as_str(), Self::outcome(created));

        if created {
            self.reward_first_read(user_id, story.id).await?;
        }

        let badges = self.awarder.award_for_read(user_id, &story).await?;
        Ok((badges, created))
    }

    async fn reward_first_read(&self, user_id: i64, story_id: i64) -> Result<()> {
        let settings = self.stories.get_settings(story_id).await?;
        if settings.reward_points <= 0 {
            return Ok(());
        }

        let (_, created): (StoryReward, bool) = self
            .actions
            .rewards
            .get_or_create(story_id, user_id, Some(i32::from(settings.reward_points)))
            .await?;
        if created {
            metrics::record_story_action(StoryActionKind::Reward.as_str(), "created");
            info!(user_id, story_id, points = settings.reward_points, "Reward granted");
        }
        Ok(())
    }
}
