//! 故事查询与故事设置服务
//!
//! 故事摘要采用 cache-aside：Redis 未启用或读写失败时直接访问数据库。
//! 缓存键: story:summary:{id}, TTL: 10min

use std::sync::Arc;
use std::time::Duration;

use tracing::{instrument, warn};
use ureport_shared::cache::{Cache, CacheKey};

use crate::error::{ApiError, Result};
use crate::models::{StorySettings, StorySettingsUpdate, StorySummary};
use crate::repository::StoryRepositoryTrait;

const STORY_SUMMARY_TTL: Duration = Duration::from_secs(600);

pub struct StoryService {
    stories: Arc<dyn StoryRepositoryTrait>,
    cache: Option<Arc<Cache>>,
}

impl StoryService {
    pub fn new(stories: Arc<dyn StoryRepositoryTrait>, cache: Option<Arc<Cache>>) -> Self {
        Self { stories, cache }
    }

    /// 查询故事摘要，不存在时返回 None
    #[instrument(skip(self))]
    pub async fn find_story(&self, id: i64) -> Result<Option<StorySummary>> {
        let key = CacheKey::story_summary(id);

        if let Some(cache) = &self.cache {
            match cache.get::<StorySummary>(&key).await {
                Ok(Some(cached)) => return Ok(Some(cached)),
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache get failed, falling back to database");
                }
            }
        }

        let story = self.stories.get_story(id).await?;

        if let (Some(cache), Some(story)) = (&self.cache, &story) {
            if let Err(e) = cache.set(&key, story, STORY_SUMMARY_TTL).await {
                warn!(key = %key, error = %e, "Cache set failed");
            }
        }

        Ok(story)
    }

    /// 查询故事摘要，不存在时返回 404
    pub async fn get_story(&self, id: i64) -> Result<StorySummary> {
        self.find_story(id).await?.ok_or(ApiError::StoryNotFound(id))
    }

    /// 获取故事设置，首次访问时按默认值创建
    pub async fn get_settings(&self, story_id: i64) -> Result<StorySettings> {
        self.get_story(story_id).await?;
        self.stories.get_or_create_settings(story_id).await
    }

    pub async fn update_settings(
        &self,
        story_id: i64,
        update: &StorySettingsUpdate,
    ) -> Result<StorySettings> {
        self.get_story(story_id).await?;
        self.stories.update_settings(story_id, update).await
    }

    /// 评分变化后重新计算平均分
    pub async fn refresh_rating(&self, story_id: i64) -> Result<f64> {
        self.stories.refresh_cached_rating(story_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockStoryRepositoryTrait;

    #[tokio::test]
    async fn test_get_story_not_found() {
        let mut repo = MockStoryRepositoryTrait::new();
        repo.expect_get_story().returning(|_| Ok(None));

        let service = StoryService::new(Arc::new(repo), None);
        let err = service.get_story(10).await.unwrap_err();
        assert!(matches!(err, ApiError::StoryNotFound(10)));
    }

    #[tokio::test]
    async fn test_settings_require_existing_story() {
        let mut repo = MockStoryRepositoryTrait::new();
        repo.expect_get_story().returning(|_| Ok(None));
        repo.expect_get_or_create_settings().never();

        let service = StoryService::new(Arc::new(repo), None);
        assert!(service.get_settings(10).await.is_err());
    }
}
