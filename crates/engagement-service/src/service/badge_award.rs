//! 阅读徽章评估
//!
//! 用户阅读故事后，按故事所属组织与分类的阅读数判定可获得的徽章。
//! 发放采用不存在才插入的语义，并发阅读不会重复发放，只返回本次新插入的徽章。

use std::sync::Arc;

use tracing::{info, instrument};
use ureport_shared::observability::metrics;

use crate::error::Result;
use crate::models::{BadgeType, ReadProgress, StorySummary, UserBadge};
use crate::repository::{BadgeRepositoryTrait, StoryRepositoryTrait};

/// 从候选徽章类型中筛出已达成的
pub fn select_earned(candidates: Vec<BadgeType>, progress: &ReadProgress) -> Vec<BadgeType> {
    candidates
        .into_iter()
        .filter(|badge_type| badge_type.is_visible && badge_type.is_earned(progress))
        .collect()
}

pub struct BadgeAwarder {
    stories: Arc<dyn StoryRepositoryTrait>,
    badges: Arc<dyn BadgeRepositoryTrait>,
}

impl BadgeAwarder {
    pub fn new(stories: Arc<dyn StoryRepositoryTrait>, badges: Arc<dyn BadgeRepositoryTrait>) -> Self {
        Self { stories, badges }
    }

    /// 为一次故事阅读评估并发放徽章
    #[instrument(skip(self, story), fields(story_id = story.id, org_id = story.org))]
    pub async fn award_for_read(&self, user_id: i64, story: &StorySummary) -> Result<Vec<UserBadge>> {
        let candidates = self
            .badges
            .list_unearned_badge_types(user_id, story.org)
            .await?;
        if candidates.is_empty() {
            metrics::record_badge_evaluation(0);
            return Ok(vec![]);
        }

        let org_reads = self.stories.count_reads_in_org(user_id, story.org).await?;
        let category_reads = match story.category_id() {
            Some(category_id) => {
                self.stories
                    .count_reads_in_category(user_id, category_id)
                    .await?
            }
            None => 0,
        };
        let progress = ReadProgress {
            org_id: story.org,
            category_id: story.category_id(),
            org_reads,
            category_reads,
        };

        let mut awarded = Vec::new();
        for badge_type in select_earned(candidates, &progress) {
            if let Some(user_badge) = self.badges.award_badge(user_id, badge_type.id).await? {
                info!(
                    user_id,
                    badge_type_id = badge_type.id,
                    title = %badge_type.title,
                    "Badge awarded"
                );
                awarded.push(user_badge);
            }
        }

        metrics::record_badge_evaluation(awarded.len());
        Ok(awarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeItemType, CategoryRef};
    use crate::repository::{MockBadgeRepositoryTrait, MockStoryRepositoryTrait};
    use chrono::Utc;

    fn badge_type(id: i64, item_type: BadgeItemType, category: Option<i64>, count: i32) -> BadgeType {
        BadgeType {
            id,
            org_id: 1,
            title: format!("badge-{id}"),
            description: String::new(),
            image: None,
            is_visible: true,
            item_type,
            item_category: category,
            item_count: count,
        }
    }

    fn story() -> StorySummary {
        StorySummary {
            id: 100,
            org: 1,
            title: "Story".into(),
            featured: false,
            summary: String::new(),
            video_id: None,
            audio_link: None,
            tags: None,
            category: Some(CategoryRef {
                id: 4,
                name: "Health".into(),
            }),
            created_on: Utc::now(),
        }
    }

    fn awarded(user_id: i64, badge_type: BadgeType) -> UserBadge {
        UserBadge {
            id: badge_type.id * 10,
            user_id,
            badge_type,
            received_on: Utc::now(),
        }
    }

    #[test]
    fn test_select_earned_skips_hidden_types() {
        let progress = ReadProgress {
            org_id: 1,
            category_id: Some(4),
            org_reads: 5,
            category_reads: 5,
        };
        let mut hidden = badge_type(2, BadgeItemType::StoryRead, None, 1);
        hidden.is_visible = false;

        let earned = select_earned(
            vec![badge_type(1, BadgeItemType::StoryRead, None, 5), hidden],
            &progress,
        );
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].id, 1);
    }

    #[tokio::test]
    async fn test_award_for_read_crossing_thresholds() {
        let mut stories = MockStoryRepositoryTrait::new();
        stories.expect_count_reads_in_org().returning(|_, _| Ok(3));
        stories.expect_count_reads_in_category().returning(|_, _| Ok(1));

        let mut badges = MockBadgeRepositoryTrait::new();
        badges.expect_list_unearned_badge_types().returning(|_, _| {
            Ok(vec![
                badge_type(1, BadgeItemType::StoryRead, None, 3),
                badge_type(2, BadgeItemType::StoryRead, None, 4),
                badge_type(3, BadgeItemType::CategoryRead, Some(4), 1),
                badge_type(4, BadgeItemType::CategoryRead, Some(9), 1),
            ])
        });
        badges
            .expect_award_badge()
            .times(2)
            .returning(|user_id, badge_type_id| {
                let item_type = if badge_type_id == 3 {
                    BadgeItemType::CategoryRead
                } else {
                    BadgeItemType::StoryRead
                };
                Ok(Some(awarded(user_id, badge_type(badge_type_id, item_type, None, 1))))
            });

        let awarder = BadgeAwarder::new(Arc::new(stories), Arc::new(badges));
        let result = awarder.award_for_read(7, &story()).await.unwrap();

        let ids: Vec<i64> = result.iter().map(|ub| ub.badge_type.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_award_for_read_drops_concurrent_duplicates() {
        let mut stories = MockStoryRepositoryTrait::new();
        stories.expect_count_reads_in_org().returning(|_, _| Ok(1));
        stories.expect_count_reads_in_category().returning(|_, _| Ok(1));

        let mut badges = MockBadgeRepositoryTrait::new();
        badges
            .expect_list_unearned_badge_types()
            .returning(|_, _| Ok(vec![badge_type(1, BadgeItemType::StoryRead, None, 1)]));
        // 另一个请求已先行插入
        badges.expect_award_badge().returning(|_, _| Ok(None));

        let awarder = BadgeAwarder::new(Arc::new(stories), Arc::new(badges));
        assert!(awarder.award_for_read(7, &story()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_candidates_skips_counting() {
        let mut stories = MockStoryRepositoryTrait::new();
        stories.expect_count_reads_in_org().never();

        let mut badges = MockBadgeRepositoryTrait::new();
        badges
            .expect_list_unearned_badge_types()
            .returning(|_, _| Ok(vec![]));

        let awarder = BadgeAwarder::new(Arc::new(stories), Arc::new(badges));
        assert!(awarder.award_for_read(7, &story()).await.unwrap().is_empty());
    }
}
