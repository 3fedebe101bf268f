//! 徽章类型与用户徽章管理服务

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{ApiError, Result};
use crate::models::{BadgeItemType, BadgeType, NewBadgeType, UserBadge};
use crate::repository::{BadgeRepositoryTrait, PageRequest, UserBadgeFilter};

pub struct BadgeService {
    badges: Arc<dyn BadgeRepositoryTrait>,
}

impl BadgeService {
    pub fn new(badges: Arc<dyn BadgeRepositoryTrait>) -> Self {
        Self { badges }
    }

    fn check_item_category(badge_type: &NewBadgeType) -> Result<()> {
        if badge_type.item_type == BadgeItemType::CategoryRead && badge_type.item_category.is_none()
        {
            return Err(ApiError::field(
                "item_category",
                "This field is required for category_read badges.",
            ));
        }
        Ok(())
    }

    pub async fn list_badge_types(
        &self,
        org: Option<i64>,
        page: Option<PageRequest>,
    ) -> Result<(Vec<BadgeType>, i64)> {
        self.badges.list_badge_types(org, page).await
    }

    pub async fn get_badge_type(&self, id: i64) -> Result<BadgeType> {
        self.badges
            .get_badge_type(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("badge type {id}")))
    }

    #[instrument(skip(self, badge_type), fields(org_id = badge_type.org_id, title = %badge_type.title))]
    pub async fn create_badge_type(&self, badge_type: &NewBadgeType) -> Result<BadgeType> {
        Self::check_item_category(badge_type)?;
        let created = self.badges.create_badge_type(badge_type).await?;
        info!(id = created.id, "Badge type created");
        Ok(created)
    }

    #[instrument(skip(self, badge_type))]
    pub async fn update_badge_type(&self, id: i64, badge_type: &NewBadgeType) -> Result<BadgeType> {
        Self::check_item_category(badge_type)?;
        let updated = self
            .badges
            .update_badge_type(id, badge_type)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("badge type {id}")))?;
        info!(id, "Badge type updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_badge_type(&self, id: i64) -> Result<()> {
        if !self.badges.delete_badge_type(id).await? {
            return Err(ApiError::NotFound(format!("badge type {id}")));
        }
        info!(id, "Badge type deleted");
        Ok(())
    }

    pub async fn list_user_badges(
        &self,
        filter: UserBadgeFilter,
        page: Option<PageRequest>,
    ) -> Result<(Vec<UserBadge>, i64)> {
        self.badges.list_user_badges(filter, page).await
    }

    pub async fn get_user_badge(&self, id: i64) -> Result<UserBadge> {
        self.badges
            .get_user_badge(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user badge {id}")))
    }

    /// 管理员手动发放徽章
    #[instrument(skip(self))]
    pub async fn create_user_badge(
        &self,
        user: Option<i64>,
        badge_type: Option<i64>,
    ) -> Result<UserBadge> {
        let badge_type = badge_type.ok_or_else(|| ApiError::required("badge_type"))?;
        let user = user.ok_or_else(|| ApiError::required("user"))?;

        let created = self.badges.create_user_badge(user, badge_type).await?;
        info!(id = created.id, "User badge created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn delete_user_badge(&self, id: i64) -> Result<()> {
        if !self.badges.delete_user_badge(id).await? {
            return Err(ApiError::NotFound(format!("user badge {id}")));
        }
        Ok(())
    }
}
